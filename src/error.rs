// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Error types for stock, sale and return processing.
//!
//! Every variant of [`InventoryError`] is raised before any state is written:
//! an operation that returns an error has left the ledger untouched.

use crate::base::{CategoryId, CustomerId, ProductId, ReturnId, SaleId, SaleItemId};
use thiserror::Error;

/// Inventory processing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// An increase would push stock above the product's maximum level
    #[error("product {product}: stock {requested} would exceed maximum level {max}")]
    CapacityExceeded {
        product: ProductId,
        max: u32,
        requested: i64,
    },

    /// A decrease asks for more units than are on hand
    #[error("product {product}: insufficient stock (available {available}, requested {requested})")]
    InsufficientStock {
        product: ProductId,
        available: u32,
        requested: u32,
    },

    /// A return asks for more units than remain returnable on the item
    #[error("sale item {item}: cannot return {requested} units ({returnable} returnable)")]
    OverReturn {
        item: SaleItemId,
        returnable: u32,
        requested: u32,
    },

    /// Quantity is zero where a positive quantity is required
    #[error("invalid quantity (must be positive)")]
    InvalidQuantity,

    /// Price is below 0.01 or has more decimal places than the money precision
    #[error("invalid price (must be at least 0.01 with no more decimal places than the money precision)")]
    InvalidPrice,

    /// A sale must be created with at least one item
    #[error("a sale needs at least one item")]
    EmptySale,

    /// An edit would leave fewer units than have already been returned
    #[error("sale item {item}: quantity {requested} is below the {returned} units already returned")]
    QuantityBelowReturned {
        item: SaleItemId,
        returned: u32,
        requested: u32,
    },

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("sale {0} not found")]
    SaleNotFound(SaleId),

    #[error("sale item {0} not found")]
    SaleItemNotFound(SaleItemId),

    #[error("return {0} not found")]
    ReturnNotFound(ReturnId),

    #[error("customer {0} not found")]
    CustomerNotFound(CustomerId),

    #[error("category {0} not found")]
    CategoryNotFound(CategoryId),

    /// Category names are unique
    #[error("category '{0}' already exists")]
    DuplicateCategory(String),
}

impl InventoryError {
    /// Returns `true` for errors caused by a reference to a missing entity.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ProductNotFound(_)
                | Self::SaleNotFound(_)
                | Self::SaleItemNotFound(_)
                | Self::ReturnNotFound(_)
                | Self::CustomerNotFound(_)
                | Self::CategoryNotFound(_)
        )
    }
}

/// Failure reported by a low-stock notifier.
///
/// Never propagated out of a stock mutation; the ledger logs it and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("low-stock notification failed: {0}")]
pub struct NotifyError(pub String);
