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

//! Core identifier types for catalog entries, sales and ledger records.
//!
//! Every identifier wraps a `u32` and orders numerically. The ordering is
//! load-bearing: multi-entity operations lock sales and products in ascending
//! identifier order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }
    };
}

identifier!(
    /// Unique identifier for a product.
    ProductId
);
identifier!(
    /// Unique identifier for a product category.
    CategoryId
);
identifier!(
    /// Unique identifier for a customer record.
    CustomerId
);
identifier!(
    /// Unique identifier for a sale.
    SaleId
);
identifier!(
    /// Unique identifier for a sale line item.
    ///
    /// Item IDs are unique across all sales, not only within one sale.
    SaleItemId
);
identifier!(
    /// Unique identifier for a processed return.
    ReturnId
);
identifier!(
    /// Unique identifier for a stock transaction in the ledger journal.
    StockTransactionId
);
identifier!(
    /// Identity of the acting user, recorded on every audit record.
    UserId
);

impl UserId {
    /// Identity used for automated jobs and batch imports.
    pub const SYSTEM: UserId = UserId(0);
}

/// Monotonic identifier allocator.
///
/// Starts at 1 so that `0` never names a stored entity.
#[derive(Debug)]
pub(crate) struct Sequence(AtomicU32);

impl Sequence {
    pub(crate) fn new() -> Self {
        Self(AtomicU32::new(1))
    }

    pub(crate) fn next<T: From<u32>>(&self) -> T {
        T::from(self.0.fetch_add(1, Ordering::Relaxed))
    }
}
