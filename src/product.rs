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

//! Product records.
//!
//! A product is split in two independently locked halves:
//!
//! - catalog data (name, category, prices, active flag) behind a `RwLock`,
//!   which is a leaf lock: nothing else is ever acquired while it is held;
//! - stock data (quantity and levels) behind a `Mutex`, which is the
//!   per-product row lock every stock mutation holds from read to write.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use stock_ledger_rs::{Inventory, NewProduct, StockStatus};
//!
//! let inventory = Inventory::new();
//! let id = inventory
//!     .create_product(NewProduct::new("Espresso beans", dec!(8.00), dec!(12.50)).stock(3))
//!     .unwrap();
//! let product = inventory.product(id).unwrap();
//! assert_eq!(product.status, StockStatus::LowStock);
//! ```

use crate::base::{CategoryId, ProductId};
use crate::error::InventoryError;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Smallest accepted price.
pub(crate) const MIN_PRICE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Accepts prices of at least 0.01 expressed in whole units of `precision`
/// decimal places, so line totals never need rounding.
pub(crate) fn validate_price(price: Decimal, precision: u32) -> Result<Decimal, InventoryError> {
    if price < MIN_PRICE || price.normalize().scale() > precision {
        return Err(InventoryError::InvalidPrice);
    }
    Ok(price)
}

/// Stock classification shown next to each product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Inactive,
    OutOfStock,
    LowStock,
    InStock,
}

impl StockStatus {
    pub fn classify(is_active: bool, stock_quantity: u32, min_stock_level: u32) -> Self {
        if !is_active {
            Self::Inactive
        } else if stock_quantity == 0 {
            Self::OutOfStock
        } else if stock_quantity <= min_stock_level {
            Self::LowStock
        } else {
            Self::InStock
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Inactive => "Inactive",
            Self::OutOfStock => "Out of Stock",
            Self::LowStock => "Low Stock",
            Self::InStock => "In Stock",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CatalogData {
    pub(crate) name: String,
    pub(crate) category: Option<CategoryId>,
    pub(crate) purchase_price: Decimal,
    pub(crate) selling_price: Decimal,
    pub(crate) is_active: bool,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub(crate) struct StockData {
    pub(crate) quantity: u32,
    pub(crate) min_stock_level: u32,
    pub(crate) max_stock_level: u32,
    pub(crate) low_stock_alert: bool,
}

impl StockData {
    pub(crate) fn assert_invariants(&self) {
        debug_assert!(
            self.quantity <= self.max_stock_level,
            "Invariant violated: stock {} above maximum {}",
            self.quantity,
            self.max_stock_level
        );
    }
}

/// Shared product record.
#[derive(Debug)]
pub(crate) struct ProductEntry {
    pub(crate) id: ProductId,
    pub(crate) catalog: RwLock<CatalogData>,
    pub(crate) stock: Mutex<StockData>,
}

impl ProductEntry {
    pub(crate) fn new(id: ProductId, catalog: CatalogData, stock: StockData) -> Self {
        Self {
            id,
            catalog: RwLock::new(catalog),
            stock: Mutex::new(stock),
        }
    }

    pub(crate) fn purchase_price(&self) -> Decimal {
        self.catalog.read().purchase_price
    }

    pub(crate) fn snapshot(&self) -> ProductSnapshot {
        let stock = self.stock.lock();
        let catalog = self.catalog.read();
        ProductSnapshot::assemble(self.id, &catalog, &stock)
    }
}

/// Point-in-time view of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub category: Option<CategoryId>,
    pub purchase_price: Decimal,
    pub selling_price: Decimal,
    pub stock_quantity: u32,
    pub min_stock_level: u32,
    pub max_stock_level: u32,
    pub is_active: bool,
    pub low_stock_alert: bool,
    pub status: StockStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductSnapshot {
    pub(crate) fn assemble(id: ProductId, catalog: &CatalogData, stock: &StockData) -> Self {
        Self {
            id,
            name: catalog.name.clone(),
            category: catalog.category,
            purchase_price: catalog.purchase_price,
            selling_price: catalog.selling_price,
            stock_quantity: stock.quantity,
            min_stock_level: stock.min_stock_level,
            max_stock_level: stock.max_stock_level,
            is_active: catalog.is_active,
            low_stock_alert: stock.low_stock_alert,
            status: StockStatus::classify(catalog.is_active, stock.quantity, stock.min_stock_level),
            created_at: catalog.created_at,
            updated_at: catalog.updated_at,
        }
    }

    /// Markup over purchase price, in percent.
    pub fn profit_margin(&self) -> Decimal {
        if self.purchase_price.is_zero() {
            return Decimal::ZERO;
        }
        (self.selling_price - self.purchase_price) / self.purchase_price * Decimal::ONE_HUNDRED
    }

    /// Units that can be added before reaching the maximum level.
    pub fn free_capacity(&self) -> u32 {
        self.max_stock_level.saturating_sub(self.stock_quantity)
    }
}

/// Input for creating a catalog product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub category: Option<CategoryId>,
    pub purchase_price: Decimal,
    pub selling_price: Decimal,
    pub stock_quantity: u32,
    pub min_stock_level: Option<u32>,
    pub max_stock_level: Option<u32>,
    pub is_active: bool,
    pub low_stock_alert: bool,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, purchase_price: Decimal, selling_price: Decimal) -> Self {
        Self {
            name: name.into(),
            category: None,
            purchase_price,
            selling_price,
            stock_quantity: 0,
            min_stock_level: None,
            max_stock_level: None,
            is_active: true,
            low_stock_alert: true,
        }
    }

    pub fn category(mut self, category: CategoryId) -> Self {
        self.category = Some(category);
        self
    }

    pub fn stock(mut self, quantity: u32) -> Self {
        self.stock_quantity = quantity;
        self
    }

    pub fn levels(mut self, min: u32, max: u32) -> Self {
        self.min_stock_level = Some(min);
        self.max_stock_level = Some(max);
        self
    }

    pub fn low_stock_alert(mut self, enabled: bool) -> Self {
        self.low_stock_alert = enabled;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Partial update of a product's catalog fields.
///
/// Stock quantity is absent: after creation it only moves
/// through the stock ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub category: Option<CategoryId>,
    pub purchase_price: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    pub min_stock_level: Option<u32>,
    pub max_stock_level: Option<u32>,
    pub is_active: Option<bool>,
    pub low_stock_alert: Option<bool>,
}

impl ProductUpdate {
    pub fn prices(purchase_price: Decimal, selling_price: Decimal) -> Self {
        Self {
            purchase_price: Some(purchase_price),
            selling_price: Some(selling_price),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot(purchase: Decimal, selling: Decimal, stock: u32) -> ProductSnapshot {
        let now = Utc::now();
        let catalog = CatalogData {
            name: "Tea".into(),
            category: None,
            purchase_price: purchase,
            selling_price: selling,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let data = StockData {
            quantity: stock,
            min_stock_level: 5,
            max_stock_level: 100,
            low_stock_alert: true,
        };
        ProductSnapshot::assemble(ProductId(1), &catalog, &data)
    }

    #[test]
    fn classify_stock_status() {
        assert_eq!(StockStatus::classify(false, 50, 5), StockStatus::Inactive);
        assert_eq!(StockStatus::classify(true, 0, 5), StockStatus::OutOfStock);
        assert_eq!(StockStatus::classify(true, 5, 5), StockStatus::LowStock);
        assert_eq!(StockStatus::classify(true, 6, 5), StockStatus::InStock);
        // Min level of zero: only an empty shelf is flagged
        assert_eq!(StockStatus::classify(true, 0, 0), StockStatus::OutOfStock);
    }

    #[test]
    fn status_labels() {
        assert_eq!(StockStatus::OutOfStock.label(), "Out of Stock");
        assert_eq!(StockStatus::LowStock.label(), "Low Stock");
    }

    #[test]
    fn price_validation_rejects_sub_cent_values() {
        assert_eq!(validate_price(dec!(0.01), 2), Ok(dec!(0.01)));
        assert_eq!(validate_price(dec!(0.009), 2), Err(InventoryError::InvalidPrice));
        assert_eq!(validate_price(dec!(0), 2), Err(InventoryError::InvalidPrice));
        assert_eq!(validate_price(dec!(-3), 2), Err(InventoryError::InvalidPrice));
    }

    #[test]
    fn price_validation_respects_money_precision() {
        assert_eq!(validate_price(dec!(1.005), 2), Err(InventoryError::InvalidPrice));
        // Trailing zeros do not count as extra precision
        assert_eq!(validate_price(dec!(1.500), 2), Ok(dec!(1.500)));
        assert_eq!(validate_price(dec!(1.005), 3), Ok(dec!(1.005)));
        assert_eq!(validate_price(dec!(2.5), 0), Err(InventoryError::InvalidPrice));
    }

    #[test]
    fn profit_margin_is_markup_percentage() {
        let product = snapshot(dec!(8.00), dec!(10.00), 20);
        assert_eq!(product.profit_margin(), dec!(25));
    }

    #[test]
    fn free_capacity_counts_room_to_max() {
        assert_eq!(snapshot(dec!(1), dec!(2), 80).free_capacity(), 20);
        assert_eq!(snapshot(dec!(1), dec!(2), 100).free_capacity(), 0);
    }

    #[test]
    fn snapshot_serializes_money_as_strings() {
        let product = snapshot(dec!(8.00), dec!(10.50), 20);
        let json = serde_json::to_value(&product).unwrap();
        assert_eq!(json["selling_price"], "10.50");
        assert_eq!(json["status"], "in_stock");
    }
}
