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

//! # Stock Ledger
//!
//! This library tracks retail inventory: product stock levels, an
//! append-only audit trail of every stock movement, price history, sales
//! with cached totals, customer returns and bulk maintenance operations.
//!
//! ## Core Components
//!
//! - [`Inventory`]: Entry point for every command, shareable between threads
//! - [`StockLedger`]: The single place stock quantities change, with its [`StockJournal`]
//! - [`PriceHistoryTracker`]: Price history recorded after each product save
//! - [`Sale`], [`SaleItem`], [`SaleReturn`]: Snapshots of the sale aggregate
//! - [`InventoryError`]: Error types for rejected commands
//!
//! ## Example
//!
//! ```
//! use stock_ledger_rs::{Inventory, NewProduct, NewSaleItem, UserId};
//! use rust_decimal_macros::dec;
//!
//! let inventory = Inventory::new();
//! let clerk = UserId(1);
//!
//! let coffee = inventory
//!     .create_product(NewProduct::new("Coffee", dec!(6.00), dec!(10.00)).stock(20))
//!     .unwrap();
//!
//! // Sell three bags
//! let sale = inventory
//!     .create_sale(clerk, None, &[NewSaleItem::new(coffee, 3)], true)
//!     .unwrap();
//! assert_eq!(sale.total_amount, dec!(30.00));
//! assert_eq!(sale.profit, dec!(12.00));
//!
//! // One comes back
//! inventory.process_return(clerk, sale.items[0].id, 1, "torn bag").unwrap();
//! assert_eq!(inventory.product(coffee).unwrap().stock_quantity, 18);
//! assert_eq!(inventory.stock_transactions(coffee).len(), 2);
//! ```
//!
//! ## Thread Safety
//!
//! Commands on different products run in parallel. Commands that share a
//! product or a sale serialize on per-entity locks, always acquired sales
//! first and then products, each in ascending ID order.

mod base;
mod bulk;
mod catalog;
pub mod config;
mod engine;
pub mod error;
mod journal;
pub mod notify;
mod price_history;
mod product;
mod returns;
mod sale;
mod stock;
mod transaction;

pub use base::{
    CategoryId, CustomerId, ProductId, ReturnId, SaleId, SaleItemId, StockTransactionId, UserId,
};
pub use bulk::{DeletionReport, RestockReport};
pub use catalog::{Category, Customer};
pub use config::LedgerConfig;
pub use engine::Inventory;
pub use error::{InventoryError, NotifyError};
pub use journal::StockJournal;
pub use notify::{LowStockAlert, LowStockNotifier, TracingNotifier};
pub use price_history::{PriceHistoryEntry, PriceHistoryTracker};
pub use product::{NewProduct, ProductSnapshot, ProductUpdate, StockStatus};
pub use returns::SaleReturn;
pub use sale::{NewSaleItem, Sale, SaleItem};
pub use stock::{BoundPolicy, StockLedger};
pub use transaction::{StockTransaction, StockTransactionType, StockWarning};
