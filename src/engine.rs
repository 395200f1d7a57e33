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

//! Inventory engine.
//!
//! [`Inventory`] is the entry point for every command. It owns the stock
//! ledger, the catalog, the sale book and the price history, and
//! orchestrates the cascades between them:
//!
//! - **Catalog**: products, categories, customers, price history hook.
//! - **Sales**: create, add/edit/remove items, delete, payment flag.
//! - **Returns**: process and cancel.
//! - **Bulk**: restock to maximum, delete sales or items in one batch.
//!
//! # Locking
//!
//! Operations that touch several entities lock sales in ascending ID order,
//! then products in ascending ID order. Catalog data is read under its own
//! leaf lock. Low-stock alerts are delivered once every lock is released.

use crate::base::{CategoryId, CustomerId, ProductId, Sequence, StockTransactionId, UserId};
use crate::catalog::{Category, Customer};
use crate::config::LedgerConfig;
use crate::error::InventoryError;
use crate::notify::{LowStockNotifier, TracingNotifier};
use crate::price_history::PriceHistoryTracker;
use crate::sale::SaleBook;
use crate::stock::StockLedger;
use crate::transaction::{StockTransaction, StockTransactionType};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Inventory store with transactional stock, sale and return handling.
///
/// All methods take `&self`; share the engine between threads with an
/// [`Arc`].
///
/// # Invariants
///
/// - `0 <= stock_quantity <= max_stock_level` for every product at rest.
/// - Every stock change has exactly one journal record.
/// - A sale's total and profit match its items after every command.
/// - A persisted sale has at least one item.
pub struct Inventory {
    pub(crate) config: LedgerConfig,
    pub(crate) ledger: StockLedger,
    pub(crate) prices: PriceHistoryTracker,
    pub(crate) sales: SaleBook,
    pub(crate) categories: DashMap<CategoryId, Category>,
    /// Unique category names.
    pub(crate) category_names: DashMap<String, CategoryId>,
    pub(crate) customers: DashMap<CustomerId, Customer>,
    pub(crate) product_ids: Sequence,
    pub(crate) category_ids: Sequence,
    pub(crate) customer_ids: Sequence,
}

impl Inventory {
    /// Creates an empty inventory with default settings.
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        Self::with_notifier(config, Arc::new(TracingNotifier))
    }

    /// Creates an inventory that delivers low-stock alerts to `notifier`.
    pub fn with_notifier(config: LedgerConfig, notifier: Arc<dyn LowStockNotifier>) -> Self {
        Self {
            ledger: StockLedger::new(&config, notifier),
            config,
            prices: PriceHistoryTracker::new(),
            sales: SaleBook::new(),
            categories: DashMap::new(),
            category_names: DashMap::new(),
            customers: DashMap::new(),
            product_ids: Sequence::new(),
            category_ids: Sequence::new(),
            customer_ids: Sequence::new(),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn ledger(&self) -> &StockLedger {
        &self.ledger
    }

    pub fn price_tracker(&self) -> &PriceHistoryTracker {
        &self.prices
    }

    /// Applies a signed stock delta, clamping decreases at zero.
    ///
    /// See [`StockLedger::apply_delta`].
    pub fn apply_delta(
        &self,
        actor: UserId,
        product: ProductId,
        signed_quantity: i64,
        transaction_type: StockTransactionType,
        notes: &str,
    ) -> Result<i64, InventoryError> {
        self.ledger
            .apply_delta(actor, product, signed_quantity, transaction_type, notes)
    }

    /// Records a manual stock movement that must fit within bounds.
    ///
    /// See [`StockLedger::record_stock_transaction`].
    pub fn record_stock_transaction(
        &self,
        actor: UserId,
        product: ProductId,
        quantity: u32,
        is_increase: bool,
        transaction_type: StockTransactionType,
        notes: &str,
    ) -> Result<StockTransaction, InventoryError> {
        self.ledger.record_stock_transaction(
            actor,
            product,
            quantity,
            is_increase,
            transaction_type,
            notes,
        )
    }

    /// Stock transactions for a product, oldest first.
    pub fn stock_transactions(&self, product: ProductId) -> Vec<StockTransaction> {
        self.ledger.journal().for_product(product)
    }

    pub fn stock_transaction(&self, id: StockTransactionId) -> Option<StockTransaction> {
        self.ledger.journal().get(id)
    }

    /// Rounds money for snapshots.
    pub(crate) fn money(&self, amount: Decimal) -> Decimal {
        amount.round_dp(self.config.money_precision)
    }
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Inventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inventory")
            .field("config", &self.config)
            .field("ledger", &self.ledger)
            .field("sales", &self.sales.len())
            .finish()
    }
}
