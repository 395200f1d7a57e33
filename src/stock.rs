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

//! Stock ledger.
//!
//! The [`StockLedger`] is the only code path that changes a product's stock
//! quantity. Every change goes through a [`StockTxn`] unit of work:
//!
//! ```text
//! lock products (ascending id) ──► stage deltas against locked values
//!        │                                   │
//!        │                 validation error ─┴─► drop: nothing written
//!        ▼
//!     commit ──► write quantities + append journal records ──► unlock
//!        │
//!        └──► low-stock alerts queued, delivered after unlock
//! ```
//!
//! # Bound policies
//!
//! | Policy | Above max | Below zero | Used by |
//! |--------|-----------|------------|---------|
//! | [`BoundPolicy::Permissive`] | reject | clamp to 0 | sales, returns, restocks |
//! | [`BoundPolicy::Strict`] | reject | reject | manual stock transactions |
//! | [`BoundPolicy::Saturating`] | clamp to max | clamp to 0 | deletions (cleanup) |

use crate::base::{ProductId, UserId};
use crate::config::LedgerConfig;
use crate::error::InventoryError;
use crate::journal::StockJournal;
use crate::notify::{AlertOutbox, LowStockAlert, LowStockNotifier};
use crate::product::{ProductEntry, StockData};
use crate::transaction::{StockTransaction, StockTransactionType, StockWarning};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::MutexGuard;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// How a delta behaves when it would leave `[0, max_stock_level]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundPolicy {
    Permissive,
    Strict,
    Saturating,
}

/// Product stock store and transaction log.
pub struct StockLedger {
    products: DashMap<ProductId, Arc<ProductEntry>>,
    journal: StockJournal,
    alerts: AlertOutbox,
    alerts_enabled: bool,
}

impl StockLedger {
    pub(crate) fn new(config: &LedgerConfig, notifier: Arc<dyn LowStockNotifier>) -> Self {
        Self {
            products: DashMap::new(),
            journal: StockJournal::new(),
            alerts: AlertOutbox::new(notifier),
            alerts_enabled: config.low_stock_alerts,
        }
    }

    pub(crate) fn insert(&self, entry: ProductEntry) {
        self.products.insert(entry.id, Arc::new(entry));
    }

    /// Clones the shared record out of the map so no shard lock outlives the call.
    pub(crate) fn entry(&self, product: ProductId) -> Result<Arc<ProductEntry>, InventoryError> {
        self.products
            .get(&product)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(InventoryError::ProductNotFound(product))
    }

    pub(crate) fn entries(&self) -> Vec<Arc<ProductEntry>> {
        let mut entries: Vec<_> = self
            .products
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        entries.sort_by_key(|entry| entry.id);
        entries
    }

    /// Resolves products for a unit of work, sorted and deduplicated.
    pub(crate) fn lock_set<I>(&self, products: I) -> Result<LockSet, InventoryError>
    where
        I: IntoIterator<Item = ProductId>,
    {
        let mut ids: Vec<ProductId> = products.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        let entries = ids
            .into_iter()
            .map(|id| self.entry(id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LockSet { entries })
    }

    pub fn journal(&self) -> &StockJournal {
        &self.journal
    }

    /// Current committed stock of a product.
    pub fn stock_level(&self, product: ProductId) -> Result<u32, InventoryError> {
        Ok(self.entry(product)?.stock.lock().quantity)
    }

    /// Applies a signed delta under the [`BoundPolicy::Permissive`] policy.
    ///
    /// Returns the change actually applied, which differs from
    /// `signed_quantity` when a decrease was clamped at zero.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::InvalidQuantity`] - `signed_quantity` is zero.
    /// - [`InventoryError::CapacityExceeded`] - increase beyond the maximum level.
    /// - [`InventoryError::ProductNotFound`] - unknown product.
    pub fn apply_delta(
        &self,
        actor: UserId,
        product: ProductId,
        signed_quantity: i64,
        transaction_type: StockTransactionType,
        notes: &str,
    ) -> Result<i64, InventoryError> {
        let locks = self.lock_set([product])?;
        let mut txn = locks.begin(self, actor);
        let applied = txn.apply(
            product,
            signed_quantity,
            transaction_type,
            notes,
            BoundPolicy::Permissive,
        )?;
        txn.commit();
        self.flush_alerts();
        Ok(applied)
    }

    /// Manual stock entry: the change must fit entirely within bounds.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::InvalidQuantity`] - `quantity` is zero.
    /// - [`InventoryError::InsufficientStock`] - decrease below zero.
    /// - [`InventoryError::CapacityExceeded`] - increase beyond the maximum level.
    pub fn record_stock_transaction(
        &self,
        actor: UserId,
        product: ProductId,
        quantity: u32,
        is_increase: bool,
        transaction_type: StockTransactionType,
        notes: &str,
    ) -> Result<StockTransaction, InventoryError> {
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity);
        }
        let signed = if is_increase {
            i64::from(quantity)
        } else {
            -i64::from(quantity)
        };

        let locks = self.lock_set([product])?;
        let mut txn = locks.begin(self, actor);
        txn.apply(product, signed, transaction_type, notes, BoundPolicy::Strict)?;
        let mut records = txn.commit();
        self.flush_alerts();
        // Strict changes are never truncated, so exactly one record exists.
        records.pop().ok_or(InventoryError::InvalidQuantity)
    }

    /// Delivers queued low-stock alerts. Call with no locks held.
    pub(crate) fn flush_alerts(&self) -> usize {
        self.alerts.flush()
    }
}

impl std::fmt::Debug for StockLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockLedger")
            .field("products", &self.products.len())
            .field("journal", &self.journal.len())
            .field("alerts_enabled", &self.alerts_enabled)
            .finish()
    }
}

/// Products resolved for one unit of work, in ascending ID order.
pub(crate) struct LockSet {
    entries: Vec<Arc<ProductEntry>>,
}

impl LockSet {
    pub(crate) fn products(&self) -> Vec<ProductId> {
        self.entries.iter().map(|entry| entry.id).collect()
    }

    pub(crate) fn entry(&self, product: ProductId) -> Result<Arc<ProductEntry>, InventoryError> {
        self.entries
            .binary_search_by_key(&product, |entry| entry.id)
            .map(|index| Arc::clone(&self.entries[index]))
            .map_err(|_| InventoryError::ProductNotFound(product))
    }

    /// Acquires every stock lock in ascending product order.
    pub(crate) fn begin<'a>(&'a self, ledger: &'a StockLedger, actor: UserId) -> StockTxn<'a> {
        let slots = self
            .entries
            .iter()
            .map(|entry| {
                let guard = entry.stock.lock();
                let staged = guard.quantity;
                (
                    entry.id,
                    Slot {
                        entry,
                        guard,
                        staged,
                        touched: false,
                    },
                )
            })
            .collect();
        StockTxn {
            ledger,
            actor,
            slots,
            pending: Vec::new(),
        }
    }
}

struct Slot<'a> {
    entry: &'a ProductEntry,
    guard: MutexGuard<'a, StockData>,
    staged: u32,
    touched: bool,
}

struct PendingRecord {
    product: ProductId,
    applied: i64,
    previous: u32,
    new: u32,
    transaction_type: StockTransactionType,
    notes: String,
}

/// A unit of work over a set of locked products.
///
/// Deltas are staged against the locked quantities; nothing is visible to
/// other threads until [`StockTxn::commit`]. Dropping the unit without
/// committing discards every staged change.
pub(crate) struct StockTxn<'a> {
    ledger: &'a StockLedger,
    actor: UserId,
    slots: BTreeMap<ProductId, Slot<'a>>,
    pending: Vec<PendingRecord>,
}

impl<'a> StockTxn<'a> {
    fn slot(&mut self, product: ProductId) -> Result<&mut Slot<'a>, InventoryError> {
        self.slots
            .get_mut(&product)
            .ok_or(InventoryError::ProductNotFound(product))
    }

    /// Stock available to this unit, including its own staged changes.
    pub(crate) fn available(&self, product: ProductId) -> Result<u32, InventoryError> {
        self.slots
            .get(&product)
            .map(|slot| slot.staged)
            .ok_or(InventoryError::ProductNotFound(product))
    }

    /// Staged room left below the maximum level.
    pub(crate) fn free_capacity(&self, product: ProductId) -> Result<u32, InventoryError> {
        self.slots
            .get(&product)
            .map(|slot| slot.guard.max_stock_level.saturating_sub(slot.staged))
            .ok_or(InventoryError::ProductNotFound(product))
    }

    /// Stages a signed delta and returns the change actually applied.
    pub(crate) fn apply(
        &mut self,
        product: ProductId,
        signed_quantity: i64,
        transaction_type: StockTransactionType,
        notes: &str,
        policy: BoundPolicy,
    ) -> Result<i64, InventoryError> {
        if signed_quantity == 0 {
            return Err(InventoryError::InvalidQuantity);
        }

        let slot = self.slot(product)?;
        let previous = slot.staged;
        let max = slot.guard.max_stock_level;
        // Saturates so an oversized request still lands on the side it asked for.
        let target = i64::from(previous).saturating_add(signed_quantity);

        if target > i64::from(max) && policy != BoundPolicy::Saturating {
            return Err(InventoryError::CapacityExceeded {
                product,
                max,
                requested: target,
            });
        }
        if target < 0 && policy == BoundPolicy::Strict {
            return Err(InventoryError::InsufficientStock {
                product,
                available: previous,
                requested: u32::try_from(signed_quantity.unsigned_abs()).unwrap_or(u32::MAX),
            });
        }

        // Clamped into [0, max], so the conversion cannot fail.
        let new = u32::try_from(target.clamp(0, i64::from(max))).unwrap_or(max);
        let applied = i64::from(new) - i64::from(previous);
        slot.staged = new;
        slot.touched = true;

        if applied != signed_quantity {
            warn!(
                %product,
                requested = signed_quantity,
                applied,
                "Stock change truncated at bound"
            );
        }
        if applied == 0 {
            return Ok(0);
        }

        let notes = if applied == signed_quantity {
            notes.to_string()
        } else {
            annotate(notes, signed_quantity, applied)
        };
        self.pending.push(PendingRecord {
            product,
            applied,
            previous,
            new,
            transaction_type,
            notes,
        });
        Ok(applied)
    }

    /// Writes staged quantities, appends journal records and queues alerts.
    ///
    /// Locks are released when this returns; alerts stay queued until the
    /// caller flushes the ledger's outbox.
    pub(crate) fn commit(self) -> Vec<StockTransaction> {
        let StockTxn {
            ledger,
            actor,
            mut slots,
            pending,
        } = self;
        let now = Utc::now();

        let mut records = Vec::with_capacity(pending.len());
        for change in pending {
            let record = StockTransaction {
                id: ledger.journal.next_id(),
                product: change.product,
                quantity: u32::try_from(change.applied.unsigned_abs()).unwrap_or(u32::MAX),
                is_increase: change.applied > 0,
                transaction_type: change.transaction_type,
                previous_stock: change.previous,
                new_stock: change.new,
                notes: change.notes,
                created_at: now,
                created_by: actor,
            };
            debug!(
                id = %record.id,
                product = %record.product,
                kind = %record.transaction_type,
                previous = record.previous_stock,
                new = record.new_stock,
                "Stock transaction recorded"
            );
            records.push(record);
        }

        for (product, slot) in slots.iter_mut().filter(|(_, slot)| slot.touched) {
            slot.guard.quantity = slot.staged;
            slot.guard.assert_invariants();

            let data = &slot.guard;
            if ledger.alerts_enabled && data.low_stock_alert && data.quantity <= data.min_stock_level
            {
                ledger.alerts.push(LowStockAlert {
                    product: *product,
                    name: slot.entry.catalog.read().name.clone(),
                    stock_quantity: data.quantity,
                    min_stock_level: data.min_stock_level,
                });
            }
        }

        for record in &records {
            ledger.journal.append(record.clone());
        }
        drop(slots);
        records
    }
}

fn annotate(notes: &str, requested: i64, applied: i64) -> String {
    let suffix = format!("(requested {requested:+}, applied {applied:+})");
    if notes.is_empty() {
        suffix
    } else {
        format!("{notes} {suffix}")
    }
}

/// Builds the warning for a truncated change, if any.
pub(crate) fn truncation_warning(
    product: ProductId,
    requested: i64,
    applied: i64,
    context: &str,
) -> Option<StockWarning> {
    (requested != applied).then(|| StockWarning {
        product,
        requested,
        applied,
        context: context.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::TracingNotifier;
    use crate::product::CatalogData;
    use rust_decimal_macros::dec;

    fn ledger_with(stock: &[(u32, u32, u32)]) -> StockLedger {
        let ledger = StockLedger::new(&LedgerConfig::default(), Arc::new(TracingNotifier));
        let now = Utc::now();
        for (i, (quantity, min, max)) in stock.iter().enumerate() {
            let id = ProductId(i as u32 + 1);
            ledger.insert(ProductEntry::new(
                id,
                CatalogData {
                    name: format!("P{}", id),
                    category: None,
                    purchase_price: dec!(1.00),
                    selling_price: dec!(2.00),
                    is_active: true,
                    created_at: now,
                    updated_at: now,
                },
                StockData {
                    quantity: *quantity,
                    min_stock_level: *min,
                    max_stock_level: *max,
                    low_stock_alert: true,
                },
            ));
        }
        ledger
    }

    #[test]
    fn permissive_clamps_decrease_at_zero() {
        let ledger = ledger_with(&[(3, 0, 10)]);
        let applied = ledger
            .apply_delta(UserId(1), ProductId(1), -5, StockTransactionType::Sale, "Sale #1")
            .unwrap();
        assert_eq!(applied, -3);
        assert_eq!(ledger.stock_level(ProductId(1)).unwrap(), 0);

        let records = ledger.journal().for_product(ProductId(1));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].quantity, 3);
        assert!(records[0].is_consistent());
        assert_eq!(records[0].notes, "Sale #1 (requested -5, applied -3)");
    }

    #[test]
    fn permissive_rejects_capacity_without_record() {
        let ledger = ledger_with(&[(8, 0, 10)]);
        let result =
            ledger.apply_delta(UserId(1), ProductId(1), 3, StockTransactionType::Purchase, "");
        assert_eq!(
            result,
            Err(InventoryError::CapacityExceeded {
                product: ProductId(1),
                max: 10,
                requested: 11
            })
        );
        assert_eq!(ledger.stock_level(ProductId(1)).unwrap(), 8);
        assert!(ledger.journal().is_empty());
    }

    #[test]
    fn strict_rejects_decrease_below_zero() {
        let ledger = ledger_with(&[(2, 0, 10)]);
        let result = ledger.record_stock_transaction(
            UserId(1),
            ProductId(1),
            3,
            false,
            StockTransactionType::Adjustment,
            "count correction",
        );
        assert_eq!(
            result,
            Err(InventoryError::InsufficientStock {
                product: ProductId(1),
                available: 2,
                requested: 3
            })
        );
        assert!(ledger.journal().is_empty());
    }

    #[test]
    fn extreme_deltas_stay_on_their_side() {
        let ledger = ledger_with(&[(5, 0, 10)]);
        assert_eq!(
            ledger.apply_delta(UserId(1), ProductId(1), i64::MAX, StockTransactionType::Purchase, ""),
            Err(InventoryError::CapacityExceeded {
                product: ProductId(1),
                max: 10,
                requested: i64::MAX
            })
        );
        assert_eq!(ledger.stock_level(ProductId(1)).unwrap(), 5);
        assert!(ledger.journal().is_empty());

        let applied = ledger
            .apply_delta(UserId(1), ProductId(1), i64::MIN, StockTransactionType::Adjustment, "")
            .unwrap();
        assert_eq!(applied, -5);
        assert_eq!(ledger.stock_level(ProductId(1)).unwrap(), 0);
        let records = ledger.journal().for_product(ProductId(1));
        assert!(!records[0].is_increase);
        assert!(records[0].is_consistent());
    }

    #[test]
    fn saturating_absorbs_oversized_increase() {
        let ledger = ledger_with(&[(5, 0, 10)]);
        let locks = ledger.lock_set([ProductId(1)]).unwrap();
        let mut txn = locks.begin(&ledger, UserId(1));
        let applied = txn
            .apply(
                ProductId(1),
                i64::MAX,
                StockTransactionType::Adjustment,
                "",
                BoundPolicy::Saturating,
            )
            .unwrap();
        assert_eq!(applied, 5);
        txn.commit();
        assert_eq!(ledger.stock_level(ProductId(1)).unwrap(), 10);
    }

    #[test]
    fn zero_delta_is_invalid() {
        let ledger = ledger_with(&[(2, 0, 10)]);
        assert_eq!(
            ledger.apply_delta(UserId(1), ProductId(1), 0, StockTransactionType::Sale, ""),
            Err(InventoryError::InvalidQuantity)
        );
    }

    #[test]
    fn fully_clamped_change_leaves_no_record() {
        let ledger = ledger_with(&[(0, 0, 10)]);
        let applied = ledger
            .apply_delta(UserId(1), ProductId(1), -2, StockTransactionType::Adjustment, "")
            .unwrap();
        assert_eq!(applied, 0);
        assert!(ledger.journal().is_empty());
    }

    #[test]
    fn saturating_clamps_at_max() {
        let ledger = ledger_with(&[(9, 0, 10)]);
        let locks = ledger.lock_set([ProductId(1)]).unwrap();
        let mut txn = locks.begin(&ledger, UserId(1));
        let applied = txn
            .apply(
                ProductId(1),
                4,
                StockTransactionType::Adjustment,
                "restore",
                BoundPolicy::Saturating,
            )
            .unwrap();
        assert_eq!(applied, 1);
        let records = txn.commit();
        assert_eq!(records[0].new_stock, 10);
        assert_eq!(ledger.stock_level(ProductId(1)).unwrap(), 10);
    }

    #[test]
    fn dropped_unit_discards_staged_changes() {
        let ledger = ledger_with(&[(5, 0, 10), (5, 0, 10)]);
        {
            let locks = ledger.lock_set([ProductId(2), ProductId(1)]).unwrap();
            let mut txn = locks.begin(&ledger, UserId(1));
            txn.apply(ProductId(1), -2, StockTransactionType::Sale, "", BoundPolicy::Permissive)
                .unwrap();
            let failed = txn.apply(
                ProductId(2),
                9,
                StockTransactionType::Sale,
                "",
                BoundPolicy::Permissive,
            );
            assert!(failed.is_err());
        }
        assert_eq!(ledger.stock_level(ProductId(1)).unwrap(), 5);
        assert!(ledger.journal().is_empty());
    }

    #[test]
    fn staged_changes_are_visible_within_unit() {
        let ledger = ledger_with(&[(5, 0, 10)]);
        let locks = ledger.lock_set([ProductId(1)]).unwrap();
        let mut txn = locks.begin(&ledger, UserId(1));
        txn.apply(ProductId(1), -2, StockTransactionType::Sale, "", BoundPolicy::Permissive)
            .unwrap();
        assert_eq!(txn.available(ProductId(1)).unwrap(), 3);
        assert_eq!(txn.free_capacity(ProductId(1)).unwrap(), 7);
    }

    #[test]
    fn lock_set_rejects_unknown_products() {
        let ledger = ledger_with(&[(5, 0, 10)]);
        assert_eq!(
            ledger.lock_set([ProductId(1), ProductId(7)]).err(),
            Some(InventoryError::ProductNotFound(ProductId(7)))
        );
    }

    #[test]
    fn truncation_warning_only_when_changed() {
        assert!(truncation_warning(ProductId(1), 3, 3, "x").is_none());
        let warning = truncation_warning(ProductId(1), 3, 1, "x").unwrap();
        assert_eq!(warning.applied, 1);
    }
}
