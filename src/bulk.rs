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

//! Batch operations.
//!
//! Each batch is one unit of work: every sale and product it touches is
//! locked up front, all stock changes are staged, and only then is anything
//! written. A missing entity fails the batch before any change is made.
//!
//! Deletions restore the units still held by the customer (sold minus
//! returned). Restorations never fail on the maximum level; an overflow is
//! truncated and reported as a [`StockWarning`].

use crate::base::{ProductId, SaleId, SaleItemId, UserId};
use crate::engine::Inventory;
use crate::error::InventoryError;
use crate::sale::ItemData;
use crate::stock::{BoundPolicy, StockTxn, truncation_warning};
use crate::transaction::{StockTransactionType, StockWarning};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Outcome of [`Inventory::bulk_restock`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestockReport {
    /// Products topped up to their maximum level.
    pub restocked: Vec<ProductId>,
    /// Products that were already full.
    pub already_full: Vec<ProductId>,
}

impl RestockReport {
    pub fn count(&self) -> usize {
        self.restocked.len()
    }
}

/// Outcome of a deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    pub sales_deleted: Vec<SaleId>,
    pub items_deleted: Vec<SaleItemId>,
    pub warnings: Vec<StockWarning>,
}

fn restore(
    txn: &mut StockTxn<'_>,
    item: &ItemData,
    context: &str,
    warnings: &mut Vec<StockWarning>,
) -> Result<(), InventoryError> {
    let net = item.net_quantity();
    if net == 0 {
        return Ok(());
    }
    let product = item.product();
    let requested = i64::from(net);
    let applied = txn.apply(
        product,
        requested,
        StockTransactionType::Adjustment,
        context,
        BoundPolicy::Saturating,
    )?;
    if let Some(warning) = truncation_warning(product, requested, applied, context) {
        warn!(%warning, "Stock restoration truncated");
        warnings.push(warning);
    }
    Ok(())
}

impl Inventory {
    /// Tops every listed product up to its maximum level.
    ///
    /// # Errors
    ///
    /// [`InventoryError::ProductNotFound`] if any product is unknown; no
    /// product is restocked in that case.
    pub fn bulk_restock(
        &self,
        actor: UserId,
        products: &[ProductId],
    ) -> Result<RestockReport, InventoryError> {
        let locks = self.ledger.lock_set(products.iter().copied())?;
        let mut txn = locks.begin(&self.ledger, actor);
        let mut report = RestockReport::default();
        for product in locks.products() {
            let space = txn.free_capacity(product)?;
            if space == 0 {
                report.already_full.push(product);
                continue;
            }
            txn.apply(
                product,
                i64::from(space),
                StockTransactionType::Purchase,
                "Bulk restock to maximum level",
                BoundPolicy::Permissive,
            )?;
            report.restocked.push(product);
        }
        txn.commit();
        self.ledger.flush_alerts();

        info!(restocked = report.count(), "Successfully restocked {} products", report.count());
        Ok(report)
    }

    /// Deletes sales and restores the stock of all their lines.
    ///
    /// # Errors
    ///
    /// [`InventoryError::SaleNotFound`] if any sale is unknown; nothing is
    /// deleted in that case.
    pub fn bulk_delete_sales(
        &self,
        actor: UserId,
        sales: &[SaleId],
    ) -> Result<DeletionReport, InventoryError> {
        let mut ids = sales.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let records = ids
            .iter()
            .map(|id| self.sales.record(*id))
            .collect::<Result<Vec<_>, _>>()?;
        let mut guards: Vec<_> = records.iter().map(|record| record.data.lock()).collect();
        if let Some((record, _)) = records.iter().zip(&guards).find(|(_, data)| data.deleted) {
            return Err(InventoryError::SaleNotFound(record.id));
        }

        let products: Vec<ProductId> = guards
            .iter()
            .flat_map(|data| data.items.values().map(ItemData::product))
            .collect();
        let locks = self.ledger.lock_set(products)?;
        let mut txn = locks.begin(&self.ledger, actor);
        let mut report = DeletionReport::default();
        for (record, data) in records.iter().zip(&guards) {
            let context = format!("Restored stock from deleted Sale #{}", record.id);
            for item in data.items.values() {
                restore(&mut txn, item, &context, &mut report.warnings)?;
            }
        }
        txn.commit();

        for (record, data) in records.iter().zip(guards.iter_mut()) {
            report.items_deleted.extend(data.items.keys().copied());
            self.sales.remove(record.id, data);
            report.sales_deleted.push(record.id);
        }
        drop(guards);
        self.ledger.flush_alerts();

        info!(
            sales = report.sales_deleted.len(),
            items = report.items_deleted.len(),
            warnings = report.warnings.len(),
            "Sales deleted"
        );
        Ok(report)
    }

    /// Deletes sale lines and restores their stock.
    ///
    /// Sales left without lines are deleted too and listed in the report.
    ///
    /// # Errors
    ///
    /// [`InventoryError::SaleItemNotFound`] if any item is unknown; nothing
    /// is deleted in that case.
    pub fn bulk_delete_items(
        &self,
        actor: UserId,
        items: &[SaleItemId],
    ) -> Result<DeletionReport, InventoryError> {
        let mut ids = items.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut by_sale: BTreeMap<SaleId, Vec<SaleItemId>> = BTreeMap::new();
        for item in &ids {
            by_sale
                .entry(self.sales.sale_of_item(*item)?)
                .or_default()
                .push(*item);
        }
        let records = by_sale
            .iter()
            .map(|(sale, items)| {
                self.sales
                    .record(*sale)
                    .map_err(|_| InventoryError::SaleItemNotFound(items[0]))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut guards: Vec<_> = records.iter().map(|record| record.data.lock()).collect();

        let mut products = Vec::with_capacity(ids.len());
        for (data, items) in guards.iter().zip(by_sale.values()) {
            for item in items {
                products.push(data.item(*item)?.product());
            }
        }
        let locks = self.ledger.lock_set(products)?;
        let mut txn = locks.begin(&self.ledger, actor);
        let mut report = DeletionReport::default();
        for ((record, data), items) in records.iter().zip(&guards).zip(by_sale.values()) {
            let context = format!("Restored stock from deleted Sale Item (Sale #{})", record.id);
            for item in items {
                restore(&mut txn, data.item(*item)?, &context, &mut report.warnings)?;
            }
        }
        txn.commit();

        for ((record, data), items) in records.iter().zip(guards.iter_mut()).zip(by_sale.values()) {
            for item in items {
                let returns = data.remove_item(*item);
                self.sales.unindex_item(*item, &returns);
                report.items_deleted.push(*item);
            }
            if data.items.is_empty() {
                self.sales.remove(record.id, data);
                report.sales_deleted.push(record.id);
                info!(sale = %record.id, "Deleted sale left without items");
            } else {
                data.recompute();
            }
        }
        drop(guards);
        self.ledger.flush_alerts();

        info!(
            items = report.items_deleted.len(),
            warnings = report.warnings.len(),
            "Sale items deleted"
        );
        Ok(report)
    }
}
