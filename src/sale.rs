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

//! Sales and their line items.
//!
//! A sale is an aggregate: its items, its returns and its cached totals live
//! behind one mutex and change together. Every item mutation moves stock
//! through the ledger inside the same critical section, then recomputes
//!
//! ```text
//! total_amount = Σ price_at_sale × quantity
//! profit       = Σ (price_at_sale − purchase_price) × quantity
//! ```
//!
//! using the purchase prices current at that moment. Item snapshots report
//! profit at those same prices, so a sale's profit always equals the sum of
//! its items' profit until the next mutation refreshes both.

use crate::base::{CustomerId, ProductId, ReturnId, SaleId, SaleItemId, Sequence, UserId};
use crate::bulk::DeletionReport;
use crate::engine::Inventory;
use crate::error::InventoryError;
use crate::product::{ProductEntry, validate_price};
use crate::returns::SaleReturn;
use crate::stock::{BoundPolicy, StockTxn};
use crate::transaction::StockTransactionType;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// A requested sale line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSaleItem {
    pub product: ProductId,
    pub quantity: u32,
    /// Overrides the product's current selling price.
    pub price_override: Option<Decimal>,
}

impl NewSaleItem {
    pub fn new(product: ProductId, quantity: u32) -> Self {
        Self {
            product,
            quantity,
            price_override: None,
        }
    }

    pub fn at_price(mut self, price: Decimal) -> Self {
        self.price_override = Some(price);
        self
    }

    fn validate(&self, precision: u32) -> Result<(), InventoryError> {
        if self.quantity == 0 {
            return Err(InventoryError::InvalidQuantity);
        }
        if let Some(price) = self.price_override {
            validate_price(price, precision)?;
        }
        Ok(())
    }
}

/// Point-in-time view of a sale line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaleItem {
    pub id: SaleItemId,
    pub sale: SaleId,
    pub product: ProductId,
    pub quantity: u32,
    pub price_at_sale: Decimal,
    pub returned_quantity: u32,
    pub line_total: Decimal,
    pub profit: Decimal,
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    /// Units that can still be returned.
    pub fn returnable(&self) -> u32 {
        self.quantity.saturating_sub(self.returned_quantity)
    }
}

/// Point-in-time view of a sale.
///
/// `profit` and each item's `profit` use the purchase prices read when the
/// sale last changed; later cost updates show up on the next mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sale {
    pub id: SaleId,
    pub customer: Option<CustomerId>,
    pub date: DateTime<Utc>,
    pub total_amount: Decimal,
    pub profit: Decimal,
    pub is_paid: bool,
    pub items: Vec<SaleItem>,
}

impl Sale {
    pub fn is_walk_in(&self) -> bool {
        self.customer.is_none()
    }

    pub fn item(&self, id: SaleItemId) -> Option<&SaleItem> {
        self.items.iter().find(|item| item.id == id)
    }
}

pub(crate) struct ItemData {
    pub(crate) id: SaleItemId,
    pub(crate) entry: Arc<ProductEntry>,
    pub(crate) quantity: u32,
    pub(crate) price_at_sale: Decimal,
    pub(crate) returned: u32,
    /// Purchase price read at the sale's last recompute.
    pub(crate) unit_cost: Decimal,
    pub(crate) created_at: DateTime<Utc>,
}

impl ItemData {
    pub(crate) fn product(&self) -> ProductId {
        self.entry.id
    }

    /// Units still held by the customer.
    pub(crate) fn net_quantity(&self) -> u32 {
        self.quantity.saturating_sub(self.returned)
    }

    fn line_total(&self) -> Decimal {
        self.price_at_sale * Decimal::from(self.quantity)
    }

    fn profit(&self) -> Decimal {
        (self.price_at_sale - self.unit_cost) * Decimal::from(self.quantity)
    }
}

pub(crate) struct SaleData {
    pub(crate) customer: Option<CustomerId>,
    pub(crate) date: DateTime<Utc>,
    pub(crate) is_paid: bool,
    pub(crate) items: BTreeMap<SaleItemId, ItemData>,
    pub(crate) returns: BTreeMap<ReturnId, SaleReturn>,
    pub(crate) total_amount: Decimal,
    pub(crate) profit: Decimal,
    /// Set once the sale is removed; holders of a stale handle see it as missing.
    pub(crate) deleted: bool,
}

impl SaleData {
    pub(crate) fn item(&self, id: SaleItemId) -> Result<&ItemData, InventoryError> {
        if self.deleted {
            return Err(InventoryError::SaleItemNotFound(id));
        }
        self.items
            .get(&id)
            .ok_or(InventoryError::SaleItemNotFound(id))
    }

    pub(crate) fn item_mut(&mut self, id: SaleItemId) -> Result<&mut ItemData, InventoryError> {
        if self.deleted {
            return Err(InventoryError::SaleItemNotFound(id));
        }
        self.items
            .get_mut(&id)
            .ok_or(InventoryError::SaleItemNotFound(id))
    }

    /// Recomputes cached totals from the items at current purchase prices.
    pub(crate) fn recompute(&mut self) {
        for item in self.items.values_mut() {
            item.unit_cost = item.entry.purchase_price();
        }
        self.total_amount = self.items.values().map(ItemData::line_total).sum();
        self.profit = self.items.values().map(ItemData::profit).sum();
    }

    /// Drops an item together with its returns.
    pub(crate) fn remove_item(&mut self, id: SaleItemId) -> Vec<ReturnId> {
        self.items.remove(&id);
        let returns: Vec<ReturnId> = self
            .returns
            .values()
            .filter(|ret| ret.sale_item == id)
            .map(|ret| ret.id)
            .collect();
        for ret in &returns {
            self.returns.remove(ret);
        }
        returns
    }
}

pub(crate) struct SaleRecord {
    pub(crate) id: SaleId,
    pub(crate) data: Mutex<SaleData>,
}

/// Sales storage with item and return indexes.
pub(crate) struct SaleBook {
    sales: DashMap<SaleId, Arc<SaleRecord>>,
    items: DashMap<SaleItemId, SaleId>,
    returns: DashMap<ReturnId, SaleId>,
    pub(crate) sale_ids: Sequence,
    pub(crate) item_ids: Sequence,
    pub(crate) return_ids: Sequence,
}

impl SaleBook {
    pub(crate) fn new() -> Self {
        Self {
            sales: DashMap::new(),
            items: DashMap::new(),
            returns: DashMap::new(),
            sale_ids: Sequence::new(),
            item_ids: Sequence::new(),
            return_ids: Sequence::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.sales.len()
    }

    // Handles are cloned out so no map shard is held while a sale is locked.
    pub(crate) fn record(&self, id: SaleId) -> Result<Arc<SaleRecord>, InventoryError> {
        self.sales
            .get(&id)
            .map(|record| Arc::clone(record.value()))
            .ok_or(InventoryError::SaleNotFound(id))
    }

    pub(crate) fn sale_of_item(&self, item: SaleItemId) -> Result<SaleId, InventoryError> {
        self.items
            .get(&item)
            .map(|sale| *sale.value())
            .ok_or(InventoryError::SaleItemNotFound(item))
    }

    pub(crate) fn record_for_item(
        &self,
        item: SaleItemId,
    ) -> Result<Arc<SaleRecord>, InventoryError> {
        let sale = self.sale_of_item(item)?;
        self.record(sale)
            .map_err(|_| InventoryError::SaleItemNotFound(item))
    }

    pub(crate) fn record_for_return(
        &self,
        id: ReturnId,
    ) -> Result<Arc<SaleRecord>, InventoryError> {
        let sale = self
            .returns
            .get(&id)
            .map(|sale| *sale.value())
            .ok_or(InventoryError::ReturnNotFound(id))?;
        self.record(sale)
            .map_err(|_| InventoryError::ReturnNotFound(id))
    }

    pub(crate) fn records(&self) -> Vec<Arc<SaleRecord>> {
        let mut records: Vec<_> = self
            .sales
            .iter()
            .map(|record| Arc::clone(record.value()))
            .collect();
        records.sort_by_key(|record| record.id);
        records
    }

    fn insert(&self, id: SaleId, data: SaleData) {
        let items: Vec<SaleItemId> = data.items.keys().copied().collect();
        self.sales.insert(
            id,
            Arc::new(SaleRecord {
                id,
                data: Mutex::new(data),
            }),
        );
        for item in items {
            self.items.insert(item, id);
        }
    }

    pub(crate) fn index_item(&self, item: SaleItemId, sale: SaleId) {
        self.items.insert(item, sale);
    }

    pub(crate) fn index_return(&self, id: ReturnId, sale: SaleId) {
        self.returns.insert(id, sale);
    }

    pub(crate) fn unindex_item(&self, item: SaleItemId, returns: &[ReturnId]) {
        self.items.remove(&item);
        for id in returns {
            self.returns.remove(id);
        }
    }

    pub(crate) fn unindex_return(&self, id: ReturnId) {
        self.returns.remove(&id);
    }

    /// Removes a sale that is locked by the caller.
    pub(crate) fn remove(&self, id: SaleId, data: &mut SaleData) {
        for item in data.items.keys() {
            self.items.remove(item);
        }
        for ret in data.returns.keys() {
            self.returns.remove(ret);
        }
        data.items.clear();
        data.returns.clear();
        data.deleted = true;
        self.sales.remove(&id);
    }
}

/// Stages a sale of `quantity` units, which must all be available.
fn take_stock(
    txn: &mut StockTxn<'_>,
    product: ProductId,
    quantity: u32,
    notes: &str,
) -> Result<(), InventoryError> {
    let available = txn.available(product)?;
    if quantity > available {
        return Err(InventoryError::InsufficientStock {
            product,
            available,
            requested: quantity,
        });
    }
    txn.apply(
        product,
        -i64::from(quantity),
        StockTransactionType::Sale,
        notes,
        BoundPolicy::Permissive,
    )?;
    Ok(())
}

impl Inventory {
    pub(crate) fn item_snapshot(&self, sale: SaleId, item: &ItemData) -> SaleItem {
        SaleItem {
            id: item.id,
            sale,
            product: item.product(),
            quantity: item.quantity,
            price_at_sale: item.price_at_sale,
            returned_quantity: item.returned,
            line_total: self.money(item.line_total()),
            profit: self.money(item.profit()),
            created_at: item.created_at,
        }
    }

    pub(crate) fn sale_snapshot(&self, id: SaleId, data: &SaleData) -> Sale {
        Sale {
            id,
            customer: data.customer,
            date: data.date,
            total_amount: self.money(data.total_amount),
            profit: self.money(data.profit),
            is_paid: data.is_paid,
            items: data
                .items
                .values()
                .map(|item| self.item_snapshot(id, item))
                .collect(),
        }
    }

    /// Records a sale with at least one line.
    ///
    /// Lines for the same product draw on the same stock, so their quantities
    /// are checked cumulatively. Either every line is sold or nothing is.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::EmptySale`] - no lines.
    /// - [`InventoryError::InvalidQuantity`] - a line with zero quantity.
    /// - [`InventoryError::InvalidPrice`] - a price override below 0.01 or finer than the money precision.
    /// - [`InventoryError::CustomerNotFound`] - unknown customer.
    /// - [`InventoryError::ProductNotFound`] - unknown product.
    /// - [`InventoryError::InsufficientStock`] - a line exceeds available stock.
    pub fn create_sale(
        &self,
        actor: UserId,
        customer: Option<CustomerId>,
        lines: &[NewSaleItem],
        is_paid: bool,
    ) -> Result<Sale, InventoryError> {
        if lines.is_empty() {
            return Err(InventoryError::EmptySale);
        }
        for line in lines {
            line.validate(self.config.money_precision)?;
        }
        if let Some(customer) = customer
            && !self.customers.contains_key(&customer)
        {
            return Err(InventoryError::CustomerNotFound(customer));
        }

        let id: SaleId = self.sales.sale_ids.next();
        let notes = format!("Sale #{id}");
        let now = Utc::now();

        let locks = self.ledger.lock_set(lines.iter().map(|line| line.product))?;
        let mut txn = locks.begin(&self.ledger, actor);
        let mut items = BTreeMap::new();
        for line in lines {
            take_stock(&mut txn, line.product, line.quantity, &notes)?;
            let entry = locks.entry(line.product)?;
            let price_at_sale = line
                .price_override
                .unwrap_or_else(|| entry.catalog.read().selling_price);
            let item: SaleItemId = self.sales.item_ids.next();
            items.insert(
                item,
                ItemData {
                    id: item,
                    entry,
                    quantity: line.quantity,
                    price_at_sale,
                    returned: 0,
                    unit_cost: Decimal::ZERO,
                    created_at: now,
                },
            );
        }

        let mut data = SaleData {
            customer,
            date: now,
            is_paid,
            items,
            returns: BTreeMap::new(),
            total_amount: Decimal::ZERO,
            profit: Decimal::ZERO,
            deleted: false,
        };
        data.recompute();
        let sale = self.sale_snapshot(id, &data);
        // Published under the product locks, so no journal record names a
        // sale that cannot be found.
        self.sales.insert(id, data);
        txn.commit();
        self.ledger.flush_alerts();

        info!(sale = %id, items = sale.items.len(), total = %sale.total_amount, "Sale created");
        Ok(sale)
    }

    /// Adds a line to an existing sale.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::SaleNotFound`] - unknown sale.
    /// - [`InventoryError::InvalidQuantity`] - zero quantity.
    /// - [`InventoryError::InsufficientStock`] - quantity exceeds available stock.
    pub fn add_item(
        &self,
        actor: UserId,
        sale: SaleId,
        line: NewSaleItem,
    ) -> Result<SaleItem, InventoryError> {
        line.validate(self.config.money_precision)?;
        let record = self.sales.record(sale)?;
        let mut data = record.data.lock();
        if data.deleted {
            return Err(InventoryError::SaleNotFound(sale));
        }

        let locks = self.ledger.lock_set([line.product])?;
        let entry = locks.entry(line.product)?;
        let mut txn = locks.begin(&self.ledger, actor);
        take_stock(&mut txn, line.product, line.quantity, &format!("Sale #{sale}"))?;
        let price_at_sale = line
            .price_override
            .unwrap_or_else(|| entry.catalog.read().selling_price);
        txn.commit();

        let id: SaleItemId = self.sales.item_ids.next();
        data.items.insert(
            id,
            ItemData {
                id,
                entry,
                quantity: line.quantity,
                price_at_sale,
                returned: 0,
                unit_cost: Decimal::ZERO,
                created_at: Utc::now(),
            },
        );
        data.recompute();
        let snapshot = self.item_snapshot(sale, data.item(id)?);
        self.sales.index_item(id, sale);
        drop(data);
        self.ledger.flush_alerts();

        debug!(%sale, item = %id, product = %line.product, quantity = line.quantity, "Sale item added");
        Ok(snapshot)
    }

    /// Changes the quantity of a sale line.
    ///
    /// An increase must be covered by available stock; a decrease puts the
    /// difference back on the shelf.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::SaleItemNotFound`] - unknown item.
    /// - [`InventoryError::InvalidQuantity`] - new quantity is zero.
    /// - [`InventoryError::QuantityBelowReturned`] - fewer units than already returned.
    /// - [`InventoryError::InsufficientStock`] - increase exceeds available stock.
    /// - [`InventoryError::CapacityExceeded`] - decrease would overflow the maximum level.
    pub fn edit_item(
        &self,
        actor: UserId,
        item: SaleItemId,
        quantity: u32,
    ) -> Result<SaleItem, InventoryError> {
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity);
        }
        let record = self.sales.record_for_item(item)?;
        let mut data = record.data.lock();
        let current = data.item(item)?;
        let (old, returned, product) = (current.quantity, current.returned, current.product());
        if quantity < returned {
            return Err(InventoryError::QuantityBelowReturned {
                item,
                returned,
                requested: quantity,
            });
        }

        if quantity != old {
            let notes = format!("Modified Sale Item in Sale #{}", record.id);
            let locks = self.ledger.lock_set([product])?;
            let mut txn = locks.begin(&self.ledger, actor);
            if quantity > old {
                take_stock(&mut txn, product, quantity - old, &notes)?;
            } else {
                txn.apply(
                    product,
                    i64::from(old - quantity),
                    StockTransactionType::Sale,
                    &notes,
                    BoundPolicy::Permissive,
                )?;
            }
            txn.commit();

            data.item_mut(item)?.quantity = quantity;
            data.recompute();
            debug!(sale = %record.id, %item, old, new = quantity, "Sale item edited");
        }

        let snapshot = self.item_snapshot(record.id, data.item(item)?);
        drop(data);
        self.ledger.flush_alerts();
        Ok(snapshot)
    }

    /// Removes a line and puts its units back in stock.
    ///
    /// The sale is deleted when its last line goes.
    pub fn remove_item(
        &self,
        actor: UserId,
        item: SaleItemId,
    ) -> Result<DeletionReport, InventoryError> {
        self.bulk_delete_items(actor, &[item])
    }

    /// Deletes a sale and puts the units of every line back in stock.
    pub fn delete_sale(&self, actor: UserId, sale: SaleId) -> Result<DeletionReport, InventoryError> {
        self.bulk_delete_sales(actor, &[sale])
    }

    pub fn set_paid(&self, sale: SaleId, is_paid: bool) -> Result<Sale, InventoryError> {
        let record = self.sales.record(sale)?;
        let mut data = record.data.lock();
        if data.deleted {
            return Err(InventoryError::SaleNotFound(sale));
        }
        data.is_paid = is_paid;
        Ok(self.sale_snapshot(sale, &data))
    }

    pub fn sale(&self, id: SaleId) -> Option<Sale> {
        let record = self.sales.record(id).ok()?;
        let data = record.data.lock();
        (!data.deleted).then(|| self.sale_snapshot(id, &data))
    }

    /// All sales ordered by ID.
    pub fn sales(&self) -> Vec<Sale> {
        self.sales
            .records()
            .into_iter()
            .filter_map(|record| {
                let data = record.data.lock();
                (!data.deleted).then(|| self.sale_snapshot(record.id, &data))
            })
            .collect()
    }

    pub fn sale_item(&self, id: SaleItemId) -> Option<SaleItem> {
        let record = self.sales.record_for_item(id).ok()?;
        let data = record.data.lock();
        data.item(id)
            .ok()
            .map(|item| self.item_snapshot(record.id, item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::{NewProduct, ProductUpdate};
    use rust_decimal_macros::dec;

    const CLERK: UserId = UserId(7);

    fn setup(stock: u32) -> (Inventory, ProductId) {
        let inventory = Inventory::new();
        let product = inventory
            .create_product(NewProduct::new("Coffee", dec!(6.00), dec!(10.00)).stock(stock))
            .unwrap();
        (inventory, product)
    }

    #[test]
    fn create_sale_takes_stock_and_totals() {
        let (inventory, product) = setup(20);
        let sale = inventory
            .create_sale(
                CLERK,
                None,
                &[
                    NewSaleItem::new(product, 3),
                    NewSaleItem::new(product, 2).at_price(dec!(9.00)),
                ],
                true,
            )
            .unwrap();

        assert!(sale.is_walk_in());
        assert_eq!(sale.items.len(), 2);
        assert_eq!(sale.total_amount, dec!(48.00));
        assert_eq!(sale.profit, dec!(18.00));
        assert_eq!(inventory.product(product).unwrap().stock_quantity, 15);

        let records = inventory.stock_transactions(product);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.notes == format!("Sale #{}", sale.id)));
        assert_eq!(records[0].created_by, CLERK);
    }

    #[test]
    fn create_sale_checks_lines_cumulatively() {
        let (inventory, product) = setup(4);
        let result = inventory.create_sale(
            CLERK,
            None,
            &[NewSaleItem::new(product, 3), NewSaleItem::new(product, 2)],
            true,
        );
        assert_eq!(
            result,
            Err(InventoryError::InsufficientStock {
                product,
                available: 1,
                requested: 2
            })
        );
        assert_eq!(inventory.product(product).unwrap().stock_quantity, 4);
        assert!(inventory.stock_transactions(product).is_empty());
        assert!(inventory.sales().is_empty());
    }

    #[test]
    fn create_sale_rejects_bad_input() {
        let (inventory, product) = setup(4);
        assert_eq!(
            inventory.create_sale(CLERK, None, &[], true),
            Err(InventoryError::EmptySale)
        );
        assert_eq!(
            inventory.create_sale(CLERK, None, &[NewSaleItem::new(product, 0)], true),
            Err(InventoryError::InvalidQuantity)
        );
        assert_eq!(
            inventory.create_sale(
                CLERK,
                None,
                &[NewSaleItem::new(product, 1).at_price(dec!(0.001))],
                true
            ),
            Err(InventoryError::InvalidPrice)
        );
        assert_eq!(
            inventory.create_sale(CLERK, Some(CustomerId(3)), &[NewSaleItem::new(product, 1)], true),
            Err(InventoryError::CustomerNotFound(CustomerId(3)))
        );
    }

    #[test]
    fn edit_item_moves_stock_both_ways() {
        let (inventory, product) = setup(10);
        let sale = inventory
            .create_sale(CLERK, None, &[NewSaleItem::new(product, 2)], false)
            .unwrap();
        let item = sale.items[0].id;

        let edited = inventory.edit_item(CLERK, item, 5).unwrap();
        assert_eq!(edited.quantity, 5);
        assert_eq!(inventory.product(product).unwrap().stock_quantity, 5);

        inventory.edit_item(CLERK, item, 1).unwrap();
        assert_eq!(inventory.product(product).unwrap().stock_quantity, 9);
        assert_eq!(inventory.sale(sale.id).unwrap().total_amount, dec!(10.00));

        let notes = inventory.stock_transactions(product).last().unwrap().notes.clone();
        assert_eq!(notes, format!("Modified Sale Item in Sale #{}", sale.id));
    }

    #[test]
    fn edit_item_increase_needs_stock() {
        let (inventory, product) = setup(3);
        let sale = inventory
            .create_sale(CLERK, None, &[NewSaleItem::new(product, 2)], true)
            .unwrap();
        let result = inventory.edit_item(CLERK, sale.items[0].id, 4);
        assert_eq!(
            result,
            Err(InventoryError::InsufficientStock {
                product,
                available: 1,
                requested: 2
            })
        );
        assert_eq!(inventory.sale(sale.id).unwrap().items[0].quantity, 2);
        assert_eq!(inventory.stock_transactions(product).len(), 1);
    }

    #[test]
    fn unchanged_quantity_is_a_no_op() {
        let (inventory, product) = setup(3);
        let sale = inventory
            .create_sale(CLERK, None, &[NewSaleItem::new(product, 2)], true)
            .unwrap();
        inventory.edit_item(CLERK, sale.items[0].id, 2).unwrap();
        assert_eq!(inventory.stock_transactions(product).len(), 1);
    }

    #[test]
    fn add_item_uses_current_selling_price() {
        let (inventory, product) = setup(10);
        let sale = inventory
            .create_sale(CLERK, None, &[NewSaleItem::new(product, 1)], true)
            .unwrap();
        inventory
            .update_product(CLERK, product, ProductUpdate::prices(dec!(6.00), dec!(12.00)))
            .unwrap();

        let item = inventory
            .add_item(CLERK, sale.id, NewSaleItem::new(product, 2))
            .unwrap();
        assert_eq!(item.price_at_sale, dec!(12.00));
        assert_eq!(item.line_total, dec!(24.00));

        let sale = inventory.sale(sale.id).unwrap();
        // The first line keeps its frozen price
        assert_eq!(sale.items[0].price_at_sale, dec!(10.00));
        assert_eq!(sale.total_amount, dec!(34.00));
        assert_eq!(sale.profit, dec!(16.00));
    }

    #[test]
    fn profit_follows_purchase_price_at_last_mutation() {
        let (inventory, product) = setup(10);
        let sale = inventory
            .create_sale(CLERK, None, &[NewSaleItem::new(product, 2)], true)
            .unwrap();
        assert_eq!(sale.profit, dec!(8.00));

        inventory
            .update_product(CLERK, product, ProductUpdate::prices(dec!(7.00), dec!(10.00)))
            .unwrap();
        // Cached until the sale changes, items included
        let cached = inventory.sale(sale.id).unwrap();
        assert_eq!(cached.profit, dec!(8.00));
        assert_eq!(cached.items[0].profit, dec!(8.00));
        assert_eq!(inventory.sale_item(sale.items[0].id).unwrap().profit, dec!(8.00));

        inventory.edit_item(CLERK, sale.items[0].id, 3).unwrap();
        let refreshed = inventory.sale(sale.id).unwrap();
        assert_eq!(refreshed.profit, dec!(9.00));
        assert_eq!(refreshed.items[0].profit, dec!(9.00));
    }

    #[test]
    fn sale_profit_matches_items_after_cost_change() {
        let (inventory, product) = setup(10);
        let other = inventory
            .create_product(NewProduct::new("Tea", dec!(1.00), dec!(3.00)).stock(10))
            .unwrap();
        let sale = inventory
            .create_sale(
                CLERK,
                None,
                &[NewSaleItem::new(product, 2), NewSaleItem::new(other, 1)],
                true,
            )
            .unwrap();

        inventory
            .update_product(CLERK, product, ProductUpdate::prices(dec!(9.50), dec!(10.00)))
            .unwrap();
        let sale = inventory.sale(sale.id).unwrap();
        let items: Decimal = sale.items.iter().map(|item| item.profit).sum();
        assert_eq!(sale.profit, items);
    }

    #[test]
    fn unknown_references() {
        let (inventory, product) = setup(10);
        assert_eq!(
            inventory.add_item(CLERK, SaleId(42), NewSaleItem::new(product, 1)),
            Err(InventoryError::SaleNotFound(SaleId(42)))
        );
        assert_eq!(
            inventory.edit_item(CLERK, SaleItemId(42), 1),
            Err(InventoryError::SaleItemNotFound(SaleItemId(42)))
        );
        assert!(inventory.sale_item(SaleItemId(42)).is_none());
    }

    #[test]
    fn set_paid_toggles_flag() {
        let (inventory, product) = setup(10);
        let sale = inventory
            .create_sale(CLERK, None, &[NewSaleItem::new(product, 1)], false)
            .unwrap();
        assert!(!sale.is_paid);
        assert!(inventory.set_paid(sale.id, true).unwrap().is_paid);
        assert!(inventory.sale(sale.id).unwrap().is_paid);
    }
}
