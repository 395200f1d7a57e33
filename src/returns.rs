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

//! Customer returns.
//!
//! A return puts units of a sale line back in stock and refunds them at the
//! line's frozen price. Returns do not change the sale's totals. Cancelling a
//! return takes the units out of stock again.

use crate::base::{ReturnId, SaleItemId, UserId};
use crate::engine::Inventory;
use crate::error::InventoryError;
use crate::stock::{BoundPolicy, truncation_warning};
use crate::transaction::{StockTransactionType, StockWarning};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

/// A processed return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaleReturn {
    pub id: ReturnId,
    pub sale_item: SaleItemId,
    pub quantity: u32,
    pub reason: String,
    /// `price_at_sale × quantity`
    pub refund_amount: Decimal,
    pub processed_at: DateTime<Utc>,
    pub processed_by: UserId,
}

impl Inventory {
    /// Returns `quantity` units of a sale line to stock.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::SaleItemNotFound`] - unknown item.
    /// - [`InventoryError::InvalidQuantity`] - zero quantity.
    /// - [`InventoryError::OverReturn`] - more than the units not yet returned.
    /// - [`InventoryError::CapacityExceeded`] - no room below the maximum level.
    pub fn process_return(
        &self,
        actor: UserId,
        item: SaleItemId,
        quantity: u32,
        reason: &str,
    ) -> Result<SaleReturn, InventoryError> {
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity);
        }
        let record = self.sales.record_for_item(item)?;
        let mut data = record.data.lock();
        let line = data.item(item)?;
        let returnable = line.net_quantity();
        if quantity > returnable {
            return Err(InventoryError::OverReturn {
                item,
                returnable,
                requested: quantity,
            });
        }
        let product = line.product();
        let refund_amount = line.price_at_sale * Decimal::from(quantity);

        let locks = self.ledger.lock_set([product])?;
        let mut txn = locks.begin(&self.ledger, actor);
        txn.apply(
            product,
            i64::from(quantity),
            StockTransactionType::Return,
            &format!("Return from Sale #{}", record.id),
            BoundPolicy::Permissive,
        )?;
        txn.commit();

        let id: ReturnId = self.sales.return_ids.next();
        let ret = SaleReturn {
            id,
            sale_item: item,
            quantity,
            reason: reason.to_string(),
            refund_amount,
            processed_at: Utc::now(),
            processed_by: actor,
        };
        data.item_mut(item)?.returned += quantity;
        data.returns.insert(id, ret.clone());
        self.sales.index_return(id, record.id);
        drop(data);
        self.ledger.flush_alerts();

        debug!(sale = %record.id, %item, quantity, refund = %refund_amount, "Return processed");
        Ok(SaleReturn {
            refund_amount: self.money(ret.refund_amount),
            ..ret
        })
    }

    /// Reverses a return, taking its units out of stock again.
    ///
    /// Units that have since left the shelf cannot be taken twice; the
    /// decrease stops at zero and the shortfall is reported as a warning.
    ///
    /// # Errors
    ///
    /// [`InventoryError::ReturnNotFound`] if the return does not exist.
    pub fn cancel_return(
        &self,
        actor: UserId,
        id: ReturnId,
    ) -> Result<Option<StockWarning>, InventoryError> {
        let record = self.sales.record_for_return(id)?;
        let mut data = record.data.lock();
        let ret = match data.returns.get(&id) {
            Some(ret) if !data.deleted => ret.clone(),
            _ => return Err(InventoryError::ReturnNotFound(id)),
        };
        let product = data.item(ret.sale_item)?.product();

        let context = format!("Cancelled return from Sale #{}", record.id);
        let requested = -i64::from(ret.quantity);
        let locks = self.ledger.lock_set([product])?;
        let mut txn = locks.begin(&self.ledger, actor);
        let applied = txn.apply(
            product,
            requested,
            StockTransactionType::Adjustment,
            &context,
            BoundPolicy::Permissive,
        )?;
        txn.commit();

        data.returns.remove(&id);
        let line = data.item_mut(ret.sale_item)?;
        line.returned = line.returned.saturating_sub(ret.quantity);
        self.sales.unindex_return(id);
        drop(data);
        self.ledger.flush_alerts();

        let warning = truncation_warning(product, requested, applied, &context);
        if let Some(warning) = &warning {
            warn!(%warning, "Return cancellation truncated");
        }
        debug!(sale = %record.id, ret = %id, "Return cancelled");
        Ok(warning)
    }

    pub fn get_return(&self, id: ReturnId) -> Option<SaleReturn> {
        let record = self.sales.record_for_return(id).ok()?;
        let data = record.data.lock();
        let ret = data.returns.get(&id)?;
        Some(SaleReturn {
            refund_amount: self.money(ret.refund_amount),
            ..ret.clone()
        })
    }

    /// Returns of a sale line, oldest first.
    pub fn returns_for_item(&self, item: SaleItemId) -> Result<Vec<SaleReturn>, InventoryError> {
        let record = self.sales.record_for_item(item)?;
        let data = record.data.lock();
        data.item(item)?;
        Ok(data
            .returns
            .values()
            .filter(|ret| ret.sale_item == item)
            .map(|ret| SaleReturn {
                refund_amount: self.money(ret.refund_amount),
                ..ret.clone()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::ProductId;
    use crate::product::NewProduct;
    use crate::sale::NewSaleItem;
    use rust_decimal_macros::dec;

    const CLERK: UserId = UserId(3);

    fn sold(stock: u32, quantity: u32) -> (Inventory, ProductId, SaleItemId) {
        let inventory = Inventory::new();
        let product = inventory
            .create_product(NewProduct::new("Mug", dec!(2.00), dec!(4.50)).stock(stock))
            .unwrap();
        let sale = inventory
            .create_sale(CLERK, None, &[NewSaleItem::new(product, quantity)], true)
            .unwrap();
        (inventory, product, sale.items[0].id)
    }

    #[test]
    fn return_restores_stock_and_refunds() {
        let (inventory, product, item) = sold(10, 4);
        let ret = inventory.process_return(CLERK, item, 3, "chipped").unwrap();

        assert_eq!(ret.refund_amount, dec!(13.50));
        assert_eq!(ret.processed_by, CLERK);
        assert_eq!(inventory.product(product).unwrap().stock_quantity, 9);
        assert_eq!(inventory.sale_item(item).unwrap().returned_quantity, 3);

        let record = inventory.stock_transactions(product).pop().unwrap();
        assert_eq!(record.transaction_type, StockTransactionType::Return);
        assert!(record.notes.starts_with("Return from Sale #"));
    }

    #[test]
    fn returns_are_capped_by_returnable_quantity() {
        let (inventory, product, item) = sold(10, 4);
        inventory.process_return(CLERK, item, 3, "").unwrap();
        assert_eq!(
            inventory.process_return(CLERK, item, 2, ""),
            Err(InventoryError::OverReturn {
                item,
                returnable: 1,
                requested: 2
            })
        );
        assert_eq!(inventory.product(product).unwrap().stock_quantity, 9);
        assert_eq!(
            inventory.process_return(CLERK, item, 0, ""),
            Err(InventoryError::InvalidQuantity)
        );
    }

    #[test]
    fn cancel_reverses_return() {
        let (inventory, product, item) = sold(10, 4);
        let ret = inventory.process_return(CLERK, item, 2, "").unwrap();
        assert_eq!(inventory.cancel_return(CLERK, ret.id), Ok(None));

        assert_eq!(inventory.product(product).unwrap().stock_quantity, 6);
        assert_eq!(inventory.sale_item(item).unwrap().returned_quantity, 0);
        assert!(inventory.get_return(ret.id).is_none());
        assert_eq!(
            inventory.cancel_return(CLERK, ret.id),
            Err(InventoryError::ReturnNotFound(ret.id))
        );
    }

    #[test]
    fn cancel_clamps_at_empty_shelf() {
        let (inventory, product, item) = sold(4, 4);
        let ret = inventory.process_return(CLERK, item, 2, "").unwrap();
        // The returned units are sold again elsewhere
        inventory
            .create_sale(CLERK, None, &[NewSaleItem::new(product, 1)], true)
            .unwrap();

        let warning = inventory.cancel_return(CLERK, ret.id).unwrap().unwrap();
        assert_eq!(warning.requested, -2);
        assert_eq!(warning.applied, -1);
        assert_eq!(inventory.product(product).unwrap().stock_quantity, 0);
    }

    #[test]
    fn returns_are_listed_per_item() {
        let (inventory, _, item) = sold(10, 5);
        inventory.process_return(CLERK, item, 1, "a").unwrap();
        inventory.process_return(CLERK, item, 2, "b").unwrap();
        let reasons: Vec<_> = inventory
            .returns_for_item(item)
            .unwrap()
            .into_iter()
            .map(|ret| ret.reason)
            .collect();
        assert_eq!(reasons, vec!["a", "b"]);
    }
}
