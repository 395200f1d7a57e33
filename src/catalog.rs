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

//! Catalog: products, categories and customers.
//!
//! A product save ([`Inventory::update_product`]) is the only place that
//! feeds the price history. Stock is set once at creation and moves through
//! the stock ledger afterwards.

use crate::base::{CategoryId, CustomerId, ProductId, UserId};
use crate::engine::Inventory;
use crate::error::InventoryError;
use crate::price_history::PriceHistoryEntry;
use crate::product::{
    CatalogData, NewProduct, ProductEntry, ProductSnapshot, ProductUpdate, StockData,
    validate_price,
};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A named buyer. Sales without a customer are walk-in sales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub contact_info: String,
    pub created_at: DateTime<Utc>,
}

impl Inventory {
    /// Creates a category with a unique name.
    ///
    /// # Errors
    ///
    /// [`InventoryError::DuplicateCategory`] if the name is taken.
    pub fn create_category(
        &self,
        name: &str,
        description: &str,
    ) -> Result<CategoryId, InventoryError> {
        match self.category_names.entry(name.to_string()) {
            Entry::Occupied(_) => Err(InventoryError::DuplicateCategory(name.to_string())),
            Entry::Vacant(slot) => {
                let id: CategoryId = self.category_ids.next();
                self.categories.insert(
                    id,
                    Category {
                        id,
                        name: name.to_string(),
                        description: description.to_string(),
                        created_at: Utc::now(),
                    },
                );
                slot.insert(id);
                Ok(id)
            }
        }
    }

    pub fn category(&self, id: CategoryId) -> Option<Category> {
        self.categories.get(&id).map(|category| category.clone())
    }

    pub fn create_customer(&self, name: &str, contact_info: &str) -> CustomerId {
        let id: CustomerId = self.customer_ids.next();
        self.customers.insert(
            id,
            Customer {
                id,
                name: name.to_string(),
                contact_info: contact_info.to_string(),
                created_at: Utc::now(),
            },
        );
        id
    }

    pub fn customer(&self, id: CustomerId) -> Option<Customer> {
        self.customers.get(&id).map(|customer| customer.clone())
    }

    fn check_category(&self, category: Option<CategoryId>) -> Result<(), InventoryError> {
        match category {
            Some(id) if !self.categories.contains_key(&id) => {
                Err(InventoryError::CategoryNotFound(id))
            }
            _ => Ok(()),
        }
    }

    /// Adds a product to the catalog.
    ///
    /// Levels left unset fall back to the configured defaults. No price
    /// history is recorded until the product is first saved.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::InvalidPrice`] - a price is below 0.01 or finer than the money precision.
    /// - [`InventoryError::CategoryNotFound`] - unknown category.
    /// - [`InventoryError::CapacityExceeded`] - initial stock above the maximum level.
    pub fn create_product(&self, new: NewProduct) -> Result<ProductId, InventoryError> {
        let precision = self.config.money_precision;
        let purchase_price = validate_price(new.purchase_price, precision)?;
        let selling_price = validate_price(new.selling_price, precision)?;
        self.check_category(new.category)?;

        let min_stock_level = new
            .min_stock_level
            .unwrap_or(self.config.default_min_stock_level);
        let max_stock_level = new
            .max_stock_level
            .unwrap_or(self.config.default_max_stock_level);

        let id: ProductId = self.product_ids.next();
        if new.stock_quantity > max_stock_level {
            return Err(InventoryError::CapacityExceeded {
                product: id,
                max: max_stock_level,
                requested: i64::from(new.stock_quantity),
            });
        }

        let now = Utc::now();
        self.ledger.insert(ProductEntry::new(
            id,
            CatalogData {
                name: new.name,
                category: new.category,
                purchase_price,
                selling_price,
                is_active: new.is_active,
                created_at: now,
                updated_at: now,
            },
            StockData {
                quantity: new.stock_quantity,
                min_stock_level,
                max_stock_level,
                low_stock_alert: new.low_stock_alert,
            },
        ));
        debug!(product = %id, stock = new.stock_quantity, "Product created");
        Ok(id)
    }

    /// Saves catalog changes to a product and runs the price history hook.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::ProductNotFound`] - unknown product.
    /// - [`InventoryError::InvalidPrice`] - a new price is below 0.01 or finer than the money precision.
    /// - [`InventoryError::CategoryNotFound`] - unknown category.
    /// - [`InventoryError::CapacityExceeded`] - new maximum below current stock.
    pub fn update_product(
        &self,
        actor: UserId,
        product: ProductId,
        update: ProductUpdate,
    ) -> Result<ProductSnapshot, InventoryError> {
        let entry = self.ledger.entry(product)?;
        let precision = self.config.money_precision;
        let purchase_price = update
            .purchase_price
            .map(|price| validate_price(price, precision))
            .transpose()?;
        let selling_price = update
            .selling_price
            .map(|price| validate_price(price, precision))
            .transpose()?;
        self.check_category(update.category)?;

        let mut stock = entry.stock.lock();
        if let Some(max) = update.max_stock_level
            && max < stock.quantity
        {
            return Err(InventoryError::CapacityExceeded {
                product,
                max,
                requested: i64::from(stock.quantity),
            });
        }
        if let Some(min) = update.min_stock_level {
            stock.min_stock_level = min;
        }
        if let Some(max) = update.max_stock_level {
            stock.max_stock_level = max;
        }
        if let Some(enabled) = update.low_stock_alert {
            stock.low_stock_alert = enabled;
        }

        let mut catalog = entry.catalog.write();
        if let Some(name) = update.name {
            catalog.name = name;
        }
        if update.category.is_some() {
            catalog.category = update.category;
        }
        if let Some(price) = purchase_price {
            catalog.purchase_price = price;
        }
        if let Some(price) = selling_price {
            catalog.selling_price = price;
        }
        if let Some(active) = update.is_active {
            catalog.is_active = active;
        }
        catalog.updated_at = Utc::now();

        // Post-save hook.
        if self.prices.record_if_changed(
            product,
            catalog.purchase_price,
            catalog.selling_price,
            actor,
            catalog.updated_at,
        ) {
            debug!(
                %product,
                purchase = %catalog.purchase_price,
                selling = %catalog.selling_price,
                "Price history entry recorded"
            );
        }

        Ok(ProductSnapshot::assemble(product, &catalog, &stock))
    }

    pub fn product(&self, id: ProductId) -> Option<ProductSnapshot> {
        self.ledger.entry(id).ok().map(|entry| entry.snapshot())
    }

    /// All products ordered by name, then ID.
    pub fn products(&self) -> Vec<ProductSnapshot> {
        let mut products: Vec<_> = self
            .ledger
            .entries()
            .iter()
            .map(|entry| entry.snapshot())
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        products
    }

    pub fn price_history(&self, product: ProductId) -> Vec<PriceHistoryEntry> {
        self.prices.history(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::StockStatus;
    use rust_decimal_macros::dec;

    fn inventory() -> Inventory {
        Inventory::new()
    }

    #[test]
    fn product_defaults_come_from_config() {
        let inventory = inventory();
        let id = inventory
            .create_product(NewProduct::new("Rice", dec!(1.00), dec!(2.00)).stock(10))
            .unwrap();
        let product = inventory.product(id).unwrap();
        assert_eq!(product.min_stock_level, 5);
        assert_eq!(product.max_stock_level, 100);
        assert_eq!(product.status, StockStatus::InStock);
    }

    #[test]
    fn create_product_validates_input() {
        let inventory = inventory();
        assert_eq!(
            inventory.create_product(NewProduct::new("Free", dec!(0), dec!(1))),
            Err(InventoryError::InvalidPrice)
        );
        assert_eq!(
            inventory.create_product(NewProduct::new("Tea", dec!(1), dec!(2)).category(CategoryId(9))),
            Err(InventoryError::CategoryNotFound(CategoryId(9)))
        );
        let tea = inventory
            .create_product(NewProduct::new("Tea", dec!(1), dec!(2)))
            .unwrap();
        assert_eq!(
            inventory.update_product(UserId(1), tea, ProductUpdate::prices(dec!(1), dec!(2.499))),
            Err(InventoryError::InvalidPrice)
        );
        assert_eq!(inventory.product(tea).unwrap().selling_price, dec!(2));
        assert!(matches!(
            inventory.create_product(NewProduct::new("Tea", dec!(1), dec!(2)).levels(0, 5).stock(6)),
            Err(InventoryError::CapacityExceeded { max: 5, requested: 6, .. })
        ));
    }

    #[test]
    fn creation_records_no_price_history() {
        let inventory = inventory();
        let id = inventory
            .create_product(NewProduct::new("Oil", dec!(3.00), dec!(4.00)))
            .unwrap();
        assert!(inventory.price_history(id).is_empty());

        // First save opens the history even without a price change
        inventory
            .update_product(UserId(1), id, ProductUpdate::default())
            .unwrap();
        assert_eq!(inventory.price_history(id).len(), 1);

        inventory
            .update_product(
                UserId(1),
                id,
                ProductUpdate {
                    name: Some("Olive oil".into()),
                    ..ProductUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(inventory.price_history(id).len(), 1);

        inventory
            .update_product(UserId(2), id, ProductUpdate::prices(dec!(3.00), dec!(4.50)))
            .unwrap();
        let history = inventory.price_history(id);
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].selling_price, dec!(4.50));
        assert_eq!(history[1].changed_by, UserId(2));
    }

    #[test]
    fn lowering_max_below_stock_is_rejected() {
        let inventory = inventory();
        let id = inventory
            .create_product(NewProduct::new("Salt", dec!(0.50), dec!(1.00)).stock(20))
            .unwrap();
        let update = ProductUpdate {
            max_stock_level: Some(10),
            ..ProductUpdate::default()
        };
        assert!(matches!(
            inventory.update_product(UserId(1), id, update),
            Err(InventoryError::CapacityExceeded { max: 10, requested: 20, .. })
        ));
        assert_eq!(inventory.product(id).unwrap().max_stock_level, 100);
    }

    #[test]
    fn category_names_are_unique() {
        let inventory = inventory();
        let id = inventory.create_category("Drinks", "Cold and hot").unwrap();
        assert_eq!(
            inventory.create_category("Drinks", ""),
            Err(InventoryError::DuplicateCategory("Drinks".into()))
        );
        assert!(inventory.create_category("drinks", "").is_ok());
        assert_eq!(inventory.category(id).unwrap().name, "Drinks");
    }

    #[test]
    fn products_are_listed_by_name() {
        let inventory = inventory();
        inventory
            .create_product(NewProduct::new("Zucchini", dec!(1), dec!(2)))
            .unwrap();
        inventory
            .create_product(NewProduct::new("Apple", dec!(1), dec!(2)))
            .unwrap();
        let names: Vec<_> = inventory.products().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Apple", "Zucchini"]);
    }

    #[test]
    fn customers_are_stored() {
        let inventory = inventory();
        let id = inventory.create_customer("Ada", "ada@example.com");
        assert_eq!(inventory.customer(id).unwrap().contact_info, "ada@example.com");
        assert!(inventory.customer(CustomerId(99)).is_none());
    }
}
