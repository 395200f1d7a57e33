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

//! Product price history.
//!
//! The catalog calls [`PriceHistoryTracker::record_if_changed`] after every
//! product save. Creating a product records nothing, so the first save after
//! creation always opens the history.

use crate::base::{ProductId, UserId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Serialize;

/// One recorded pair of prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceHistoryEntry {
    pub product: ProductId,
    pub purchase_price: Decimal,
    pub selling_price: Decimal,
    pub changed_at: DateTime<Utc>,
    pub changed_by: UserId,
}

impl PriceHistoryEntry {
    fn same_prices(&self, purchase_price: Decimal, selling_price: Decimal) -> bool {
        self.purchase_price == purchase_price && self.selling_price == selling_price
    }
}

/// Append-only price history per product.
#[derive(Debug, Default)]
pub struct PriceHistoryTracker {
    entries: DashMap<ProductId, Vec<PriceHistoryEntry>>,
}

impl PriceHistoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry unless the latest one already holds these prices.
    ///
    /// Returns `true` if an entry was appended.
    pub(crate) fn record_if_changed(
        &self,
        product: ProductId,
        purchase_price: Decimal,
        selling_price: Decimal,
        changed_by: UserId,
        changed_at: DateTime<Utc>,
    ) -> bool {
        let mut history = self.entries.entry(product).or_default();
        if history
            .last()
            .is_some_and(|latest| latest.same_prices(purchase_price, selling_price))
        {
            return false;
        }
        history.push(PriceHistoryEntry {
            product,
            purchase_price,
            selling_price,
            changed_at,
            changed_by,
        });
        true
    }

    /// Entries for a product, oldest first.
    pub fn history(&self, product: ProductId) -> Vec<PriceHistoryEntry> {
        self.entries
            .get(&product)
            .map(|history| history.value().clone())
            .unwrap_or_default()
    }

    pub fn latest(&self, product: ProductId) -> Option<PriceHistoryEntry> {
        self.entries
            .get(&product)
            .and_then(|history| history.last().cloned())
    }
}
