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

//! Append-only stock transaction journal.
//!
//! Provides a concurrent log of [`StockTransaction`] records indexed both by
//! transaction ID and by product. Records can be appended and read, never
//! updated or removed.

use crate::base::{ProductId, Sequence, StockTransactionId};
use crate::transaction::StockTransaction;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

/// A thread-safe, append-only stock journal.
///
/// Combines a [`DashMap`] keyed by transaction ID with a per-product index
/// of IDs in append order.
#[derive(Debug)]
pub struct StockJournal {
    /// Records indexed by transaction ID.
    records: DashMap<StockTransactionId, Arc<StockTransaction>>,

    /// Transaction IDs per product, oldest first.
    by_product: DashMap<ProductId, Vec<StockTransactionId>>,

    ids: Sequence,
}

impl StockJournal {
    /// Creates a new empty journal.
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            by_product: DashMap::new(),
            ids: Sequence::new(),
        }
    }

    pub(crate) fn next_id(&self) -> StockTransactionId {
        self.ids.next()
    }

    /// Appends a record.
    ///
    /// Callers hold the product's stock lock, so records for one product are
    /// appended in the same order as the mutations they describe.
    pub(crate) fn append(&self, record: StockTransaction) {
        let id = record.id;
        let product = record.product;

        match self.records.entry(id) {
            Entry::Occupied(_) => {
                // IDs come from our own sequence; a clash means a record was
                // built outside the journal and is rejected.
                tracing::error!(%id, "Refusing to overwrite stock transaction");
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(record));
                self.by_product.entry(product).or_default().push(id);
            }
        }
    }

    /// Looks up a record by ID.
    pub fn get(&self, id: StockTransactionId) -> Option<StockTransaction> {
        self.records.get(&id).map(|record| (**record).clone())
    }

    /// All records for a product, oldest first.
    pub fn for_product(&self, product: ProductId) -> Vec<StockTransaction> {
        let ids = match self.by_product.get(&product) {
            Some(ids) => ids.value().clone(),
            None => return Vec::new(),
        };
        ids.iter().filter_map(|id| self.get(*id)).collect()
    }

    /// Every record in the journal ordered by transaction ID.
    pub fn all(&self) -> Vec<StockTransaction> {
        let mut records: Vec<StockTransaction> =
            self.records.iter().map(|entry| (**entry).clone()).collect();
        records.sort_by_key(|record| record.id);
        records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for StockJournal {
    fn default() -> Self {
        Self::new()
    }
}
