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

//! Low-stock notifications.
//!
//! Alerts raised inside a stock unit of work are parked in a lock-free
//! outbox and delivered only after every product lock has been released.
//! Delivery is fire-and-forget: a failing notifier is logged and ignored.

use crate::base::ProductId;
use crate::error::NotifyError;
use crossbeam::queue::SegQueue;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// A product whose stock fell to or below its minimum level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LowStockAlert {
    pub product: ProductId,
    pub name: String,
    pub stock_quantity: u32,
    pub min_stock_level: u32,
}

impl LowStockAlert {
    pub fn subject(&self) -> String {
        format!("Low Stock Alert: {}", self.name)
    }

    pub fn message(&self) -> String {
        format!(
            "Low stock alert for {}\nCurrent stock: {}\nMinimum stock level: {}\nPlease restock soon.",
            self.name, self.stock_quantity, self.min_stock_level
        )
    }
}

/// Delivery channel for low-stock alerts (email, SMS, chat...).
pub trait LowStockNotifier: Send + Sync {
    fn send_low_stock_alert(&self, alert: &LowStockAlert) -> Result<(), NotifyError>;
}

/// Default notifier: writes alerts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl LowStockNotifier for TracingNotifier {
    fn send_low_stock_alert(&self, alert: &LowStockAlert) -> Result<(), NotifyError> {
        warn!(
            product = %alert.product,
            stock = alert.stock_quantity,
            min = alert.min_stock_level,
            "{}",
            alert.subject()
        );
        Ok(())
    }
}

/// Pending alerts awaiting delivery.
pub(crate) struct AlertOutbox {
    pending: SegQueue<LowStockAlert>,
    notifier: Arc<dyn LowStockNotifier>,
}

impl AlertOutbox {
    pub(crate) fn new(notifier: Arc<dyn LowStockNotifier>) -> Self {
        Self {
            pending: SegQueue::new(),
            notifier,
        }
    }

    pub(crate) fn push(&self, alert: LowStockAlert) {
        self.pending.push(alert);
    }

    /// Delivers every queued alert. Returns how many were accepted.
    ///
    /// Must not be called while holding a product lock.
    pub(crate) fn flush(&self) -> usize {
        let mut delivered = 0;
        while let Some(alert) = self.pending.pop() {
            match self.notifier.send_low_stock_alert(&alert) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(product = %alert.product, error = %e, "Dropping low-stock alert"),
            }
        }
        if delivered > 0 {
            info!(delivered, "Low-stock alerts dispatched");
        }
        delivered
    }
}

impl fmt::Debug for AlertOutbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertOutbox")
            .field("pending", &self.pending.len())
            .finish()
    }
}
