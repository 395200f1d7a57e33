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

//! Ledger configuration.
//!
//! # Example
//!
//! ```
//! use stock_ledger_rs::LedgerConfig;
//!
//! let config = LedgerConfig::default()
//!     .low_stock_alerts(false)
//!     .default_stock_levels(2, 50);
//! assert_eq!(config.default_max_stock_level, 50);
//! ```

/// Tunables shared by every component of an [`Inventory`](crate::Inventory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Master switch for low-stock notifications.
    ///
    /// A product's own `low_stock_alert` flag is only honoured while this is on.
    pub low_stock_alerts: bool,

    /// Minimum stock level for products created without one.
    pub default_min_stock_level: u32,

    /// Maximum stock level for products created without one.
    pub default_max_stock_level: u32,

    /// Decimal places used when money is serialized.
    pub money_precision: u32,
}

impl LedgerConfig {
    pub fn low_stock_alerts(mut self, enabled: bool) -> Self {
        self.low_stock_alerts = enabled;
        self
    }

    pub fn default_stock_levels(mut self, min: u32, max: u32) -> Self {
        self.default_min_stock_level = min;
        self.default_max_stock_level = max;
        self
    }

    pub fn money_precision(mut self, precision: u32) -> Self {
        self.money_precision = precision;
        self
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            low_stock_alerts: true,
            default_min_stock_level: 5,
            default_max_stock_level: 100,
            money_precision: 2,
        }
    }
}
