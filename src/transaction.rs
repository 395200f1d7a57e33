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

//! Stock transaction records.
//!
//! A [`StockTransaction`] is the immutable audit entry appended for every
//! change to a product's stock quantity:
//!
//! ```text
//! previous_stock ──(+quantity if is_increase, −quantity otherwise)──► new_stock
//! ```

use crate::base::{ProductId, StockTransactionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Why the stock moved.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockTransactionType {
    Purchase,
    Sale,
    Return,
    Adjustment,
}

impl StockTransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "PURCHASE",
            Self::Sale => "SALE",
            Self::Return => "RETURN",
            Self::Adjustment => "ADJUSTMENT",
        }
    }
}

impl fmt::Display for StockTransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StockTransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PURCHASE" => Ok(Self::Purchase),
            "SALE" => Ok(Self::Sale),
            "RETURN" => Ok(Self::Return),
            "ADJUSTMENT" => Ok(Self::Adjustment),
            other => Err(format!("unknown stock transaction type '{other}'")),
        }
    }
}

/// Immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockTransaction {
    pub id: StockTransactionId,
    pub product: ProductId,
    /// Magnitude of the change, always positive.
    pub quantity: u32,
    pub is_increase: bool,
    pub transaction_type: StockTransactionType,
    pub previous_stock: u32,
    pub new_stock: u32,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
}

impl StockTransaction {
    /// Returns the change as a signed quantity.
    pub fn signed_quantity(&self) -> i64 {
        if self.is_increase {
            i64::from(self.quantity)
        } else {
            -i64::from(self.quantity)
        }
    }

    /// Checks `new_stock = previous_stock ± quantity`.
    pub fn is_consistent(&self) -> bool {
        self.quantity > 0
            && i64::from(self.new_stock) - i64::from(self.previous_stock) == self.signed_quantity()
    }
}

impl fmt::Display for StockTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = if self.is_increase { "IN" } else { "OUT" };
        write!(
            f,
            "{} {}: product {} x {}",
            self.transaction_type, direction, self.product, self.quantity
        )
    }
}

/// A stock change that could not be applied in full.
///
/// Cleanup paths (deletions, cancelled returns) never fail because of stock
/// bounds; they truncate the change and report it with one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockWarning {
    pub product: ProductId,
    pub requested: i64,
    pub applied: i64,
    pub context: String,
}

impl fmt::Display for StockWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: could not fully adjust stock for product {} (expected {:+}, actual {:+})",
            self.context, self.product, self.requested, self.applied
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(quantity: u32, is_increase: bool, previous: u32, new: u32) -> StockTransaction {
        StockTransaction {
            id: StockTransactionId(1),
            product: ProductId(1),
            quantity,
            is_increase,
            transaction_type: StockTransactionType::Sale,
            previous_stock: previous,
            new_stock: new,
            notes: String::new(),
            created_at: Utc::now(),
            created_by: UserId::SYSTEM,
        }
    }

    #[test]
    fn consistency_follows_direction() {
        assert!(record(3, false, 10, 7).is_consistent());
        assert!(record(3, true, 7, 10).is_consistent());
        assert!(!record(3, true, 10, 7).is_consistent());
        assert!(!record(0, true, 7, 7).is_consistent());
    }

    #[test]
    fn signed_quantity() {
        assert_eq!(record(4, false, 4, 0).signed_quantity(), -4);
        assert_eq!(record(4, true, 0, 4).signed_quantity(), 4);
    }

    #[test]
    fn transaction_type_round_trips_through_text() {
        for kind in [
            StockTransactionType::Purchase,
            StockTransactionType::Sale,
            StockTransactionType::Return,
            StockTransactionType::Adjustment,
        ] {
            assert_eq!(kind.as_str().parse::<StockTransactionType>(), Ok(kind));
        }
        assert_eq!(
            "return".parse::<StockTransactionType>(),
            Ok(StockTransactionType::Return)
        );
        assert!("refund".parse::<StockTransactionType>().is_err());
    }

    #[test]
    fn display_formats() {
        assert_eq!(record(2, false, 5, 3).to_string(), "SALE OUT: product 1 x 2");
        let warning = StockWarning {
            product: ProductId(4),
            requested: 5,
            applied: 2,
            context: "Sale #9".into(),
        };
        assert_eq!(
            warning.to_string(),
            "Sale #9: could not fully adjust stock for product 4 (expected +5, actual +2)"
        );
    }
}
