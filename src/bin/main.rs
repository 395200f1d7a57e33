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

use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use stock_ledger_rs::{
    Inventory, InventoryError, LedgerConfig, NewProduct, NewSaleItem, ProductId, ReturnId, SaleId,
    SaleItemId, StockTransactionType, UserId,
};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Stock Ledger - Replay inventory commands against a product catalog
///
/// Loads a catalog CSV, replays a command CSV (sales, edits, returns,
/// restocks, adjustments) and writes the final stock levels to stdout.
#[derive(Parser, Debug)]
#[command(name = "stock-ledger")]
#[command(about = "Replays inventory commands and reports stock levels", long_about = None)]
struct Args {
    /// Path to the product catalog CSV
    ///
    /// Expected format: id,name,purchase_price,selling_price,stock,min,max
    #[arg(value_name = "CATALOG")]
    catalog: PathBuf,

    /// Path to the command CSV
    ///
    /// Expected format: op,sale,product,quantity,note
    #[arg(value_name = "COMMANDS")]
    commands: PathBuf,

    /// Disable low-stock alerts
    #[arg(long)]
    no_alerts: bool,

    /// User ID recorded on every stock transaction
    #[arg(long, default_value_t = 0)]
    actor: u32,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stock_ledger_rs=info,stock_ledger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = LedgerConfig::default().low_stock_alerts(!args.no_alerts);
    let mut replay = Replay::new(Inventory::with_config(config), UserId(args.actor));

    let catalog = open(&args.catalog);
    if let Err(e) = replay.load_catalog(BufReader::new(catalog)) {
        eprintln!("Error reading catalog: {}", e);
        process::exit(1);
    }

    let commands = open(&args.commands);
    match replay.run(BufReader::new(commands)) {
        Ok(applied) => info!(applied, "Commands replayed"),
        Err(e) => {
            eprintln!("Error reading commands: {}", e);
            process::exit(1);
        }
    }

    if let Err(e) = replay.write_stock(std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

fn open(path: &Path) -> File {
    match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", path.display(), e);
            process::exit(1);
        }
    }
}

/// Catalog row: `id,name,purchase_price,selling_price,stock,min,max`
#[derive(Debug, Deserialize)]
struct CatalogRecord {
    id: u32,
    name: String,
    purchase_price: Decimal,
    selling_price: Decimal,
    stock: u32,
    #[serde(deserialize_with = "csv::invalid_option")]
    min: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option")]
    max: Option<u32>,
}

/// Command row: `op,sale,product,quantity,note`
///
/// `sale` and `product` are references from the input files, not engine IDs.
#[derive(Debug, Deserialize)]
struct CommandRecord {
    op: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    sale: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option")]
    product: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option")]
    quantity: Option<i64>,
    #[serde(default)]
    note: String,
}

/// Output row: `product,name,stock,min,max,status`
#[derive(Debug, Serialize)]
struct StockRow {
    product: u32,
    name: String,
    stock: u32,
    min: u32,
    max: u32,
    status: &'static str,
}

/// Reasons a command row is skipped.
#[derive(Error, Debug)]
enum RowError {
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("unknown op '{0}'")]
    UnknownOp(String),

    #[error("missing field '{0}'")]
    Missing(&'static str),

    #[error("quantity {0} out of range")]
    Quantity(i64),

    #[error("unknown product reference {0}")]
    UnknownProduct(u32),

    #[error("unknown sale reference {0}")]
    UnknownSale(u32),

    #[error("sale {sale} has no line for product {product}")]
    NoLine { sale: u32, product: u32 },

    #[error("no open return for sale {sale}, product {product}")]
    NoReturn { sale: u32, product: u32 },
}

/// Engine plus the mapping from file references to engine IDs.
struct Replay {
    inventory: Inventory,
    actor: UserId,
    products: BTreeMap<u32, ProductId>,
    sales: HashMap<u32, SaleId>,
    returns: HashMap<(u32, u32), Vec<ReturnId>>,
}

impl Replay {
    fn new(inventory: Inventory, actor: UserId) -> Self {
        Self {
            inventory,
            actor,
            products: BTreeMap::new(),
            sales: HashMap::new(),
            returns: HashMap::new(),
        }
    }

    /// Loads products. Rows that fail validation are skipped.
    fn load_catalog<R: Read>(&mut self, reader: R) -> Result<usize, csv::Error> {
        let mut rdr = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);

        for result in rdr.deserialize::<CatalogRecord>() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed catalog row");
                    continue;
                }
            };
            let mut product =
                NewProduct::new(record.name, record.purchase_price, record.selling_price)
                    .stock(record.stock);
            let config = self.inventory.config();
            product = product.levels(
                record.min.unwrap_or(config.default_min_stock_level),
                record.max.unwrap_or(config.default_max_stock_level),
            );
            match self.inventory.create_product(product) {
                Ok(id) => {
                    self.products.insert(record.id, id);
                }
                Err(e) => warn!(reference = record.id, error = %e, "Skipping catalog row"),
            }
        }
        Ok(self.products.len())
    }

    /// Replays commands and returns how many were applied.
    fn run<R: Read>(&mut self, reader: R) -> Result<usize, csv::Error> {
        let mut rdr = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);

        let mut applied = 0;
        for (row, result) in rdr.deserialize::<CommandRecord>().enumerate() {
            let outcome = match result {
                Ok(record) => self.apply(record),
                Err(e) => {
                    warn!(row, error = %e, "Skipping malformed command row");
                    continue;
                }
            };
            match outcome {
                Ok(()) => applied += 1,
                Err(e) => warn!(row, error = %e, "Skipping command"),
            }
        }
        Ok(applied)
    }

    fn product(&self, record: &CommandRecord) -> Result<(u32, ProductId), RowError> {
        let reference = record.product.ok_or(RowError::Missing("product"))?;
        let id = self
            .products
            .get(&reference)
            .copied()
            .ok_or(RowError::UnknownProduct(reference))?;
        Ok((reference, id))
    }

    fn sale(&self, record: &CommandRecord) -> Result<(u32, SaleId), RowError> {
        let reference = record.sale.ok_or(RowError::Missing("sale"))?;
        let id = self
            .sales
            .get(&reference)
            .copied()
            .ok_or(RowError::UnknownSale(reference))?;
        Ok((reference, id))
    }

    fn quantity(record: &CommandRecord) -> Result<u32, RowError> {
        let quantity = record.quantity.ok_or(RowError::Missing("quantity"))?;
        u32::try_from(quantity).map_err(|_| RowError::Quantity(quantity))
    }

    /// First line of the sale selling the row's product.
    fn line(&self, record: &CommandRecord) -> Result<SaleItemId, RowError> {
        let (sale_ref, sale) = self.sale(record)?;
        let (product_ref, product) = self.product(record)?;
        let missing = || RowError::NoLine {
            sale: sale_ref,
            product: product_ref,
        };
        let sale = self.inventory.sale(sale).ok_or_else(missing)?;
        sale.items
            .iter()
            .find(|item| item.product == product)
            .map(|item| item.id)
            .ok_or_else(missing)
    }

    fn apply(&mut self, record: CommandRecord) -> Result<(), RowError> {
        let actor = self.actor;
        match record.op.to_lowercase().as_str() {
            "sell" => {
                let (_, product) = self.product(&record)?;
                let line = NewSaleItem::new(product, Self::quantity(&record)?);
                let reference = record.sale.ok_or(RowError::Missing("sale"))?;
                match self.sales.get(&reference).copied() {
                    Some(sale) => {
                        self.inventory.add_item(actor, sale, line)?;
                    }
                    None => {
                        let sale = self.inventory.create_sale(actor, None, &[line], true)?;
                        self.sales.insert(reference, sale.id);
                    }
                }
            }
            "edit" => {
                let item = self.line(&record)?;
                self.inventory
                    .edit_item(actor, item, Self::quantity(&record)?)?;
            }
            "remove" => {
                let item = self.line(&record)?;
                let report = self.inventory.remove_item(actor, item)?;
                if !report.sales_deleted.is_empty() {
                    self.sales.retain(|_, sale| !report.sales_deleted.contains(sale));
                }
            }
            "delete" => {
                let (reference, sale) = self.sale(&record)?;
                self.inventory.delete_sale(actor, sale)?;
                self.sales.remove(&reference);
            }
            "return" => {
                let item = self.line(&record)?;
                let ret = self.inventory.process_return(
                    actor,
                    item,
                    Self::quantity(&record)?,
                    &record.note,
                )?;
                let key = (record.sale.unwrap_or_default(), record.product.unwrap_or_default());
                self.returns.entry(key).or_default().push(ret.id);
            }
            "cancel_return" => {
                let sale = record.sale.ok_or(RowError::Missing("sale"))?;
                let product = record.product.ok_or(RowError::Missing("product"))?;
                let ret = self
                    .returns
                    .get_mut(&(sale, product))
                    .and_then(|returns| returns.pop())
                    .ok_or(RowError::NoReturn { sale, product })?;
                self.inventory.cancel_return(actor, ret)?;
            }
            "restock" => {
                let products: Vec<ProductId> = match record.product {
                    Some(_) => vec![self.product(&record)?.1],
                    None => self.products.values().copied().collect(),
                };
                self.inventory.bulk_restock(actor, &products)?;
            }
            "adjust" => {
                let (_, product) = self.product(&record)?;
                let quantity = record.quantity.ok_or(RowError::Missing("quantity"))?;
                let magnitude = u32::try_from(quantity.unsigned_abs())
                    .map_err(|_| RowError::Quantity(quantity))?;
                self.inventory.record_stock_transaction(
                    actor,
                    product,
                    magnitude,
                    quantity > 0,
                    StockTransactionType::Adjustment,
                    &record.note,
                )?;
            }
            other => return Err(RowError::UnknownOp(other.to_string())),
        }
        Ok(())
    }

    /// Writes final stock levels in catalog order.
    fn write_stock<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut wtr = Writer::from_writer(writer);
        for (reference, id) in &self.products {
            let Some(product) = self.inventory.product(*id) else {
                continue;
            };
            wtr.serialize(StockRow {
                product: *reference,
                name: product.name,
                stock: product.stock_quantity,
                min: product.min_stock_level,
                max: product.max_stock_level,
                status: product.status.label(),
            })?;
        }
        wtr.flush()?;
        Ok(())
    }
}
