//! # Seed Data Generator
//!
//! Opens a numbering series for every document type and inserts demo
//! products, for development databases.
//!
//! ## Usage
//! ```bash
//! # Seed ./fiscal_dev.db for the current year
//! cargo run -p fiscal-db --bin seed
//!
//! # Specify database path and year
//! cargo run -p fiscal-db --bin seed -- --db ./data/fiscal.db --year 2026
//! ```
//!
//! ## Generated Data
//! - One active series per type: `{CODE}{YEAR}` (e.g. `FT2025`, `FRt2025`)
//! - Goods with opening stock and average cost, services with retention

use chrono::{Datelike, Utc};
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fiscal_core::{DocumentType, Product, ProductKind};
use fiscal_db::{new_id, Database, DbConfig, ProductRepository, SeriesRepository};

/// (sku, name, kind, vat bps, retention bps, stock, min stock, avg cost cents)
const PRODUCTS: &[(&str, &str, ProductKind, u32, Option<u32>, i64, i64, i64)] = &[
    ("BOLT-M8", "Hex bolt M8", ProductKind::Goods, 1400, None, 500, 50, 35),
    ("NUT-M8", "Hex nut M8", ProductKind::Goods, 1400, None, 800, 80, 12),
    ("DRILL-18V", "Cordless drill 18V", ProductKind::Goods, 1400, None, 12, 3, 8_900),
    ("CABLE-25", "Power cable 2.5mm (m)", ProductKind::Goods, 1400, None, 300, 100, 140),
    ("PAINT-WHT", "Wall paint white 15L", ProductKind::Goods, 1400, None, 2, 5, 4_250),
    ("INSTALL", "Installation service (h)", ProductKind::Service, 1400, Some(650), 0, 0, 0),
    ("CONSULT", "Technical consulting (h)", ProductKind::Service, 1400, Some(650), 0, 0, 0),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./fiscal_dev.db");
    let mut year = Utc::now().year();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--year" | "-y" => {
                if i + 1 < args.len() {
                    year = args[i + 1].parse().unwrap_or(year);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Fiscal Engine Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./fiscal_dev.db)");
                println!("  -y, --year <YEAR>  Fiscal year of the series (default: current)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(database = %db_path, year, "Seeding database");

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let mut tx = db.begin().await?;
    let now = Utc::now();

    let mut opened = 0;
    for document_type in DocumentType::ALL {
        let label = format!("{}{}", document_type.code(), year);
        match SeriesRepository::new(&mut tx)
            .insert(document_type, &label, Some(year), now)
            .await
        {
            Ok(_) => opened += 1,
            Err(fiscal_db::DbError::UniqueViolation { .. }) => {
                warn!(series = %label, "Series already exists, skipping");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let mut products = ProductRepository::new(&mut tx);
    if products.count().await? > 0 {
        warn!("Products already present, skipping product seed");
    } else {
        for &(sku, name, kind, vat, retention, stock, min_stock, avg_cost) in PRODUCTS {
            products
                .insert(&Product {
                    id: new_id(),
                    sku: sku.to_string(),
                    name: name.to_string(),
                    kind,
                    vat_rate_bps: vat,
                    retention_rate_bps: retention,
                    current_stock: stock,
                    min_stock,
                    average_cost_cents: avg_cost,
                    is_active: true,
                    created_at: now,
                    updated_at: now,
                })
                .await?;
        }
        info!(count = PRODUCTS.len(), "Products inserted");
    }

    tx.commit().await?;
    info!(series = opened, "Seed complete");

    db.close().await;
    Ok(())
}
