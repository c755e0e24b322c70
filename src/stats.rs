//! Store statistics.
//!
//! A quick summary of what the business store holds: row counts per table
//! and the headline sales and advertising totals. Used by `shopq stats` and
//! `GET /stats` to confirm that data has been loaded.

use anyhow::Result;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Row counts for the three business tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableCounts {
    pub product_eligibility: i64,
    pub product_ad_sales: i64,
    pub product_total_sales: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreMetrics {
    pub total_sales: f64,
    pub total_ad_spend: f64,
    /// Total sales over ad spend; 0 when nothing was spent.
    pub estimated_roas: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    pub tables: TableCounts,
    pub metrics: StoreMetrics,
}

pub async fn collect(pool: &SqlitePool) -> Result<StoreStats> {
    let count = |table: &'static str| async move {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await
    };

    let tables = TableCounts {
        product_eligibility: count("product_eligibility").await?,
        product_ad_sales: count("product_ad_sales").await?,
        product_total_sales: count("product_total_sales").await?,
    };

    let total_sales: f64 = sqlx::query_scalar(
        "SELECT CAST(COALESCE(SUM(total_sales), 0) AS REAL) FROM product_total_sales",
    )
    .fetch_one(pool)
    .await?;

    let total_ad_spend: f64 = sqlx::query_scalar(
        "SELECT CAST(COALESCE(SUM(ad_spend), 0) AS REAL) FROM product_ad_sales",
    )
    .fetch_one(pool)
    .await?;

    let estimated_roas = if total_ad_spend > 0.0 {
        total_sales / total_ad_spend
    } else {
        0.0
    };

    Ok(StoreStats {
        tables,
        metrics: StoreMetrics {
            total_sales,
            total_ad_spend,
            estimated_roas,
        },
    })
}

/// Run the stats command: query the store and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect_read_only(config).await?;
    let stats = collect(&pool).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Shop Analyst: Store Stats");
    println!("=========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  {:<24} {:>8}", "TABLE", "ROWS");
    println!("  {}", "-".repeat(33));
    println!(
        "  {:<24} {:>8}",
        "product_eligibility", stats.tables.product_eligibility
    );
    println!(
        "  {:<24} {:>8}",
        "product_ad_sales", stats.tables.product_ad_sales
    );
    println!(
        "  {:<24} {:>8}",
        "product_total_sales", stats.tables.product_total_sales
    );
    println!();
    println!(
        "  Total sales:     {}",
        crate::format::format_currency(stats.metrics.total_sales)
    );
    println!(
        "  Total ad spend:  {}",
        crate::format::format_currency(stats.metrics.total_ad_spend)
    );
    println!("  Estimated RoAS:  {:.2}", stats.metrics.estimated_roas);
    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
