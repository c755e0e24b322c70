use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // Eligibility of each product for advertising
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS product_eligibility (
            product_id TEXT NOT NULL,
            product_name TEXT,
            category TEXT,
            subcategory TEXT,
            brand TEXT,
            is_eligible_for_ads INTEGER NOT NULL DEFAULT 0,
            eligibility_reason TEXT
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Per-campaign advertising metrics
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS product_ad_sales (
            product_id TEXT NOT NULL,
            campaign_name TEXT,
            ad_spend REAL,
            impressions INTEGER,
            clicks INTEGER,
            ctr REAL,
            cpc REAL,
            ad_sales REAL,
            ad_orders INTEGER,
            conversion_rate REAL,
            acos REAL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Overall (ad + organic) sales per product
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS product_total_sales (
            product_id TEXT NOT NULL,
            total_sales REAL,
            total_orders INTEGER,
            organic_sales REAL,
            organic_orders INTEGER,
            sessions INTEGER,
            page_views INTEGER,
            buy_box_percentage REAL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_eligibility_product ON product_eligibility(product_id)",
    )
    .execute(&pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_ad_sales_product ON product_ad_sales(product_id)")
        .execute(&pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_total_sales_product ON product_total_sales(product_id)",
    )
    .execute(&pool)
    .await?;

    pool.close().await;
    Ok(())
}
