//! Human-readable description of the business tables.
//!
//! The [`SchemaDescriptor`] is built once at startup from the store's own
//! catalog and handed, read-only, to every translator tier as grounding.
//! Column descriptions come from a built-in annotation list for the known
//! e-commerce columns; anything else is listed with its declared type only.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared SQL type (`TEXT`, `REAL`, `INTEGER`, ...).
    pub sql_type: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDescriptor {
    tables: Vec<TableInfo>,
}

/// Column annotations: (table, column, description).
const COLUMN_NOTES: &[(&str, &str, &str)] = &[
    ("product_eligibility", "product_id", "Unique product identifier"),
    ("product_eligibility", "product_name", "Name of the product"),
    ("product_eligibility", "category", "Product category"),
    ("product_eligibility", "subcategory", "Product subcategory"),
    ("product_eligibility", "brand", "Product brand"),
    (
        "product_eligibility",
        "is_eligible_for_ads",
        "1 if eligible for ads, 0 otherwise",
    ),
    (
        "product_eligibility",
        "eligibility_reason",
        "Reason for eligibility status",
    ),
    ("product_ad_sales", "product_id", "Unique product identifier"),
    ("product_ad_sales", "campaign_name", "Name of advertising campaign"),
    ("product_ad_sales", "ad_spend", "Amount spent on advertising"),
    ("product_ad_sales", "impressions", "Number of ad impressions"),
    ("product_ad_sales", "clicks", "Number of ad clicks"),
    ("product_ad_sales", "ctr", "Click-through rate (%)"),
    ("product_ad_sales", "cpc", "Cost per click"),
    ("product_ad_sales", "ad_sales", "Sales generated from ads"),
    ("product_ad_sales", "ad_orders", "Orders generated from ads"),
    ("product_ad_sales", "conversion_rate", "Conversion rate (%)"),
    ("product_ad_sales", "acos", "Advertising Cost of Sales (%)"),
    ("product_total_sales", "product_id", "Unique product identifier"),
    ("product_total_sales", "total_sales", "Total sales amount"),
    ("product_total_sales", "total_orders", "Total number of orders"),
    ("product_total_sales", "organic_sales", "Sales not from ads"),
    ("product_total_sales", "organic_orders", "Orders not from ads"),
    ("product_total_sales", "sessions", "Number of product page sessions"),
    ("product_total_sales", "page_views", "Number of page views"),
    ("product_total_sales", "buy_box_percentage", "Buy box percentage"),
];

fn describe_column(table: &str, column: &str) -> String {
    COLUMN_NOTES
        .iter()
        .find(|(t, c, _)| *t == table && *c == column)
        .map(|(_, _, d)| d.to_string())
        .unwrap_or_default()
}

impl SchemaDescriptor {
    pub fn new(tables: Vec<TableInfo>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &[TableInfo] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&TableInfo> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Renders the schema as prompt text.
    ///
    /// ```text
    /// Table: product_total_sales
    /// - product_id (TEXT): Unique product identifier
    /// - total_sales (REAL): Total sales amount
    /// ```
    pub fn render(&self) -> String {
        let mut out = String::from("Database Schema:\n");
        for table in &self.tables {
            out.push_str(&format!("\nTable: {}\n", table.name));
            for col in &table.columns {
                if col.description.is_empty() {
                    out.push_str(&format!("- {} ({})\n", col.name, col.sql_type));
                } else {
                    out.push_str(&format!(
                        "- {} ({}): {}\n",
                        col.name, col.sql_type, col.description
                    ));
                }
            }
        }
        out
    }
}

/// Builds the descriptor from the store's catalog.
///
/// Tables are listed in name order; columns in declaration order. SQLite
/// internal tables are skipped.
pub async fn describe_store(pool: &SqlitePool) -> Result<SchemaDescriptor> {
    let table_names: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
         ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    let mut tables = Vec::with_capacity(table_names.len());

    for table in table_names {
        let rows = sqlx::query("SELECT name, type FROM pragma_table_info(?) ORDER BY cid")
            .bind(&table)
            .fetch_all(pool)
            .await?;

        let columns = rows
            .iter()
            .map(|row| {
                let name: String = row.get("name");
                let sql_type: String = row.get("type");
                let description = describe_column(&table, &name);
                ColumnInfo {
                    name,
                    sql_type: if sql_type.is_empty() {
                        "ANY".to_string()
                    } else {
                        sql_type
                    },
                    description,
                }
            })
            .collect();

        tables.push(TableInfo {
            name: table,
            columns,
        });
    }

    Ok(SchemaDescriptor::new(tables))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SchemaDescriptor {
        SchemaDescriptor::new(vec![TableInfo {
            name: "product_total_sales".to_string(),
            columns: vec![
                ColumnInfo {
                    name: "product_id".to_string(),
                    sql_type: "TEXT".to_string(),
                    description: describe_column("product_total_sales", "product_id"),
                },
                ColumnInfo {
                    name: "notes".to_string(),
                    sql_type: "TEXT".to_string(),
                    description: describe_column("product_total_sales", "notes"),
                },
            ],
        }])
    }

    #[test]
    fn test_render_lists_tables_and_columns() {
        let text = sample().render();
        assert!(text.contains("Table: product_total_sales"));
        assert!(text.contains("- product_id (TEXT): Unique product identifier"));
        assert!(text.contains("- notes (TEXT)\n"));
    }

    #[test]
    fn test_unknown_column_has_no_description() {
        assert_eq!(describe_column("product_ad_sales", "mystery"), "");
        assert_eq!(describe_column("product_ad_sales", "cpc"), "Cost per click");
    }

    #[test]
    fn test_table_lookup() {
        let schema = sample();
        assert!(schema.table("product_total_sales").is_some());
        assert!(schema.table("orders").is_none());
        assert!(!schema.is_empty());
    }
}
