//! Turns an [`ExecutionResult`] into a natural-language answer.
//!
//! The answer depends only on the result and the question's [`Intent`].
//! Intent-specific templates apply when the expected column is present;
//! otherwise the result falls through to the generic renderings.

use anyhow::{bail, Result};
use serde_json::Value;
use tracing::error;

use crate::intent::Intent;
use crate::models::{ExecutionResult, Row};

pub const NO_DATA: &str = "No data found for your question.";

/// Returned when a successful result has a shape the templates cannot
/// render (for example text where an amount was expected).
pub const FORMAT_APOLOGY: &str =
    "Sorry, I could not put together an answer from the query results.";

/// Rows listed before the remainder is summarised as a count.
const LIST_LIMIT: usize = 5;

pub fn format_answer(result: &ExecutionResult, intent: Intent) -> String {
    if !result.is_success() {
        return format!(
            "Sorry, I encountered an error: {}",
            result.error().unwrap_or("unknown error")
        );
    }

    let rows = result.rows();
    if rows.is_empty() {
        return NO_DATA.to_string();
    }

    match render(rows, intent) {
        Ok(answer) => answer,
        Err(e) => {
            error!(error = %e, ?intent, "could not format query result");
            FORMAT_APOLOGY.to_string()
        }
    }
}

fn render(rows: &[Row], intent: Intent) -> Result<String> {
    let first = &rows[0];

    match intent {
        Intent::TotalSales => {
            if let Some(value) = lookup(first, "total_sales") {
                return Ok(match as_number(value)? {
                    Some(total) => format!("The total sales amount is {}", format_currency(total)),
                    None => NO_DATA.to_string(),
                });
            }
        }
        Intent::Roas => {
            if let Some(value) = lookup(first, "roas") {
                return Ok(match as_number(value)? {
                    Some(roas) => format!(
                        "The Return on Ad Spend (RoAS) is {:.2}. This means for every $1 spent \
                         on advertising, you generated ${:.2} in sales.",
                        roas, roas
                    ),
                    None => NO_DATA.to_string(),
                });
            }
        }
        Intent::HighestCpc => {
            if let Some(value) = first.get("cpc") {
                let product = first
                    .get("product_name")
                    .or_else(|| first.get("product_id"))
                    .filter(|v| !v.is_null())
                    .map(display_value)
                    .unwrap_or_else(|| "Unknown".to_string());
                return Ok(match as_number(value)? {
                    Some(cpc) => format!(
                        "The product with the highest Cost Per Click (CPC) is '{}' with a CPC of ${:.2}",
                        product, cpc
                    ),
                    None => NO_DATA.to_string(),
                });
            }
        }
        _ => {}
    }

    if rows.len() == 1 && first.len() == 1 {
        if let Some((key, value)) = first.iter().next() {
            return Ok(format!("The {} is {}.", key.replace('_', " "), display_value(value)));
        }
    }

    Ok(render_list(rows))
}

fn render_list(rows: &[Row]) -> String {
    let mut out = String::from("Here are the results for your question:\n\n");

    for (i, row) in rows.iter().take(LIST_LIMIT).enumerate() {
        let fields: Vec<String> = row
            .iter()
            .map(|(key, value)| format!("{}: {}", title_case(key), display_value(value)))
            .collect();
        out.push_str(&format!("{}. {}\n", i + 1, fields.join(", ")));
    }

    if rows.len() > LIST_LIMIT {
        out.push_str(&format!(
            "\n... and {} more results.",
            rows.len() - LIST_LIMIT
        ));
    }

    out.trim_end().to_string()
}

/// The named column, or the only column of a single-column row.
fn lookup<'a>(row: &'a Row, name: &str) -> Option<&'a Value> {
    row.get(name).or_else(|| {
        if row.len() == 1 {
            row.values().next()
        } else {
            None
        }
    })
}

/// `Ok(None)` for SQL NULL; an error for values that are not amounts.
fn as_number(value: &Value) -> Result<Option<f64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => match n.as_f64() {
            Some(f) => Ok(Some(f)),
            None => bail!("number out of range: {}", n),
        },
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(f) => Ok(Some(f)),
            Err(_) => bail!("expected a number, found text '{}'", s),
        },
        other => bail!("expected a number, found {}", other),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "N/A".to_string(),
        Value::Number(n) if n.is_f64() => format!("{:.2}", n.as_f64().unwrap_or_default()),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `12500.0` → `"$12,500.00"`.
pub fn format_currency(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, cents)
}
