//! Keyword intent table shared by the pattern translator and the formatter.
//!
//! [`INTENT_TABLE`] is the only place question keywords are matched. The
//! pattern tier reads a rule's `query`, the response formatter reads its
//! `intent`, and both go through [`match_rule`], so the two can never
//! disagree about which branch a question falls into.
//!
//! Rules are evaluated in order against the lower-cased question; the
//! first match wins and [`DEFAULT_RULE`] applies when nothing matches.

use serde::Serialize;

/// Closed classification of a question, used to pick an answer template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    TotalSales,
    Roas,
    HighestCpc,
    ConversionRate,
    TopPerforming,
    Eligibility,
    AdSpend,
    Generic,
}

/// Keyword condition of a rule.
#[derive(Debug, Clone, Copy)]
pub enum Trigger {
    /// Matches when any of the substrings occurs.
    Any(&'static [&'static str]),
    /// Matches when every substring occurs.
    All(&'static [&'static str]),
    /// Matches every question.
    Always,
}

impl Trigger {
    fn matches(&self, lowered: &str) -> bool {
        match self {
            Trigger::Any(needles) => needles.iter().any(|n| lowered.contains(n)),
            Trigger::All(needles) => needles.iter().all(|n| lowered.contains(n)),
            Trigger::Always => true,
        }
    }
}

/// One row of the dispatch table.
#[derive(Debug)]
pub struct IntentRule {
    /// Stable identifier of the branch, used in logs and tests.
    pub name: &'static str,
    pub trigger: Trigger,
    pub intent: Intent,
    /// Read-only query answering questions of this shape.
    pub query: &'static str,
}

pub static INTENT_TABLE: &[IntentRule] = &[
    IntentRule {
        name: "total_sales",
        trigger: Trigger::Any(&["total sales"]),
        intent: Intent::TotalSales,
        query: "SELECT SUM(total_sales) AS total_sales \
                FROM product_total_sales \
                WHERE total_sales IS NOT NULL",
    },
    IntentRule {
        name: "roas",
        trigger: Trigger::Any(&["roas", "return on ad spend"]),
        intent: Intent::Roas,
        query: "SELECT ROUND(SUM(ad_sales) * 1.0 / NULLIF(SUM(ad_spend), 0), 2) AS roas, \
                SUM(ad_sales) AS total_ad_sales, \
                SUM(ad_spend) AS total_ad_spend \
                FROM product_ad_sales \
                WHERE ad_spend > 0 AND ad_sales IS NOT NULL",
    },
    IntentRule {
        name: "highest_cpc",
        trigger: Trigger::Any(&["highest cpc", "cost per click"]),
        intent: Intent::HighestCpc,
        query: "SELECT product_id, cpc, ad_spend, clicks \
                FROM product_ad_sales \
                WHERE clicks > 0 AND cpc IS NOT NULL \
                ORDER BY cpc DESC \
                LIMIT 10",
    },
    IntentRule {
        name: "conversion_rate",
        trigger: Trigger::Any(&["conversion rate"]),
        intent: Intent::ConversionRate,
        query: "SELECT product_id, conversion_rate, clicks, ad_orders \
                FROM product_ad_sales \
                WHERE conversion_rate IS NOT NULL \
                ORDER BY conversion_rate DESC \
                LIMIT 10",
    },
    IntentRule {
        name: "high_clicks_low_conversion",
        trigger: Trigger::All(&["high clicks", "low conversion"]),
        intent: Intent::Generic,
        query: "SELECT product_id, clicks, conversion_rate, ad_spend, ad_sales \
                FROM product_ad_sales \
                WHERE clicks > (SELECT AVG(clicks) FROM product_ad_sales WHERE clicks IS NOT NULL) \
                AND conversion_rate < (SELECT AVG(conversion_rate) FROM product_ad_sales WHERE conversion_rate IS NOT NULL) \
                ORDER BY clicks DESC, conversion_rate ASC \
                LIMIT 10",
    },
    IntentRule {
        name: "top_performing",
        trigger: Trigger::Any(&["top performing", "best product"]),
        intent: Intent::TopPerforming,
        query: "SELECT product_id, total_sales, total_orders \
                FROM product_total_sales \
                WHERE total_sales IS NOT NULL \
                ORDER BY total_sales DESC \
                LIMIT 10",
    },
    IntentRule {
        name: "eligibility",
        trigger: Trigger::Any(&["eligible"]),
        intent: Intent::Eligibility,
        query: "SELECT product_id, product_name, is_eligible_for_ads, eligibility_reason \
                FROM product_eligibility \
                WHERE is_eligible_for_ads = 1 \
                LIMIT 10",
    },
    IntentRule {
        name: "ad_spend",
        trigger: Trigger::Any(&["ad spend"]),
        intent: Intent::AdSpend,
        query: "SELECT SUM(ad_spend) AS total_ad_spend, COUNT(*) AS campaigns \
                FROM product_ad_sales \
                WHERE ad_spend IS NOT NULL",
    },
];

pub static DEFAULT_RULE: IntentRule = IntentRule {
    name: "default",
    trigger: Trigger::Always,
    intent: Intent::Generic,
    query: "SELECT product_id, total_sales, total_orders \
            FROM product_total_sales \
            WHERE total_sales IS NOT NULL \
            ORDER BY total_sales DESC \
            LIMIT 10",
};

/// Returns the first rule whose trigger matches `question`.
///
/// A full translator prompt is reduced to its trailing question first, see
/// [`extract_question`].
pub fn match_rule(question: &str) -> &'static IntentRule {
    let lowered = extract_question(question).to_lowercase();
    INTENT_TABLE
        .iter()
        .find(|rule| rule.trigger.matches(&lowered))
        .unwrap_or(&DEFAULT_RULE)
}

/// If `input` is a full prompt, returns the text after its last
/// `User Question:` marker; otherwise returns `input` unchanged.
pub fn extract_question(input: &str) -> &str {
    const MARKER: &str = "User Question:";
    match input.rfind(MARKER) {
        Some(pos) => input[pos + MARKER.len()..].trim(),
        None => input,
    }
}

/// Classifies a question into an [`Intent`].
pub fn classify(question: &str) -> Intent {
    match_rule(question).intent
}
