use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::delta::{AggregateChanges, ProductChanges};

/// Current-period metrics for one product on the active channel.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ProductMetric {
    pub group_id: String,
    pub channel: String,
    pub annual_profit: f64,
    pub sold_qty: i64,
    pub avg_profit_per_unit: f64,
    pub avg_gross_margin: f64,
    pub segment: String,
    pub owner: String,
    pub brand: Option<String>,
    pub season: Option<String>,
    pub notes: String,
    pub review_date: Option<NaiveDate>,
    pub next_review_date: Option<NaiveDate>,
    pub recommended_price: Option<f64>,
    pub stock: Option<i64>,
}

/// A product's figures as they stood at the end of a reporting week.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct PeriodSnapshot {
    pub group_id: String,
    pub period_key: String,
    pub annual_profit: f64,
    pub sold_qty: i64,
    pub avg_profit_per_unit: f64,
    pub avg_gross_margin: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    #[serde(flatten)]
    pub current: ProductMetric,
    pub previous: Option<PeriodSnapshot>,
    pub changes: Option<ProductChanges>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateStats {
    pub total_products: usize,
    pub total_annual_profit: f64,
    pub total_sold_qty: i64,
    pub avg_profit_per_unit: f64,
    pub avg_gross_margin: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallStats {
    pub current: AggregateStats,
    pub previous: Option<AggregateStats>,
    pub changes: Option<AggregateChanges>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonInfo {
    pub current_week: Option<String>,
    pub comparison_week: Option<String>,
    pub comparison_period: String,
    pub comparison_label: String,
    pub products_with_comparison: usize,
    pub products_without_comparison: usize,
    pub total_products: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub products: Vec<ComparisonResult>,
    pub comparison_info: ComparisonInfo,
    pub overall_stats: OverallStats,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SkuAttribute {
    pub sku: String,
    pub colour: Option<String>,
    pub size: Option<String>,
    pub barcode: Option<String>,
    pub cost_price: Option<f64>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PriceChange {
    pub id: i64,
    pub sku: Option<String>,
    pub changed_at: DateTime<Utc>,
    pub old_price: Option<f64>,
    pub new_price: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SalesLine {
    pub id: i64,
    pub sku: String,
    pub order_ref: String,
    pub sold_at: DateTime<Utc>,
    pub qty: i64,
    pub unit_price: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PricePage {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductDetails {
    pub product: ProductMetric,
    pub skus: Vec<SkuAttribute>,
    pub history: Vec<PeriodSnapshot>,
    pub price_changes: Vec<PriceChange>,
    pub price_pagination: PricePage,
    pub recent_sales: Vec<SalesLine>,
}
