use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::error::AppError;
use crate::filter::ProductFilter;
use crate::models::{PeriodSnapshot, ProductMetric};

#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Highest period key on record, if any.
    async fn latest_period(&self) -> Result<Option<String>, AppError>;

    /// Lowest period key strictly before `period`.
    async fn earliest_period_before(&self, period: &str) -> Result<Option<String>, AppError>;

    async fn snapshot_count(&self, period: &str) -> Result<i64, AppError>;

    async fn current_metrics(&self, filter: &ProductFilter) -> Result<Vec<ProductMetric>, AppError>;

    /// Every product passing `filter`, paired with its snapshot at `period`
    /// when one exists.
    async fn metrics_with_snapshot(
        &self,
        filter: &ProductFilter,
        period: &str,
    ) -> Result<Vec<(ProductMetric, Option<PeriodSnapshot>)>, AppError>;
}

pub(crate) const PRODUCT_COLUMNS: &str = "pm.group_id, pm.channel, \
     pm.annual_profit::float8 AS annual_profit, pm.sold_qty::int8 AS sold_qty, \
     pm.avg_profit_per_unit::float8 AS avg_profit_per_unit, \
     pm.avg_gross_margin::float8 AS avg_gross_margin, \
     pm.segment, pm.owner, pm.brand, pm.season, pm.notes, pm.review_date, pm.next_review_date, \
     pm.recommended_price::float8 AS recommended_price, pm.stock::int8 AS stock";

const PRODUCT_ORDER: &str = " ORDER BY pm.annual_profit DESC, pm.group_id";

#[derive(sqlx::FromRow)]
struct JoinedRow {
    #[sqlx(flatten)]
    product: ProductMetric,
    prev_period_key: Option<String>,
    prev_annual_profit: Option<f64>,
    prev_sold_qty: Option<i64>,
    prev_avg_profit_per_unit: Option<f64>,
    prev_avg_gross_margin: Option<f64>,
}

impl JoinedRow {
    fn split(self) -> (ProductMetric, Option<PeriodSnapshot>) {
        let snapshot = self.prev_period_key.map(|period_key| PeriodSnapshot {
            group_id: self.product.group_id.clone(),
            period_key,
            annual_profit: self.prev_annual_profit.unwrap_or_default(),
            sold_qty: self.prev_sold_qty.unwrap_or_default(),
            avg_profit_per_unit: self.prev_avg_profit_per_unit.unwrap_or_default(),
            avg_gross_margin: self.prev_avg_gross_margin,
        });

        (self.product, snapshot)
    }
}

/// Postgres-backed source pinned to a single channel.
#[derive(Clone)]
pub struct PgMetrics {
    pool: PgPool,
    channel: String,
}

impl PgMetrics {
    pub fn new(pool: PgPool, channel: impl Into<String>) -> Self {
        Self {
            pool,
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl MetricsSource for PgMetrics {
    async fn latest_period(&self) -> Result<Option<String>, AppError> {
        sqlx::query_scalar(
            "SELECT MAX(period_key) FROM sales_dashboard.period_snapshots WHERE channel = $1",
        )
        .bind(&self.channel)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::data_source("find the latest snapshot period"))
    }

    async fn earliest_period_before(&self, period: &str) -> Result<Option<String>, AppError> {
        sqlx::query_scalar(
            "SELECT MIN(period_key) FROM sales_dashboard.period_snapshots \
             WHERE channel = $1 AND period_key < $2",
        )
        .bind(&self.channel)
        .bind(period)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::data_source("find the earliest snapshot period"))
    }

    async fn snapshot_count(&self, period: &str) -> Result<i64, AppError> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM sales_dashboard.period_snapshots \
             WHERE channel = $1 AND period_key = $2",
        )
        .bind(&self.channel)
        .bind(period)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::data_source("count snapshots for a period"))
    }

    async fn current_metrics(&self, filter: &ProductFilter) -> Result<Vec<ProductMetric>, AppError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT ");
        builder
            .push(PRODUCT_COLUMNS)
            .push(" FROM sales_dashboard.product_metrics pm WHERE pm.channel = ")
            .push_bind(self.channel.clone());
        filter.push_predicates(&mut builder);
        builder.push(PRODUCT_ORDER);

        builder
            .build_query_as::<ProductMetric>()
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::data_source("load current product metrics"))
    }

    async fn metrics_with_snapshot(
        &self,
        filter: &ProductFilter,
        period: &str,
    ) -> Result<Vec<(ProductMetric, Option<PeriodSnapshot>)>, AppError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT ");
        builder
            .push(PRODUCT_COLUMNS)
            .push(
                ", ps.period_key AS prev_period_key, \
                 ps.annual_profit::float8 AS prev_annual_profit, \
                 ps.sold_qty::int8 AS prev_sold_qty, \
                 ps.avg_profit_per_unit::float8 AS prev_avg_profit_per_unit, \
                 ps.avg_gross_margin::float8 AS prev_avg_gross_margin \
                 FROM sales_dashboard.product_metrics pm \
                 LEFT JOIN sales_dashboard.period_snapshots ps \
                 ON ps.group_id = pm.group_id AND ps.channel = pm.channel AND ps.period_key = ",
            )
            .push_bind(period.to_string())
            .push(" WHERE pm.channel = ")
            .push_bind(self.channel.clone());
        filter.push_predicates(&mut builder);
        builder.push(PRODUCT_ORDER);

        let rows = builder
            .build_query_as::<JoinedRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::data_source("load metrics joined with period snapshots"))?;

        Ok(rows.into_iter().map(JoinedRow::split).collect())
    }
}

#[cfg(test)]
pub mod memory {
    use super::*;

    #[derive(Debug, Clone, Default)]
    pub struct MemorySource {
        pub products: Vec<ProductMetric>,
        pub snapshots: Vec<PeriodSnapshot>,
    }

    pub fn product(group_id: &str, annual_profit: f64, sold_qty: i64) -> ProductMetric {
        ProductMetric {
            group_id: group_id.to_string(),
            channel: "shopify".to_string(),
            annual_profit,
            sold_qty,
            avg_profit_per_unit: if sold_qty == 0 {
                0.0
            } else {
                annual_profit / sold_qty as f64
            },
            avg_gross_margin: 0.4,
            segment: "core".to_string(),
            owner: "Sam".to_string(),
            brand: Some("Rieker".to_string()),
            season: Some("Summer".to_string()),
            notes: String::new(),
            review_date: None,
            next_review_date: None,
            recommended_price: None,
            stock: Some(10),
        }
    }

    impl MemorySource {
        pub fn with_product(mut self, product: ProductMetric) -> Self {
            self.products.push(product);
            self
        }

        pub fn with_snapshot(mut self, group_id: &str, period_key: &str, annual_profit: f64) -> Self {
            self.snapshots.push(PeriodSnapshot {
                group_id: group_id.to_string(),
                period_key: period_key.to_string(),
                annual_profit,
                sold_qty: 10,
                avg_profit_per_unit: annual_profit / 10.0,
                avg_gross_margin: Some(0.4),
            });
            self
        }

        fn filtered(&self, filter: &ProductFilter) -> Vec<ProductMetric> {
            let mut products: Vec<ProductMetric> = self
                .products
                .iter()
                .filter(|product| filter.matches(product))
                .cloned()
                .collect();
            products.sort_by(|a, b| {
                b.annual_profit
                    .total_cmp(&a.annual_profit)
                    .then_with(|| a.group_id.cmp(&b.group_id))
            });
            products
        }
    }

    #[async_trait]
    impl MetricsSource for MemorySource {
        async fn latest_period(&self) -> Result<Option<String>, AppError> {
            Ok(self.snapshots.iter().map(|s| s.period_key.clone()).max())
        }

        async fn earliest_period_before(&self, period: &str) -> Result<Option<String>, AppError> {
            Ok(self
                .snapshots
                .iter()
                .map(|s| s.period_key.clone())
                .filter(|key| key.as_str() < period)
                .min())
        }

        async fn snapshot_count(&self, period: &str) -> Result<i64, AppError> {
            Ok(self.snapshots.iter().filter(|s| s.period_key == period).count() as i64)
        }

        async fn current_metrics(&self, filter: &ProductFilter) -> Result<Vec<ProductMetric>, AppError> {
            Ok(self.filtered(filter))
        }

        async fn metrics_with_snapshot(
            &self,
            filter: &ProductFilter,
            period: &str,
        ) -> Result<Vec<(ProductMetric, Option<PeriodSnapshot>)>, AppError> {
            Ok(self
                .filtered(filter)
                .into_iter()
                .map(|product| {
                    let snapshot = self
                        .snapshots
                        .iter()
                        .find(|s| s.group_id == product.group_id && s.period_key == period)
                        .cloned();
                    (product, snapshot)
                })
                .collect())
        }
    }
}
