use tracing::{debug, info};

use crate::delta::{self, round_to};
use crate::error::AppError;
use crate::filter::ProductFilter;
use crate::models::{
    AggregateStats, ComparisonInfo, ComparisonReport, ComparisonResult, OverallStats,
    PeriodSnapshot, ProductMetric,
};
use crate::period::{self, Granularity, ResolveError, ResolvedPeriods};
use crate::source::MetricsSource;

fn mean(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

impl AggregateStats {
    pub fn from_products<'a, I>(products: I) -> Self
    where
        I: IntoIterator<Item = &'a ProductMetric>,
    {
        let mut count = 0usize;
        let mut profit = 0.0;
        let mut qty = 0i64;
        let mut per_unit = 0.0;
        let mut margin = 0.0;

        for product in products {
            count += 1;
            profit += product.annual_profit;
            qty += product.sold_qty;
            per_unit += product.avg_profit_per_unit;
            margin += product.avg_gross_margin;
        }

        Self {
            total_products: count,
            total_annual_profit: round_to(profit, 2),
            total_sold_qty: qty,
            avg_profit_per_unit: round_to(mean(per_unit, count), 2),
            avg_gross_margin: (count > 0).then(|| round_to(mean(margin, count), 4)),
        }
    }

    pub fn from_snapshots<'a, I>(snapshots: I) -> Self
    where
        I: IntoIterator<Item = &'a PeriodSnapshot>,
    {
        let mut count = 0usize;
        let mut profit = 0.0;
        let mut qty = 0i64;
        let mut per_unit = 0.0;
        let mut margin = 0.0;
        let mut margin_count = 0usize;

        for snapshot in snapshots {
            count += 1;
            profit += snapshot.annual_profit;
            qty += snapshot.sold_qty;
            per_unit += snapshot.avg_profit_per_unit;
            if let Some(value) = snapshot.avg_gross_margin {
                margin += value;
                margin_count += 1;
            }
        }

        Self {
            total_products: count,
            total_annual_profit: round_to(profit, 2),
            total_sold_qty: qty,
            avg_profit_per_unit: round_to(mean(per_unit, count), 2),
            avg_gross_margin: (margin_count > 0).then(|| round_to(mean(margin, margin_count), 4)),
        }
    }
}

/// Pairs each product with its snapshot at the resolved comparison period and
/// rolls up both sides. Snapshots for any other period are discarded.
pub fn build_comparison(
    rows: Vec<(ProductMetric, Option<PeriodSnapshot>)>,
    periods: &ResolvedPeriods,
) -> ComparisonReport {
    let comparison_key = periods.comparison.to_string();

    let products: Vec<ComparisonResult> = rows
        .into_iter()
        .map(|(current, snapshot)| {
            let previous = snapshot.filter(|s| s.period_key == comparison_key);
            let changes = previous
                .as_ref()
                .map(|previous| delta::product_changes(&current, previous));

            ComparisonResult {
                current,
                previous,
                changes,
            }
        })
        .collect();

    let current = AggregateStats::from_products(products.iter().map(|p| &p.current));
    let previous = AggregateStats::from_snapshots(products.iter().filter_map(|p| p.previous.as_ref()));
    let changes = delta::aggregate_changes(&current, &previous);

    let with_comparison = previous.total_products;
    let total = products.len();

    ComparisonReport {
        comparison_info: ComparisonInfo {
            current_week: Some(periods.current.to_string()),
            comparison_week: Some(comparison_key),
            comparison_period: periods.granularity.as_str().to_string(),
            comparison_label: periods.label(),
            products_with_comparison: with_comparison,
            products_without_comparison: total - with_comparison,
            total_products: total,
        },
        overall_stats: OverallStats {
            current,
            previous: Some(previous),
            changes: Some(changes),
        },
        products,
    }
}

/// Report for when no comparison period could be resolved.
pub fn current_only(
    metrics: Vec<ProductMetric>,
    granularity: Granularity,
    shortfall: &ResolveError,
) -> ComparisonReport {
    let current = AggregateStats::from_products(&metrics);
    let total = metrics.len();

    ComparisonReport {
        products: metrics
            .into_iter()
            .map(|current| ComparisonResult {
                current,
                previous: None,
                changes: None,
            })
            .collect(),
        comparison_info: ComparisonInfo {
            current_week: shortfall.current().map(|key| key.to_string()),
            comparison_week: None,
            comparison_period: granularity.as_str().to_string(),
            comparison_label: shortfall.label(),
            products_with_comparison: 0,
            products_without_comparison: total,
            total_products: total,
        },
        overall_stats: OverallStats {
            current,
            previous: None,
            changes: None,
        },
    }
}

/// Resolves periods and assembles the comparison payload, degrading to a
/// current-only report when history is missing. Query failures propagate.
pub async fn compare<S>(
    source: &S,
    filter: &ProductFilter,
    granularity: Granularity,
) -> Result<ComparisonReport, AppError>
where
    S: MetricsSource + ?Sized,
{
    match period::resolve(source, granularity).await {
        Ok(periods) => {
            let rows = source
                .metrics_with_snapshot(filter, &periods.comparison.to_string())
                .await?;
            let report = build_comparison(rows, &periods);

            info!(
                current = %periods.current,
                comparison = %periods.comparison,
                with = report.comparison_info.products_with_comparison,
                without = report.comparison_info.products_without_comparison,
                "Built product comparison"
            );
            Ok(report)
        }
        Err(ResolveError::Source(err)) => Err(err),
        Err(shortfall) => {
            debug!(reason = %shortfall.label(), "Comparison unavailable, returning current period only");
            let metrics = source.current_metrics(filter).await?;
            Ok(current_only(metrics, granularity, &shortfall))
        }
    }
}
