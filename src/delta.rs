use serde::Serialize;

use crate::models::{AggregateStats, PeriodSnapshot, ProductMetric};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Delta<T> {
    pub delta: T,
    /// `None` when the prior value is zero.
    pub percent: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProductChanges {
    pub annual_profit: Delta<f64>,
    pub sold_qty: Delta<i64>,
    pub avg_profit_per_unit: Delta<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AggregateChanges {
    pub total_products: Delta<i64>,
    pub total_annual_profit: Delta<f64>,
    pub total_sold_qty: Delta<i64>,
    pub avg_profit_per_unit: Delta<f64>,
    pub avg_gross_margin: Option<Delta<f64>>,
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn percent_change(delta: f64, previous: f64) -> Option<f64> {
    if previous == 0.0 {
        return None;
    }

    Some(round_to(delta / previous * 100.0, 2))
}

/// Money-like values: delta and percent both rounded to two places.
pub fn profit_delta(current: f64, previous: f64) -> Delta<f64> {
    let delta = current - previous;
    Delta {
        delta: round_to(delta, 2),
        percent: percent_change(delta, previous),
    }
}

pub fn quantity_delta(current: i64, previous: i64) -> Delta<i64> {
    let delta = current - previous;
    Delta {
        delta,
        percent: percent_change(delta as f64, previous as f64),
    }
}

/// Ratios in 0..1 keep four places on the delta.
pub fn ratio_delta(current: f64, previous: f64) -> Delta<f64> {
    let delta = current - previous;
    Delta {
        delta: round_to(delta, 4),
        percent: percent_change(delta, previous),
    }
}

pub fn product_changes(current: &ProductMetric, previous: &PeriodSnapshot) -> ProductChanges {
    ProductChanges {
        annual_profit: profit_delta(current.annual_profit, previous.annual_profit),
        sold_qty: quantity_delta(current.sold_qty, previous.sold_qty),
        avg_profit_per_unit: profit_delta(
            current.avg_profit_per_unit,
            previous.avg_profit_per_unit,
        ),
    }
}

pub fn aggregate_changes(current: &AggregateStats, previous: &AggregateStats) -> AggregateChanges {
    AggregateChanges {
        total_products: quantity_delta(
            current.total_products as i64,
            previous.total_products as i64,
        ),
        total_annual_profit: profit_delta(
            current.total_annual_profit,
            previous.total_annual_profit,
        ),
        total_sold_qty: quantity_delta(current.total_sold_qty, previous.total_sold_qty),
        avg_profit_per_unit: profit_delta(
            current.avg_profit_per_unit,
            previous.avg_profit_per_unit,
        ),
        avg_gross_margin: match (current.avg_gross_margin, previous.avg_gross_margin) {
            (Some(now), Some(before)) => Some(ratio_delta(now, before)),
            _ => None,
        },
    }
}
