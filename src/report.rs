use std::fmt::Write;

use crate::delta::Delta;
use crate::models::{AggregateStats, ComparisonReport, ComparisonResult};

fn profit_delta(result: &ComparisonResult) -> f64 {
    result
        .changes
        .map(|changes| changes.annual_profit.delta)
        .unwrap_or_default()
}

/// Products with a comparison, ordered by annual-profit delta.
/// Returns `(gainers, losers)`, each capped at `limit`.
pub fn top_movers(report: &ComparisonReport, limit: usize) -> (Vec<&ComparisonResult>, Vec<&ComparisonResult>) {
    let mut moved: Vec<&ComparisonResult> = report
        .products
        .iter()
        .filter(|result| result.changes.is_some())
        .collect();

    moved.sort_by(|a, b| {
        profit_delta(b)
            .total_cmp(&profit_delta(a))
            .then_with(|| a.current.group_id.cmp(&b.current.group_id))
    });

    let gainers: Vec<&ComparisonResult> = moved
        .iter()
        .copied()
        .filter(|result| profit_delta(result) > 0.0)
        .take(limit)
        .collect();
    let losers: Vec<&ComparisonResult> = moved
        .iter()
        .rev()
        .copied()
        .filter(|result| profit_delta(result) < 0.0)
        .take(limit)
        .collect();

    (gainers, losers)
}

pub fn format_percent(percent: Option<f64>) -> String {
    match percent {
        Some(value) => format!("{value:+.2}%"),
        None => "n/a".to_string(),
    }
}

pub fn format_mover(result: &ComparisonResult) -> String {
    let brand = result.current.brand.as_deref().unwrap_or("no brand");
    match result.changes {
        Some(changes) => format!(
            "{} ({}) profit {:.2} ({:+.2}, {})",
            result.current.group_id,
            brand,
            result.current.annual_profit,
            changes.annual_profit.delta,
            format_percent(changes.annual_profit.percent)
        ),
        None => format!(
            "{} ({}) profit {:.2}",
            result.current.group_id, brand, result.current.annual_profit
        ),
    }
}

fn write_stats(output: &mut String, stats: &AggregateStats) {
    let _ = writeln!(output, "- Products: {}", stats.total_products);
    let _ = writeln!(output, "- Annual profit: {:.2}", stats.total_annual_profit);
    let _ = writeln!(output, "- Units sold: {}", stats.total_sold_qty);
    let _ = writeln!(output, "- Avg profit per unit: {:.2}", stats.avg_profit_per_unit);
    if let Some(margin) = stats.avg_gross_margin {
        let _ = writeln!(output, "- Avg gross margin: {:.1}%", margin * 100.0);
    }
}

fn change_line<T: std::fmt::Display>(label: &str, change: &Delta<T>) -> String {
    format!("- {label}: {} ({})", change.delta, format_percent(change.percent))
}

pub fn build_report(channel: &str, report: &ComparisonReport, limit: usize) -> String {
    let info = &report.comparison_info;
    let stats = &report.overall_stats;
    let mut output = String::new();

    let _ = writeln!(output, "# Product Performance Comparison");
    let _ = writeln!(
        output,
        "Channel {} · current period {} · {}",
        channel,
        info.current_week.as_deref().unwrap_or("none"),
        info.comparison_label
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Coverage");
    let _ = writeln!(
        output,
        "{} of {} products have comparison data ({} without).",
        info.products_with_comparison, info.total_products, info.products_without_comparison
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Current Period");
    write_stats(&mut output, &stats.current);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Comparison Period");
    match (&stats.previous, &stats.changes) {
        (Some(previous), Some(changes)) => {
            write_stats(&mut output, previous);
            let _ = writeln!(output);
            let _ = writeln!(output, "## Changes");
            let _ = writeln!(output, "{}", change_line("Annual profit", &changes.total_annual_profit));
            let _ = writeln!(output, "{}", change_line("Units sold", &changes.total_sold_qty));
            let _ = writeln!(
                output,
                "{}",
                change_line("Avg profit per unit", &changes.avg_profit_per_unit)
            );
        }
        _ => {
            let _ = writeln!(output, "No comparison period available.");
        }
    }

    let (gainers, losers) = top_movers(report, limit);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Gainers");
    if gainers.is_empty() {
        let _ = writeln!(output, "No products gained profit in this window.");
    } else {
        for result in gainers {
            let _ = writeln!(output, "- {}", format_mover(result));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Decliners");
    if losers.is_empty() {
        let _ = writeln!(output, "No products lost profit in this window.");
    } else {
        for result in losers {
            let _ = writeln!(output, "- {}", format_mover(result));
        }
    }

    output
}
