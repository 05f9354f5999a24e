use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod brand;
mod comparison;
mod config;
mod db;
mod delta;
mod error;
mod filter;
mod models;
mod period;
mod report;
mod routes;
mod server;
mod source;
mod state;

use config::Config;
use filter::ProductFilter;
use period::Granularity;
use source::PgMetrics;
use state::AppState;

#[derive(Parser)]
#[command(name = "sales-dashboard")]
#[command(about = "Product performance dashboard API with period-over-period comparison", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the dashboard JSON API
    Serve,
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import period snapshots from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List the biggest profit movers against the comparison period
    Movers {
        #[arg(long, value_enum, default_value_t = Granularity::Week)]
        period: Granularity,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        brand: Option<String>,
    },
    /// Generate a markdown comparison report
    Report {
        #[arg(long, value_enum, default_value_t = Granularity::Week)]
        period: Granularity,
        #[arg(long)]
        brand: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn brand_filter(brand: Option<String>) -> ProductFilter {
    ProductFilter {
        brand: brand::BrandFilter::parse(brand.as_deref()),
        ..ProductFilter::default()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let pool = db::connect(&config).await?;

    match cli.command {
        Commands::Serve => {
            server::run(AppState::new(config, pool)).await?;
        }
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool, &config.channel).await?;
            println!("Seed data inserted for channel {}.", config.channel);
        }
        Commands::Import { csv } => {
            let written = db::import_snapshots(&pool, &config.channel, &csv).await?;
            println!("Wrote {written} snapshots from {}.", csv.display());
        }
        Commands::Movers {
            period,
            limit,
            brand,
        } => {
            let source = PgMetrics::new(pool.clone(), config.channel.clone());
            let report = comparison::compare(&source, &brand_filter(brand), period).await?;

            println!("{}", report.comparison_info.comparison_label);
            let (gainers, losers) = report::top_movers(&report, limit);
            if gainers.is_empty() && losers.is_empty() {
                println!("No movers found for this comparison.");
                return Ok(());
            }

            println!("Top gainers:");
            for result in gainers {
                println!("- {}", report::format_mover(result));
            }
            println!("Top decliners:");
            for result in losers {
                println!("- {}", report::format_mover(result));
            }
        }
        Commands::Report {
            period,
            brand,
            limit,
            out,
        } => {
            let source = PgMetrics::new(pool.clone(), config.channel.clone());
            let comparison = comparison::compare(&source, &brand_filter(brand), period).await?;
            let report = report::build_report(&config.channel, &comparison, limit);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
