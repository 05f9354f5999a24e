use anyhow::Context;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::Config;
use crate::error::AppError;
use crate::models::{PeriodSnapshot, PriceChange, ProductMetric, SalesLine, SkuAttribute};
use crate::period::PeriodKey;
use crate::source::PRODUCT_COLUMNS;

pub async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

struct SeedProduct {
    group_id: &'static str,
    brand: Option<&'static str>,
    season: &'static str,
    owner: &'static str,
    segment: &'static str,
    annual_profit: f64,
    sold_qty: i32,
    margin: f64,
    price: f64,
}

const SEED_PRODUCTS: [SeedProduct; 6] = [
    SeedProduct {
        group_id: "RIE-46727",
        brand: Some("Rieker"),
        season: "Summer",
        owner: "Priya",
        segment: "Core",
        annual_profit: 18450.0,
        sold_qty: 1230,
        margin: 0.42,
        price: 64.99,
    },
    SeedProduct {
        group_id: "BIR-0051793",
        brand: Some("Birkenstock"),
        season: "Summer",
        owner: "Tom",
        segment: "Core",
        annual_profit: 22100.0,
        sold_qty: 860,
        margin: 0.38,
        price: 89.0,
    },
    SeedProduct {
        group_id: "CRO-10001",
        brand: Some("Crocs"),
        season: "Any",
        owner: "Priya",
        segment: "Growth",
        annual_profit: 9400.0,
        sold_qty: 1540,
        margin: 0.31,
        price: 44.99,
    },
    SeedProduct {
        group_id: "HOT-SHAKE",
        brand: Some("Hotter"),
        season: "Winter",
        owner: "Alex",
        segment: "Clearance",
        annual_profit: 2100.0,
        sold_qty: 210,
        margin: 0.18,
        price: 79.0,
    },
    SeedProduct {
        group_id: "NIK-AIR90",
        brand: Some("Nike"),
        season: "Any",
        owner: "Alex",
        segment: "Growth",
        annual_profit: 5600.0,
        sold_qty: 400,
        margin: 0.27,
        price: 110.0,
    },
    SeedProduct {
        group_id: "GEN-SLIPPER",
        brand: None,
        season: "Winter",
        owner: "Tom",
        segment: "Tail",
        annual_profit: 640.0,
        sold_qty: 160,
        margin: 0.22,
        price: 14.99,
    },
];

pub async fn seed(pool: &PgPool, channel: &str) -> anyhow::Result<()> {
    let latest = PeriodKey::new(2025, 27).context("invalid seed period")?;

    for product in &SEED_PRODUCTS {
        sqlx::query(
            r#"
            INSERT INTO sales_dashboard.product_metrics
            (group_id, channel, annual_profit, sold_qty, avg_profit_per_unit, avg_gross_margin,
             segment, owner, brand, season, notes, recommended_price, stock)
            VALUES ($1, $2, $3::float8, $4, $5::float8, $6::float8, $7, $8, $9, $10, '', $11::float8, $12)
            ON CONFLICT (group_id, channel) DO UPDATE
            SET annual_profit = EXCLUDED.annual_profit,
                sold_qty = EXCLUDED.sold_qty,
                avg_profit_per_unit = EXCLUDED.avg_profit_per_unit,
                avg_gross_margin = EXCLUDED.avg_gross_margin
            "#,
        )
        .bind(product.group_id)
        .bind(channel)
        .bind(product.annual_profit)
        .bind(product.sold_qty)
        .bind(product.annual_profit / f64::from(product.sold_qty))
        .bind(product.margin)
        .bind(product.segment)
        .bind(product.owner)
        .bind(product.brand)
        .bind(product.season)
        .bind(product.price)
        .bind(product.sold_qty / 4)
        .execute(pool)
        .await?;

        // Six weeks of history; the tail product only appears from week 25.
        let mut period = latest;
        for step in 0..6u32 {
            if product.group_id == "GEN-SLIPPER" && step > 2 {
                break;
            }

            let scale = 1.0 - f64::from(step) * 0.04;
            let qty = (f64::from(product.sold_qty) * scale).round() as i32;
            let profit = product.annual_profit * scale;

            sqlx::query(
                r#"
                INSERT INTO sales_dashboard.period_snapshots
                (group_id, channel, period_key, annual_profit, sold_qty, avg_profit_per_unit, avg_gross_margin)
                VALUES ($1, $2, $3, $4::float8, $5, $6::float8, $7::float8)
                ON CONFLICT (group_id, channel, period_key) DO NOTHING
                "#,
            )
            .bind(product.group_id)
            .bind(channel)
            .bind(period.to_string())
            .bind(profit)
            .bind(qty)
            .bind(profit / f64::from(qty.max(1)))
            .bind(product.margin)
            .execute(pool)
            .await?;

            period = period.previous_week();
        }

        let sku = format!("{}-38", product.group_id);
        sqlx::query(
            r#"
            INSERT INTO sales_dashboard.sku_attributes (sku, group_id, colour, size, cost_price)
            VALUES ($1, $2, 'Black', '38', $3::float8)
            ON CONFLICT (sku) DO NOTHING
            "#,
        )
        .bind(&sku)
        .bind(product.group_id)
        .bind(product.price * (1.0 - product.margin))
        .execute(pool)
        .await?;

        let base = Utc
            .with_ymd_and_hms(2025, 7, 4, 9, 0, 0)
            .single()
            .context("invalid seed timestamp")?;

        for day in 0..3i64 {
            let changed_at: DateTime<Utc> = base - Duration::days(day * 14);
            sqlx::query(
                r#"
                INSERT INTO sales_dashboard.price_changes
                (group_id, channel, sku, changed_at, old_price, new_price, reason, source_key)
                VALUES ($1, $2, $3, $4, $5::float8, $6::float8, 'repricing', $7)
                ON CONFLICT (source_key) DO NOTHING
                "#,
            )
            .bind(product.group_id)
            .bind(channel)
            .bind(&sku)
            .bind(changed_at)
            .bind(product.price + 2.0)
            .bind(product.price)
            .bind(format!("seed-{}-{day}", product.group_id))
            .execute(pool)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO sales_dashboard.sales_lines
                (group_id, channel, sku, order_ref, sold_at, qty, unit_price, profit)
                VALUES ($1, $2, $3, $4, $5, $6, $7::float8, $8::float8)
                ON CONFLICT (order_ref, sku) DO NOTHING
                "#,
            )
            .bind(product.group_id)
            .bind(channel)
            .bind(&sku)
            .bind(format!("SEED-{}-{day}", product.group_id))
            .bind(changed_at + Duration::hours(3))
            .bind(1 + day as i32)
            .bind(product.price)
            .bind(product.price * product.margin * (1 + day) as f64)
            .execute(pool)
            .await?;
        }
    }

    Ok(())
}

/// Upserts period snapshots from CSV. Returns the number of rows written.
pub async fn import_snapshots(
    pool: &PgPool,
    channel: &str,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        group_id: String,
        period_key: String,
        annual_profit: f64,
        sold_qty: i32,
        avg_profit_per_unit: f64,
        #[serde(default)]
        avg_gross_margin: Option<f64>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut written = 0usize;

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("invalid CSV record {}", index + 1))?;
        let period: PeriodKey = row
            .period_key
            .parse()
            .with_context(|| format!("invalid period key on record {}", index + 1))?;

        let result = sqlx::query(
            r#"
            INSERT INTO sales_dashboard.period_snapshots
            (group_id, channel, period_key, annual_profit, sold_qty, avg_profit_per_unit, avg_gross_margin)
            VALUES ($1, $2, $3, $4::float8, $5, $6::float8, $7::float8)
            ON CONFLICT (group_id, channel, period_key) DO UPDATE
            SET annual_profit = EXCLUDED.annual_profit,
                sold_qty = EXCLUDED.sold_qty,
                avg_profit_per_unit = EXCLUDED.avg_profit_per_unit,
                avg_gross_margin = EXCLUDED.avg_gross_margin,
                recorded_at = now()
            "#,
        )
        .bind(row.group_id.trim())
        .bind(channel)
        .bind(period.to_string())
        .bind(row.annual_profit)
        .bind(row.sold_qty)
        .bind(row.avg_profit_per_unit)
        .bind(row.avg_gross_margin)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            written += 1;
        }
    }

    Ok(written)
}

pub async fn fetch_owners(pool: &PgPool, channel: &str) -> Result<Vec<String>, AppError> {
    sqlx::query_scalar(
        "SELECT DISTINCT btrim(owner) AS owner FROM sales_dashboard.product_metrics \
         WHERE channel = $1 AND btrim(owner) <> '' ORDER BY owner",
    )
    .bind(channel)
    .fetch_all(pool)
    .await
    .map_err(AppError::data_source("load owners"))
}

pub async fn fetch_brands(pool: &PgPool, channel: &str) -> Result<Vec<Option<String>>, AppError> {
    sqlx::query_scalar(
        "SELECT DISTINCT brand FROM sales_dashboard.product_metrics WHERE channel = $1",
    )
    .bind(channel)
    .fetch_all(pool)
    .await
    .map_err(AppError::data_source("load brands"))
}

pub async fn fetch_product(
    pool: &PgPool,
    channel: &str,
    group_id: &str,
) -> Result<Option<ProductMetric>, AppError> {
    let query = format!(
        "SELECT {PRODUCT_COLUMNS} FROM sales_dashboard.product_metrics pm \
         WHERE pm.channel = $1 AND pm.group_id = $2"
    );

    sqlx::query_as::<_, ProductMetric>(&query)
        .bind(channel)
        .bind(group_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::data_source("load product"))
}

pub async fn fetch_sku_attributes(pool: &PgPool, group_id: &str) -> Result<Vec<SkuAttribute>, AppError> {
    sqlx::query_as::<_, SkuAttribute>(
        "SELECT sku, colour, size, barcode, cost_price::float8 AS cost_price \
         FROM sales_dashboard.sku_attributes WHERE group_id = $1 ORDER BY sku",
    )
    .bind(group_id)
    .fetch_all(pool)
    .await
    .map_err(AppError::data_source("load SKU attributes"))
}

pub async fn fetch_history(
    pool: &PgPool,
    channel: &str,
    group_id: &str,
) -> Result<Vec<PeriodSnapshot>, AppError> {
    sqlx::query_as::<_, PeriodSnapshot>(
        "SELECT group_id, period_key, annual_profit::float8 AS annual_profit, \
         sold_qty::int8 AS sold_qty, avg_profit_per_unit::float8 AS avg_profit_per_unit, \
         avg_gross_margin::float8 AS avg_gross_margin \
         FROM sales_dashboard.period_snapshots \
         WHERE channel = $1 AND group_id = $2 ORDER BY period_key",
    )
    .bind(channel)
    .bind(group_id)
    .fetch_all(pool)
    .await
    .map_err(AppError::data_source("load weekly history"))
}

pub async fn fetch_price_changes(
    pool: &PgPool,
    channel: &str,
    group_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<PriceChange>, AppError> {
    sqlx::query_as::<_, PriceChange>(
        "SELECT id, sku, changed_at, old_price::float8 AS old_price, \
         new_price::float8 AS new_price, reason \
         FROM sales_dashboard.price_changes \
         WHERE channel = $1 AND group_id = $2 \
         ORDER BY changed_at DESC, id DESC LIMIT $3 OFFSET $4",
    )
    .bind(channel)
    .bind(group_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(AppError::data_source("load price changes"))
}

pub async fn count_price_changes(pool: &PgPool, channel: &str, group_id: &str) -> Result<i64, AppError> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM sales_dashboard.price_changes WHERE channel = $1 AND group_id = $2",
    )
    .bind(channel)
    .bind(group_id)
    .fetch_one(pool)
    .await
    .map_err(AppError::data_source("count price changes"))
}

pub async fn fetch_recent_sales(
    pool: &PgPool,
    channel: &str,
    group_id: &str,
    limit: i64,
) -> Result<Vec<SalesLine>, AppError> {
    sqlx::query_as::<_, SalesLine>(
        "SELECT id, sku, order_ref, sold_at, qty::int8 AS qty, \
         unit_price::float8 AS unit_price, profit::float8 AS profit \
         FROM sales_dashboard.sales_lines \
         WHERE channel = $1 AND group_id = $2 \
         ORDER BY sold_at DESC, id DESC LIMIT $3",
    )
    .bind(channel)
    .bind(group_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(AppError::data_source("load recent sales"))
}
