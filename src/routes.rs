use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::brand;
use crate::comparison;
use crate::db;
use crate::error::AppError;
use crate::filter::{ComparisonRequest, FilterRequest, ProductFilter};
use crate::models::{ComparisonReport, PricePage, ProductDetails, ProductMetric};
use crate::source::MetricsSource;
use crate::state::AppState;

const DEFAULT_PRICE_LIMIT: u32 = 20;
const MAX_PRICE_LIMIT: u32 = 200;
const RECENT_SALES_LIMIT: i64 = 25;

/// Successful payloads carry `return_code` next to their own fields.
#[derive(Debug, Serialize)]
pub struct Success<T> {
    pub return_code: &'static str,
    #[serde(flatten)]
    pub body: T,
}

fn respond<T: Serialize>(state: &AppState, result: Result<T, AppError>) -> Response {
    match result {
        Ok(body) => Json(Success {
            return_code: "SUCCESS",
            body,
        })
        .into_response(),
        Err(err) => err.into_response_with(state.config.expose_errors()),
    }
}

#[derive(Debug, Serialize)]
pub struct ProductList {
    pub products: Vec<ProductMetric>,
    pub total_products: usize,
}

#[derive(Debug, Serialize)]
pub struct OwnerList {
    pub owners: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BrandList {
    pub brands: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DetailsRequest {
    pub group_id: Option<String>,
    pub price_limit: Option<u32>,
    pub price_offset: Option<u32>,
}

pub async fn products_comparison_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ComparisonRequest>, JsonRejection>,
) -> Response {
    let result = products_comparison(&state, payload).await;
    respond(&state, result)
}

pub async fn products_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FilterRequest>, JsonRejection>,
) -> Response {
    let result = list_products(&state, payload).await;
    respond(&state, result)
}

pub async fn owners_handler(State(state): State<Arc<AppState>>) -> Response {
    let result = db::fetch_owners(&state.pool, &state.config.channel)
        .await
        .map(|names| {
            let mut owners = vec![brand::ALL.to_string()];
            owners.extend(names);
            OwnerList { owners }
        });
    respond(&state, result)
}

pub async fn brands_handler(State(state): State<Arc<AppState>>) -> Response {
    let result = db::fetch_brands(&state.pool, &state.config.channel)
        .await
        .map(|present| BrandList {
            brands: brand::brand_options(present.iter().map(Option::as_deref)),
        });
    respond(&state, result)
}

pub async fn product_details_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DetailsRequest>, JsonRejection>,
) -> Response {
    let result = match payload {
        Ok(Json(request)) => product_details(&state, request).await,
        Err(rejection) => Err(rejection.into()),
    };
    respond(&state, result)
}

async fn products_comparison(
    state: &AppState,
    payload: Result<Json<ComparisonRequest>, JsonRejection>,
) -> Result<ComparisonReport, AppError> {
    let Json(request) = payload?;
    let filter = ProductFilter::from(&request.filters);
    let granularity = request.comparison_period.unwrap_or_default();

    comparison::compare(&state.metrics(), &filter, granularity).await
}

async fn list_products(
    state: &AppState,
    payload: Result<Json<FilterRequest>, JsonRejection>,
) -> Result<ProductList, AppError> {
    let Json(request) = payload?;
    let filter = ProductFilter::from(&request);
    let products = state.metrics().current_metrics(&filter).await?;
    debug!(count = products.len(), "Listed products");

    Ok(ProductList {
        total_products: products.len(),
        products,
    })
}

async fn product_details(state: &AppState, request: DetailsRequest) -> Result<ProductDetails, AppError> {
    let group_id = request
        .group_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Validation("group_id is required".to_string()))?;

    let (limit, offset) = page_bounds(request.price_limit, request.price_offset);

    let pool = &state.pool;
    let channel = state.config.channel.as_str();

    let product = db::fetch_product(pool, channel, group_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product {group_id} not found")))?;

    let (skus, history, price_changes, total, recent_sales) = tokio::try_join!(
        db::fetch_sku_attributes(pool, group_id),
        db::fetch_history(pool, channel, group_id),
        db::fetch_price_changes(pool, channel, group_id, limit, offset),
        db::count_price_changes(pool, channel, group_id),
        db::fetch_recent_sales(pool, channel, group_id, RECENT_SALES_LIMIT),
    )?;

    let price_pagination = price_page(limit, offset, price_changes.len(), total);

    Ok(ProductDetails {
        product,
        skus,
        history,
        price_changes,
        price_pagination,
        recent_sales,
    })
}

/// Applies the default page size and caps it at [`MAX_PRICE_LIMIT`].
fn page_bounds(limit: Option<u32>, offset: Option<u32>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PRICE_LIMIT).min(MAX_PRICE_LIMIT);
    (i64::from(limit), i64::from(offset.unwrap_or(0)))
}

fn price_page(limit: i64, offset: i64, fetched: usize, total: i64) -> PricePage {
    PricePage {
        total,
        limit,
        offset,
        has_more: offset + (fetched as i64) < total,
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{
            header::{
                ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_REQUEST_HEADERS,
                ACCESS_CONTROL_REQUEST_METHOD, CONTENT_TYPE, ORIGIN,
            },
            Method, Request, StatusCode,
        },
    };
    use serde_json::Value;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::{page_bounds, price_page};
    use crate::config::Config;
    use crate::server::router;
    use crate::state::AppState;

    fn test_state() -> std::sync::Arc<AppState> {
        let config = Config::from_lookup(|key| {
            (key == "DATABASE_URL").then(|| "postgres://localhost:1/unused".to_string())
        })
        .unwrap();
        let pool = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        AppState::new(config, pool)
    }

    async fn post(uri: &str, body: &str) -> (StatusCode, Value) {
        let response = router(test_state())
            .oneshot(
                Request::post(uri)
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn details_without_group_id_is_a_validation_error() {
        let (status, body) = post("/get_product_details", r#"{"price_limit": 5}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["return_code"], "VALIDATION_ERROR");
        assert_eq!(body["message"], "group_id is required");
    }

    #[tokio::test]
    async fn blank_group_id_is_rejected() {
        let (status, body) = post("/get_product_details", r#"{"group_id": "  "}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["return_code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn malformed_body_reports_invalid_request() {
        let (status, body) =
            post("/get_products_comparison", r#"{"comparison_period": "year"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["return_code"], "INVALID_REQUEST");

        let (status, body) = post("/get_products", "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["return_code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn endpoints_are_post_only() {
        let response = router(test_state())
            .oneshot(Request::get("/get_brands").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn price_page_defaults_and_caps_limit() {
        assert_eq!(page_bounds(None, None), (20, 0));
        assert_eq!(page_bounds(Some(201), Some(40)), (200, 40));
        assert_eq!(page_bounds(Some(5), None), (5, 0));
    }

    #[test]
    fn has_more_only_while_rows_remain() {
        assert!(price_page(20, 0, 20, 45).has_more);
        assert!(!price_page(20, 40, 5, 45).has_more);
        assert!(!price_page(20, 25, 20, 45).has_more);
        assert!(!price_page(20, 100, 0, 45).has_more);

        let page = price_page(20, 20, 20, 45);
        assert!(page.has_more);
        assert_eq!((page.total, page.limit, page.offset), (45, 20, 20));
    }

    #[tokio::test]
    async fn preflight_allows_authorization_header() {
        let response = router(test_state())
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/get_products")
                    .header(ORIGIN, "http://localhost:3000")
                    .header(ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .header(ACCESS_CONTROL_REQUEST_HEADERS, "authorization, content-type")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let allowed = response
            .headers()
            .get(ACCESS_CONTROL_ALLOW_HEADERS)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        assert!(allowed.contains("authorization"), "allowed headers: {allowed}");
        assert!(allowed.contains("content-type"), "allowed headers: {allowed}");
    }
}
