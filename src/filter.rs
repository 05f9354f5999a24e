use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};

use crate::brand::{self, BrandFilter};
use crate::models::ProductMetric;
use crate::period::Granularity;

/// Body shared by the listing endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterRequest {
    pub season_filter: Option<String>,
    pub season_filter_exclude: Option<String>,
    pub brand_filter: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ComparisonRequest {
    pub comparison_period: Option<Granularity>,
    #[serde(flatten)]
    pub filters: FilterRequest,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub season_include: Option<String>,
    pub season_exclude: Option<String>,
    pub brand: BrandFilter,
}

fn season_value(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty() && !value.eq_ignore_ascii_case(brand::ALL))
        .map(str::to_string)
}

impl From<&FilterRequest> for ProductFilter {
    fn from(request: &FilterRequest) -> Self {
        Self {
            season_include: season_value(request.season_filter.as_deref()),
            season_exclude: season_value(request.season_filter_exclude.as_deref()),
            brand: BrandFilter::parse(request.brand_filter.as_deref()),
        }
    }
}

impl ProductFilter {
    pub fn matches(&self, product: &ProductMetric) -> bool {
        let season = product.season.as_deref().map(str::trim);

        if let Some(wanted) = &self.season_include {
            if !season.is_some_and(|season| season.eq_ignore_ascii_case(wanted)) {
                return false;
            }
        }

        if let Some(unwanted) = &self.season_exclude {
            if season.is_some_and(|season| season.eq_ignore_ascii_case(unwanted)) {
                return false;
            }
        }

        self.brand.matches(product.brand.as_deref())
    }

    /// Appends `AND ...` predicates against the `pm` alias.
    pub fn push_predicates(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        if let Some(wanted) = &self.season_include {
            builder
                .push(" AND lower(btrim(pm.season)) = lower(")
                .push_bind(wanted.clone())
                .push(")");
        }

        if let Some(unwanted) = &self.season_exclude {
            builder
                .push(" AND (pm.season IS NULL OR lower(btrim(pm.season)) <> lower(")
                .push_bind(unwanted.clone())
                .push("))");
        }

        match &self.brand {
            BrandFilter::All => {}
            BrandFilter::Unclassified => {
                builder
                    .push(" AND (pm.brand IS NULL OR lower(btrim(pm.brand)) <> ALL(")
                    .push_bind(brand::named_brands_lowercase())
                    .push("))");
            }
            BrandFilter::Exact(wanted) => {
                builder
                    .push(" AND lower(btrim(pm.brand)) = lower(")
                    .push_bind(wanted.clone())
                    .push(")");
            }
        }
    }
}
