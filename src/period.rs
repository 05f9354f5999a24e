//! Reporting-period keys and resolution of the comparison period.
//!
//! The current period is whatever the snapshot store holds as its latest
//! week, never the wall clock. Week-over-week steps back one week with a
//! fixed 52-week year; ISO years with a week 53 are not special-cased.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::source::MetricsSource;

const WEEKS_PER_YEAR: u32 = 52;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodKey {
    year: i32,
    week: u32,
}

impl PeriodKey {
    pub fn new(year: i32, week: u32) -> Option<Self> {
        ((1..=53).contains(&week) && (1000..=9999).contains(&year)).then_some(Self { year, week })
    }

    pub fn previous_week(&self) -> Self {
        if self.week <= 1 {
            Self {
                year: self.year - 1,
                week: WEEKS_PER_YEAR,
            }
        } else {
            Self {
                year: self.year,
                week: self.week - 1,
            }
        }
    }

    /// Whole weeks between `earlier` and `self`, using the same 52-week year.
    pub fn weeks_since(&self, earlier: &PeriodKey) -> i64 {
        i64::from(self.year - earlier.year) * i64::from(WEEKS_PER_YEAR)
            + i64::from(self.week)
            - i64::from(earlier.week)
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

impl FromStr for PeriodKey {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::MalformedData(format!("invalid period key '{value}'"));
        let (year, week) = value.trim().split_once("-W").ok_or_else(invalid)?;

        let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if year.len() != 4 || week.len() != 2 || !digits(year) || !digits(week) {
            return Err(invalid());
        }

        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let week = week.parse::<u32>().map_err(|_| invalid())?;
        PeriodKey::new(year, week).ok_or_else(invalid)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Week,
    Month,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Week => "week",
            Granularity::Month => "month",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPeriods {
    pub current: PeriodKey,
    pub comparison: PeriodKey,
    pub granularity: Granularity,
}

impl ResolvedPeriods {
    pub fn label(&self) -> String {
        match self.granularity {
            Granularity::Week => format!("vs previous week ({})", self.comparison),
            Granularity::Month => {
                let weeks = self.current.weeks_since(&self.comparison);
                let unit = if weeks == 1 { "week" } else { "weeks" };
                format!("vs {weeks} {unit} ago ({})", self.comparison)
            }
        }
    }
}

#[derive(Debug)]
pub enum ResolveError {
    /// The snapshot store has nothing for the channel.
    NoDataAvailable,
    /// There is a current period but nothing usable to compare it against.
    InsufficientHistory {
        current: PeriodKey,
        missing: Option<PeriodKey>,
    },
    Source(AppError),
}

impl ResolveError {
    /// Explanation shown in place of a comparison label.
    pub fn label(&self) -> String {
        match self {
            ResolveError::NoDataAvailable => {
                "No historical data available for comparison".to_string()
            }
            ResolveError::InsufficientHistory {
                current,
                missing: Some(missing),
            } => format!("No historical data for {missing}; showing {current} only"),
            ResolveError::InsufficientHistory {
                current,
                missing: None,
            } => format!("No historical data before {current}; showing current period only"),
            ResolveError::Source(err) => err.to_string(),
        }
    }

    pub fn current(&self) -> Option<PeriodKey> {
        match self {
            ResolveError::InsufficientHistory { current, .. } => Some(*current),
            _ => None,
        }
    }
}

impl From<AppError> for ResolveError {
    fn from(err: AppError) -> Self {
        ResolveError::Source(err)
    }
}

pub async fn resolve<S>(source: &S, granularity: Granularity) -> Result<ResolvedPeriods, ResolveError>
where
    S: MetricsSource + ?Sized,
{
    let current: PeriodKey = source
        .latest_period()
        .await?
        .ok_or(ResolveError::NoDataAvailable)?
        .parse()?;

    let comparison = match granularity {
        Granularity::Week => {
            let candidate = current.previous_week();
            if source.snapshot_count(&candidate.to_string()).await? == 0 {
                return Err(ResolveError::InsufficientHistory {
                    current,
                    missing: Some(candidate),
                });
            }
            candidate
        }
        Granularity::Month => {
            let earliest = source.earliest_period_before(&current.to_string()).await?;
            match earliest {
                Some(raw) => raw.parse::<PeriodKey>()?,
                None => {
                    return Err(ResolveError::InsufficientHistory {
                        current,
                        missing: None,
                    })
                }
            }
        }
    };

    if comparison >= current {
        return Err(ResolveError::InsufficientHistory {
            current,
            missing: None,
        });
    }

    Ok(ResolvedPeriods {
        current,
        comparison,
        granularity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::memory::MemorySource;

    fn key(raw: &str) -> PeriodKey {
        raw.parse().expect("valid key")
    }

    #[test]
    fn parses_and_prints_week_keys() {
        let parsed = key("2025-W07");
        assert_eq!(Some(parsed), PeriodKey::new(2025, 7));
        assert_eq!(parsed.to_string(), "2025-W07");
    }

    #[test]
    fn rejects_malformed_keys() {
        for raw in [
            "2025-07", "2025-W7", "25-W07", "2025-W00", "2025-W54", "abcd-W01", "2025-W+7", "+025-W07",
        ] {
            assert!(raw.parse::<PeriodKey>().is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn previous_week_rolls_over_year() {
        assert_eq!(key("2025-W27").previous_week(), key("2025-W26"));
        assert_eq!(key("2025-W01").previous_week(), key("2024-W52"));
        assert_eq!(key("2021-W53").previous_week(), key("2021-W52"));
    }

    #[test]
    fn weeks_since_spans_years() {
        assert_eq!(key("2025-W27").weeks_since(&key("2025-W10")), 17);
        assert_eq!(key("2025-W02").weeks_since(&key("2024-W51")), 3);
    }

    #[test]
    fn labels_describe_distance() {
        let month = ResolvedPeriods {
            current: key("2025-W27"),
            comparison: key("2025-W10"),
            granularity: Granularity::Month,
        };
        assert_eq!(month.label(), "vs 17 weeks ago (2025-W10)");

        let single = ResolvedPeriods {
            current: key("2025-W27"),
            comparison: key("2025-W26"),
            granularity: Granularity::Month,
        };
        assert_eq!(single.label(), "vs 1 week ago (2025-W26)");

        let week = ResolvedPeriods {
            granularity: Granularity::Week,
            ..single
        };
        assert_eq!(week.label(), "vs previous week (2025-W26)");
    }

    #[tokio::test]
    async fn empty_store_has_no_data() {
        let source = MemorySource::default();
        let err = resolve(&source, Granularity::Week).await.unwrap_err();
        assert!(matches!(err, ResolveError::NoDataAvailable));
    }

    #[tokio::test]
    async fn week_uses_latest_period_in_data() {
        let source = MemorySource::default()
            .with_snapshot("A", "2025-W25", 10.0)
            .with_snapshot("A", "2025-W26", 10.0)
            .with_snapshot("A", "2025-W27", 10.0);

        let periods = resolve(&source, Granularity::Week).await.unwrap();
        assert_eq!(periods.current, key("2025-W27"));
        assert_eq!(periods.comparison, key("2025-W26"));
    }

    #[tokio::test]
    async fn week_gap_is_insufficient_history() {
        let source = MemorySource::default()
            .with_snapshot("A", "2025-W20", 10.0)
            .with_snapshot("A", "2025-W27", 10.0);

        let err = resolve(&source, Granularity::Week).await.unwrap_err();
        match err {
            ResolveError::InsufficientHistory { current, missing } => {
                assert_eq!(current, key("2025-W27"));
                assert_eq!(missing, Some(key("2025-W26")));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn month_picks_earliest_period() {
        let mut source = MemorySource::default();
        for week in 10..=27 {
            source = source.with_snapshot("A", &format!("2025-W{week:02}"), 10.0);
        }

        let periods = resolve(&source, Granularity::Month).await.unwrap();
        assert_eq!(periods.comparison, key("2025-W10"));
        assert_eq!(periods.label(), "vs 17 weeks ago (2025-W10)");
    }

    #[tokio::test]
    async fn month_with_single_period_is_insufficient() {
        let source = MemorySource::default().with_snapshot("A", "2025-W27", 10.0);
        let err = resolve(&source, Granularity::Month).await.unwrap_err();
        assert!(matches!(
            err,
            ResolveError::InsufficientHistory { missing: None, .. }
        ));
        assert!(err.label().starts_with("No historical data"));
    }

    #[tokio::test]
    async fn malformed_latest_key_is_a_source_error() {
        let source = MemorySource::default().with_snapshot("A", "week-27", 10.0);
        let err = resolve(&source, Granularity::Week).await.unwrap_err();
        assert!(matches!(err, ResolveError::Source(AppError::MalformedData(_))));
    }
}
