//! Market benchmark block - summed daily benchmark returns per window.
//!
//! The benchmark series is shared by every entity; only the windows differ,
//! since they are measured from each entity's performance anchor.

use super::metric;
use crate::{
    Result, SourceTables,
    anchor::{AnchorKind, Anchors},
    benchmark::BenchmarkIndex,
    merge::MergePolicy,
    registry::BlockCategory,
    sources::{DAILY_RETURN, QUOTE_DAY, require_columns},
    traits::FeatureBlock,
    window::windows,
};
use polars::prelude::*;
use tracing::debug;

/// Market benchmark block.
///
/// # Output Columns
/// - `market_performance_<period>` for the six periods
///
/// One row per entity with a performance anchor. A window without quotes
/// reads 0.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarketBenchmark;

impl FeatureBlock for MarketBenchmark {
    fn name(&self) -> &str {
        "market_benchmark"
    }

    fn description(&self) -> &str {
        "Sum of daily benchmark returns over each window before the last performance period"
    }

    fn category(&self) -> BlockCategory {
        BlockCategory::Benchmark
    }

    fn required_columns(&self) -> &[&str] {
        &[QUOTE_DAY, DAILY_RETURN]
    }

    fn anchor(&self) -> Option<AnchorKind> {
        Some(AnchorKind::Performance)
    }

    fn window_policy(&self) -> Option<MergePolicy> {
        None
    }

    fn compute(&self, sources: &SourceTables, offset_days: u32) -> Result<DataFrame> {
        let benchmark = sources.benchmark();
        require_columns(benchmark, self.required_columns())?;

        let index = BenchmarkIndex::from_frame(benchmark)?;
        let anchors = Anchors::performance(sources.performance())?;
        debug!(quotes = index.len(), entities = anchors.len(), "indexed benchmark");

        let all: Vec<_> = windows(offset_days)?.collect();
        index.aggregate(&anchors, &all, metric::MARKET_PERFORMANCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::DateSentinels,
        sources::{ENTITY_ID, MarketReturn, PerformanceRecord, RawSources, fixtures},
    };
    use approx::assert_relative_eq;
    use chrono::{Days, NaiveDate};

    fn period(entity_id: i64, end: NaiveDate) -> PerformanceRecord {
        PerformanceRecord {
            entity_id,
            period_start: end - Days::new(28),
            period_end: end,
            net_paid: 0.0,
            return_fraction: 0.0,
        }
    }

    fn daily(first: NaiveDate, days: u64, value: f64) -> Vec<MarketReturn> {
        (0..days)
            .map(|i| MarketReturn {
                date: first + Days::new(i),
                daily_return: value,
            })
            .collect()
    }

    #[test]
    fn test_full_windows_sum_daily_returns() {
        let end = fixtures::date(2019, 10, 31);
        let raw = RawSources::from_records(
            fixtures::attributes(&[1]),
            &[],
            &[period(1, end)],
            &daily(fixtures::date(2018, 1, 1), 700, 0.01),
            &[],
        )
        .unwrap();
        let tables = SourceTables::normalize(raw, &DateSentinels::default()).unwrap();

        let result = MarketBenchmark.compute(&tables, 0).unwrap();
        assert_eq!(result.width(), 7);
        for p in crate::window::Period::ALL {
            let column = p.column(metric::MARKET_PERFORMANCE);
            let value = result.column(&column).unwrap().f64().unwrap().get(0).unwrap();
            assert_relative_eq!(value, 0.28, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_unquoted_windows_read_zero() {
        let raw = RawSources::from_records(
            fixtures::attributes(&[1, 2]),
            &[],
            &[
                period(1, fixtures::date(2019, 10, 31)),
                period(2, fixtures::date(2015, 1, 31)),
            ],
            &daily(fixtures::date(2019, 1, 1), 300, 0.5),
            &[],
        )
        .unwrap();
        let tables = SourceTables::normalize(raw, &DateSentinels::default()).unwrap();

        let result = MarketBenchmark.compute(&tables, 0).unwrap();
        let ids: Vec<i64> = result
            .column(ENTITY_ID)
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(ids, vec![1, 2]);

        let last = result.column("market_performance_last").unwrap().f64().unwrap();
        assert_eq!(last.get(1), Some(0.0));
        assert_relative_eq!(last.get(0).unwrap(), 14.0, epsilon = 1e-9);
    }

    #[test]
    fn test_market_benchmark_metadata() {
        let block = MarketBenchmark;
        assert_eq!(block.name(), "market_benchmark");
        assert_eq!(block.category(), BlockCategory::Benchmark);
        assert_eq!(block.window_policy(), None);
    }
}
