//! Windowed sums over the entity-independent benchmark series.
//!
//! The benchmark has no entity key: every entity needs the sum of the daily
//! returns falling in each of its own windows. Rather than re-scanning the
//! whole series per entity, the series is sorted by day once and each window
//! is located with two binary searches. Entities are independent, so the
//! lookups run in parallel over a shared read-only index.

use crate::{
    Result,
    anchor::Anchors,
    sources::{DAILY_RETURN, QUOTE_DAY, require_columns},
    window::LookbackWindow,
};
use polars::prelude::*;
use rayon::prelude::*;

/// Day-sorted benchmark returns.
#[derive(Debug, Clone, Default)]
pub struct BenchmarkIndex {
    days: Vec<i32>,
    returns: Vec<f64>,
}

impl BenchmarkIndex {
    /// Build from `(day, return)` points in any order.
    pub fn from_points(points: impl IntoIterator<Item = (i32, f64)>) -> Self {
        let mut points: Vec<_> = points.into_iter().collect();
        points.sort_by_key(|(day, _)| *day);
        let (days, returns) = points.into_iter().unzip();
        Self { days, returns }
    }

    /// Build from a normalized benchmark table (`quote_day`, `daily_return`).
    ///
    /// Null returns are skipped, as a missing quote contributes nothing.
    pub fn from_frame(benchmark: &DataFrame) -> Result<Self> {
        require_columns(benchmark, &[QUOTE_DAY, DAILY_RETURN])?;
        let days = benchmark.column(QUOTE_DAY)?.i32()?;
        let returns = benchmark.column(DAILY_RETURN)?.f64()?;
        Ok(Self::from_points(
            days.into_iter()
                .zip(returns)
                .filter_map(|(d, r)| Some((d?, r?))),
        ))
    }

    /// Number of quotes.
    pub fn len(&self) -> usize {
        self.days.len()
    }

    /// Whether the series is empty.
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Sum of returns quoted in `[lower, upper)`.
    pub fn range_sum(&self, lower: i32, upper: i32) -> f64 {
        if upper <= lower {
            return 0.0;
        }
        let start = self.days.partition_point(|d| *d < lower);
        let end = self.days.partition_point(|d| *d < upper);
        self.returns[start..end].iter().sum()
    }

    /// Sum of returns in `window` measured from `anchor_day`.
    pub fn window_sum(&self, anchor_day: i32, window: &LookbackWindow) -> f64 {
        self.range_sum(window.lower_bound(anchor_day), window.upper_bound(anchor_day))
    }

    /// One row per anchored entity with one column per window, named
    /// `<metric>_<period>`. Empty windows give 0.0.
    pub fn aggregate(
        &self,
        anchors: &Anchors,
        windows: &[LookbackWindow],
        metric: &str,
    ) -> Result<DataFrame> {
        let (keys, anchor_days) = anchors.to_pairs()?;

        let rows: Vec<Vec<f64>> = anchor_days
            .par_iter()
            .map(|&anchor| windows.iter().map(|w| self.window_sum(anchor, w)).collect())
            .collect();

        let mut columns = Vec::with_capacity(windows.len() + 1);
        columns.push(Column::new(anchors.key().into(), keys));
        for (i, window) in windows.iter().enumerate() {
            let values: Vec<f64> = rows.iter().map(|row| row[i]).collect();
            columns.push(Column::new(window.column(metric).into(), values));
        }
        Ok(DataFrame::new(columns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        sources::{ENTITY_ID, PERIOD_END_DAY},
        window::{Period, windows},
    };
    use approx::assert_relative_eq;

    fn constant_series(first: i32, last: i32, value: f64) -> BenchmarkIndex {
        BenchmarkIndex::from_points((first..=last).map(|d| (d, value)))
    }

    #[test]
    fn test_range_sum_half_open() {
        let index = BenchmarkIndex::from_points([(3, 0.3), (1, 0.1), (2, 0.2)]);
        assert_relative_eq!(index.range_sum(1, 3), 0.3, epsilon = 1e-12);
        assert_relative_eq!(index.range_sum(1, 4), 0.6, epsilon = 1e-12);
        assert_eq!(index.range_sum(4, 10), 0.0);
        assert_eq!(index.range_sum(3, 3), 0.0);
    }

    #[test]
    fn test_full_window_of_daily_returns() {
        let index = constant_series(0, 1000, 0.01);
        let window = LookbackWindow::new(Period::SecondLast, 0).unwrap();
        assert_relative_eq!(index.window_sum(1000, &window), 0.28, epsilon = 1e-9);
    }

    #[test]
    fn test_aggregate_per_entity_anchor() {
        // Quotes only cover days 0..=500.
        let index = constant_series(0, 500, 0.01);
        let periods = df! {
            ENTITY_ID => [1i64, 2],
            PERIOD_END_DAY => [400i32, 560],
        }
        .unwrap();
        let anchors = Anchors::performance(&periods).unwrap();
        let all: Vec<_> = windows(0).unwrap().collect();

        let result = index.aggregate(&anchors, &all, "market_performance").unwrap();
        assert_eq!(result.height(), 2);
        assert_eq!(result.width(), 7);

        let last = result.column("market_performance_last").unwrap().f64().unwrap();
        // Entity 1: [344, 372) fully quoted.
        assert_relative_eq!(last.get(0).unwrap(), 0.28, epsilon = 1e-9);
        // Entity 2: [504, 532) has no quotes.
        assert_eq!(last.get(1), Some(0.0));

        let second = result
            .column("market_performance_second_last")
            .unwrap()
            .f64()
            .unwrap();
        // Entity 2: [476, 504) is quoted up to day 500 only.
        assert_relative_eq!(second.get(1).unwrap(), 0.25, epsilon = 1e-9);
    }

    #[test]
    fn test_from_frame_skips_null_returns() {
        let frame = df! {
            QUOTE_DAY => [2i32, 1, 3],
            DAILY_RETURN => [Some(0.5), Some(0.25), None],
        }
        .unwrap();
        let index = BenchmarkIndex::from_frame(&frame).unwrap();
        assert_eq!(index.len(), 2);
        assert_relative_eq!(index.range_sum(0, 10), 0.75);
    }
}
