//! Windowed aggregation over an entity-keyed source.
//!
//! A [`WindowedMetric`] describes one aggregate column family: which rows
//! belong to a window (relative to each row's own anchor), which rows count
//! towards the value, and whether the value is a count or a sum. Evaluating it
//! for one window yields `[entity_id, <metric>_<period>]` with one row per
//! entity that had at least one matching record in that window.

use crate::{
    Result,
    anchor::{ANCHOR_DAY, Anchors},
    merge::{MergePolicy, merge_tables},
    sources::{ENTITY_ID, require_columns},
    window::LookbackWindow,
};
use polars::prelude::*;
use tracing::debug;

/// How a record's dates place it in a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowMatch {
    /// Live at the window's recent edge: `open < upper && close > upper`.
    ActiveAt {
        /// Open day column
        open: String,
        /// Close day column
        close: String,
    },
    /// Closed before the window's recent edge: `close < upper`.
    ClosedBefore {
        /// Close day column
        close: String,
    },
    /// Single event date inside the window: `lower <= date < upper`.
    Within {
        /// Event day column
        date: String,
    },
    /// Period contained in the window: `start >= lower && end <= upper`.
    Spans {
        /// Period start day column
        start: String,
        /// Period end day column
        end: String,
    },
}

impl WindowMatch {
    /// Date columns this rule reads.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Self::ActiveAt { open, close } => vec![open.as_str(), close.as_str()],
            Self::ClosedBefore { close } => vec![close.as_str()],
            Self::Within { date } => vec![date.as_str()],
            Self::Spans { start, end } => vec![start.as_str(), end.as_str()],
        }
    }

    /// Row predicate for `window`, expressed against the `anchor_day` column.
    pub fn predicate(&self, window: &LookbackWindow) -> Expr {
        let lower = col(ANCHOR_DAY) - lit(window.lower_days());
        let upper = col(ANCHOR_DAY) - lit(window.upper_days());
        match self {
            Self::ActiveAt { open, close } => col(open.as_str())
                .lt(upper.clone())
                .and(col(close.as_str()).gt(upper)),
            Self::ClosedBefore { close } => col(close.as_str()).lt(upper),
            Self::Within { date } => col(date.as_str())
                .gt_eq(lower)
                .and(col(date.as_str()).lt(upper)),
            Self::Spans { start, end } => col(start.as_str())
                .gt_eq(lower)
                .and(col(end.as_str()).lt_eq(upper)),
        }
    }
}

/// Aggregation operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregation {
    /// Number of matching rows, as `Int64`.
    Count,
    /// Sum of a value column, as `Float64`.
    Sum(String),
}

/// One aggregate column family evaluated per lookback window.
#[derive(Debug, Clone)]
pub struct WindowedMetric {
    name: String,
    entity_key: String,
    matcher: WindowMatch,
    aggregation: Aggregation,
    row_filter: Option<Expr>,
    value_filter: Option<Expr>,
}

impl WindowedMetric {
    /// Count of matching rows per entity.
    pub fn count(name: impl Into<String>, matcher: WindowMatch) -> Self {
        Self::new(name.into(), matcher, Aggregation::Count)
    }

    /// Sum of `value` over matching rows per entity.
    pub fn sum(name: impl Into<String>, value: impl Into<String>, matcher: WindowMatch) -> Self {
        Self::new(name.into(), matcher, Aggregation::Sum(value.into()))
    }

    fn new(name: String, matcher: WindowMatch, aggregation: Aggregation) -> Self {
        Self {
            name,
            entity_key: ENTITY_ID.to_string(),
            matcher,
            aggregation,
            row_filter: None,
            value_filter: None,
        }
    }

    /// Restrict window membership to rows passing `filter`.
    pub fn with_row_filter(mut self, filter: Expr) -> Self {
        self.row_filter = Some(filter);
        self
    }

    /// Keep every matching row for membership, but only let rows passing
    /// `filter` contribute to the value; the rest count as zero.
    pub fn with_value_filter(mut self, filter: Expr) -> Self {
        self.value_filter = Some(filter);
        self
    }

    /// Output column for `window`.
    pub fn column(&self, window: &LookbackWindow) -> String {
        window.column(&self.name)
    }

    // No branch may be all-literal: polars cannot aggregate a literal
    // inside `group_by`.
    fn value_expr(&self) -> Expr {
        match (&self.aggregation, &self.value_filter) {
            (Aggregation::Count, None) => len().cast(DataType::Int64),
            (Aggregation::Count, Some(filter)) => when(filter.clone())
                .then(lit(1i64))
                .otherwise(lit(0i64))
                .sum()
                .cast(DataType::Int64),
            (Aggregation::Sum(value), None) => {
                col(value.as_str()).cast(DataType::Float64).sum()
            }
            (Aggregation::Sum(value), Some(filter)) => when(filter.clone())
                .then(col(value.as_str()).cast(DataType::Float64))
                .otherwise(lit(0.0))
                .sum()
                .cast(DataType::Float64),
        }
    }

    fn validate(&self, source: &DataFrame, anchors: &Anchors) -> Result<()> {
        let mut required = self.matcher.columns();
        required.push(self.entity_key.as_str());
        required.push(anchors.key());
        if let Aggregation::Sum(value) = &self.aggregation {
            required.push(value.as_str());
        }
        require_columns(source, &required)
    }

    /// Aggregate `source` over one window.
    ///
    /// Rows whose anchor key has no anchor are dropped before matching, so an
    /// entity without the relevant history never appears.
    pub fn aggregate(
        &self,
        source: &DataFrame,
        anchors: &Anchors,
        window: &LookbackWindow,
    ) -> Result<DataFrame> {
        self.validate(source, anchors)?;
        let key = anchors.key();

        let mut matched = source
            .clone()
            .lazy()
            .join(
                anchors.frame().clone().lazy(),
                [col(key)],
                [col(key)],
                JoinArgs::new(JoinType::Inner),
            )
            .filter(self.matcher.predicate(window));
        if let Some(filter) = &self.row_filter {
            matched = matched.filter(filter.clone());
        }

        let column = self.column(window);
        let result = matched
            .group_by([col(self.entity_key.as_str())])
            .agg([self.value_expr().alias(column.as_str())])
            .sort([self.entity_key.as_str()], SortMultipleOptions::default())
            .collect()?;

        debug!(
            metric = %self.name,
            period = %window.period(),
            entities = result.height(),
            "aggregated window"
        );
        Ok(result)
    }

    /// Aggregate every window and merge them under `policy`.
    pub fn aggregate_windows(
        &self,
        source: &DataFrame,
        anchors: &Anchors,
        windows: impl IntoIterator<Item = LookbackWindow>,
        policy: MergePolicy,
    ) -> Result<DataFrame> {
        let tables = windows
            .into_iter()
            .map(|window| self.aggregate(source, anchors, &window))
            .collect::<Result<Vec<_>>>()?;
        merge_tables(tables, &self.entity_key, policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        sources::{CLOSE_DAY, CONTRACT_ID, OPEN_DAY, PERIOD_END_DAY, PERIOD_START_DAY, STATUS},
        window::{Period, windows},
    };

    // Anchors at day 1000 for both entities.
    fn contracts() -> DataFrame {
        df! {
            ENTITY_ID => [1i64, 1, 2, 2],
            CONTRACT_ID => [10i64, 11, 20, 21],
            STATUS => [1i64, 2, 2, 2],
            OPEN_DAY => [0i32, 0, 0, 900],
            CLOSE_DAY => [1000i32, 950, 960, 1000],
        }
        .unwrap()
    }

    fn window(period: Period) -> LookbackWindow {
        LookbackWindow::new(period, 0).unwrap()
    }

    fn values_i64(df: &DataFrame, column: &str) -> Vec<i64> {
        df.column(column)
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect()
    }

    fn active_metric() -> WindowedMetric {
        WindowedMetric::count(
            "active_contracts",
            WindowMatch::ActiveAt {
                open: OPEN_DAY.into(),
                close: CLOSE_DAY.into(),
            },
        )
    }

    #[test]
    fn test_active_count_at_window_edge() {
        let contracts = contracts();
        let anchors = Anchors::churn(&contracts).unwrap();

        // Window 1 upper edge = day 972.
        let result = active_metric()
            .aggregate(&contracts, &anchors, &window(Period::Last))
            .unwrap();
        assert_eq!(values_i64(&result, ENTITY_ID), vec![1, 2]);
        assert_eq!(values_i64(&result, "active_contracts_last"), vec![1, 1]);

        // Window 3 upper edge = day 916: entity 2's second contract opened at 900.
        let result = active_metric()
            .aggregate(&contracts, &anchors, &window(Period::ThirdLast))
            .unwrap();
        assert_eq!(values_i64(&result, "active_contracts_third_last"), vec![2, 2]);
    }

    #[test]
    fn test_unfiltered_count_per_entity() {
        let contracts = contracts();
        let anchors = Anchors::churn(&contracts).unwrap();
        let metric = WindowedMetric::count(
            "closed_contracts",
            WindowMatch::ClosedBefore {
                close: CLOSE_DAY.into(),
            },
        );

        // Upper edge 972: contract 11 (day 950) and contract 20 (day 960).
        let result = metric
            .aggregate(&contracts, &anchors, &window(Period::Last))
            .unwrap();
        assert_eq!(result.width(), 2);
        assert_eq!(
            result.column("closed_contracts_last").unwrap().dtype(),
            &DataType::Int64
        );
        assert_eq!(values_i64(&result, ENTITY_ID), vec![1, 2]);
        assert_eq!(values_i64(&result, "closed_contracts_last"), vec![1, 1]);

        // Upper edge 860: every contract closed later.
        let result = metric
            .aggregate(&contracts, &anchors, &window(Period::FifthLast))
            .unwrap();
        assert_eq!(result.height(), 0);
    }

    #[test]
    fn test_unfiltered_sum_per_entity() {
        let transactions = df! {
            ENTITY_ID => [1i64, 1, 2],
            "day" => [950i32, 960, 990],
            "amount" => [100.0, 40.0, 70.0],
        }
        .unwrap();
        let periods = df! {
            ENTITY_ID => [1i64, 2],
            PERIOD_END_DAY => [1000i32, 1000],
        }
        .unwrap();
        let anchors = Anchors::performance(&periods).unwrap();
        let metric =
            WindowedMetric::sum("investments", "amount", WindowMatch::Within { date: "day".into() });

        // Window 1 = [944, 972): entity 2's transaction falls after it.
        let result = metric
            .aggregate(&transactions, &anchors, &window(Period::Last))
            .unwrap();
        assert_eq!(values_i64(&result, ENTITY_ID), vec![1]);
        let sums = result.column("investments_last").unwrap().f64().unwrap();
        assert_eq!(sums.get(0), Some(140.0));
    }

    #[test]
    fn test_closed_count_with_row_filter() {
        let contracts = contracts();
        let anchors = Anchors::churn(&contracts).unwrap();
        let metric = WindowedMetric::count(
            "closed_contracts",
            WindowMatch::ClosedBefore {
                close: CLOSE_DAY.into(),
            },
        )
        .with_row_filter(col(STATUS).eq(lit(2i64)));

        // Upper edge 972: entity 1 closed 11 at 950, entity 2 closed 20 at 960.
        let result = metric
            .aggregate(&contracts, &anchors, &window(Period::Last))
            .unwrap();
        assert_eq!(values_i64(&result, "closed_contracts_last"), vec![1, 1]);

        // Upper edge 944: nothing closed yet, so no entity is present.
        let result = metric
            .aggregate(&contracts, &anchors, &window(Period::SecondLast))
            .unwrap();
        assert_eq!(result.height(), 0);
    }

    #[test]
    fn test_spans_requires_containment() {
        let performance = df! {
            ENTITY_ID => [1i64, 1, 1, 1],
            PERIOD_START_DAY => [972i32, 944, 930, 1000],
            PERIOD_END_DAY => [1000i32, 972, 960, 1028],
            "net_paid" => [99.0, 10.0, 5.0, 1.0],
        }
        .unwrap();
        let anchors = Anchors::performance(&performance).unwrap();
        let metric = WindowedMetric::sum(
            "net_paid",
            "net_paid",
            WindowMatch::Spans {
                start: PERIOD_START_DAY.into(),
                end: PERIOD_END_DAY.into(),
            },
        );

        // Anchor 1028, window 1 = [972, 1000]. The period ending on the
        // anchor itself lies in front of every window.
        let result = metric
            .aggregate(&performance, &anchors, &window(Period::Last))
            .unwrap();
        let paid = result.column("net_paid_last").unwrap().f64().unwrap();
        assert_eq!(paid.get(0), Some(99.0));

        // Window 2 = [944, 972]: the straddling period is excluded.
        let result = metric
            .aggregate(&performance, &anchors, &window(Period::SecondLast))
            .unwrap();
        let paid = result.column("net_paid_second_last").unwrap().f64().unwrap();
        assert_eq!(paid.get(0), Some(10.0));
    }

    #[test]
    fn test_value_filter_keeps_presence() {
        let transactions = df! {
            ENTITY_ID => [1i64, 1, 2],
            "day" => [950i32, 960, 955],
            "kind" => ["BUY", "SELL", "SELL"],
            "amount" => [100.0, 40.0, 70.0],
        }
        .unwrap();
        let periods = df! {
            ENTITY_ID => [1i64, 2],
            PERIOD_END_DAY => [1000i32, 1000],
        }
        .unwrap();
        let anchors = Anchors::performance(&periods).unwrap();

        let metric = WindowedMetric::sum(
            "investments",
            "amount",
            WindowMatch::Within { date: "day".into() },
        )
        .with_value_filter(col("kind").eq(lit("BUY")));
        let result = metric
            .aggregate(&transactions, &anchors, &window(Period::Last))
            .unwrap();

        // Entity 2 only sold, but it still has a row in this window.
        assert_eq!(values_i64(&result, ENTITY_ID), vec![1, 2]);
        let sums = result.column("investments_last").unwrap().f64().unwrap();
        assert_eq!(sums.get(0), Some(100.0));
        assert_eq!(sums.get(1), Some(0.0));
    }

    #[test]
    fn test_union_vs_intersection_across_windows() {
        let contracts = contracts();
        let anchors = Anchors::churn(&contracts).unwrap();
        let metric = WindowedMetric::count(
            "closed_contracts",
            WindowMatch::ClosedBefore {
                close: CLOSE_DAY.into(),
            },
        )
        .with_row_filter(col(STATUS).eq(lit(2i64)));

        let union = metric
            .aggregate_windows(&contracts, &anchors, windows(0).unwrap(), MergePolicy::Union)
            .unwrap();
        assert_eq!(union.height(), 2);
        assert_eq!(values_i64(&union, "closed_contracts_sixth_last"), vec![0, 0]);

        let intersection = metric
            .aggregate_windows(&contracts, &anchors, windows(0).unwrap(), MergePolicy::Intersection)
            .unwrap();
        assert_eq!(intersection.height(), 0);
    }

    #[test]
    fn test_missing_value_column() {
        let contracts = contracts();
        let anchors = Anchors::churn(&contracts).unwrap();
        let metric = WindowedMetric::sum(
            "bogus",
            "no_such_column",
            WindowMatch::Within {
                date: CLOSE_DAY.into(),
            },
        );
        let err = metric
            .aggregate(&contracts, &anchors, &window(Period::Last))
            .unwrap_err();
        assert!(matches!(err, crate::FeatureError::MissingColumn(ref c) if c == "no_such_column"));
    }
}
