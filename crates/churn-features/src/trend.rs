//! Linear trend features over the lookback windows.
//!
//! For each metric family the values of windows 2 through 6 are regressed on
//! a time axis by ordinary least squares, and the slope becomes
//! `trend_<metric>`. The axis runs `[4, 3, 2, 1, 0]`: window 2 is the most
//! recent of the five and sits at the largest x, so a metric that has grown
//! towards the anchor gets a positive slope.

use crate::{
    FeatureError, Result,
    blocks::metric::{
        ACTIVE_CONTRACTS, CLOSED_CONTRACTS, INVESTMENTS, NET_PAID, PERFORMANCE,
        RELATIVE_PERFORMANCE,
    },
    sources::require_columns,
    window::Period,
};
use polars::prelude::*;
use tracing::debug;

/// Metric families that get a trend column, in output order.
pub const TREND_METRICS: [&str; 6] = [
    ACTIVE_CONTRACTS,
    CLOSED_CONTRACTS,
    NET_PAID,
    PERFORMANCE,
    RELATIVE_PERFORMANCE,
    INVESTMENTS,
];

/// Name of the trend column of `metric`.
pub fn trend_column(metric: &str) -> String {
    format!("trend_{metric}")
}

/// Descending time axis `[n-1, ..., 1, 0]`.
pub fn trend_axis(n: usize) -> Vec<f64> {
    (0..n).rev().map(|x| x as f64).collect()
}

/// Ordinary least squares slope of `y` on `x`.
///
/// Returns exactly 0.0 when `y` is constant or `x` has no variance.
pub fn ols_slope(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 || y[..n].iter().all(|v| *v == y[0]) {
        return 0.0;
    }

    let mean_x = x[..n].iter().sum::<f64>() / n as f64;
    let mean_y = y[..n].iter().sum::<f64>() / n as f64;
    let (sxy, sxx) = x[..n]
        .iter()
        .zip(&y[..n])
        .fold((0.0, 0.0), |(sxy, sxx), (xi, yi)| {
            let dx = xi - mean_x;
            (sxy + dx * (yi - mean_y), sxx + dx * dx)
        });

    if sxx == 0.0 { 0.0 } else { sxy / sxx }
}

/// Per-row trend of `metric` over windows 2 through 6.
pub fn trend_series(df: &DataFrame, metric: &str) -> Result<Column> {
    let columns: Vec<String> = Period::trend_periods().map(|p| p.column(metric)).collect();
    let names: Vec<&str> = columns.iter().map(String::as_str).collect();
    require_columns(df, &names)?;

    let mut values = Vec::with_capacity(columns.len());
    for name in &columns {
        let column = df.column(name)?.cast(&DataType::Float64)?;
        if column.null_count() > 0 {
            return Err(FeatureError::NullValue(name.clone()));
        }
        values.push(column.f64()?.into_no_null_iter().collect::<Vec<f64>>());
    }

    let x = trend_axis(columns.len());
    let slopes: Vec<f64> = (0..df.height())
        .map(|row| {
            let y: Vec<f64> = values.iter().map(|v| v[row]).collect();
            ols_slope(&x, &y)
        })
        .collect();

    Ok(Column::new(trend_column(metric).into(), slopes))
}

/// Append one trend column per family in [`TREND_METRICS`].
pub fn add_trends(mut df: DataFrame) -> Result<DataFrame> {
    for metric in TREND_METRICS {
        let trend = trend_series(&df, metric)?;
        df.with_column(trend)?;
    }
    debug!(rows = df.height(), trends = TREND_METRICS.len(), "added trend columns");
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case(vec![3.0, 3.0, 3.0, 3.0, 3.0], 0.0)]
    #[case(vec![4.0, 3.0, 2.0, 1.0, 0.0], 1.0)]
    #[case(vec![0.0, 1.0, 2.0, 3.0, 4.0], -1.0)]
    #[case(vec![8.0, 6.0, 4.0, 2.0, 0.0], 2.0)]
    fn test_ols_slope_on_trend_axis(#[case] y: Vec<f64>, #[case] expected: f64) {
        let x = trend_axis(5);
        assert_relative_eq!(ols_slope(&x, &y), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_series_is_exactly_zero() {
        let x = trend_axis(5);
        assert_eq!(ols_slope(&x, &[0.1; 5]), 0.0);
        assert_eq!(ols_slope(&[2.0; 5], &[1.0, 2.0, 3.0, 4.0, 5.0]), 0.0);
    }

    #[test]
    fn test_trend_axis_descends() {
        assert_eq!(trend_axis(5), vec![4.0, 3.0, 2.0, 1.0, 0.0]);
        assert!(trend_axis(0).is_empty());
    }

    fn family(metric: &str, rows: [[i64; 5]; 2]) -> Vec<Column> {
        Period::trend_periods()
            .enumerate()
            .map(|(i, p)| Column::new(p.column(metric).into(), [rows[0][i], rows[1][i]]))
            .collect()
    }

    #[test]
    fn test_trend_series_per_row() {
        let df = DataFrame::new(family("active_contracts", [[4, 3, 2, 1, 0], [1, 1, 1, 1, 1]]))
            .unwrap();
        let trend = trend_series(&df, "active_contracts").unwrap();
        assert_eq!(trend.name().as_str(), "trend_active_contracts");
        let values = trend.f64().unwrap();
        assert_relative_eq!(values.get(0).unwrap(), 1.0, epsilon = 1e-12);
        assert_eq!(values.get(1), Some(0.0));
    }

    #[test]
    fn test_null_input_is_rejected() {
        let mut columns = family("net_paid", [[1, 2, 3, 4, 5], [1, 2, 3, 4, 5]]);
        columns[2] = Column::new("net_paid_fourth_last".into(), [Some(1.0), None]);
        let df = DataFrame::new(columns).unwrap();
        let err = trend_series(&df, "net_paid").unwrap_err();
        assert!(matches!(err, FeatureError::NullValue(ref c) if c == "net_paid_fourth_last"));
    }

    #[test]
    fn test_missing_family_is_error() {
        let df = DataFrame::new(family("net_paid", [[0; 5], [0; 5]])).unwrap();
        assert!(add_trends(df).is_err());
    }
}
