//! Performance relative to the market benchmark.

use crate::{
    Result,
    blocks::metric::{MARKET_PERFORMANCE, PERFORMANCE, RELATIVE_PERFORMANCE},
    sources::require_columns,
    window::Period,
};
use polars::prelude::*;

/// Add `relative_performance_<p> = performance_<p> - market_performance_<p>`
/// for every period and drop the market columns.
pub fn add_relative_performance(df: DataFrame) -> Result<DataFrame> {
    let performance: Vec<String> = Period::ALL.iter().map(|p| p.column(PERFORMANCE)).collect();
    let market: Vec<String> = Period::ALL
        .iter()
        .map(|p| p.column(MARKET_PERFORMANCE))
        .collect();
    let required: Vec<&str> = performance
        .iter()
        .chain(&market)
        .map(String::as_str)
        .collect();
    require_columns(&df, &required)?;

    let mut selected: Vec<Expr> = df
        .get_column_names()
        .into_iter()
        .filter(|name| !market.iter().any(|m| m == name.as_str()))
        .map(|name| col(name.clone()))
        .collect();
    selected.extend(
        Period::ALL
            .iter()
            .zip(performance.iter().zip(&market))
            .map(|(p, (perf, bench))| {
                (col(perf.as_str()) - col(bench.as_str())).alias(p.column(RELATIVE_PERFORMANCE))
            }),
    );

    Ok(df.lazy().select(selected).collect()?)
}
