//! Multi-way merging of keyed tables.
//!
//! Per-window aggregate tables and per-source feature blocks are combined by
//! one reduce over the whole list, parameterized by a [`MergePolicy`]. The two
//! policies produce different entity populations; which one a caller uses is
//! part of the feature definition and must not be unified.

use crate::{FeatureError, Result};
use derive_more::Display;
use polars::prelude::*;
use std::collections::BTreeSet;
use tracing::debug;

/// How entity sets of the merged tables combine.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergePolicy {
    /// Keep every key seen in any table; missing values become zero.
    Union,
    /// Keep only keys present in every table.
    Intersection,
}

/// Merge `tables` on `key` under `policy`, sorted by key.
///
/// Non-key column names must be distinct across tables.
pub fn merge_tables(tables: Vec<DataFrame>, key: &str, policy: MergePolicy) -> Result<DataFrame> {
    if tables.is_empty() {
        return Err(FeatureError::Computation(format!(
            "no tables to merge on {key}"
        )));
    }

    let value_columns: Vec<String> = tables
        .iter()
        .flat_map(|t| t.get_column_names())
        .map(|name| name.to_string())
        .filter(|name| name != key)
        .collect();

    let merged = match policy {
        MergePolicy::Union => {
            let base = df! { key => union_keys(&tables, key)? }?.lazy();
            let fills: Vec<Expr> = value_columns
                .iter()
                .map(|c| col(c.as_str()).fill_null(lit(0)))
                .collect();
            tables
                .into_iter()
                .fold(base, |acc, table| {
                    acc.join(
                        table.lazy(),
                        [col(key)],
                        [col(key)],
                        JoinArgs::new(JoinType::Left),
                    )
                })
                .with_columns(fills)
        }
        MergePolicy::Intersection => {
            let mut frames = tables.into_iter().map(DataFrame::lazy);
            let first = frames
                .next()
                .ok_or_else(|| FeatureError::Computation(format!("no tables to merge on {key}")))?;
            frames.fold(first, |acc, table| {
                acc.join(
                    table,
                    [col(key)],
                    [col(key)],
                    JoinArgs::new(JoinType::Inner),
                )
            })
        }
    };

    let result = merged
        .sort([key], SortMultipleOptions::default())
        .collect()?;
    debug!(%policy, key, rows = result.height(), columns = result.width(), "merged tables");
    Ok(result)
}

fn union_keys(tables: &[DataFrame], key: &str) -> Result<Vec<i64>> {
    let mut keys = BTreeSet::new();
    for table in tables {
        keys.extend(table.column(key)?.i64()?.into_iter().flatten());
    }
    Ok(keys.into_iter().collect())
}

/// Keys present in `df`, in row order.
pub fn keys(df: &DataFrame, key: &str) -> Result<Vec<i64>> {
    Ok(df.column(key)?.i64()?.into_iter().flatten().collect())
}
