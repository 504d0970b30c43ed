//! Per-entity reference dates.
//!
//! Two anchors are resolved independently and are allowed to disagree for the
//! same entity: the churn anchor (last contract close) drives the contract
//! windows, the performance anchor (last performance period end) drives the
//! performance, benchmark and investment windows.

use crate::{
    Result,
    sources::{CLOSE_DAY, CONTRACT_ID, ENTITY_ID, PERIOD_END_DAY, require_columns},
};
use derive_more::Display;
use polars::prelude::*;
use std::collections::HashMap;

/// Column holding the resolved anchor day in every anchor frame.
pub const ANCHOR_DAY: &str = "anchor_day";

/// Which reference date a set of windows is measured from.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorKind {
    /// Latest contract close date of the entity
    Churn,
    /// Latest performance period end of the entity
    Performance,
    /// Close date of each individual contract
    ContractClose,
}

/// Anchor days keyed by entity or contract.
///
/// Aggregators join their source against [`Anchors::frame`] on
/// [`Anchors::key`], so a source row without an anchor drops out.
#[derive(Debug, Clone)]
pub struct Anchors {
    kind: AnchorKind,
    key: &'static str,
    frame: DataFrame,
}

impl Anchors {
    /// Churn anchor: `max(close_day)` per entity over normalized contracts.
    pub fn churn(contracts: &DataFrame) -> Result<Self> {
        require_columns(contracts, &[ENTITY_ID, CLOSE_DAY])?;
        let frame = latest_per_entity(contracts, CLOSE_DAY)?;
        Ok(Self {
            kind: AnchorKind::Churn,
            key: ENTITY_ID,
            frame,
        })
    }

    /// Performance anchor: `max(period_end_day)` per entity.
    pub fn performance(performance: &DataFrame) -> Result<Self> {
        require_columns(performance, &[ENTITY_ID, PERIOD_END_DAY])?;
        let frame = latest_per_entity(performance, PERIOD_END_DAY)?;
        Ok(Self {
            kind: AnchorKind::Performance,
            key: ENTITY_ID,
            frame,
        })
    }

    /// Per-contract anchor: each contract's own `close_day`.
    pub fn contract_close(contracts: &DataFrame) -> Result<Self> {
        require_columns(contracts, &[CONTRACT_ID, CLOSE_DAY])?;
        let frame = contracts
            .clone()
            .lazy()
            .group_by([col(CONTRACT_ID)])
            .agg([col(CLOSE_DAY).max().alias(ANCHOR_DAY)])
            .sort([CONTRACT_ID], SortMultipleOptions::default())
            .collect()?;
        Ok(Self {
            kind: AnchorKind::ContractClose,
            key: CONTRACT_ID,
            frame,
        })
    }

    /// Kind of anchor.
    pub const fn kind(&self) -> AnchorKind {
        self.kind
    }

    /// Key column the anchors are indexed by.
    pub const fn key(&self) -> &'static str {
        self.key
    }

    /// Frame with columns `[key, anchor_day]`.
    pub const fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Number of anchored keys.
    pub fn len(&self) -> usize {
        self.frame.height()
    }

    /// Whether no key has an anchor.
    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Keys and anchor days as parallel vectors, in key order.
    pub fn to_pairs(&self) -> Result<(Vec<i64>, Vec<i32>)> {
        let keys = self.frame.column(self.key)?.i64()?;
        let days = self.frame.column(ANCHOR_DAY)?.i32()?;
        Ok(keys
            .into_iter()
            .zip(days)
            .filter_map(|(k, d)| Some((k?, d?)))
            .unzip())
    }

    /// Anchor days as a lookup map.
    pub fn to_map(&self) -> Result<HashMap<i64, i32>> {
        let (keys, days) = self.to_pairs()?;
        Ok(keys.into_iter().zip(days).collect())
    }
}

fn latest_per_entity(df: &DataFrame, day_column: &str) -> Result<DataFrame> {
    Ok(df
        .clone()
        .lazy()
        .group_by([col(ENTITY_ID)])
        .agg([col(day_column).max().alias(ANCHOR_DAY)])
        .sort([ENTITY_ID], SortMultipleOptions::default())
        .collect()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{OPEN_DAY, PERIOD_START_DAY};

    fn contracts() -> DataFrame {
        df! {
            ENTITY_ID => [1i64, 1, 2],
            CONTRACT_ID => [10i64, 11, 20],
            OPEN_DAY => [0i32, 0, 0],
            CLOSE_DAY => [100i32, 300, 50],
        }
        .unwrap()
    }

    #[test]
    fn test_churn_anchor_is_latest_close() {
        let anchors = Anchors::churn(&contracts()).unwrap();
        assert_eq!(anchors.kind(), AnchorKind::Churn);
        let map = anchors.to_map().unwrap();
        assert_eq!(map[&1], 300);
        assert_eq!(map[&2], 50);
    }

    #[test]
    fn test_performance_anchor_is_latest_period_end() {
        let performance = df! {
            ENTITY_ID => [3i64, 3, 3],
            PERIOD_START_DAY => [0i32, 31, 59],
            PERIOD_END_DAY => [30i32, 58, 89],
        }
        .unwrap();
        let anchors = Anchors::performance(&performance).unwrap();
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors.to_map().unwrap()[&3], 89);
    }

    #[test]
    fn test_contract_close_anchor_per_contract() {
        let anchors = Anchors::contract_close(&contracts()).unwrap();
        assert_eq!(anchors.key(), CONTRACT_ID);
        let (keys, days) = anchors.to_pairs().unwrap();
        assert_eq!(keys, vec![10, 11, 20]);
        assert_eq!(days, vec![100, 300, 50]);
    }

    #[test]
    fn test_entity_without_records_has_no_anchor() {
        let anchors = Anchors::churn(&contracts()).unwrap();
        assert!(!anchors.to_map().unwrap().contains_key(&3));
    }

    #[test]
    fn test_missing_column() {
        let err = Anchors::performance(&contracts()).unwrap_err();
        assert!(matches!(err, crate::FeatureError::MissingColumn(_)));
    }
}
