//! Contract activity block - active and closed contract counts.
//!
//! Counts are taken as snapshots at the recent edge of each window, measured
//! from the entity's churn anchor (its latest contract close). Windows are
//! merged under the union policy: an entity with contracts is never dropped
//! here, a window in which it had nothing simply reads 0.

use super::{ACTIVE_CONTRACTS_CURRENT, CLOSED_CONTRACTS_CURRENT, metric};
use crate::{
    Result, SourceTables,
    aggregate::{WindowMatch, WindowedMetric},
    anchor::{AnchorKind, Anchors},
    config::ContractActivityConfig,
    merge::{MergePolicy, merge_tables},
    registry::BlockCategory,
    sources::{CLOSE_DAY, CONTRACT_ID, ENTITY_ID, OPEN_DAY, STATUS, require_columns},
    traits::{ConfigurableBlock, FeatureBlock},
    window::windows,
};
use polars::prelude::*;

/// Contract activity block.
///
/// # Output Columns
/// - `active_contracts_current`, `closed_contracts_current`
/// - `active_contracts_<period>` for the six periods
/// - `closed_contracts_<period>` for the six periods
#[derive(Debug, Clone, Default)]
pub struct ContractActivity {
    config: ContractActivityConfig,
}

impl ContractActivity {
    /// Contracts open before and still open after the window's recent edge.
    pub fn active_metric(&self) -> WindowedMetric {
        WindowedMetric::count(
            metric::ACTIVE_CONTRACTS,
            WindowMatch::ActiveAt {
                open: OPEN_DAY.into(),
                close: CLOSE_DAY.into(),
            },
        )
    }

    /// Closed-status contracts whose close precedes the window's recent edge.
    pub fn closed_metric(&self) -> WindowedMetric {
        WindowedMetric::count(
            metric::CLOSED_CONTRACTS,
            WindowMatch::ClosedBefore {
                close: CLOSE_DAY.into(),
            },
        )
        .with_row_filter(col(STATUS).eq(lit(self.config.closed_status)))
    }

    fn status_count(&self, status: i64) -> Expr {
        when(col(STATUS).eq(lit(status)))
            .then(lit(1i64))
            .otherwise(lit(0i64))
            .sum()
            .cast(DataType::Int64)
    }

    /// Current active and closed counts for every entity with a contract.
    pub fn current_counts(&self, contracts: &DataFrame) -> Result<DataFrame> {
        Ok(contracts
            .clone()
            .lazy()
            .group_by([col(ENTITY_ID)])
            .agg([
                self.status_count(self.config.active_status)
                    .alias(ACTIVE_CONTRACTS_CURRENT),
                self.status_count(self.config.closed_status)
                    .alias(CLOSED_CONTRACTS_CURRENT),
            ])
            .sort([ENTITY_ID], SortMultipleOptions::default())
            .collect()?)
    }
}

impl FeatureBlock for ContractActivity {
    fn name(&self) -> &str {
        "contract_activity"
    }

    fn description(&self) -> &str {
        "Active and closed contract counts at the edge of each window before the last contract close"
    }

    fn category(&self) -> BlockCategory {
        BlockCategory::Contracts
    }

    fn required_columns(&self) -> &[&str] {
        &[ENTITY_ID, CONTRACT_ID, STATUS, OPEN_DAY, CLOSE_DAY]
    }

    fn anchor(&self) -> Option<AnchorKind> {
        Some(AnchorKind::Churn)
    }

    fn window_policy(&self) -> Option<MergePolicy> {
        Some(MergePolicy::Union)
    }

    fn compute(&self, sources: &SourceTables, offset_days: u32) -> Result<DataFrame> {
        let contracts = sources.contracts();
        require_columns(contracts, self.required_columns())?;
        let anchors = Anchors::churn(contracts)?;

        let current = self.current_counts(contracts)?;
        let active = self.active_metric().aggregate_windows(
            contracts,
            &anchors,
            windows(offset_days)?,
            MergePolicy::Union,
        )?;
        let closed = self.closed_metric().aggregate_windows(
            contracts,
            &anchors,
            windows(offset_days)?,
            MergePolicy::Union,
        )?;

        merge_tables(vec![current, active, closed], ENTITY_ID, MergePolicy::Union)
    }
}

impl ConfigurableBlock for ContractActivity {
    type Config = ContractActivityConfig;

    fn with_config(config: Self::Config) -> Self {
        Self { config }
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }
}
