//! Investment block - purchase amount and purchase count per window.
//!
//! Transactions reach an entity through the contract they were booked on.
//! Every transaction in a window keeps the entity present for that window,
//! but only purchases contribute to the sum and the count. Windows are merged
//! under the intersection policy.

use super::metric;
use crate::{
    Result, SourceTables,
    aggregate::{WindowMatch, WindowedMetric},
    anchor::{AnchorKind, Anchors},
    config::{InvestmentAnchor, InvestmentConfig},
    merge::{MergePolicy, merge_tables},
    registry::BlockCategory,
    sources::{ENTITY_ID, GROSS_AMOUNT, TRANSACTION_DAY, TRANSACTION_TYPE, require_columns},
    traits::{ConfigurableBlock, FeatureBlock},
    window::windows,
};
use polars::prelude::*;

/// Investment block.
///
/// # Output Columns
/// - `investments_<period>` for the six periods
/// - `num_investments_<period>` for the six periods
#[derive(Debug, Clone, Default)]
pub struct Investments {
    config: InvestmentConfig,
}

impl Investments {
    fn booked() -> WindowMatch {
        WindowMatch::Within {
            date: TRANSACTION_DAY.into(),
        }
    }

    fn is_purchase(&self) -> Expr {
        col(TRANSACTION_TYPE).eq(lit(self.config.purchase_type.as_str()))
    }

    /// Gross amount of purchases in a window.
    pub fn amount_metric(&self) -> WindowedMetric {
        WindowedMetric::sum(metric::INVESTMENTS, GROSS_AMOUNT, Self::booked())
            .with_value_filter(self.is_purchase())
    }

    /// Number of purchases in a window.
    pub fn count_metric(&self) -> WindowedMetric {
        WindowedMetric::count(metric::NUM_INVESTMENTS, Self::booked())
            .with_value_filter(self.is_purchase())
    }

    fn anchors(&self, sources: &SourceTables) -> Result<Anchors> {
        match self.config.anchor {
            InvestmentAnchor::Performance => Anchors::performance(sources.performance()),
            InvestmentAnchor::ContractClose => Anchors::contract_close(sources.contracts()),
        }
    }
}

impl FeatureBlock for Investments {
    fn name(&self) -> &str {
        "investments"
    }

    fn description(&self) -> &str {
        "Purchase amount and number of purchases over each window"
    }

    fn category(&self) -> BlockCategory {
        BlockCategory::Investments
    }

    fn required_columns(&self) -> &[&str] {
        &[ENTITY_ID, TRANSACTION_DAY, TRANSACTION_TYPE, GROSS_AMOUNT]
    }

    fn anchor(&self) -> Option<AnchorKind> {
        Some(match self.config.anchor {
            InvestmentAnchor::Performance => AnchorKind::Performance,
            InvestmentAnchor::ContractClose => AnchorKind::ContractClose,
        })
    }

    fn window_policy(&self) -> Option<MergePolicy> {
        Some(MergePolicy::Intersection)
    }

    fn compute(&self, sources: &SourceTables, offset_days: u32) -> Result<DataFrame> {
        let transactions = sources.transactions();
        require_columns(transactions, self.required_columns())?;
        let anchors = self.anchors(sources)?;

        let amounts = self.amount_metric().aggregate_windows(
            transactions,
            &anchors,
            windows(offset_days)?,
            MergePolicy::Intersection,
        )?;
        let counts = self.count_metric().aggregate_windows(
            transactions,
            &anchors,
            windows(offset_days)?,
            MergePolicy::Intersection,
        )?;

        merge_tables(vec![amounts, counts], ENTITY_ID, MergePolicy::Intersection)
    }
}

impl ConfigurableBlock for Investments {
    type Config = InvestmentConfig;

    fn with_config(config: Self::Config) -> Self {
        Self { config }
    }

    fn config(&self) -> &Self::Config {
        &self.config
    }
}
