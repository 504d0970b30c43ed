//! Feature matrix assembly.
//!
//! The builder runs the registered blocks, derives relative performance,
//! trends and the label, then prunes the columns that must not reach the
//! classifier (the entity key, the current counts the label was read from,
//! and every window-1 column) and fixes the column order.

use crate::{
    Result, SourceTables,
    blocks::metric::{
        ACTIVE_CONTRACTS, CLOSED_CONTRACTS, INVESTMENTS, NET_PAID, NUM_INVESTMENTS, PERFORMANCE,
        RELATIVE_PERFORMANCE,
    },
    config::PipelineConfig,
    label::{LABEL, add_label},
    registry::BlockRegistry,
    relative::add_relative_performance,
    sources::{ENTITY_ID, RawSources},
    trend::{TREND_METRICS, add_trends, trend_column},
    window::{Period, check_offset},
};
use polars::prelude::*;
use tracing::info;

/// Window column families kept in the output, in output order.
pub const OUTPUT_METRICS: [&str; 7] = [
    ACTIVE_CONTRACTS,
    CLOSED_CONTRACTS,
    NET_PAID,
    PERFORMANCE,
    RELATIVE_PERFORMANCE,
    INVESTMENTS,
    NUM_INVESTMENTS,
];

/// Builds the per-entity feature matrix.
#[derive(Debug)]
pub struct FeatureMatrixBuilder {
    config: PipelineConfig,
    registry: BlockRegistry,
}

impl FeatureMatrixBuilder {
    /// Builder with the standard blocks.
    pub fn new(config: PipelineConfig) -> Self {
        let registry = BlockRegistry::with_defaults(&config);
        Self { config, registry }
    }

    /// Builder over a custom registry.
    pub const fn with_registry(config: PipelineConfig, registry: BlockRegistry) -> Self {
        Self { config, registry }
    }

    /// Run configuration.
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Registered blocks.
    pub const fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    /// Normalize `raw` with the configured sentinels and build the matrix.
    pub fn build_from_raw(&self, raw: RawSources) -> Result<DataFrame> {
        let sources = SourceTables::normalize(raw, &self.config.sentinels)?;
        self.build(&sources)
    }

    /// Build the feature matrix.
    ///
    /// Columns: `label`, the trend columns, the static attributes, then
    /// windows 2 through 6 of every output family. Rows are sorted by
    /// `entity_id`.
    pub fn build(&self, sources: &SourceTables) -> Result<DataFrame> {
        let offset = check_offset(self.config.offset_days)?;
        info!(offset, blocks = self.registry.len(), "building feature matrix");

        let merged = self.registry.compute_all(sources, offset)?;
        let relative = add_relative_performance(merged)?;
        let trended = add_trends(relative)?;
        let labelled = add_label(trended)?;

        let attributes: Vec<String> = sources
            .attributes()
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != ENTITY_ID)
            .map(|name| name.to_string())
            .collect();
        let order = self.output_columns(&attributes);

        let result = labelled
            .lazy()
            .sort([ENTITY_ID], SortMultipleOptions::default())
            .select(order.iter().map(|c| col(c.as_str())).collect::<Vec<_>>())
            .collect()?;

        info!(
            entities = result.height(),
            columns = result.width(),
            "built feature matrix"
        );
        Ok(result)
    }

    /// Output column names, in order, for the given attribute columns.
    ///
    /// `active_contracts_current`, `closed_contracts_current` and every
    /// window-1 column are never part of the output.
    pub fn output_columns(&self, attributes: &[String]) -> Vec<String> {
        let mut columns = vec![LABEL.to_string()];
        columns.extend(TREND_METRICS.iter().map(|m| trend_column(m)));
        columns.extend(attributes.iter().cloned());
        for metric in OUTPUT_METRICS {
            columns.extend(Period::trend_periods().map(|p| p.column(metric)));
        }
        if self.config.keep_entity_id {
            columns.push(ENTITY_ID.to_string());
        }
        columns
    }
}

impl Default for FeatureMatrixBuilder {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}
