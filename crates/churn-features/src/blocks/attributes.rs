//! Static attribute block.
//!
//! Passes the per-entity attribute table through unchanged. Its only effect
//! on the merged matrix is on the population: an entity without attributes
//! is dropped.

use crate::{
    Result, SourceTables,
    anchor::AnchorKind,
    merge::MergePolicy,
    registry::BlockCategory,
    sources::{ENTITY_ID, require_columns},
    traits::FeatureBlock,
};
use polars::prelude::*;

/// Static attribute block.
///
/// # Output Columns
/// Every column of the attribute table, sorted by `entity_id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticAttributes;

impl FeatureBlock for StaticAttributes {
    fn name(&self) -> &str {
        "static_attributes"
    }

    fn description(&self) -> &str {
        "Static per-entity attributes, one-hot encoded at load"
    }

    fn category(&self) -> BlockCategory {
        BlockCategory::Attributes
    }

    fn required_columns(&self) -> &[&str] {
        &[ENTITY_ID]
    }

    fn anchor(&self) -> Option<AnchorKind> {
        None
    }

    fn window_policy(&self) -> Option<MergePolicy> {
        None
    }

    fn compute(&self, sources: &SourceTables, _offset_days: u32) -> Result<DataFrame> {
        let attributes = sources.attributes();
        require_columns(attributes, self.required_columns())?;
        Ok(attributes
            .clone()
            .lazy()
            .sort([ENTITY_ID], SortMultipleOptions::default())
            .collect()?)
    }
}
