//! Core trait definitions for feature blocks.
//!
//! Every source contributes one block of columns keyed by `entity_id`. Blocks
//! implement the [`FeatureBlock`] trait, which gives the registry a uniform way
//! to compute and join them.

use crate::{BlockCategory, Result, SourceTables, anchor::AnchorKind, merge::MergePolicy};
use polars::prelude::*;

/// A block of per-entity feature columns computed from one source.
pub trait FeatureBlock: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this block.
    ///
    /// Should be snake_case and stable across versions.
    fn name(&self) -> &str;

    /// Human-readable description of what this block measures.
    fn description(&self) -> &str;

    /// Block category.
    fn category(&self) -> BlockCategory;

    /// Columns required in the block's normalized source table.
    fn required_columns(&self) -> &[&str];

    /// Reference date the block's windows are measured from, if any.
    fn anchor(&self) -> Option<AnchorKind>;

    /// How the block combines its per-window tables, if it has windows.
    fn window_policy(&self) -> Option<MergePolicy>;

    /// Compute the block.
    ///
    /// Returns a DataFrame with `entity_id` and the block's feature columns,
    /// one row per entity that survives the block's own merge policy.
    fn compute(&self, sources: &SourceTables, offset_days: u32) -> Result<DataFrame>;
}

/// Marker trait for block configuration types.
///
/// All config types should implement Default, Clone, Send, Sync, and Debug.
pub trait BlockConfig: Default + Clone + Send + Sync + std::fmt::Debug {}

/// A block that supports runtime configuration.
pub trait ConfigurableBlock: FeatureBlock {
    /// Configuration type for this block.
    type Config: BlockConfig;

    /// Create a new block with the given configuration.
    fn with_config(config: Self::Config) -> Self;

    /// Returns the current configuration.
    fn config(&self) -> &Self::Config;
}

/// Blanket implementation for any type that satisfies the trait bounds.
impl<T: Default + Clone + Send + Sync + std::fmt::Debug> BlockConfig for T {}
