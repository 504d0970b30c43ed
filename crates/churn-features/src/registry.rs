//! Block registry for discovery and joint computation.
//!
//! The registry keeps feature blocks in registration order, which is also the
//! column order of the merged table. Blocks are joined on `entity_id` under
//! the intersection policy, so an entity survives only if every block has a
//! row for it.

use crate::{
    FeatureBlock, FeatureError, Result, SourceTables,
    anchor::AnchorKind,
    blocks::{AdvisoryPerformance, ContractActivity, Investments, MarketBenchmark, StaticAttributes},
    config::PipelineConfig,
    merge::{MergePolicy, keys, merge_tables},
    sources::ENTITY_ID,
    traits::ConfigurableBlock,
};
use derive_more::Display;
use polars::prelude::*;
use std::{collections::BTreeSet, sync::Arc};
use tracing::{info, warn};

/// Block category, one per source.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockCategory {
    /// Attributes - static per-entity columns
    Attributes,
    /// Contracts - contract activity counts
    Contracts,
    /// Performance - advisory cash flow and return
    Performance,
    /// Benchmark - market index returns
    Benchmark,
    /// Investments - purchase transactions
    Investments,
}

/// Metadata for block introspection.
#[derive(Debug, Clone)]
pub struct BlockInfo {
    /// Block name (unique identifier)
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Block category
    pub category: BlockCategory,
    /// Required source columns
    pub required_columns: Vec<String>,
    /// Anchor the block's windows are measured from
    pub anchor: Option<AnchorKind>,
    /// Policy combining the block's windows
    pub window_policy: Option<MergePolicy>,
}

/// Ordered registry of feature blocks.
#[derive(Debug, Default)]
pub struct BlockRegistry {
    blocks: Vec<Arc<dyn FeatureBlock>>,
}

impl BlockRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// Register the standard blocks in source order.
    pub fn with_defaults(config: &PipelineConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(StaticAttributes));
        registry.register(Arc::new(ContractActivity::with_config(config.contracts)));
        registry.register(Arc::new(AdvisoryPerformance));
        registry.register(Arc::new(MarketBenchmark));
        registry.register(Arc::new(Investments::with_config(
            config.investments.clone(),
        )));
        registry
    }

    /// Register a block, replacing any block of the same name in place.
    pub fn register(&mut self, block: Arc<dyn FeatureBlock>) {
        match self.blocks.iter().position(|b| b.name() == block.name()) {
            Some(i) => self.blocks[i] = block,
            None => self.blocks.push(block),
        }
    }

    /// Get a block by name.
    pub fn get(&self, name: &str) -> Option<&dyn FeatureBlock> {
        self.blocks
            .iter()
            .find(|b| b.name() == name)
            .map(|b| b.as_ref())
    }

    /// Get blocks by category.
    pub fn by_category(&self, category: BlockCategory) -> Vec<&dyn FeatureBlock> {
        self.blocks
            .iter()
            .filter(|b| b.category() == category)
            .map(|b| b.as_ref())
            .collect()
    }

    /// Get all block metadata, in registration order.
    pub fn all_info(&self) -> Vec<BlockInfo> {
        self.blocks
            .iter()
            .map(|b| BlockInfo {
                name: b.name().to_string(),
                description: b.description().to_string(),
                category: b.category(),
                required_columns: b.required_columns().iter().map(|s| s.to_string()).collect(),
                anchor: b.anchor(),
                window_policy: b.window_policy(),
            })
            .collect()
    }

    /// Get all block names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.blocks.iter().map(|b| b.name()).collect()
    }

    /// Compute every block and inner-join them on `entity_id`.
    ///
    /// Returns one row per entity present in every block, sorted by
    /// `entity_id`.
    pub fn compute_all(&self, sources: &SourceTables, offset_days: u32) -> Result<DataFrame> {
        if self.blocks.is_empty() {
            return Err(FeatureError::Computation("no blocks registered".to_string()));
        }

        let mut tables = Vec::with_capacity(self.blocks.len());
        let mut surviving: Option<BTreeSet<i64>> = None;
        for block in &self.blocks {
            let table = block.compute(sources, offset_days)?;
            let present: BTreeSet<i64> = keys(&table, ENTITY_ID)?.into_iter().collect();
            let before = surviving.as_ref().map(BTreeSet::len);
            let after = match surviving.take() {
                Some(prev) => prev.intersection(&present).copied().collect(),
                None => present.clone(),
            };
            info!(
                block = block.name(),
                entities = present.len(),
                before = ?before,
                after = after.len(),
                "joined block"
            );
            surviving = Some(after);
            tables.push(table);
        }

        let merged = merge_tables(tables, ENTITY_ID, MergePolicy::Intersection)?;
        if merged.height() == 0 {
            warn!("no entity is present in every block");
        }
        Ok(merged)
    }

    /// Number of registered blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
