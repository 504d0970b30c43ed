#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/churn-features/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod aggregate;
pub mod anchor;
pub mod benchmark;
pub mod blocks;
pub mod config;
pub mod error;
pub mod io;
pub mod label;
pub mod merge;
pub mod pipeline;
pub mod registry;
pub mod relative;
pub mod sources;
pub mod traits;
pub mod trend;
pub mod window;

// Re-export core types
pub use aggregate::{Aggregation, WindowMatch, WindowedMetric};
pub use anchor::{AnchorKind, Anchors};
pub use benchmark::BenchmarkIndex;
pub use config::{
    ContractActivityConfig, DateSentinels, InvestmentAnchor, InvestmentConfig, PipelineConfig,
};
pub use error::{FeatureError, Result};
pub use io::{DEFAULT_OUTPUT, SourceFiles, load_sources, one_hot, write_matrix};
pub use label::ChurnLabel;
pub use merge::{MergePolicy, merge_tables};
pub use pipeline::FeatureMatrixBuilder;
pub use registry::{BlockCategory, BlockInfo, BlockRegistry};
pub use sources::{RawSources, SourceTables};
pub use traits::{BlockConfig, ConfigurableBlock, FeatureBlock};
pub use trend::{ols_slope, trend_axis};
pub use window::{LookbackWindow, MAX_OFFSET_DAYS, Period, Windows, check_offset, windows};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
