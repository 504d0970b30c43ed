//! Run configuration.
//!
//! Everything has a default matching the reference data snapshot, so an
//! empty JSON object (or no file at all) is a valid configuration.

use crate::{Result, window::check_offset};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Substitutions applied to missing dates before any window arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateSentinels {
    /// Token the source files use for a missing date.
    pub null_token: String,
    /// Close date given to contracts that are still open.
    pub open_contract_close: NaiveDate,
    /// Open date given to contracts opened before recorded history.
    pub missing_open: NaiveDate,
}

impl Default for DateSentinels {
    fn default() -> Self {
        Self {
            null_token: "(null)".to_string(),
            open_contract_close: NaiveDate::from_ymd_opt(2019, 11, 29).unwrap_or_default(),
            missing_open: NaiveDate::from_ymd_opt(1999, 11, 29).unwrap_or_default(),
        }
    }
}

/// Status codes of the contract source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractActivityConfig {
    /// Status code of an active contract.
    pub active_status: i64,
    /// Status code of a closed contract.
    pub closed_status: i64,
}

impl Default for ContractActivityConfig {
    fn default() -> Self {
        Self {
            active_status: 1,
            closed_status: 2,
        }
    }
}

/// Which reference date anchors the investment windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentAnchor {
    /// Entity's last performance period end.
    #[default]
    Performance,
    /// Close date of the contract the transaction was booked on.
    ContractClose,
}

/// Settings for the investment block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvestmentConfig {
    /// Transaction type counted as an investment.
    pub purchase_type: String,
    /// Anchor used for the investment windows.
    pub anchor: InvestmentAnchor,
}

impl Default for InvestmentConfig {
    fn default() -> Self {
        Self {
            purchase_type: "ACQUISTO TITOLI".to_string(),
            anchor: InvestmentAnchor::Performance,
        }
    }
}

/// Configuration for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Days every window is shifted away from the anchor.
    pub offset_days: u32,
    /// Missing-date substitutions.
    pub sentinels: DateSentinels,
    /// Contract status codes.
    pub contracts: ContractActivityConfig,
    /// Investment block settings.
    pub investments: InvestmentConfig,
    /// Keep `entity_id` as the last output column.
    pub keep_entity_id: bool,
}

impl PipelineConfig {
    /// Read a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Parse a configuration from a JSON string.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values serde cannot constrain.
    pub fn validate(&self) -> Result<()> {
        check_offset(self.offset_days)?;
        Ok(())
    }

    /// Same configuration with a different offset.
    pub const fn with_offset(mut self, offset_days: u32) -> Self {
        self.offset_days = offset_days;
        self
    }
}
