//! Feature blocks - one block of windowed columns per source.
//!
//! Each block resolves its own anchor, aggregates its source over the six
//! lookback windows and merges the windows under its own policy. The
//! registry then joins the blocks on `entity_id`.

pub mod attributes;
pub mod contracts;
pub mod investments;
pub mod market;
pub mod performance;

pub use attributes::StaticAttributes;
pub use contracts::ContractActivity;
pub use investments::Investments;
pub use market::MarketBenchmark;
pub use performance::AdvisoryPerformance;

/// Column prefixes of the windowed metrics.
pub mod metric {
    /// Contracts live at the window's recent edge.
    pub const ACTIVE_CONTRACTS: &str = "active_contracts";
    /// Contracts closed before the window's recent edge.
    pub const CLOSED_CONTRACTS: &str = "closed_contracts";
    /// Net amount paid in over the window.
    pub const NET_PAID: &str = "net_paid";
    /// Summed advisory return over the window.
    pub const PERFORMANCE: &str = "performance";
    /// Summed benchmark return over the window.
    pub const MARKET_PERFORMANCE: &str = "market_performance";
    /// Advisory return minus benchmark return.
    pub const RELATIVE_PERFORMANCE: &str = "relative_performance";
    /// Gross amount of security purchases.
    pub const INVESTMENTS: &str = "investments";
    /// Number of security purchases.
    pub const NUM_INVESTMENTS: &str = "num_investments";
}

/// Active contracts today, regardless of any window.
pub const ACTIVE_CONTRACTS_CURRENT: &str = "active_contracts_current";

/// Closed contracts today, regardless of any window.
pub const CLOSED_CONTRACTS_CURRENT: &str = "closed_contracts_current";
