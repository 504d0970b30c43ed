//! Source records and their canonical tables.
//!
//! Raw sources arrive with dates as strings (the delimited files use a
//! `(null)` token for missing dates). [`SourceTables::normalize`] substitutes
//! the configured sentinels, parses every date into a day number and checks
//! identifiers, so the aggregation code only ever sees integer days and
//! non-null keys. Sources are normalized once per run and shared by
//! reference with every feature block.

use crate::{FeatureError, Result, config::DateSentinels};
use chrono::NaiveDate;
use derive_more::Display;
use polars::prelude::*;
use tracing::{debug, warn};

/// Entity (customer) identifier.
pub const ENTITY_ID: &str = "entity_id";
/// Contract identifier.
pub const CONTRACT_ID: &str = "contract_id";
/// Contract status code.
pub const STATUS: &str = "status";
/// Raw contract open date.
pub const OPEN_DATE: &str = "open_date";
/// Raw contract close date.
pub const CLOSE_DATE: &str = "close_date";
/// Normalized contract open day.
pub const OPEN_DAY: &str = "open_day";
/// Normalized contract close day.
pub const CLOSE_DAY: &str = "close_day";
/// Raw performance period start.
pub const PERIOD_START: &str = "period_start";
/// Raw performance period end.
pub const PERIOD_END: &str = "period_end";
/// Normalized performance period start.
pub const PERIOD_START_DAY: &str = "period_start_day";
/// Normalized performance period end.
pub const PERIOD_END_DAY: &str = "period_end_day";
/// Net amount paid in over a performance period.
pub const NET_PAID: &str = "net_paid";
/// Return fraction over a performance period.
pub const RETURN_FRACTION: &str = "return_fraction";
/// Raw benchmark quote date.
pub const QUOTE_DATE: &str = "quote_date";
/// Normalized benchmark quote day.
pub const QUOTE_DAY: &str = "quote_day";
/// Benchmark daily return fraction.
pub const DAILY_RETURN: &str = "daily_return";
/// Raw transaction booking date.
pub const TRANSACTION_DATE: &str = "transaction_date";
/// Normalized transaction booking day.
pub const TRANSACTION_DAY: &str = "transaction_day";
/// Transaction type discriminator.
pub const TRANSACTION_TYPE: &str = "transaction_type";
/// Gross transaction amount.
pub const GROSS_AMOUNT: &str = "gross_amount";

/// Kind of source table, used for validation and logging.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Static per-entity attributes, already one-hot expanded
    Attributes,
    /// Contract open/close history
    Contracts,
    /// Advisory performance periods
    Performance,
    /// Entity-independent market benchmark series
    Benchmark,
    /// Transactions booked on contracts
    Transactions,
}

impl SourceKind {
    /// Columns a raw table of this kind must provide.
    pub const fn raw_columns(self) -> &'static [&'static str] {
        match self {
            Self::Attributes => &[ENTITY_ID],
            Self::Contracts => &[ENTITY_ID, CONTRACT_ID, STATUS, OPEN_DATE, CLOSE_DATE],
            Self::Performance => &[ENTITY_ID, PERIOD_START, PERIOD_END, NET_PAID, RETURN_FRACTION],
            Self::Benchmark => &[QUOTE_DATE, DAILY_RETURN],
            Self::Transactions => &[CONTRACT_ID, TRANSACTION_DATE, TRANSACTION_TYPE, GROSS_AMOUNT],
        }
    }
}

/// A contract held by an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractRecord {
    /// Owning entity
    pub entity_id: i64,
    /// Contract identifier
    pub contract_id: i64,
    /// Status code (active / closed)
    pub status: i64,
    /// Open date, `None` if it predates recorded history
    pub open_date: Option<NaiveDate>,
    /// Close date, `None` while the contract is open
    pub close_date: Option<NaiveDate>,
}

/// One advisory performance period of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceRecord {
    /// Owning entity
    pub entity_id: i64,
    /// First day of the period
    pub period_start: NaiveDate,
    /// Last day of the period
    pub period_end: NaiveDate,
    /// Net amount paid in (deposits minus withdrawals)
    pub net_paid: f64,
    /// Return fraction over the period
    pub return_fraction: f64,
}

/// One daily quote of the market benchmark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketReturn {
    /// Quote date
    pub date: NaiveDate,
    /// Daily return fraction
    pub daily_return: f64,
}

/// A transaction booked on a contract.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    /// Contract the transaction was booked on
    pub contract_id: i64,
    /// Booking date
    pub date: NaiveDate,
    /// Transaction type, e.g. a security purchase
    pub transaction_type: String,
    /// Gross amount
    pub gross_amount: f64,
}

/// Day number of a date: days since 1970-01-01.
///
/// This is the physical representation of a polars `Date`, so the value can
/// be cast back with `DataType::Date` when a calendar column is needed.
pub fn day_number(date: NaiveDate) -> i32 {
    // chrono's NaiveDate range fits in i32 days.
    date.signed_duration_since(NaiveDate::default()).num_days() as i32
}

/// Calendar date of a day number.
pub fn date_from_day(day: i32) -> Option<NaiveDate> {
    NaiveDate::default().checked_add_signed(chrono::Duration::days(i64::from(day)))
}

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y-%m-%d %H:%M:%S", "%d/%m/%Y"];

/// Parse a date in one of the accepted source formats.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

fn resolve_day(
    raw: Option<&str>,
    column: &str,
    fallback: Option<NaiveDate>,
    sentinels: &DateSentinels,
) -> Result<i32> {
    let missing = match raw.map(str::trim) {
        None => true,
        Some(value) => value.is_empty() || value == sentinels.null_token,
    };

    let date = if missing {
        fallback
    } else {
        raw.and_then(parse_date)
    };

    date.map(day_number).ok_or_else(|| FeatureError::InvalidDate {
        column: column.to_string(),
        value: raw.unwrap_or("null").to_string(),
    })
}

fn day_column(
    df: &DataFrame,
    column: &str,
    output: &str,
    fallback: Option<NaiveDate>,
    sentinels: &DateSentinels,
) -> Result<Column> {
    let values = df.column(column)?.cast(&DataType::String)?;
    let days = values
        .str()?
        .into_iter()
        .map(|raw| resolve_day(raw, column, fallback, sentinels))
        .collect::<Result<Vec<i32>>>()?;

    Ok(Column::new(output.into(), days))
}

fn id_column(df: &DataFrame, column: &str) -> Result<Column> {
    let source = df.column(column)?;
    let ids = source.cast(&DataType::Int64)?;
    // A non-strict cast turns unparseable ids into nulls.
    if ids.null_count() > source.null_count() {
        return Err(FeatureError::InvalidIdentifier {
            column: column.to_string(),
            reason: "non-integer value".to_string(),
        });
    }
    if ids.null_count() > 0 {
        return Err(FeatureError::InvalidIdentifier {
            column: column.to_string(),
            reason: format!("{} null values", ids.null_count()),
        });
    }
    // The cast truncates floats, so only whole values are accepted.
    if source.dtype().is_float() {
        let values = source.cast(&DataType::Float64)?;
        if let Some(bad) = values.f64()?.into_no_null_iter().find(|v| v.fract() != 0.0) {
            return Err(FeatureError::InvalidIdentifier {
                column: column.to_string(),
                reason: format!("fractional value {bad}"),
            });
        }
    }
    Ok(ids)
}

fn typed_column(df: &DataFrame, column: &str, dtype: &DataType) -> Result<Column> {
    Ok(df.column(column)?.cast(dtype)?)
}

/// Check that `df` provides every column in `required`.
pub fn require_columns(df: &DataFrame, required: &[&str]) -> Result<()> {
    let schema = df.schema();
    match required.iter().find(|name| !schema.contains(name)) {
        Some(missing) => Err(FeatureError::MissingColumn((*missing).to_string())),
        None => Ok(()),
    }
}

/// Raw source tables with canonical column names and string dates.
#[derive(Debug, Clone)]
pub struct RawSources {
    /// Static attributes: `entity_id` plus numeric attribute columns
    pub attributes: DataFrame,
    /// Contracts: `entity_id`, `contract_id`, `status`, `open_date`, `close_date`
    pub contracts: DataFrame,
    /// Performance: `entity_id`, `period_start`, `period_end`, `net_paid`, `return_fraction`
    pub performance: DataFrame,
    /// Benchmark: `quote_date`, `daily_return`
    pub benchmark: DataFrame,
    /// Transactions: `contract_id`, `transaction_date`, `transaction_type`, `gross_amount`
    pub transactions: DataFrame,
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

impl RawSources {
    /// Build raw tables from typed records.
    pub fn from_records(
        attributes: DataFrame,
        contracts: &[ContractRecord],
        performance: &[PerformanceRecord],
        benchmark: &[MarketReturn],
        transactions: &[TransactionRecord],
    ) -> Result<Self> {
        let contracts = df! {
            ENTITY_ID => contracts.iter().map(|c| c.entity_id).collect::<Vec<_>>(),
            CONTRACT_ID => contracts.iter().map(|c| c.contract_id).collect::<Vec<_>>(),
            STATUS => contracts.iter().map(|c| c.status).collect::<Vec<_>>(),
            OPEN_DATE => contracts.iter().map(|c| c.open_date.map(format_date)).collect::<Vec<_>>(),
            CLOSE_DATE => contracts.iter().map(|c| c.close_date.map(format_date)).collect::<Vec<_>>(),
        }?;

        let performance = df! {
            ENTITY_ID => performance.iter().map(|p| p.entity_id).collect::<Vec<_>>(),
            PERIOD_START => performance.iter().map(|p| format_date(p.period_start)).collect::<Vec<_>>(),
            PERIOD_END => performance.iter().map(|p| format_date(p.period_end)).collect::<Vec<_>>(),
            NET_PAID => performance.iter().map(|p| p.net_paid).collect::<Vec<_>>(),
            RETURN_FRACTION => performance.iter().map(|p| p.return_fraction).collect::<Vec<_>>(),
        }?;

        let benchmark = df! {
            QUOTE_DATE => benchmark.iter().map(|m| format_date(m.date)).collect::<Vec<_>>(),
            DAILY_RETURN => benchmark.iter().map(|m| m.daily_return).collect::<Vec<_>>(),
        }?;

        let transactions = df! {
            CONTRACT_ID => transactions.iter().map(|t| t.contract_id).collect::<Vec<_>>(),
            TRANSACTION_DATE => transactions.iter().map(|t| format_date(t.date)).collect::<Vec<_>>(),
            TRANSACTION_TYPE => transactions.iter().map(|t| t.transaction_type.clone()).collect::<Vec<_>>(),
            GROSS_AMOUNT => transactions.iter().map(|t| t.gross_amount).collect::<Vec<_>>(),
        }?;

        Ok(Self {
            attributes,
            contracts,
            performance,
            benchmark,
            transactions,
        })
    }
}

/// Normalized, read-only source tables for one run.
#[derive(Debug, Clone)]
pub struct SourceTables {
    attributes: DataFrame,
    contracts: DataFrame,
    performance: DataFrame,
    benchmark: DataFrame,
    transactions: DataFrame,
}

impl SourceTables {
    /// Normalize raw sources: sentinel substitution, date parsing,
    /// identifier checks, and attaching entity ids to transactions.
    ///
    /// Fails on unparseable dates and malformed identifiers; nothing
    /// downstream can run safely without them.
    pub fn normalize(raw: RawSources, sentinels: &DateSentinels) -> Result<Self> {
        for (kind, df) in [
            (SourceKind::Attributes, &raw.attributes),
            (SourceKind::Contracts, &raw.contracts),
            (SourceKind::Performance, &raw.performance),
            (SourceKind::Benchmark, &raw.benchmark),
            (SourceKind::Transactions, &raw.transactions),
        ] {
            require_columns(df, kind.raw_columns())?;
            debug!(source = %kind, rows = df.height(), "validated raw source");
        }

        let mut attributes = raw.attributes;
        let attribute_ids = id_column(&attributes, ENTITY_ID)?;
        attributes.with_column(attribute_ids)?;

        let c = &raw.contracts;
        let contracts = DataFrame::new(vec![
            id_column(c, ENTITY_ID)?,
            id_column(c, CONTRACT_ID)?,
            typed_column(c, STATUS, &DataType::Int64)?,
            day_column(c, OPEN_DATE, OPEN_DAY, Some(sentinels.missing_open), sentinels)?,
            day_column(c, CLOSE_DATE, CLOSE_DAY, Some(sentinels.open_contract_close), sentinels)?,
        ])?;

        let p = &raw.performance;
        let performance = DataFrame::new(vec![
            id_column(p, ENTITY_ID)?,
            day_column(p, PERIOD_START, PERIOD_START_DAY, None, sentinels)?,
            day_column(p, PERIOD_END, PERIOD_END_DAY, None, sentinels)?,
            typed_column(p, NET_PAID, &DataType::Float64)?,
            typed_column(p, RETURN_FRACTION, &DataType::Float64)?,
        ])?;

        let b = &raw.benchmark;
        let benchmark = DataFrame::new(vec![
            day_column(b, QUOTE_DATE, QUOTE_DAY, None, sentinels)?,
            typed_column(b, DAILY_RETURN, &DataType::Float64)?,
        ])?
        .lazy()
        .sort([QUOTE_DAY], SortMultipleOptions::default())
        .collect()?;

        let t = &raw.transactions;
        let booked = DataFrame::new(vec![
            id_column(t, CONTRACT_ID)?,
            day_column(t, TRANSACTION_DATE, TRANSACTION_DAY, None, sentinels)?,
            typed_column(t, TRANSACTION_TYPE, &DataType::String)?,
            typed_column(t, GROSS_AMOUNT, &DataType::Float64)?,
        ])?;
        let transactions = attach_entities(booked, &contracts)?;

        Ok(Self {
            attributes,
            contracts,
            performance,
            benchmark,
            transactions,
        })
    }

    /// Static attributes keyed by `entity_id`.
    pub const fn attributes(&self) -> &DataFrame {
        &self.attributes
    }

    /// Contracts with `open_day`/`close_day`.
    pub const fn contracts(&self) -> &DataFrame {
        &self.contracts
    }

    /// Performance periods with `period_start_day`/`period_end_day`.
    pub const fn performance(&self) -> &DataFrame {
        &self.performance
    }

    /// Benchmark series sorted by `quote_day`.
    pub const fn benchmark(&self) -> &DataFrame {
        &self.benchmark
    }

    /// Transactions with the owning `entity_id` attached.
    pub const fn transactions(&self) -> &DataFrame {
        &self.transactions
    }
}

/// Attach the owning entity to each transaction through its contract.
fn attach_entities(transactions: DataFrame, contracts: &DataFrame) -> Result<DataFrame> {
    let booked = transactions.height();
    let owners = contracts
        .clone()
        .lazy()
        .group_by([col(CONTRACT_ID)])
        .agg([col(ENTITY_ID).first()]);

    let joined = transactions
        .lazy()
        .join(
            owners,
            [col(CONTRACT_ID)],
            [col(CONTRACT_ID)],
            JoinArgs::new(JoinType::Inner),
        )
        .select([
            col(CONTRACT_ID),
            col(ENTITY_ID),
            col(TRANSACTION_DAY),
            col(TRANSACTION_TYPE),
            col(GROSS_AMOUNT),
        ])
        .collect()?;

    if joined.height() < booked {
        warn!(
            dropped = booked - joined.height(),
            "transactions reference unknown contracts"
        );
    }
    Ok(joined)
}
