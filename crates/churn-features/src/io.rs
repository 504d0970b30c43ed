//! Delimited-file ingestion and matrix persistence.
//!
//! The reference data comes as five files with the source system's own
//! column names. Each is scanned lazily, checked against its expected header
//! and projected onto the canonical column names of [`RawSources`]. The one
//! categorical attribute is one-hot expanded here, so everything downstream
//! only sees numeric attributes.

use crate::{
    FeatureError, Result,
    sources::{
        CLOSE_DATE, CONTRACT_ID, DAILY_RETURN, ENTITY_ID, GROSS_AMOUNT, NET_PAID, OPEN_DATE,
        PERIOD_END, PERIOD_START, QUOTE_DATE, RETURN_FRACTION, RawSources, STATUS,
        TRANSACTION_DATE, TRANSACTION_TYPE,
    },
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// Default location of the written matrix.
pub const DEFAULT_OUTPUT: &str = "data/clients_dataset.csv";

/// Canonical name of the categorical attribute before expansion.
pub const SEGMENT: &str = "segment";

/// One input file: name, separator and `(source column, canonical column)`
/// pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// File name inside the data directory
    pub file_name: String,
    /// Field separator
    pub separator: u8,
    /// Source column names mapped to canonical names
    pub columns: Vec<(String, String)>,
}

impl SourceFile {
    fn new(file_name: &str, separator: u8, columns: &[(&str, &str)]) -> Self {
        Self {
            file_name: file_name.to_string(),
            separator,
            columns: columns
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }

    /// Read the file from `dir` with canonical column names.
    pub fn read(&self, dir: &Path) -> Result<DataFrame> {
        let path = dir.join(&self.file_name);
        if !path.is_file() {
            return Err(FeatureError::NotFound(path.display().to_string()));
        }

        let mut frame = LazyCsvReader::new(&path)
            .with_has_header(true)
            .with_separator(self.separator)
            .with_infer_schema_length(Some(10_000))
            .finish()?;

        let schema = frame.collect_schema()?;
        if let Some((missing, _)) = self.columns.iter().find(|(from, _)| !schema.contains(from)) {
            return Err(FeatureError::MissingColumn(format!(
                "{missing} in {}",
                self.file_name
            )));
        }

        let df = frame
            .select(
                self.columns
                    .iter()
                    .map(|(from, to)| col(from.as_str()).alias(to.as_str()))
                    .collect::<Vec<_>>(),
            )
            .collect()?;
        debug!(file = %self.file_name, rows = df.height(), "read source file");
        Ok(df)
    }
}

/// Layout of the five input files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFiles {
    /// Static attributes (`entity_id`, `segment`)
    pub attributes: SourceFile,
    /// Contract history
    pub contracts: SourceFile,
    /// Advisory performance periods
    pub performance: SourceFile,
    /// Market benchmark daily returns
    pub benchmark: SourceFile,
    /// Transactions
    pub transactions: SourceFile,
}

impl Default for SourceFiles {
    fn default() -> Self {
        Self {
            attributes: SourceFile::new(
                "Clients.csv",
                b'\t',
                &[("ID_CLIENTE", ENTITY_ID), ("PSC", SEGMENT)],
            ),
            contracts: SourceFile::new(
                "Contracts.csv",
                b'\t',
                &[
                    ("CLIENTE", ENTITY_ID),
                    ("ID", CONTRACT_ID),
                    ("STATO", STATUS),
                    ("DATA_APERTURA", OPEN_DATE),
                    ("DATA_CHIUSURA", CLOSE_DATE),
                ],
            ),
            performance: SourceFile::new(
                "AdvisoryPerformance.csv",
                b'\t',
                &[
                    ("ID_CLIENTE", ENTITY_ID),
                    ("DT_INIZIO_PERIODO", PERIOD_START),
                    ("DT_FINE_PERIODO", PERIOD_END),
                    ("VERSATO_NETTO", NET_PAID),
                    ("RENDIMENTO", RETURN_FRACTION),
                ],
            ),
            benchmark: SourceFile::new(
                "MarketPerformance.csv",
                b'\t',
                &[("DATA", QUOTE_DATE), ("REND_GIORN", DAILY_RETURN)],
            ),
            transactions: SourceFile::new(
                "Transactions.csv",
                b',',
                &[
                    ("ID_CONTRATTO", CONTRACT_ID),
                    ("DATA_CONTABILE", TRANSACTION_DATE),
                    ("NOME", TRANSACTION_TYPE),
                    ("IMP_LORDO", GROSS_AMOUNT),
                ],
            ),
        }
    }
}

impl SourceFiles {
    /// Read every source from `dir`, one-hot expanding the segment attribute.
    pub fn load(&self, dir: impl AsRef<Path>) -> Result<RawSources> {
        let dir = dir.as_ref();
        let attributes = self.attributes.read(dir)?;
        let attributes = if attributes.schema().contains(SEGMENT) {
            one_hot(&attributes, SEGMENT)?
        } else {
            attributes
        };

        let raw = RawSources {
            attributes,
            contracts: self.contracts.read(dir)?,
            performance: self.performance.read(dir)?,
            benchmark: self.benchmark.read(dir)?,
            transactions: self.transactions.read(dir)?,
        };
        info!(
            dir = %dir.display(),
            entities = raw.attributes.height(),
            contracts = raw.contracts.height(),
            periods = raw.performance.height(),
            quotes = raw.benchmark.height(),
            transactions = raw.transactions.height(),
            "loaded sources"
        );
        Ok(raw)
    }
}

/// Read the default file layout from `dir`.
pub fn load_sources(dir: impl AsRef<Path>) -> Result<RawSources> {
    SourceFiles::default().load(dir)
}

/// Replace categorical `column` with one `Int32` indicator column per
/// distinct value, named `<column>_<value>` and ordered by value. Nulls get
/// no indicator.
pub fn one_hot(df: &DataFrame, column: &str) -> Result<DataFrame> {
    let values = df.column(column)?.cast(&DataType::String)?;
    let mut levels: Vec<String> = values
        .str()?
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect();
    levels.sort();
    levels.dedup();

    let mut selected: Vec<Expr> = df
        .get_column_names()
        .into_iter()
        .filter(|name| name.as_str() != column)
        .map(|name| col(name.clone()))
        .collect();
    selected.extend(levels.iter().map(|level| {
        when(col(column).cast(DataType::String).eq(lit(level.as_str())))
            .then(lit(1i32))
            .otherwise(lit(0i32))
            .alias(format!("{column}_{level}"))
    }));

    Ok(df.clone().lazy().select(selected).collect()?)
}

/// Write the feature matrix as comma-separated CSV with a header, creating
/// the parent directory if needed.
pub fn write_matrix(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(&path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(df)?;
    info!(path = %path.display(), rows = df.height(), columns = df.width(), "wrote feature matrix");
    Ok(path)
}
