//! Outcome label.

use crate::{FeatureError, Result, blocks::ACTIVE_CONTRACTS_CURRENT, sources::require_columns};
use derive_more::Display;
use polars::prelude::*;

/// Name of the label column.
pub const LABEL: &str = "label";

/// Whether an entity has left.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChurnLabel {
    /// No active contract left
    #[display("CHURN")]
    Churn,
    /// At least one active contract
    #[display("NO-CHURN")]
    NoChurn,
}

impl ChurnLabel {
    /// Label for the current number of active contracts.
    pub const fn from_active_count(active: i64) -> Self {
        if active == 0 { Self::Churn } else { Self::NoChurn }
    }
}

/// Add the `label` column as the first column.
///
/// Every row needs a current active-contract count; a null is an error.
pub fn add_label(df: DataFrame) -> Result<DataFrame> {
    require_columns(&df, &[ACTIVE_CONTRACTS_CURRENT])?;
    let active = df.column(ACTIVE_CONTRACTS_CURRENT)?.cast(&DataType::Int64)?;
    let labels = active
        .i64()?
        .into_iter()
        .map(|count| {
            count
                .map(|n| ChurnLabel::from_active_count(n).to_string())
                .ok_or_else(|| FeatureError::NullValue(ACTIVE_CONTRACTS_CURRENT.to_string()))
        })
        .collect::<Result<Vec<String>>>()?;

    let mut columns = vec![Column::new(LABEL.into(), labels)];
    columns.extend(df.get_columns().iter().cloned());
    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, ChurnLabel::Churn)]
    #[case(1, ChurnLabel::NoChurn)]
    #[case(5, ChurnLabel::NoChurn)]
    #[case(100, ChurnLabel::NoChurn)]
    fn test_from_active_count(#[case] active: i64, #[case] expected: ChurnLabel) {
        assert_eq!(ChurnLabel::from_active_count(active), expected);
    }

    #[test]
    fn test_display() {
        assert_eq!(ChurnLabel::Churn.to_string(), "CHURN");
        assert_eq!(ChurnLabel::NoChurn.to_string(), "NO-CHURN");
    }

    #[test]
    fn test_add_label_first() {
        let df = df! {
            "entity_id" => [1i64, 2, 3],
            ACTIVE_CONTRACTS_CURRENT => [0i64, 1, 7],
        }
        .unwrap();
        let result = add_label(df).unwrap();
        assert_eq!(result.get_column_names()[0].as_str(), LABEL);

        let labels: Vec<&str> = result
            .column(LABEL)
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(labels, vec!["CHURN", "NO-CHURN", "NO-CHURN"]);
    }

    #[test]
    fn test_null_count_is_rejected() {
        let df = df! {
            "entity_id" => [1i64, 2],
            ACTIVE_CONTRACTS_CURRENT => [Some(1i64), None],
        }
        .unwrap();
        let err = add_label(df).unwrap_err();
        assert!(matches!(err, FeatureError::NullValue(ref c) if c == ACTIVE_CONTRACTS_CURRENT));
    }

    #[test]
    fn test_add_label_requires_current_count() {
        let df = df! { "entity_id" => [1i64] }.unwrap();
        assert!(add_label(df).is_err());
    }
}
