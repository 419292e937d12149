//! Data Processor Module
//! Column classification, row cleaning and typed column extraction.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::collections::HashMap;
use thiserror::Error;

/// A column with exactly this name is the time index for the line chart.
pub const DATE_COLUMN: &str = "date";

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Column '{column}' value '{value}' is not a date")]
    DateCoercion { column: String, value: String },
}

/// Partition of the dataset's column names, computed once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnClassification {
    /// Integer and floating point columns, in column order
    pub numeric: Vec<String>,
    /// Text, categorical and boolean columns, in column order
    pub categorical: Vec<String>,
    /// The `date` column, whatever its inferred dtype
    pub date: Option<String>,
}

/// Handles column classification and extraction.
pub struct DataProcessor;

impl DataProcessor {
    /// Split column names into numeric and categorical lists.
    ///
    /// The `date` column is pulled out as the time index and excluded from
    /// both lists. Other temporal columns count as categorical; nested
    /// columns are ignored.
    pub fn classify(df: &DataFrame) -> ColumnClassification {
        let mut classes = ColumnClassification::default();

        for column in df.get_columns() {
            let name = column.name().to_string();
            if name == DATE_COLUMN {
                classes.date = Some(name);
                continue;
            }

            if Self::is_numeric(column.dtype()) {
                classes.numeric.push(name);
            } else if Self::is_categorical(column.dtype()) {
                classes.categorical.push(name);
            }
        }

        classes
    }

    fn is_numeric(dtype: &DataType) -> bool {
        matches!(
            dtype,
            DataType::Float32
                | DataType::Float64
                | DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
        )
    }

    fn is_categorical(dtype: &DataType) -> bool {
        matches!(
            dtype,
            DataType::String
                | DataType::Boolean
                | DataType::Categorical(..)
                | DataType::Enum(..)
                | DataType::Date
                | DataType::Datetime(..)
                | DataType::Time
        )
    }

    /// Drop rows with a missing value in any of the given numeric columns.
    ///
    /// A NaN in a float column counts as missing, like a null.
    pub fn drop_incomplete_rows(
        df: &DataFrame,
        numeric: &[String],
    ) -> Result<DataFrame, ProcessorError> {
        let mut predicate: Option<Expr> = None;
        for name in numeric {
            let mut present = col(name.as_str()).is_not_null();
            if df.column(name)?.dtype().is_float() {
                present = present.and(col(name.as_str()).is_not_nan());
            }
            predicate = Some(match predicate {
                Some(acc) => acc.and(present),
                None => present,
            });
        }

        match predicate {
            Some(predicate) => Ok(df.clone().lazy().filter(predicate).collect()?),
            None => Ok(df.clone()),
        }
    }

    /// Finite values of a numeric column.
    pub fn numeric_values(df: &DataFrame, column: &str) -> Result<Vec<f64>, ProcessorError> {
        let values = df.column(column)?.cast(&DataType::Float64)?;
        let values = values
            .f64()?
            .into_iter()
            .flatten()
            .filter(|v| v.is_finite())
            .collect();
        Ok(values)
    }

    /// Per-row values of a numeric column; nulls and non-finite values are `None`.
    pub fn optional_values(
        df: &DataFrame,
        column: &str,
    ) -> Result<Vec<Option<f64>>, ProcessorError> {
        let cast = df.column(column)?.cast(&DataType::Float64)?;
        let values = cast
            .f64()?
            .into_iter()
            .map(|v| v.filter(|v| v.is_finite()))
            .collect();
        Ok(values)
    }

    /// Row-aligned values of several numeric columns.
    ///
    /// Only rows where every column holds a finite value are kept, so all
    /// returned vectors have the same length.
    pub fn aligned_values(
        df: &DataFrame,
        columns: &[String],
    ) -> Result<Vec<Vec<f64>>, ProcessorError> {
        let raw = columns
            .iter()
            .map(|name| Self::optional_values(df, name))
            .collect::<Result<Vec<_>, _>>()?;

        let mut aligned = vec![Vec::new(); columns.len()];
        for row in 0..df.height() {
            let complete: Option<Vec<f64>> = raw
                .iter()
                .map(|series| series[row])
                .collect();
            if let Some(values) = complete {
                for (out, v) in aligned.iter_mut().zip(values) {
                    out.push(v);
                }
            }
        }

        Ok(aligned)
    }

    /// Occurrence count per distinct non-null value, most frequent first.
    pub fn category_counts(
        df: &DataFrame,
        column: &str,
    ) -> Result<Vec<(String, usize)>, ProcessorError> {
        let text = df.column(column)?.cast(&DataType::String)?;
        let mut counts: HashMap<String, usize> = HashMap::new();
        for value in text.str()?.into_iter().flatten() {
            *counts.entry(value.to_string()).or_default() += 1;
        }

        let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(counts)
    }

    /// Coerce a column to timestamps. Nulls stay `None`; any other value that
    /// does not parse as a date or date-time is an error.
    pub fn date_values(
        df: &DataFrame,
        column: &str,
    ) -> Result<Vec<Option<NaiveDateTime>>, ProcessorError> {
        let text = df.column(column)?.cast(&DataType::String)?;
        text.str()?
            .into_iter()
            .map(|value| match value {
                None => Ok(None),
                Some(raw) => parse_timestamp(raw)
                    .map(Some)
                    .ok_or_else(|| ProcessorError::DateCoercion {
                        column: column.to_string(),
                        value: raw.to_string(),
                    }),
            })
            .collect()
    }
}

/// Parse a date or date-time in one of the accepted layouts.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn sample() -> DataFrame {
        df!(
            "age" => [Some(31i64), None, Some(27), Some(45)],
            "score" => [1.5f64, 2.5, 3.5, f64::NAN],
            "city" => ["Paris", "Lyon", "Paris", "Nice"],
            "member" => [true, false, true, true],
            "date" => ["2024-01-01", "2024-01-02", "2024-01-03", "2024-01-04"]
        )
        .unwrap()
    }

    #[test]
    fn classify_partitions_columns_in_order() {
        let classes = DataProcessor::classify(&sample());
        assert_eq!(classes.numeric, vec!["age", "score"]);
        assert_eq!(classes.categorical, vec!["city", "member"]);
        assert_eq!(classes.date.as_deref(), Some("date"));
        assert!(classes.date.is_some());
    }

    #[test]
    fn date_column_is_excluded_even_when_numeric() {
        let df = df!("date" => [2020i64, 2021], "x" => [1.0f64, 2.0]).unwrap();
        let classes = DataProcessor::classify(&df);
        assert_eq!(classes.numeric, vec!["x"]);
        assert!(classes.categorical.is_empty());
        assert!(classes.date.is_some());
    }

    #[test]
    fn drops_rows_missing_numeric_values() {
        let df = sample();
        let cleaned =
            DataProcessor::drop_incomplete_rows(&df, &["age".into(), "score".into()]).unwrap();
        assert_eq!(cleaned.height(), 2);
        assert_eq!(
            DataProcessor::numeric_values(&cleaned, "age").unwrap(),
            vec![31.0, 27.0]
        );

        let untouched = DataProcessor::drop_incomplete_rows(&df, &[]).unwrap();
        assert_eq!(untouched.height(), 4);
    }

    #[test]
    fn nan_cells_in_a_loaded_csv_drop_the_whole_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nan.csv");
        std::fs::write(&path, "a,b,city\n1,NaN,x\n2,3,y\n100,4,y\n").unwrap();

        let mut loader = crate::data::DataLoader::new();
        let df = loader.load_csv(&path).unwrap().clone();
        let classes = DataProcessor::classify(&df);
        assert_eq!(classes.numeric, vec!["a", "b"]);

        let cleaned = DataProcessor::drop_incomplete_rows(&df, &classes.numeric).unwrap();
        assert_eq!(cleaned.height(), 2);
        assert_eq!(
            DataProcessor::numeric_values(&cleaned, "a").unwrap(),
            vec![2.0, 100.0]
        );
        assert_eq!(
            DataProcessor::category_counts(&cleaned, "city").unwrap(),
            vec![("y".to_string(), 2)]
        );
    }

    #[test]
    fn temporal_columns_other_than_date_are_categorical() {
        let df = df!("when" => [19723i32, 19724], "v" => [1i64, 2], "label" => ["a", "b"])
            .unwrap()
            .lazy()
            .with_column(col("when").cast(DataType::Date))
            .collect()
            .unwrap();
        assert_eq!(df.column("when").unwrap().dtype(), &DataType::Date);

        let classes = DataProcessor::classify(&df);
        assert_eq!(classes.numeric, vec!["v"]);
        assert_eq!(classes.categorical, vec!["when", "label"]);
        assert!(classes.date.is_none());

        let counts = DataProcessor::category_counts(&df, "when").unwrap();
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn numeric_values_skip_nulls_and_nan() {
        let df = sample();
        assert_eq!(
            DataProcessor::numeric_values(&df, "age").unwrap(),
            vec![31.0, 27.0, 45.0]
        );
        assert_eq!(
            DataProcessor::numeric_values(&df, "score").unwrap(),
            vec![1.5, 2.5, 3.5]
        );
    }

    #[test]
    fn aligned_values_keep_complete_rows_only() {
        let df = sample();
        let aligned = DataProcessor::aligned_values(&df, &["age".into(), "score".into()]).unwrap();
        assert_eq!(aligned[0], vec![31.0, 27.0]);
        assert_eq!(aligned[1], vec![1.5, 3.5]);
    }

    #[test]
    fn category_counts_sorted_by_frequency_then_label() {
        let counts = DataProcessor::category_counts(&sample(), "city").unwrap();
        assert_eq!(
            counts,
            vec![
                ("Paris".to_string(), 2),
                ("Lyon".to_string(), 1),
                ("Nice".to_string(), 1)
            ]
        );
    }

    #[test]
    fn date_values_parse_and_reject() {
        let dates = DataProcessor::date_values(&sample(), "date").unwrap();
        assert_eq!(dates.len(), 4);
        assert_eq!(
            dates[0],
            NaiveDate::from_ymd_opt(2024, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
        );

        let bad = df!("date" => ["2024-01-01", "yesterday"]).unwrap();
        let err = DataProcessor::date_values(&bad, "date").unwrap_err();
        assert!(matches!(err, ProcessorError::DateCoercion { ref value, .. } if value == "yesterday"));
    }

    #[test]
    fn parse_timestamp_accepts_common_layouts() {
        assert!(parse_timestamp("2024-03-05").is_some());
        assert!(parse_timestamp("2024/03/05").is_some());
        assert!(parse_timestamp("03/05/2024").is_some());
        assert!(parse_timestamp("2024-03-05 10:30:00").is_some());
        assert!(parse_timestamp("2024-03-05T10:30:00.250").is_some());
        assert!(parse_timestamp("2024-03-05T10:30:00Z").is_some());
        assert!(parse_timestamp("2024").is_none());
        assert!(parse_timestamp("").is_none());
    }
}
