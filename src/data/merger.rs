//! Merger Module
//! Equality filtering and inner joins of census tables on a shared key.

use super::loader::{is_integer, is_numeric};
use crate::geo::GeoTable;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hidden column carrying each attribute row's geometry position through a join.
const GEOMETRY_ROW: &str = "__geometry_row";

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Column {0} not found in dataframe")]
    MissingColumn(String),
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

/// Value compared against a filter column.
///
/// Comparison is type-sensitive: a string never equals a number. Integers
/// and floats compare numerically against any numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Str(value.to_string())
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Int(value)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Float(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

fn require_column(df: &DataFrame, name: &str) -> Result<(), MergeError> {
    df.column(name)
        .map(|_| ())
        .map_err(|_| MergeError::MissingColumn(name.to_string()))
}

/// Handles filtering and joining of census tables.
pub struct Merger;

impl Merger {
    /// Row mask for `column == value`. Rows with a null cell, or a value of
    /// a different kind than the column, never match.
    pub fn equality_mask(
        df: &DataFrame,
        column: &str,
        value: &FilterValue,
    ) -> Result<BooleanChunked, MergeError> {
        require_column(df, column)?;
        let series = df.column(column)?;
        let dtype = series.dtype();

        let mask: BooleanChunked = match value {
            FilterValue::Str(s) if dtype == &DataType::String => series
                .str()?
                .into_iter()
                .map(|v| v == Some(s.as_str()))
                .collect(),
            FilterValue::Int(i) if is_integer(dtype) => series
                .cast(&DataType::Int64)?
                .i64()?
                .into_iter()
                .map(|v| v == Some(*i))
                .collect(),
            FilterValue::Int(i) if is_numeric(dtype) => series
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .map(|v| v == Some(*i as f64))
                .collect(),
            FilterValue::Float(f) if is_numeric(dtype) => series
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .map(|v| v == Some(*f))
                .collect(),
            FilterValue::Bool(b) if dtype == &DataType::Boolean => series
                .bool()?
                .into_iter()
                .map(|v| v == Some(*b))
                .collect(),
            _ => {
                log::warn!("Filter value {value:?} cannot match column {column} of type {dtype}");
                BooleanChunked::full("mask".into(), false, df.height())
            }
        };

        Ok(mask)
    }

    /// Keep only rows whose `column` equals `value`.
    pub fn filter_frame(
        df: &DataFrame,
        column: &str,
        value: &FilterValue,
    ) -> Result<DataFrame, MergeError> {
        let mask = Self::equality_mask(df, column, value)?;
        Ok(df.filter(&mask)?)
    }

    /// Inner-join `left` and `right` on `key`, optionally restricting `left`
    /// to rows where `filter.0 == filter.1` first.
    ///
    /// Keys of different types are compared as strings, or as numbers when
    /// both sides are numeric. Float keys holding only whole numbers are
    /// treated as integers first, so `2.0` matches `"2"`.
    pub fn merge_frames(
        left: &DataFrame,
        right: &DataFrame,
        key: &str,
        filter: Option<(&str, &FilterValue)>,
    ) -> Result<DataFrame, MergeError> {
        require_column(left, key)?;
        require_column(right, key)?;

        let left = match filter {
            Some((column, value)) => Self::filter_frame(left, column, value)?,
            None => left.clone(),
        };

        let left_type = left.column(key)?.dtype().clone();
        let right_type = right.column(key)?.dtype().clone();
        let both_nonempty = left.height() > 0 && right.height() > 0;
        let key_types = if left_type != right_type {
            Some((key_type(&left, key)?, key_type(right, key)?))
        } else {
            None
        };

        let mut left_lf = left.lazy();
        let mut right_lf = right.clone().lazy();
        if let Some((left_key, right_key)) = key_types {
            let common = common_key_type(&left_key, &right_key);
            log::warn!("Join key {key} has types {left_type} and {right_type}, comparing as {common}");
            left_lf = left_lf.with_column(col(key).cast(left_key).cast(common.clone()));
            right_lf = right_lf.with_column(col(key).cast(right_key).cast(common));
        }

        let merged = left_lf
            .join(
                right_lf,
                [col(key)],
                [col(key)],
                JoinArgs::new(JoinType::Inner),
            )
            .collect()?;

        if merged.height() == 0 && both_nonempty {
            log::warn!("Join on {key} matched no rows");
        } else {
            log::debug!("Merged on {key}: {} rows", merged.height());
        }
        Ok(merged)
    }

    /// Join a geometry table with a census table. The result keeps the
    /// geometry of every matched region.
    pub fn merge_geo(
        geo: &GeoTable,
        data: &DataFrame,
        key: &str,
        filter: Option<(&str, &FilterValue)>,
    ) -> Result<GeoTable, MergeError> {
        let mut attributes = geo.attributes.clone();
        let rows: Vec<u64> = (0..attributes.height() as u64).collect();
        attributes.with_column(Column::new(GEOMETRY_ROW.into(), rows))?;

        let merged = Self::merge_frames(&attributes, data, key, filter)?;

        let indices: Vec<usize> = merged
            .column(GEOMETRY_ROW)?
            .u64()?
            .into_iter()
            .map(|i| i.unwrap_or_default() as usize)
            .collect();
        let geometries = geo.take_geometries(indices);
        let merged = merged.drop(GEOMETRY_ROW)?;

        log::info!(
            "Joined {} of {} regions with {} data rows on {key}",
            merged.height(),
            geo.height(),
            data.height()
        );
        Ok(GeoTable::new(merged, geometries, geo.crs.clone()))
    }
}

/// Key type used for comparison: `Int64` for float keys with no fraction.
fn key_type(df: &DataFrame, key: &str) -> Result<DataType, MergeError> {
    let column = df.column(key)?;
    let dtype = column.dtype();
    if !matches!(dtype, DataType::Float32 | DataType::Float64) {
        return Ok(dtype.clone());
    }
    let whole = column
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .flatten()
        .all(|v| v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64);
    Ok(if whole { DataType::Int64 } else { dtype.clone() })
}

fn common_key_type(left: &DataType, right: &DataType) -> DataType {
    if left == right {
        left.clone()
    } else if is_integer(left) && is_integer(right) {
        DataType::Int64
    } else if is_numeric(left) && is_numeric(right) {
        DataType::Float64
    } else {
        DataType::String
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regions() -> DataFrame {
        df! {
            "DAUID" => [1i64, 2, 3, 4],
            "PRNAME" => ["Quebec", "Ontario", "Quebec", "Quebec"],
        }
        .unwrap()
    }

    fn census() -> DataFrame {
        df! {
            "DAUID" => [2i64, 3, 4, 5],
            "pop_total" => [100i64, 200, 300, 400],
        }
        .unwrap()
    }

    fn keys(df: &DataFrame) -> Vec<i64> {
        let mut keys: Vec<i64> = df
            .column("DAUID")
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        keys.sort();
        keys
    }

    #[test]
    fn inner_join_drops_unmatched_keys() {
        let merged = Merger::merge_frames(&regions(), &census(), "DAUID", None).unwrap();
        assert_eq!(keys(&merged), vec![2, 3, 4]);
        assert!(merged.column("PRNAME").is_ok());
        assert!(merged.column("pop_total").is_ok());
    }

    #[test]
    fn filter_applies_before_join() {
        let quebec = FilterValue::from("Quebec");
        let merged =
            Merger::merge_frames(&regions(), &census(), "DAUID", Some(("PRNAME", &quebec)))
                .unwrap();
        assert_eq!(keys(&merged), vec![3, 4]);
    }

    #[test]
    fn filter_then_merge_matches_merge_then_filter() {
        let quebec = FilterValue::from("Quebec");
        let filtered_first =
            Merger::merge_frames(&regions(), &census(), "DAUID", Some(("PRNAME", &quebec)))
                .unwrap();
        let merged = Merger::merge_frames(&regions(), &census(), "DAUID", None).unwrap();
        let filtered_after = Merger::filter_frame(&merged, "PRNAME", &quebec).unwrap();
        assert_eq!(keys(&filtered_first), keys(&filtered_after));
    }

    #[test]
    fn filter_is_type_sensitive() {
        let df = df! { "code" => ["1", "2"] }.unwrap();
        let by_int = Merger::filter_frame(&df, "code", &FilterValue::Int(1)).unwrap();
        assert_eq!(by_int.height(), 0);
        let by_str = Merger::filter_frame(&df, "code", &FilterValue::from("1")).unwrap();
        assert_eq!(by_str.height(), 1);

        let numbers = df! { "n" => [1.0f64, 2.0] }.unwrap();
        let by_int = Merger::filter_frame(&numbers, "n", &FilterValue::Int(2)).unwrap();
        assert_eq!(by_int.height(), 1);
    }

    #[test]
    fn missing_key_or_filter_column_fails() {
        let err = Merger::merge_frames(&regions(), &census(), "GEOUID", None).unwrap_err();
        assert!(matches!(err, MergeError::MissingColumn(c) if c == "GEOUID"));

        let value = FilterValue::from("x");
        let err = Merger::merge_frames(&regions(), &census(), "DAUID", Some(("CDNAME", &value)))
            .unwrap_err();
        assert!(matches!(err, MergeError::MissingColumn(c) if c == "CDNAME"));
    }

    #[test]
    fn string_and_integer_keys_join() {
        let geo_side = df! { "DAUID" => ["2", "9"], "AREA" => [1.0f64, 2.0] }.unwrap();
        let merged = Merger::merge_frames(&geo_side, &census(), "DAUID", None).unwrap();
        assert_eq!(merged.height(), 1);
        assert_eq!(merged.column("DAUID").unwrap().str().unwrap().get(0), Some("2"));
    }

    #[test]
    fn whole_float_keys_join_string_keys() {
        let float_side = df! { "DAUID" => [2.0f64, 3.0], "AREA" => [1.0f64, 2.0] }.unwrap();
        let text_side = df! { "DAUID" => ["2", "3"], "pop_total" => [10i64, 20] }.unwrap();

        let merged = Merger::merge_frames(&float_side, &text_side, "DAUID", None).unwrap();

        assert_eq!(merged.height(), 2);
        let mut ids: Vec<String> = merged
            .column("DAUID")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .flatten()
            .map(str::to_string)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["2", "3"]);
    }

    #[test]
    fn fractional_float_keys_stay_numeric() {
        let float_side = df! { "DAUID" => [2.0f64, 2.5] }.unwrap();

        let merged = Merger::merge_frames(&float_side, &census(), "DAUID", None).unwrap();

        assert_eq!(merged.height(), 1);
        assert_eq!(merged.column("DAUID").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn filter_value_deserializes_by_kind() {
        let values: Vec<FilterValue> = serde_json::from_str(r#"[true, 24, 2.5, "Quebec"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                FilterValue::Bool(true),
                FilterValue::Int(24),
                FilterValue::Float(2.5),
                FilterValue::Str("Quebec".into()),
            ]
        );
    }
}
