//! Census Data Loader Module
//! Loads region geometry and CSV census tables using Polars, fills missing
//! values and applies the optional header mapping.

use super::header::HeaderMapping;
use crate::geo::{GeoError, GeoTable, GeometryReader};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("Failed to load CSV: {0}")]
    CsvError(#[from] PolarsError),
    #[error("Failed to load geometry: {0}")]
    GeometryError(#[from] GeoError),
    #[error("Malformed header line {line}: {content:?}")]
    MalformedHeader { line: usize, content: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Input files and cleaning options for one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadOptions {
    pub shp_path: PathBuf,
    pub data_path: PathBuf,
    #[serde(default)]
    pub header_path: Option<PathBuf>,
    #[serde(default)]
    pub split_char: Option<String>,
    #[serde(default)]
    pub fillna_val: Option<f64>,
}

impl LoadOptions {
    pub fn new(shp_path: impl Into<PathBuf>, data_path: impl Into<PathBuf>) -> Self {
        Self {
            shp_path: shp_path.into(),
            data_path: data_path.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, header_path: impl Into<PathBuf>, split_char: &str) -> Self {
        self.header_path = Some(header_path.into());
        self.split_char = Some(split_char.to_string());
        self
    }

    pub fn with_fill_value(mut self, value: f64) -> Self {
        self.fillna_val = Some(value);
        self
    }
}

/// Loads geometry and census tables.
pub struct DataLoader;

impl DataLoader {
    /// Load the geometry and data files described by `options`.
    ///
    /// Missing cells are filled before the header mapping is applied, and the
    /// mapping is only read when both a header path and a non-empty separator
    /// are given.
    /// Column existence is not checked here.
    pub fn read_data(options: &LoadOptions) -> Result<(GeoTable, DataFrame), LoaderError> {
        let geo = Self::load_geometry(&options.shp_path)?;
        let mut data = Self::load_csv(&options.data_path)?;

        if let Some(value) = options.fillna_val {
            data = Self::fill_missing(data, value)?;
        }

        let split_char = options.split_char.as_deref().filter(|s| !s.is_empty());
        if let (Some(header_path), Some(split_char)) = (&options.header_path, split_char) {
            let mapping = HeaderMapping::from_path(header_path, split_char)?;
            let renamed = mapping.apply(&mut data)?;
            log::info!(
                "Applied header mapping from {}: {} of {} entries matched",
                header_path.display(),
                renamed,
                mapping.len()
            );
        }

        Ok((geo, data))
    }

    pub fn load_geometry(path: &Path) -> Result<GeoTable, LoaderError> {
        if !path.exists() {
            return Err(LoaderError::FileNotFound(path.to_path_buf()));
        }
        let geo = GeometryReader::read(path)?;
        log::info!("Loaded {} regions from {}", geo.height(), path.display());
        Ok(geo)
    }

    /// Load a comma-separated file with a header row.
    pub fn load_csv(path: &Path) -> Result<DataFrame, LoaderError> {
        if !path.exists() {
            return Err(LoaderError::FileNotFound(path.to_path_buf()));
        }

        let df = LazyCsvReader::new(path)
            .with_has_header(true)
            .with_infer_schema_length(Some(10000))
            .finish()?
            .collect()?;

        log::info!(
            "Loaded {} rows x {} columns from {}",
            df.height(),
            df.width(),
            path.display()
        );
        Ok(df)
    }

    /// Replace nulls with `value`: numeric columns take the number, string
    /// columns take its decimal text. Other column types are left untouched.
    pub fn fill_missing(df: DataFrame, value: f64) -> Result<DataFrame, LoaderError> {
        let numeric = Self::get_numeric_columns(&df);

        let fills: Vec<Expr> = df
            .get_columns()
            .iter()
            .filter(|c| c.null_count() > 0)
            .filter_map(|c| {
                let name = c.name().to_string();
                if numeric.contains(&name) {
                    Some(col(name.as_str()).fill_null(lit(value)))
                } else if c.dtype() == &DataType::String {
                    Some(col(name.as_str()).fill_null(lit(fill_text(value))))
                } else {
                    None
                }
            })
            .collect();

        if fills.is_empty() {
            return Ok(df);
        }

        log::debug!("Filling nulls in {} columns with {value}", fills.len());
        Ok(df.lazy().with_columns(fills).collect()?)
    }

    /// Get list of numeric column names.
    pub fn get_numeric_columns(df: &DataFrame) -> Vec<String> {
        df.get_columns()
            .iter()
            .filter(|col| is_numeric(col.dtype()))
            .map(|col| col.name().to_string())
            .collect()
    }
}

pub(crate) fn is_numeric(dtype: &DataType) -> bool {
    is_integer(dtype) || matches!(dtype, DataType::Float32 | DataType::Float64)
}

pub(crate) fn is_integer(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

/// `0.0`, `1.5`: the same text a float cell would print.
fn fill_text(value: f64) -> String {
    format!("{value:?}")
}
