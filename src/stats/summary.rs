//! Ratio Summary Module
//! Descriptive statistics over derived ratio columns, computed across
//! columns in parallel.

use super::ratios::{RatioCalculator, RatioError};
use polars::prelude::*;
use rayon::prelude::*;
use statrs::statistics::{Data, Distribution, Max, Min, OrderStatistics};
use std::collections::HashMap;

/// Statistics for a single ratio column. Undefined cells are counted but
/// excluded from every statistic.
#[derive(Debug, Clone, PartialEq)]
pub struct RatioSummary {
    pub column: String,
    pub count: usize,
    pub undefined: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub p05: Option<f64>,
    pub p95: Option<f64>,
}

impl RatioSummary {
    fn empty(column: &str, undefined: usize) -> Self {
        Self {
            column: column.to_string(),
            count: 0,
            undefined,
            mean: None,
            median: None,
            std: None,
            min: None,
            max: None,
            p05: None,
            p95: None,
        }
    }
}

/// Handles summary statistics with multi-threading support.
pub struct RatioSummarizer;

impl RatioSummarizer {
    /// Summarize the defined values of a ratio column.
    pub fn compute_summary(column: &str, values: &[Option<f64>]) -> RatioSummary {
        let defined: Vec<f64> = values.iter().flatten().copied().collect();
        let undefined = values.len() - defined.len();
        if defined.is_empty() {
            return RatioSummary::empty(column, undefined);
        }

        let count = defined.len();
        let mut data = Data::new(defined);

        RatioSummary {
            column: column.to_string(),
            count,
            undefined,
            mean: data.mean(),
            median: Some(data.median()),
            std: if count > 1 { data.std_dev() } else { Some(0.0) },
            min: Some(data.min()),
            max: Some(data.max()),
            p05: Some(data.percentile(5)),
            p95: Some(data.percentile(95)),
        }
    }

    pub fn summarize_column(df: &DataFrame, column: &str) -> Result<RatioSummary, RatioError> {
        let values = RatioCalculator::column_values(df, column)?;
        Ok(Self::compute_summary(column, &values))
    }

    /// Summaries for every listed column, keyed by column name.
    pub fn summarize_all(
        df: &DataFrame,
        columns: &[String],
    ) -> Result<HashMap<String, RatioSummary>, RatioError> {
        columns
            .par_iter()
            .map(|column| -> Result<(String, RatioSummary), RatioError> {
                let summary = Self::summarize_column(df, column)?;
                Ok((column.clone(), summary))
            })
            .collect()
    }
}
