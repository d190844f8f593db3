//! Education Ratio Module
//! Education level ratios per region and the region with the highest ratio.

use super::ratios::{RatioCalculator, RatioError, RatioSpec};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

pub const EDUCATION_RATIO: &str = "education_ratio";
pub const NO_CERTIFICATE_RATIO: &str = "no_certificate_ratio";
pub const SECONDARY_RATIO: &str = "secondary_ratio";
pub const POSTSECONDARY_RATIO: &str = "postsecondary_ratio";

pub const EDUCATION_RATIO_COLUMNS: [&str; 3] =
    [NO_CERTIFICATE_RATIO, SECONDARY_RATIO, POSTSECONDARY_RATIO];

/// Default region identifier column.
pub const DEFAULT_ID_COLUMN: &str = "DAUID";

/// Highest education ratio found across regions.
#[derive(Debug, Clone, PartialEq)]
pub struct EducationPeak {
    pub ratio: f64,
    /// `None` when the id cell is null.
    pub region_id: Option<String>,
    /// First column whose name contains the requested education column name.
    /// Informational only.
    pub education_level: String,
}

/// Highest-attainment count columns, each divided by `population`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EducationColumns {
    pub no_certificate: String,
    pub secondary: String,
    pub postsecondary: String,
    pub population: String,
}

impl EducationColumns {
    pub fn ratio_specs(&self) -> [RatioSpec<'_>; 3] {
        [
            RatioSpec::new(NO_CERTIFICATE_RATIO, &self.no_certificate, &self.population),
            RatioSpec::new(SECONDARY_RATIO, &self.secondary, &self.population),
            RatioSpec::new(POSTSECONDARY_RATIO, &self.postsecondary, &self.population),
        ]
    }
}

/// Finds education ratios and their maxima.
pub struct EducationRatioFinder;

impl EducationRatioFinder {
    /// Append the no-certificate, secondary and postsecondary ratios.
    pub fn calculate_education_ratios(
        df: &mut DataFrame,
        columns: &EducationColumns,
    ) -> Result<(), RatioError> {
        RatioCalculator::append_ratios(df, &columns.ratio_specs())
    }

    /// `highest_ratio_by` with the `DAUID` id column.
    pub fn highest_ratio(
        df: &mut DataFrame,
        population_col: &str,
        education_level_col: &str,
    ) -> Result<Option<EducationPeak>, RatioError> {
        Self::highest_ratio_by(df, DEFAULT_ID_COLUMN, population_col, education_level_col)
    }

    /// Write `education_ratio = education_level_col / population_col` and
    /// return the first region holding the maximum defined ratio.
    ///
    /// Returns `None` when no region has a defined ratio.
    pub fn highest_ratio_by(
        df: &mut DataFrame,
        id_col: &str,
        population_col: &str,
        education_level_col: &str,
    ) -> Result<Option<EducationPeak>, RatioError> {
        RatioCalculator::require_columns(df, [id_col, population_col, education_level_col])?;
        RatioCalculator::append_ratios(
            df,
            &[RatioSpec::new(EDUCATION_RATIO, education_level_col, population_col)],
        )?;

        let ratios = RatioCalculator::column_values(df, EDUCATION_RATIO)?;
        let best = ratios
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.map(|r| (i, r)))
            .fold(None, |best: Option<(usize, f64)>, (i, r)| match best {
                Some((_, b)) if b >= r => best,
                _ => Some((i, r)),
            });

        let Some((index, ratio)) = best else {
            log::warn!("No defined {EDUCATION_RATIO} values; all {population_col} are zero or missing");
            return Ok(None);
        };

        let region_id = format_region_id(df.column(id_col)?.get(index)?);

        let education_level = df
            .get_column_names()
            .iter()
            .find(|name| name.contains(education_level_col))
            .map(|name| name.to_string())
            .unwrap_or_else(|| education_level_col.to_string());

        Ok(Some(EducationPeak {
            ratio,
            region_id,
            education_level,
        }))
    }
}

/// Float ids print without a trailing `.0`, text ids without quotes.
fn format_region_id(value: AnyValue) -> Option<String> {
    match value {
        AnyValue::Null => None,
        AnyValue::String(s) => Some(s.to_string()),
        AnyValue::StringOwned(s) => Some(s.to_string()),
        AnyValue::Float64(f) => Some(f.to_string()),
        AnyValue::Float32(f) => Some(f.to_string()),
        other => Some(other.to_string().trim_matches('"').to_string()),
    }
}
