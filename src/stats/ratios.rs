//! Ratio Calculator Module
//! Derives ratio columns (numerator / denominator) from census count columns.
//! A zero or missing denominator leaves the cell null.

use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const RATIO_ENG: &str = "ratio_eng";
pub const RATIO_FRE: &str = "ratio_fre";
pub const RATIO_BOTH: &str = "ratio_both";
pub const RATIO_NONE: &str = "ratio_none";
pub const RATIO_MOTHER_OFF: &str = "ratio_mother_off";
pub const RATIO_MOTHER_UNOFF: &str = "ratio_mother_unoff";
pub const AGE_DEPENDENCY_RATIO: &str = "age_dependency_ratio";

/// Output columns of the language ratio calculation, in write order.
pub const LANGUAGE_RATIO_COLUMNS: [&str; 6] = [
    RATIO_ENG,
    RATIO_FRE,
    RATIO_BOTH,
    RATIO_NONE,
    RATIO_MOTHER_OFF,
    RATIO_MOTHER_UNOFF,
];

#[derive(Error, Debug)]
pub enum RatioError {
    #[error("Column name {0} not found in dataframe")]
    MissingColumn(String),
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

/// One derived column: `output = numerator / denominator`.
#[derive(Debug, Clone, Copy)]
pub struct RatioSpec<'a> {
    pub output: &'a str,
    pub numerator: &'a str,
    pub denominator: &'a str,
}

impl<'a> RatioSpec<'a> {
    pub fn new(output: &'a str, numerator: &'a str, denominator: &'a str) -> Self {
        Self {
            output,
            numerator,
            denominator,
        }
    }
}

/// Actual column names of the language knowledge and mother tongue counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LanguageColumns {
    pub total_knowledge_eng: String,
    pub total_knowledge_fre: String,
    pub total_knowledge_fre_eng: String,
    pub total_knowledge_none: String,
    pub total_knowledge_languages: String,
    pub mother_tongue_official_lang: String,
    pub mother_tongue_non_official_lang: String,
    pub mother_tongue_total: String,
}

impl LanguageColumns {
    pub fn names(&self) -> [&str; 8] {
        [
            self.total_knowledge_eng.as_str(),
            self.total_knowledge_fre.as_str(),
            self.total_knowledge_fre_eng.as_str(),
            self.total_knowledge_none.as_str(),
            self.total_knowledge_languages.as_str(),
            self.mother_tongue_official_lang.as_str(),
            self.mother_tongue_non_official_lang.as_str(),
            self.mother_tongue_total.as_str(),
        ]
    }

    pub fn ratio_specs(&self) -> [RatioSpec<'_>; 6] {
        let languages = self.total_knowledge_languages.as_str();
        let mother_total = self.mother_tongue_total.as_str();
        [
            RatioSpec::new(RATIO_ENG, &self.total_knowledge_eng, languages),
            RatioSpec::new(RATIO_FRE, &self.total_knowledge_fre, languages),
            RatioSpec::new(RATIO_BOTH, &self.total_knowledge_fre_eng, languages),
            RatioSpec::new(RATIO_NONE, &self.total_knowledge_none, languages),
            RatioSpec::new(RATIO_MOTHER_OFF, &self.mother_tongue_official_lang, mother_total),
            RatioSpec::new(
                RATIO_MOTHER_UNOFF,
                &self.mother_tongue_non_official_lang,
                mother_total,
            ),
        ]
    }
}

/// Age group population columns for the age dependency ratio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgeColumns {
    pub pop_0_14: String,
    pub pop_15_64: String,
    pub pop_65_plus: String,
}

/// Computes derived ratio columns.
pub struct RatioCalculator;

impl RatioCalculator {
    /// Quotient with undefined results mapped to `None`.
    pub fn divide(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
        match (numerator, denominator) {
            (Some(n), Some(d)) if d != 0.0 => Some(n / d).filter(|r| !r.is_nan()),
            _ => None,
        }
    }

    /// Column values as `f64`, nulls kept as `None`.
    pub fn column_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, RatioError> {
        let column = df
            .column(name)
            .map_err(|_| RatioError::MissingColumn(name.to_string()))?;
        let values = column.cast(&DataType::Float64)?;
        Ok(values.f64()?.into_iter().collect())
    }

    /// Element-wise `numerator / denominator` over two columns.
    pub fn ratio(
        df: &DataFrame,
        numerator: &str,
        denominator: &str,
    ) -> Result<Vec<Option<f64>>, RatioError> {
        let num = Self::column_values(df, numerator)?;
        let den = Self::column_values(df, denominator)?;
        Ok(num
            .into_iter()
            .zip(den)
            .map(|(n, d)| Self::divide(n, d))
            .collect())
    }

    pub fn require_columns<'a>(
        df: &DataFrame,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), RatioError> {
        for name in names {
            if df.column(name).is_err() {
                return Err(RatioError::MissingColumn(name.to_string()));
            }
        }
        Ok(())
    }

    /// Compute every spec in parallel, then write the columns in order.
    /// Existing columns with the same output name are replaced.
    pub fn append_ratios(df: &mut DataFrame, specs: &[RatioSpec<'_>]) -> Result<(), RatioError> {
        Self::require_columns(
            df,
            specs.iter().flat_map(|s| [s.numerator, s.denominator]),
        )?;

        let frame: &DataFrame = df;
        let columns: Vec<Column> = specs
            .par_iter()
            .map(|spec| -> Result<Column, RatioError> {
                let values = Self::ratio(frame, spec.numerator, spec.denominator)?;
                Ok(Column::new(spec.output.into(), values))
            })
            .collect::<Result<_, _>>()?;

        for column in columns {
            df.with_column(column)?;
        }
        Ok(())
    }

    /// Append the six language knowledge and mother tongue ratios.
    ///
    /// Every configured column must exist; otherwise nothing is written.
    pub fn calculate_language_ratios(
        df: &mut DataFrame,
        columns: &LanguageColumns,
    ) -> Result<(), RatioError> {
        Self::require_columns(df, columns.names())?;
        Self::append_ratios(df, &columns.ratio_specs())?;
        log::debug!("Computed language ratios for {} rows", df.height());
        Ok(())
    }

    /// Append `age_dependency_ratio = (0-14 + 65+) / 15-64`.
    pub fn calculate_age_dependency_ratio(
        df: &mut DataFrame,
        columns: &AgeColumns,
    ) -> Result<(), RatioError> {
        let young = Self::column_values(df, &columns.pop_0_14)?;
        let working = Self::column_values(df, &columns.pop_15_64)?;
        let old = Self::column_values(df, &columns.pop_65_plus)?;

        let values: Vec<Option<f64>> = young
            .into_iter()
            .zip(old)
            .zip(working)
            .map(|((y, o), w)| {
                let dependents = y.zip(o).map(|(y, o)| y + o);
                Self::divide(dependents, w)
            })
            .collect();

        df.with_column(Column::new(AGE_DEPENDENCY_RATIO.into(), values))?;
        Ok(())
    }
}
