//! Statistics module - derived ratio columns and their summaries

mod education;
mod ratios;
mod summary;

pub use education::{
    EducationColumns, EducationPeak, EducationRatioFinder, DEFAULT_ID_COLUMN, EDUCATION_RATIO,
    EDUCATION_RATIO_COLUMNS, NO_CERTIFICATE_RATIO, POSTSECONDARY_RATIO, SECONDARY_RATIO,
};
pub use ratios::{
    AgeColumns, LanguageColumns, RatioCalculator, RatioError, RatioSpec, AGE_DEPENDENCY_RATIO,
    LANGUAGE_RATIO_COLUMNS, RATIO_BOTH, RATIO_ENG, RATIO_FRE, RATIO_MOTHER_OFF,
    RATIO_MOTHER_UNOFF, RATIO_NONE,
};
pub use summary::{RatioSummarizer, RatioSummary};
