//! Census Geo - census geodata loading, joining & ratio analysis
//!
//! Loads dissemination-area geometry and tabular census data, joins them on a
//! shared region identifier (DAUID) and derives ratio columns such as
//! language knowledge, education and age dependency ratios.

pub mod config;
pub mod data;
pub mod geo;
pub mod pipeline;
pub mod stats;

pub use config::{ConfigError, EducationPeakSpec, FilterSpec, PipelineConfig};
pub use data::{DataLoader, FilterValue, HeaderMapping, LoadOptions, LoaderError, MergeError, Merger};
pub use geo::{Coord, GeoError, GeoTable, Geometry, GeometryReader, Polygon};
pub use pipeline::{Pipeline, PipelineOutput};
pub use stats::{
    AgeColumns, EducationColumns, EducationPeak, EducationRatioFinder, LanguageColumns,
    RatioCalculator, RatioError, RatioSummarizer, RatioSummary,
};
