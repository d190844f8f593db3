//! Pipeline configuration loaded from JSON.

use crate::data::{FilterValue, LoadOptions};
use crate::stats::{AgeColumns, EducationColumns, LanguageColumns, DEFAULT_ID_COLUMN};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Equality filter applied to the geometry table before joining.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub column: String,
    pub value: FilterValue,
}

/// Population and education level columns for the highest-ratio lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EducationPeakSpec {
    pub population: String,
    pub education_level: String,
}

fn default_join_key() -> String {
    DEFAULT_ID_COLUMN.to_string()
}

/// One analysis run: inputs, join, and which ratio families to derive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub load: LoadOptions,
    #[serde(default = "default_join_key")]
    pub join_key: String,
    #[serde(default)]
    pub filter: Option<FilterSpec>,
    #[serde(default)]
    pub language: Option<LanguageColumns>,
    #[serde(default)]
    pub education: Option<EducationColumns>,
    #[serde(default)]
    pub education_peak: Option<EducationPeakSpec>,
    #[serde(default)]
    pub age: Option<AgeColumns>,
}

impl PipelineConfig {
    pub fn new(load: LoadOptions) -> Self {
        Self {
            load,
            join_key: default_join_key(),
            filter: None,
            language: None,
            education: None,
            education_peak: None,
            age: None,
        }
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}
