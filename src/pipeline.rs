//! Analysis Pipeline
//! Runs load → rename → fill → filter → join → derive ratios for one config.

use crate::config::PipelineConfig;
use crate::data::{DataLoader, Merger};
use crate::geo::GeoTable;
use crate::stats::{
    EducationPeak, EducationRatioFinder, RatioCalculator, RatioSummarizer, RatioSummary,
    AGE_DEPENDENCY_RATIO, EDUCATION_RATIO, EDUCATION_RATIO_COLUMNS, LANGUAGE_RATIO_COLUMNS,
};
use anyhow::{Context, Result};
use std::collections::HashMap;

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Joined geometry table carrying every derived ratio column.
    pub merged: GeoTable,
    pub summaries: HashMap<String, RatioSummary>,
    pub education_peak: Option<EducationPeak>,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self) -> Result<PipelineOutput> {
        let config = &self.config;

        let (geo, data) = DataLoader::read_data(&config.load).with_context(|| {
            format!(
                "loading {} and {}",
                config.load.shp_path.display(),
                config.load.data_path.display()
            )
        })?;

        let filter = config
            .filter
            .as_ref()
            .map(|f| (f.column.as_str(), &f.value));
        let mut merged = Merger::merge_geo(&geo, &data, &config.join_key, filter)
            .with_context(|| format!("joining on {}", config.join_key))?;

        let mut ratio_columns: Vec<String> = Vec::new();

        if let Some(language) = &config.language {
            RatioCalculator::calculate_language_ratios(&mut merged.attributes, language)
                .context("computing language ratios")?;
            ratio_columns.extend(LANGUAGE_RATIO_COLUMNS.iter().map(|c| c.to_string()));
        }

        if let Some(education) = &config.education {
            EducationRatioFinder::calculate_education_ratios(&mut merged.attributes, education)
                .context("computing education ratios")?;
            ratio_columns.extend(EDUCATION_RATIO_COLUMNS.iter().map(|c| c.to_string()));
        }

        let education_peak = match &config.education_peak {
            Some(spec) => {
                let peak = EducationRatioFinder::highest_ratio_by(
                    &mut merged.attributes,
                    &config.join_key,
                    &spec.population,
                    &spec.education_level,
                )
                .context("finding highest education ratio")?;
                ratio_columns.push(EDUCATION_RATIO.to_string());
                peak
            }
            None => None,
        };

        if let Some(age) = &config.age {
            RatioCalculator::calculate_age_dependency_ratio(&mut merged.attributes, age)
                .context("computing age dependency ratio")?;
            ratio_columns.push(AGE_DEPENDENCY_RATIO.to_string());
        }

        let summaries = RatioSummarizer::summarize_all(&merged.attributes, &ratio_columns)
            .context("summarizing ratio columns")?;

        log::info!(
            "Pipeline finished: {} regions, {} ratio columns",
            merged.height(),
            ratio_columns.len()
        );

        Ok(PipelineOutput {
            merged,
            summaries,
            education_peak,
        })
    }
}
