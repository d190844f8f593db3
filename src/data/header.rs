//! Header Mapping Module
//! Parses `raw<sep>display` lines and renames census columns.

use super::loader::LoaderError;
use polars::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Raw census column names mapped to readable names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMapping {
    entries: Vec<(String, String)>,
}

impl HeaderMapping {
    /// Parse mapping text. Each non-blank line must hold at least two tokens
    /// separated by `separator`; extra tokens are ignored.
    pub fn parse(text: &str, separator: &str) -> Result<Self, LoaderError> {
        let mut entries = Vec::new();

        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let mut tokens = line.split(separator);
            match (tokens.next(), tokens.next()) {
                (Some(raw), Some(display)) if !separator.is_empty() => {
                    entries.push((raw.to_string(), display.to_string()));
                }
                _ => {
                    return Err(LoaderError::MalformedHeader {
                        line: idx + 1,
                        content: line.to_string(),
                    })
                }
            }
        }

        Ok(Self { entries })
    }

    pub fn from_path(path: &Path, separator: &str) -> Result<Self, LoaderError> {
        if !path.exists() {
            return Err(LoaderError::FileNotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path)?;
        Self::parse(&text, separator)
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Display name for a raw column. A raw name listed twice maps to its last entry.
    pub fn get(&self, raw: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(r, _)| r == raw)
            .map(|(_, d)| d.as_str())
    }

    /// Rename every matching column at once; unmatched entries are ignored.
    /// Returns the number of renamed columns.
    pub fn apply(&self, df: &mut DataFrame) -> PolarsResult<usize> {
        let lookup: HashMap<&str, &str> = self
            .entries
            .iter()
            .map(|(r, d)| (r.as_str(), d.as_str()))
            .collect();

        let mut renamed = 0;
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| match lookup.get(name.as_str()) {
                Some(display) => {
                    renamed += 1;
                    log::debug!("Renaming column {name} -> {display}");
                    display.to_string()
                }
                None => name.to_string(),
            })
            .collect();

        if renamed > 0 {
            df.set_column_names(names)?;
        }
        Ok(renamed)
    }
}
