//! Geometry Table
//! Attribute rows paired one-to-one with region geometries.

use super::geometry::Geometry;
use crate::data::{FilterValue, MergeError, Merger};
use polars::prelude::*;

/// Attribute table plus one geometry per row.
///
/// Row `i` of `attributes` owns `geometries[i]`. Operations that drop or
/// reorder rows must carry the geometries along.
#[derive(Debug, Clone)]
pub struct GeoTable {
    pub attributes: DataFrame,
    pub geometries: Vec<Geometry>,
    /// CRS description as read from the source (WKT or an EPSG name).
    pub crs: Option<String>,
}

impl GeoTable {
    pub fn new(attributes: DataFrame, geometries: Vec<Geometry>, crs: Option<String>) -> Self {
        Self {
            attributes,
            geometries,
            crs,
        }
    }

    /// Number of regions.
    pub fn height(&self) -> usize {
        self.geometries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    /// Get list of attribute column names.
    pub fn get_columns(&self) -> Vec<String> {
        self.attributes
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Keep only regions whose `column` equals `value`.
    pub fn filter_eq(&self, column: &str, value: &FilterValue) -> Result<GeoTable, MergeError> {
        let mask = Merger::equality_mask(&self.attributes, column, value)?;
        let attributes = self.attributes.filter(&mask)?;
        let geometries = mask
            .into_iter()
            .zip(self.geometries.iter())
            .filter(|(keep, _)| keep.unwrap_or(false))
            .map(|(_, g)| g.clone())
            .collect();

        Ok(GeoTable::new(attributes, geometries, self.crs.clone()))
    }

    /// Keep the rows at `indices`, in that order.
    pub(crate) fn take_geometries(&self, indices: impl IntoIterator<Item = usize>) -> Vec<Geometry> {
        indices
            .into_iter()
            .map(|i| self.geometries.get(i).cloned().unwrap_or_default())
            .collect()
    }
}
