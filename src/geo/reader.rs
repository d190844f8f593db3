//! Geometry File Reader
//! Reads ESRI shapefiles (with .dbf attributes and .prj CRS) and GeoJSON
//! feature collections into a `GeoTable`.

use super::geometry::{Coord, Geometry, Polygon};
use super::table::GeoTable;
use polars::prelude::*;
use serde::Deserialize;
use shapefile::dbase::FieldValue;
use shapefile::{PolygonRing, Shape};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),
    #[error("dBase attribute error: {0}")]
    Dbase(#[from] shapefile::dbase::Error),
    #[error("Invalid GeoJSON: {0}")]
    GeoJson(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to build attribute table: {0}")]
    Polars(#[from] PolarsError),
    #[error("Unsupported shape type {0}, expected polygons")]
    UnsupportedShape(String),
    #[error("Unsupported geometry format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
}

/// A single attribute cell before column types are resolved.
#[derive(Debug, Clone, PartialEq)]
enum AttributeValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Flag(bool),
}

impl AttributeValue {
    /// Integral floats become integers so ids stored as numbers join cleanly.
    fn number(v: f64) -> Self {
        if v.fract() == 0.0 && v.abs() < 9.0e15 {
            AttributeValue::Int(v as i64)
        } else {
            AttributeValue::Float(v)
        }
    }
}

impl From<FieldValue> for AttributeValue {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Character(Some(s)) => AttributeValue::Text(s.trim().to_string()),
            FieldValue::Numeric(Some(v)) => AttributeValue::number(v),
            FieldValue::Float(Some(v)) => AttributeValue::number(v as f64),
            FieldValue::Integer(v) => AttributeValue::Int(v as i64),
            FieldValue::Double(v) | FieldValue::Currency(v) => AttributeValue::number(v),
            FieldValue::Logical(Some(b)) => AttributeValue::Flag(b),
            FieldValue::Memo(s) => AttributeValue::Text(s),
            FieldValue::Character(None)
            | FieldValue::Numeric(None)
            | FieldValue::Float(None)
            | FieldValue::Logical(None) => AttributeValue::Null,
            other => AttributeValue::Text(format!("{other:?}")),
        }
    }
}

impl From<serde_json::Value> for AttributeValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => AttributeValue::Null,
            Value::Bool(b) => AttributeValue::Flag(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => AttributeValue::Int(i),
                None => n.as_f64().map_or(AttributeValue::Null, AttributeValue::Float),
            },
            Value::String(s) => AttributeValue::Text(s),
            other => AttributeValue::Text(other.to_string()),
        }
    }
}

type AttributeRow = BTreeMap<String, AttributeValue>;

#[derive(Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
    #[serde(default)]
    crs: Option<NamedCrs>,
}

#[derive(Deserialize)]
struct NamedCrs {
    properties: CrsProperties,
}

#[derive(Deserialize)]
struct CrsProperties {
    name: String,
}

#[derive(Deserialize)]
struct Feature {
    geometry: Option<RawGeometry>,
    #[serde(default)]
    properties: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum RawGeometry {
    Polygon {
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Vec<f64>>>>,
    },
}

impl RawGeometry {
    fn into_geometry(self) -> Geometry {
        match self {
            RawGeometry::Polygon { coordinates } => {
                Geometry::from_polygons(vec![polygon_from_positions(coordinates)])
            }
            RawGeometry::MultiPolygon { coordinates } => Geometry::from_polygons(
                coordinates.into_iter().map(polygon_from_positions).collect(),
            ),
        }
    }
}

fn ring_from_positions(ring: Vec<Vec<f64>>) -> Vec<Coord> {
    ring.into_iter()
        .filter(|pos| pos.len() >= 2)
        .map(|pos| Coord::new(pos[0], pos[1]))
        .collect()
}

fn polygon_from_positions(rings: Vec<Vec<Vec<f64>>>) -> Polygon {
    let mut rings = rings.into_iter().map(ring_from_positions);
    let exterior = rings.next().unwrap_or_default();
    Polygon::new(exterior, rings.collect())
}

/// Group shapefile rings: each outer ring opens a polygon, inner rings attach
/// to the polygon opened before them.
fn polygons_from_rings<P>(rings: &[PolygonRing<P>], xy: impl Fn(&P) -> Coord) -> Geometry {
    let mut polygons: Vec<Polygon> = Vec::new();
    for ring in rings {
        let coords: Vec<Coord> = ring.points().iter().map(&xy).collect();
        match (ring, polygons.last_mut()) {
            (PolygonRing::Inner(_), Some(last)) => last.interiors.push(coords),
            _ => polygons.push(Polygon::new(coords, Vec::new())),
        }
    }
    Geometry::from_polygons(polygons)
}

fn geometry_from_shape(shape: Shape) -> Result<Geometry, GeoError> {
    match shape {
        Shape::NullShape => Ok(Geometry::Empty),
        Shape::Polygon(p) => Ok(polygons_from_rings(p.rings(), |pt| Coord::new(pt.x, pt.y))),
        Shape::PolygonM(p) => Ok(polygons_from_rings(p.rings(), |pt| Coord::new(pt.x, pt.y))),
        Shape::PolygonZ(p) => Ok(polygons_from_rings(p.rings(), |pt| Coord::new(pt.x, pt.y))),
        other => Err(GeoError::UnsupportedShape(format!("{:?}", other.shapetype()))),
    }
}

/// Build one typed column from the cells of a single attribute.
fn build_column(name: &str, cells: &[AttributeValue]) -> Column {
    let present = || cells.iter().filter(|c| **c != AttributeValue::Null);

    if present().all(|c| matches!(c, AttributeValue::Int(_))) && present().next().is_some() {
        let values: Vec<Option<i64>> = cells
            .iter()
            .map(|c| match c {
                AttributeValue::Int(i) => Some(*i),
                _ => None,
            })
            .collect();
        return Column::new(name.into(), values);
    }

    if present().all(|c| matches!(c, AttributeValue::Int(_) | AttributeValue::Float(_)))
        && present().next().is_some()
    {
        let values: Vec<Option<f64>> = cells
            .iter()
            .map(|c| match c {
                AttributeValue::Int(i) => Some(*i as f64),
                AttributeValue::Float(f) => Some(*f),
                _ => None,
            })
            .collect();
        return Column::new(name.into(), values);
    }

    if present().all(|c| matches!(c, AttributeValue::Flag(_))) && present().next().is_some() {
        let values: Vec<Option<bool>> = cells
            .iter()
            .map(|c| match c {
                AttributeValue::Flag(b) => Some(*b),
                _ => None,
            })
            .collect();
        return Column::new(name.into(), values);
    }

    let values: Vec<Option<String>> = cells
        .iter()
        .map(|c| match c {
            AttributeValue::Null => None,
            AttributeValue::Int(i) => Some(i.to_string()),
            AttributeValue::Float(f) => Some(f.to_string()),
            AttributeValue::Text(s) => Some(s.clone()),
            AttributeValue::Flag(b) => Some(b.to_string()),
        })
        .collect();
    Column::new(name.into(), values)
}

/// Build one column per attribute name. Names listed in `field_order` come
/// first in that order, any others follow sorted.
fn attributes_to_frame(
    rows: &[AttributeRow],
    field_order: &[String],
) -> Result<DataFrame, GeoError> {
    let present: BTreeSet<&String> = rows.iter().flat_map(|row| row.keys()).collect();
    let listed: HashSet<&String> = field_order.iter().collect();

    let names = field_order
        .iter()
        .filter(|name| present.contains(name))
        .chain(present.iter().copied().filter(|name| !listed.contains(name)));

    let columns = names
        .map(|name| {
            let cells: Vec<AttributeValue> = rows
                .iter()
                .map(|row| row.get(name).cloned().unwrap_or(AttributeValue::Null))
                .collect();
            build_column(name, &cells)
        })
        .collect();

    Ok(DataFrame::new(columns)?)
}

/// Reads geometry files into attribute + geometry tables.
pub struct GeometryReader;

impl GeometryReader {
    /// Read a geometry file, dispatching on its extension.
    pub fn read(path: &Path) -> Result<GeoTable, GeoError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("shp") => Self::read_shapefile(path),
            Some("geojson") | Some("json") => Self::read_geojson(path),
            _ => Err(GeoError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Read a shapefile; attributes come from the sibling .dbf in its field
    /// order, the CRS from the sibling .prj when present.
    pub fn read_shapefile(path: &Path) -> Result<GeoTable, GeoError> {
        let field_order: Vec<String> =
            shapefile::dbase::Reader::from_path(path.with_extension("dbf"))?
                .fields()
                .iter()
                .map(|field| field.name().to_string())
                .collect();
        let mut reader = shapefile::Reader::from_path(path)?;

        let mut geometries = Vec::new();
        let mut rows: Vec<AttributeRow> = Vec::new();
        for item in reader.iter_shapes_and_records() {
            let (shape, record) = item?;
            geometries.push(geometry_from_shape(shape)?);
            rows.push(
                record
                    .into_iter()
                    .map(|(name, value)| (name, AttributeValue::from(value)))
                    .collect(),
            );
        }

        let prj = path.with_extension("prj");
        let crs = if prj.exists() {
            Some(fs::read_to_string(&prj)?.trim().to_string())
        } else {
            None
        };

        log::debug!("Read {} shapes from {}", geometries.len(), path.display());
        Ok(GeoTable::new(attributes_to_frame(&rows, &field_order)?, geometries, crs))
    }

    pub fn read_geojson(path: &Path) -> Result<GeoTable, GeoError> {
        let text = fs::read_to_string(path)?;
        Self::parse_geojson(&text)
    }

    /// Parse a GeoJSON `FeatureCollection` of polygon features.
    pub fn parse_geojson(text: &str) -> Result<GeoTable, GeoError> {
        let collection: FeatureCollection = serde_json::from_str(text)?;

        let mut geometries = Vec::with_capacity(collection.features.len());
        let mut rows: Vec<AttributeRow> = Vec::with_capacity(collection.features.len());
        for feature in collection.features {
            geometries.push(
                feature
                    .geometry
                    .map(RawGeometry::into_geometry)
                    .unwrap_or_default(),
            );
            rows.push(
                feature
                    .properties
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(k, v)| (k, AttributeValue::from(v)))
                    .collect(),
            );
        }

        let crs = collection.crs.map(|c| c.properties.name);
        Ok(GeoTable::new(attributes_to_frame(&rows, &[])?, geometries, crs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapefile::dbase::{Record, TableWriterBuilder};
    use shapefile::Point;
    use tempfile::tempdir;

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "crs": { "type": "name", "properties": { "name": "EPSG:3347" } },
        "features": [
            {
                "type": "Feature",
                "properties": { "DAUID": "24660001", "PRUID": 24, "AREA": 1.5 },
                "geometry": { "type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]] }
            },
            {
                "type": "Feature",
                "properties": { "DAUID": "24660002", "PRUID": 24, "AREA": 2 },
                "geometry": { "type": "MultiPolygon", "coordinates": [
                    [[[2,0],[3,0],[3,1],[2,0]]],
                    [[[5,5],[6,5],[6,6],[5,5]], [[5.2,5.1],[5.4,5.1],[5.4,5.3],[5.2,5.1]]]
                ] }
            },
            {
                "type": "Feature",
                "properties": { "DAUID": "24660003", "PRUID": null },
                "geometry": null
            }
        ]
    }"#;

    #[test]
    fn parses_feature_collection() {
        let table = GeometryReader::parse_geojson(COLLECTION).unwrap();
        assert_eq!(table.height(), 3);
        assert_eq!(table.crs.as_deref(), Some("EPSG:3347"));

        assert!(matches!(table.geometries[0], Geometry::Polygon(_)));
        let parts = table.geometries[1].polygons();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1].interiors.len(), 1);
        assert!(table.geometries[2].is_empty());
    }

    #[test]
    fn resolves_attribute_types() {
        let table = GeometryReader::parse_geojson(COLLECTION).unwrap();
        let attrs = &table.attributes;

        assert_eq!(attrs.column("DAUID").unwrap().dtype(), &DataType::String);
        assert_eq!(attrs.column("PRUID").unwrap().dtype(), &DataType::Int64);
        assert_eq!(attrs.column("AREA").unwrap().dtype(), &DataType::Float64);
        assert_eq!(attrs.column("PRUID").unwrap().null_count(), 1);
        assert_eq!(attrs.column("AREA").unwrap().null_count(), 1);
    }

    #[test]
    fn rejects_non_polygon_geometry() {
        let text = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{},"geometry":{"type":"Point","coordinates":[1,2]}}
        ]}"#;
        assert!(matches!(
            GeometryReader::parse_geojson(text),
            Err(GeoError::GeoJson(_))
        ));
    }

    fn square(x0: f64, y0: f64, side: f64) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x0, y0 + side),
            Point::new(x0 + side, y0 + side),
            Point::new(x0 + side, y0),
            Point::new(x0, y0),
        ]
    }

    fn record(dauid: &str, pruid: f64, area: f64) -> Record {
        let mut record = Record::default();
        record.insert("DAUID".to_string(), FieldValue::Character(Some(dauid.to_string())));
        record.insert("PRUID".to_string(), FieldValue::Numeric(Some(pruid)));
        record.insert("AREA".to_string(), FieldValue::Numeric(Some(area)));
        record
    }

    fn table_builder() -> TableWriterBuilder {
        TableWriterBuilder::new()
            .add_character_field("DAUID".try_into().unwrap(), 10)
            .add_numeric_field("PRUID".try_into().unwrap(), 10, 0)
            .add_numeric_field("AREA".try_into().unwrap(), 10, 2)
    }

    /// Two regions: a square with a hole, and two disjoint squares.
    fn write_regions(path: &Path) {
        let mut writer = shapefile::Writer::from_path(path, table_builder()).unwrap();
        let holed = shapefile::Polygon::with_rings(vec![
            PolygonRing::Outer(square(0.0, 0.0, 10.0)),
            PolygonRing::Inner(square(2.0, 2.0, 2.0)),
        ]);
        let split = shapefile::Polygon::with_rings(vec![
            PolygonRing::Outer(square(20.0, 0.0, 1.0)),
            PolygonRing::Outer(square(30.0, 0.0, 1.0)),
        ]);
        writer
            .write_shape_and_record(&holed, &record("24660001", 24.0, 1.5))
            .unwrap();
        writer
            .write_shape_and_record(&split, &record("24660002", 24.0, 2.25))
            .unwrap();
    }

    #[test]
    fn reads_shapefile_attributes_and_crs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lda.shp");
        write_regions(&path);
        fs::write(path.with_extension("prj"), "PROJCS[\"NAD83 / Statistics Canada Lambert\"]\n")
            .unwrap();

        let table = GeometryReader::read(&path).unwrap();
        let attrs = &table.attributes;

        assert_eq!(table.height(), 2);
        assert_eq!(
            table.crs.as_deref(),
            Some("PROJCS[\"NAD83 / Statistics Canada Lambert\"]")
        );
        assert_eq!(attrs.column("DAUID").unwrap().dtype(), &DataType::String);
        assert_eq!(attrs.column("PRUID").unwrap().dtype(), &DataType::Int64);
        assert_eq!(attrs.column("AREA").unwrap().dtype(), &DataType::Float64);
        assert_eq!(
            attrs.column("DAUID").unwrap().str().unwrap().get(0),
            Some("24660001")
        );
    }

    #[test]
    fn shapefile_columns_follow_dbf_field_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lda.shp");
        write_regions(&path);

        let table = GeometryReader::read_shapefile(&path).unwrap();

        let names: Vec<String> = table
            .attributes
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, vec!["DAUID", "PRUID", "AREA"]);
        assert!(table.crs.is_none());
    }

    #[test]
    fn shapefile_rings_are_grouped_into_polygons() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lda.shp");
        write_regions(&path);

        let table = GeometryReader::read_shapefile(&path).unwrap();

        let holed = table.geometries[0].polygons();
        assert_eq!(holed.len(), 1);
        assert_eq!(holed[0].interiors.len(), 1);
        assert_eq!(holed[0].exterior.len(), 5);

        let split = table.geometries[1].polygons();
        assert_eq!(split.len(), 2);
        assert!(split.iter().all(|p| p.interiors.is_empty()));
        let (lo, hi) = table.geometries[1].bounds().unwrap();
        assert_eq!((lo.x, hi.x), (20.0, 31.0));
    }

    #[test]
    fn rejects_point_shapefile() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("centroids.shp");
        {
            let mut writer = shapefile::Writer::from_path(&path, table_builder()).unwrap();
            writer
                .write_shape_and_record(&Point::new(1.0, 2.0), &record("24660001", 24.0, 0.0))
                .unwrap();
        }

        let err = GeometryReader::read(&path).unwrap_err();

        assert!(matches!(err, GeoError::UnsupportedShape(kind) if kind == "Point"));
    }

    #[test]
    fn geojson_attributes_are_sorted() {
        let table = GeometryReader::parse_geojson(COLLECTION).unwrap();
        let names: Vec<String> = table
            .attributes
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, vec!["AREA", "DAUID", "PRUID"]);
    }

    #[test]
    fn rejects_unknown_extension() {
        let err = GeometryReader::read(Path::new("regions.kml")).unwrap_err();
        assert!(matches!(err, GeoError::UnsupportedFormat(_)));
    }
}
