//! Geo module - region geometry and geometry file readers

mod geometry;
mod reader;
mod table;

pub use geometry::{Coord, Geometry, Polygon};
pub use reader::{GeoError, GeometryReader};
pub use table::GeoTable;
