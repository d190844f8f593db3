//! Region geometry types.
//! Dissemination areas are polygons or multipolygons; anything else is rejected
//! at read time.

/// A planar coordinate in the source CRS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A polygon with one exterior ring and zero or more holes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon {
    pub exterior: Vec<Coord>,
    pub interiors: Vec<Vec<Coord>>,
}

impl Polygon {
    pub fn new(exterior: Vec<Coord>, interiors: Vec<Vec<Coord>>) -> Self {
        Self {
            exterior,
            interiors,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Geometry {
    /// Null shape or missing GeoJSON geometry.
    #[default]
    Empty,
    Polygon(Polygon),
    MultiPolygon(Vec<Polygon>),
}

impl Geometry {
    /// Collapse a list of polygons into the narrowest geometry variant.
    pub fn from_polygons(mut polygons: Vec<Polygon>) -> Self {
        match polygons.len() {
            0 => Geometry::Empty,
            1 => Geometry::Polygon(polygons.remove(0)),
            _ => Geometry::MultiPolygon(polygons),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Geometry::Empty)
    }

    pub fn polygons(&self) -> &[Polygon] {
        match self {
            Geometry::Empty => &[],
            Geometry::Polygon(p) => std::slice::from_ref(p),
            Geometry::MultiPolygon(ps) => ps,
        }
    }

    /// Axis-aligned bounds as `(min, max)`, `None` for an empty geometry.
    pub fn bounds(&self) -> Option<(Coord, Coord)> {
        let mut coords = self.polygons().iter().flat_map(|p| p.exterior.iter());
        let first = *coords.next()?;
        Some(coords.fold((first, first), |(lo, hi), c| {
            (
                Coord::new(lo.x.min(c.x), lo.y.min(c.y)),
                Coord::new(hi.x.max(c.x), hi.y.max(c.y)),
            )
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> Polygon {
        Polygon::new(
            vec![
                Coord::new(x0, y0),
                Coord::new(x0 + size, y0),
                Coord::new(x0 + size, y0 + size),
                Coord::new(x0, y0 + size),
                Coord::new(x0, y0),
            ],
            Vec::new(),
        )
    }

    #[test]
    fn from_polygons_picks_variant() {
        assert!(Geometry::from_polygons(Vec::new()).is_empty());
        assert!(matches!(
            Geometry::from_polygons(vec![square(0.0, 0.0, 1.0)]),
            Geometry::Polygon(_)
        ));
        let multi = Geometry::from_polygons(vec![square(0.0, 0.0, 1.0), square(5.0, 5.0, 1.0)]);
        assert_eq!(multi.polygons().len(), 2);
    }

    #[test]
    fn bounds_span_all_parts() {
        let multi = Geometry::from_polygons(vec![square(0.0, 0.0, 1.0), square(5.0, -2.0, 1.0)]);
        let (lo, hi) = multi.bounds().unwrap();
        assert_eq!(lo, Coord::new(0.0, -2.0));
        assert_eq!(hi, Coord::new(6.0, 1.0));
        assert!(Geometry::Empty.bounds().is_none());
    }
}
