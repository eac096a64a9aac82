use crate::query::Position;
use bson::{Bson, Document as BsonDocument};
use geo::{Coord, Intersects, LineString, MultiPolygon, Polygon};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Parsed GeoJSON geometry. Positions are `[longitude, latitude]`, which is
/// also the `x`/`y` order of the `geo` types.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Position),
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

fn position(v: &Bson) -> Option<Position> {
    let Bson::Array(a) = v else { return None };
    let num = |b: &Bson| match b {
        Bson::Double(f) => Some(*f),
        Bson::Int32(i) => Some(f64::from(*i)),
        #[allow(clippy::cast_precision_loss)]
        Bson::Int64(i) => Some(*i as f64),
        _ => None,
    };
    match a.as_slice() {
        [lon, lat, ..] => Some([num(lon)?, num(lat)?]),
        _ => None,
    }
}

fn ring(v: &Bson) -> Option<LineString<f64>> {
    let Bson::Array(a) = v else { return None };
    let coords = a
        .iter()
        .map(|p| position(p).map(|[x, y]| Coord { x, y }))
        .collect::<Option<Vec<_>>>()?;
    Some(LineString::new(coords))
}

// First ring is the exterior, the rest are holes.
fn polygon(v: &Bson) -> Option<Polygon<f64>> {
    let Bson::Array(a) = v else { return None };
    let mut rings = a.iter().map(ring).collect::<Option<Vec<_>>>()?.into_iter();
    let exterior = rings.next()?;
    Some(Polygon::new(exterior, rings.collect()))
}

impl Geometry {
    #[must_use]
    pub fn from_document(doc: &BsonDocument) -> Option<Self> {
        let coords = doc.get("coordinates")?;
        match doc.get_str("type").ok()? {
            "Point" => position(coords).map(Self::Point),
            "Polygon" => polygon(coords).map(Self::Polygon),
            "MultiPolygon" => {
                let Bson::Array(a) = coords else { return None };
                a.iter()
                    .map(polygon)
                    .collect::<Option<Vec<_>>>()
                    .map(|ps| Self::MultiPolygon(MultiPolygon::new(ps)))
            }
            _ => None,
        }
    }

    /// Whether the point `at` touches this geometry: the interior or the
    /// boundary of a polygon, or the point itself. For a stored point this is
    /// both `$geoIntersects` and closed `$geoWithin` containment.
    #[must_use]
    pub fn intersects(&self, at: Position) -> bool {
        let p = geo::Point::new(at[0], at[1]);
        match self {
            Self::Point(q) => *q == at,
            Self::Polygon(poly) => poly.intersects(&p),
            Self::MultiPolygon(mp) => mp.0.iter().any(|poly| poly.intersects(&p)),
        }
    }
}

/// Great-circle distance in meters.
#[must_use]
pub fn haversine_m(a: Position, b: Position) -> f64 {
    let lat1 = a[1].to_radians();
    let lat2 = b[1].to_radians();
    let dlat = (b[1] - a[1]).to_radians();
    let dlon = (b[0] - a[0]).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    EARTH_RADIUS_M * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn unit_square() -> Geometry {
        Geometry::from_document(&doc! {
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]],
        })
        .unwrap()
    }

    #[test]
    fn parses_points_and_polygons() {
        let p = Geometry::from_document(&doc! {"type": "Point", "coordinates": [1, 2.5]});
        assert_eq!(p, Some(Geometry::Point([1.0, 2.5])));
        let poly = Geometry::from_document(
            &doc! {"type": "Polygon", "coordinates": [[[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 0.0]]]},
        );
        assert!(matches!(poly, Some(Geometry::Polygon(p)) if p.exterior().0.len() == 4));
        assert!(Geometry::from_document(&doc! {"type": "Polygon", "coordinates": []}).is_none());
        assert!(Geometry::from_document(&doc! {"type": "LineString", "coordinates": []}).is_none());
    }

    #[test]
    fn boundary_points_intersect() {
        let square = unit_square();
        assert!(square.intersects([0.5, 0.5]));
        assert!(square.intersects([1.0, 0.5]), "edge");
        assert!(square.intersects([0.0, 0.0]), "vertex");
        assert!(square.intersects([1.0, 1.0]), "opposite vertex");
        assert!(!square.intersects([1.0001, 0.5]));
    }

    #[test]
    fn polygon_with_hole() {
        let g = Geometry::from_document(&doc! {
            "type": "Polygon",
            "coordinates": [
                [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]],
                [[4.0, 4.0], [6.0, 4.0], [6.0, 6.0], [4.0, 6.0], [4.0, 4.0]],
            ],
        })
        .unwrap();
        assert!(g.intersects([1.0, 1.0]));
        assert!(!g.intersects([5.0, 5.0]));
        assert!(g.intersects([4.0, 5.0]), "hole boundary belongs to the polygon");
        assert!(!g.intersects([11.0, 5.0]));
    }

    #[test]
    fn multi_polygon_matches_any_member() {
        let g = Geometry::from_document(&doc! {
            "type": "MultiPolygon",
            "coordinates": [
                [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]],
                [[[5.0, 5.0], [6.0, 5.0], [6.0, 6.0], [5.0, 5.0]]],
            ],
        })
        .unwrap();
        assert!(g.intersects([6.0, 5.5]));
        assert!(!g.intersects([3.0, 3.0]));
    }

    #[test]
    fn haversine_small_offsets() {
        assert!(haversine_m([-122.66, 45.69], [-122.66, 45.69]).abs() < 1e-9);
        // 0.001 degrees of latitude is roughly 111 meters
        let d = haversine_m([-122.66, 45.69], [-122.66, 45.691]);
        assert!((d - 111.19).abs() < 0.5, "{d}");
    }
}
