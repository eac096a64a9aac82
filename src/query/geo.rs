//! Spatial query commands.
//!
//! A [`SpatialCommand`] pairs one of the four spatial operators with a GeoJSON
//! shape and, for the proximity operators, optional distance bounds. The
//! builder rejects operator/shape pairs the store would misinterpret before
//! anything is sent.

use crate::errors::StoreError;
use bson::{Bson, Document as BsonDocument, doc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Field every spatially indexed document stores its geometry under.
pub const SPATIAL_FIELD: &str = "location";
/// Index type required by the spherical operators.
pub const SPATIAL_INDEX_TYPE: &str = "2dsphere";

/// Default proximity bounds, in meters, used by the crumb lookups.
pub const DEFAULT_MAX_DISTANCE: f64 = 100.0;
pub const DEFAULT_MIN_DISTANCE: f64 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeType {
    Point,
    Polygon,
    MultiPolygon,
}

impl ShapeType {
    pub const ALL: [Self; 3] = [Self::Point, Self::Polygon, Self::MultiPolygon];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Point => "Point",
            Self::Polygon => "Polygon",
            Self::MultiPolygon => "MultiPolygon",
        }
    }
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShapeType {
    type Err = StoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Point" => Ok(Self::Point),
            "Polygon" => Ok(Self::Polygon),
            "MultiPolygon" => Ok(Self::MultiPolygon),
            other => Err(StoreError::InvalidShapeForOperator {
                shape: other.to_string(),
                operator: "any".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpatialOperator {
    Near,
    NearSphere,
    GeoWithin,
    GeoIntersects,
}

impl SpatialOperator {
    pub const ALL: [Self; 4] = [Self::Near, Self::NearSphere, Self::GeoWithin, Self::GeoIntersects];

    /// Operator name as accepted from request handlers.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Near => "near",
            Self::NearSphere => "nearSphere",
            Self::GeoWithin => "geoWithin",
            Self::GeoIntersects => "geoIntersects",
        }
    }

    /// Key of the operator envelope in the command document.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Near => "$near",
            Self::NearSphere => "$nearSphere",
            Self::GeoWithin => "$geoWithin",
            Self::GeoIntersects => "$geoIntersects",
        }
    }

    /// Whether the operator ranks by distance and accepts distance bounds.
    #[must_use]
    pub const fn takes_distance(self) -> bool {
        matches!(self, Self::Near | Self::NearSphere)
    }

    #[must_use]
    pub const fn accepts(self, shape: ShapeType) -> bool {
        !matches!((self, shape), (Self::GeoWithin, ShapeType::Point))
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.key() == key)
    }
}

impl fmt::Display for SpatialOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SpatialOperator {
    type Err = StoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| StoreError::UnsupportedOperator(s.to_string()))
    }
}

pub type Position = [f64; 2];

/// GeoJSON coordinate payload; the variant fixes the nesting depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coordinates {
    Position(Position),
    Rings(Vec<Vec<Position>>),
    Polygons(Vec<Vec<Vec<Position>>>),
}

impl Coordinates {
    fn position_bson(p: &Position) -> Bson {
        Bson::Array(vec![Bson::Double(p[0]), Bson::Double(p[1])])
    }

    fn rings_bson(rings: &[Vec<Position>]) -> Bson {
        Bson::Array(
            rings.iter().map(|r| Bson::Array(r.iter().map(Self::position_bson).collect())).collect(),
        )
    }

    #[must_use]
    pub fn to_bson(&self) -> Bson {
        match self {
            Self::Position(p) => Self::position_bson(p),
            Self::Rings(rings) => Self::rings_bson(rings),
            Self::Polygons(polys) => Bson::Array(polys.iter().map(|p| Self::rings_bson(p)).collect()),
        }
    }
}

/// A type tag plus coordinates. The tag is not cross-checked against the
/// nesting depth of `coordinates`; handlers validate that upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    #[serde(rename = "type")]
    pub kind: ShapeType,
    pub coordinates: Coordinates,
}

impl Shape {
    /// Point at `[longitude, latitude]`.
    #[must_use]
    pub const fn point(lon: f64, lat: f64) -> Self {
        Self { kind: ShapeType::Point, coordinates: Coordinates::Position([lon, lat]) }
    }

    #[must_use]
    pub const fn polygon(rings: Vec<Vec<Position>>) -> Self {
        Self { kind: ShapeType::Polygon, coordinates: Coordinates::Rings(rings) }
    }

    #[must_use]
    pub const fn multi_polygon(polygons: Vec<Vec<Vec<Position>>>) -> Self {
        Self { kind: ShapeType::MultiPolygon, coordinates: Coordinates::Polygons(polygons) }
    }

    /// Builds a shape from a handler-supplied type name.
    ///
    /// # Errors
    /// Returns `InvalidShapeForOperator` for type names outside the supported set.
    pub fn from_parts(kind: &str, coordinates: Coordinates) -> Result<Self, StoreError> {
        Ok(Self { kind: kind.parse()?, coordinates })
    }

    #[must_use]
    pub fn to_document(&self) -> BsonDocument {
        doc! { "type": self.kind.as_str(), "coordinates": self.coordinates.to_bson() }
    }
}

/// A validated spatial query. Only [`build_spatial_command`] creates one, so
/// every value satisfies the operator/shape table and the distance rules.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialCommand {
    pub(crate) field: String,
    pub(crate) operator: SpatialOperator,
    pub(crate) geometry: Shape,
    pub(crate) max_distance: Option<f64>,
    pub(crate) min_distance: Option<f64>,
}

impl SpatialCommand {
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[must_use]
    pub const fn operator(&self) -> SpatialOperator {
        self.operator
    }

    #[must_use]
    pub const fn geometry(&self) -> &Shape {
        &self.geometry
    }

    #[must_use]
    pub const fn max_distance(&self) -> Option<f64> {
        self.max_distance
    }

    #[must_use]
    pub const fn min_distance(&self) -> Option<f64> {
        self.min_distance
    }

    /// Re-checks the builder rules.
    ///
    /// # Errors
    /// As [`build_spatial_command`].
    pub fn validate(&self) -> Result<(), StoreError> {
        if !self.operator.accepts(self.geometry.kind) {
            return Err(StoreError::InvalidShapeForOperator {
                shape: self.geometry.kind.to_string(),
                operator: self.operator.to_string(),
            });
        }
        if self.operator.takes_distance() {
            check_distance("maxDistance", self.max_distance)?;
            check_distance("minDistance", self.min_distance)?;
        } else if self.max_distance.is_some() || self.min_distance.is_some() {
            return Err(StoreError::InvalidDistance(format!("{} takes no distance bounds", self.operator)));
        }
        Ok(())
    }

    /// The operator envelope alone, e.g. `{"$near": {"$geometry": ...}}`.
    /// Distances are always written as doubles.
    #[must_use]
    pub fn envelope(&self) -> BsonDocument {
        let mut geometry = doc! { "$geometry": self.geometry.to_document() };
        if self.operator.takes_distance() {
            if let Some(max) = self.max_distance {
                geometry.insert("$maxDistance", max);
            }
            if let Some(min) = self.min_distance {
                geometry.insert("$minDistance", min);
            }
        }
        let mut envelope = BsonDocument::new();
        envelope.insert(self.operator.key(), geometry);
        envelope
    }

    /// Filter document to hand to the store: the envelope nested under the field.
    #[must_use]
    pub fn to_filter(&self) -> BsonDocument {
        let mut filter = BsonDocument::new();
        filter.insert(self.field.clone(), self.envelope());
        filter
    }
}

fn check_distance(name: &str, value: Option<f64>) -> Result<(), StoreError> {
    match value {
        Some(d) if !d.is_finite() || d < 0.0 => {
            Err(StoreError::InvalidDistance(format!("{name} must be a non-negative number, got {d}")))
        }
        _ => Ok(()),
    }
}

/// Builds a spatial command over the default `location` field.
///
/// Distance bounds are kept only for `near` and `nearSphere`; other operators
/// drop them without error.
///
/// # Errors
/// - `InvalidShapeForOperator` when the operator cannot take the shape
///   (`geoWithin` with a `Point`).
/// - `InvalidDistance` when a bound the operator uses is negative or not finite.
pub fn build_spatial_command(
    operator: SpatialOperator,
    shape: Shape,
    max_distance: Option<f64>,
    min_distance: Option<f64>,
) -> Result<SpatialCommand, StoreError> {
    let (max_distance, min_distance) =
        if operator.takes_distance() { (max_distance, min_distance) } else { (None, None) };
    let cmd = SpatialCommand {
        field: SPATIAL_FIELD.to_string(),
        operator,
        geometry: shape,
        max_distance,
        min_distance,
    };
    cmd.validate()?;
    Ok(cmd)
}

/// String entry point for request handlers that carry the operator and shape
/// type as plain names.
///
/// # Errors
/// `UnsupportedOperator` for an unknown operator name, `InvalidShapeForOperator`
/// for an unknown shape name or a disallowed pair, `InvalidDistance` as in
/// [`build_spatial_command`].
pub fn build_spatial_command_str(
    operator: &str,
    shape_type: &str,
    coordinates: Coordinates,
    max_distance: Option<f64>,
    min_distance: Option<f64>,
) -> Result<SpatialCommand, StoreError> {
    let operator: SpatialOperator = operator.parse()?;
    let shape = Shape::from_parts(shape_type, coordinates).map_err(|_| {
        StoreError::InvalidShapeForOperator {
            shape: shape_type.to_string(),
            operator: operator.to_string(),
        }
    })?;
    build_spatial_command(operator, shape, max_distance, min_distance)
}
