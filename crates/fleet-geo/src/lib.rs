//! Zone geometry and point containment.
//!
//! Zones arrive from storage as a flat [`ZoneGeometry`] record in which every
//! shape field is optional. [`ZoneGeometry::shape`] turns that record into a
//! [`ZoneShape`], and [`contains`] answers containment without ever failing:
//! a zone whose shape cannot be built contains nothing.
//!
//! Boundaries are evaluated without tolerance. A point lying exactly on a
//! circle edge, rectangle bound or polygon edge may classify either way
//! depending on floating-point rounding.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Mean Earth radius used by the Haversine distance.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

pub const MIN_POLYGON_VERTICES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// Checks WGS84 ranges: latitude in [-90, 90], longitude in [-180, 180].
    pub fn validate(&self) -> Result<(), ShapeError> {
        if !self.is_finite() {
            return Err(ShapeError::NonFiniteCoordinate);
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ShapeError::LatitudeOutOfRange(self.latitude));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ShapeError::LongitudeOutOfRange(self.longitude));
        }
        Ok(())
    }
}

/// Great-circle distance in meters.
pub fn haversine_distance_m(from: Coordinate, to: Coordinate) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlat = (to.latitude - from.latitude).to_radians();
    let dlng = (to.longitude - from.longitude).to_radians();
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    /// Inclusive on every bound. Boxes with `west > east` (antimeridian)
    /// contain nothing.
    pub fn contains(&self, coord: Coordinate) -> bool {
        coord.latitude <= self.north
            && coord.latitude >= self.south
            && coord.longitude <= self.east
            && coord.longitude >= self.west
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.west > self.east
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneType {
    Circle,
    Rectangle,
    Polygon,
}

impl fmt::Display for ZoneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Circle => "circle",
            Self::Rectangle => "rectangle",
            Self::Polygon => "polygon",
        };
        write!(f, "{}", value)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShapeError {
    #[error("{zone_type} zone is missing `{field}`")]
    MissingField {
        zone_type: ZoneType,
        field: &'static str,
    },
    #[error("coordinate is not a finite number")]
    NonFiniteCoordinate,
    #[error("radius must be positive, got {0}")]
    NonPositiveRadius(f64),
    #[error("polygon needs at least 3 vertices, got {0}")]
    TooFewVertices(usize),
    #[error("south bound {south} is above north bound {north}")]
    InvertedBounds { north: f64, south: f64 },
    #[error("rectangles crossing the antimeridian are not supported (west {west} > east {east})")]
    CrossesAntimeridian { west: f64, east: f64 },
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),
}

/// Flat zone record as stored. Only the fields matching `zone_type` are
/// meaningful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneGeometry {
    pub zone_type: ZoneType,
    #[serde(default)]
    pub center_lat: Option<f64>,
    #[serde(default)]
    pub center_lng: Option<f64>,
    #[serde(default)]
    pub radius_meters: Option<f64>,
    #[serde(default)]
    pub north_bound: Option<f64>,
    #[serde(default)]
    pub south_bound: Option<f64>,
    #[serde(default)]
    pub east_bound: Option<f64>,
    #[serde(default)]
    pub west_bound: Option<f64>,
    #[serde(default)]
    pub polygon_points: Vec<Coordinate>,
}

impl ZoneGeometry {
    fn empty(zone_type: ZoneType) -> Self {
        Self {
            zone_type,
            center_lat: None,
            center_lng: None,
            radius_meters: None,
            north_bound: None,
            south_bound: None,
            east_bound: None,
            west_bound: None,
            polygon_points: Vec::new(),
        }
    }

    pub fn circle(center: Coordinate, radius_meters: f64) -> Self {
        Self {
            center_lat: Some(center.latitude),
            center_lng: Some(center.longitude),
            radius_meters: Some(radius_meters),
            ..Self::empty(ZoneType::Circle)
        }
    }

    pub fn rectangle(bounds: BoundingBox) -> Self {
        Self {
            north_bound: Some(bounds.north),
            south_bound: Some(bounds.south),
            east_bound: Some(bounds.east),
            west_bound: Some(bounds.west),
            ..Self::empty(ZoneType::Rectangle)
        }
    }

    pub fn polygon(vertices: Vec<Coordinate>) -> Self {
        Self {
            polygon_points: vertices,
            ..Self::empty(ZoneType::Polygon)
        }
    }

    /// Builds the shape for `zone_type` from the matching fields. Only
    /// checks what containment needs; see [`ZoneShape::validate`] for the
    /// stricter checks applied when a zone is defined.
    pub fn shape(&self) -> Result<ZoneShape, ShapeError> {
        let zone_type = self.zone_type;
        let require = |value: Option<f64>, field: &'static str| required(zone_type, value, field);

        match zone_type {
            ZoneType::Circle => {
                let center = Coordinate::new(
                    require(self.center_lat, "center_lat")?,
                    require(self.center_lng, "center_lng")?,
                );
                let radius_m = require(self.radius_meters, "radius_meters")?;
                if radius_m <= 0.0 {
                    return Err(ShapeError::NonPositiveRadius(radius_m));
                }
                Ok(ZoneShape::Circle { center, radius_m })
            }
            ZoneType::Rectangle => Ok(ZoneShape::Rectangle {
                bounds: BoundingBox {
                    north: require(self.north_bound, "north_bound")?,
                    south: require(self.south_bound, "south_bound")?,
                    east: require(self.east_bound, "east_bound")?,
                    west: require(self.west_bound, "west_bound")?,
                },
            }),
            ZoneType::Polygon => {
                if self.polygon_points.len() < MIN_POLYGON_VERTICES {
                    return Err(ShapeError::TooFewVertices(self.polygon_points.len()));
                }
                if !self.polygon_points.iter().all(Coordinate::is_finite) {
                    return Err(ShapeError::NonFiniteCoordinate);
                }
                Ok(ZoneShape::Polygon {
                    vertices: self.polygon_points.clone(),
                })
            }
        }
    }
}

fn required(zone_type: ZoneType, value: Option<f64>, field: &'static str) -> Result<f64, ShapeError> {
    let value = value.ok_or(ShapeError::MissingField { zone_type, field })?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ShapeError::NonFiniteCoordinate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneShape {
    Circle { center: Coordinate, radius_m: f64 },
    Rectangle { bounds: BoundingBox },
    Polygon { vertices: Vec<Coordinate> },
}

impl ZoneShape {
    pub fn zone_type(&self) -> ZoneType {
        match self {
            Self::Circle { .. } => ZoneType::Circle,
            Self::Rectangle { .. } => ZoneType::Rectangle,
            Self::Polygon { .. } => ZoneType::Polygon,
        }
    }

    pub fn contains(&self, point: Coordinate) -> bool {
        match self {
            Self::Circle { center, radius_m } => {
                haversine_distance_m(point, *center) <= *radius_m
            }
            Self::Rectangle { bounds } => bounds.contains(point),
            Self::Polygon { vertices } => polygon_contains(vertices, point),
        }
    }

    /// Rejects shapes a zone editor should never accept, including
    /// antimeridian rectangles, which containment does not support.
    pub fn validate(&self) -> Result<(), ShapeError> {
        match self {
            Self::Circle { center, radius_m } => {
                center.validate()?;
                if *radius_m <= 0.0 || !radius_m.is_finite() {
                    return Err(ShapeError::NonPositiveRadius(*radius_m));
                }
            }
            Self::Rectangle { bounds } => {
                Coordinate::new(bounds.north, bounds.east).validate()?;
                Coordinate::new(bounds.south, bounds.west).validate()?;
                if bounds.south > bounds.north {
                    return Err(ShapeError::InvertedBounds {
                        north: bounds.north,
                        south: bounds.south,
                    });
                }
                if bounds.crosses_antimeridian() {
                    return Err(ShapeError::CrossesAntimeridian {
                        west: bounds.west,
                        east: bounds.east,
                    });
                }
            }
            Self::Polygon { vertices } => {
                if vertices.len() < MIN_POLYGON_VERTICES {
                    return Err(ShapeError::TooFewVertices(vertices.len()));
                }
                for vertex in vertices {
                    vertex.validate()?;
                }
            }
        }
        Ok(())
    }
}

/// Even-odd ray casting; the last vertex connects back to the first.
fn polygon_contains(vertices: &[Coordinate], point: Coordinate) -> bool {
    if vertices.len() < MIN_POLYGON_VERTICES {
        return false;
    }
    let mut inside = false;
    let mut j = vertices.len() - 1;
    for (i, vi) in vertices.iter().enumerate() {
        let vj = vertices[j];
        if (vi.latitude > point.latitude) != (vj.latitude > point.latitude) {
            let crossing_lng = (vj.longitude - vi.longitude) * (point.latitude - vi.latitude)
                / (vj.latitude - vi.latitude)
                + vi.longitude;
            if point.longitude < crossing_lng {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Total containment test: malformed geometry contains nothing.
pub fn contains(point: Coordinate, geometry: &ZoneGeometry) -> bool {
    match geometry.shape() {
        Ok(shape) => shape.contains(point),
        Err(_) => false,
    }
}
