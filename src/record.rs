use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry;

/// Smallest ring that still describes an area.
pub const MIN_VERTICES: usize = 3;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("a polygon needs at least 3 vertices, got {0}")]
    TooFewVertices(usize),
}

/// Identifies one drawn shape for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeId(Uuid);

impl ShapeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ShapeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ShapeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Geographic vertex, stored as `[lat, lng]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<[f64; 2]> for LatLng {
    fn from([lat, lng]: [f64; 2]) -> Self {
        Self { lat, lng }
    }
}

impl From<LatLng> for [f64; 2] {
    fn from(p: LatLng) -> Self {
        [p.lat, p.lng]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    #[serde(rename = "")]
    Unset,
    Planting,
    Cutting,
}

impl Action {
    pub fn is_set(self) -> bool {
        self != Action::Unset
    }
}

/// Annotation attached to one drawn polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    #[serde(default)]
    pub id: ShapeId,
    pub count: u32,
    #[serde(default)]
    pub action: Action,
    coordinates: Vec<LatLng>,
}

impl AnnotationRecord {
    /// Fresh record for a just-drawn shape: no trees, no action yet.
    pub fn new(id: ShapeId, coordinates: Vec<LatLng>) -> Result<Self, RecordError> {
        if coordinates.len() < MIN_VERTICES {
            return Err(RecordError::TooFewVertices(coordinates.len()));
        }
        Ok(Self {
            id,
            count: 0,
            action: Action::Unset,
            coordinates,
        })
    }

    pub fn coordinates(&self) -> &[LatLng] {
        &self.coordinates
    }

    pub fn is_valid(&self) -> bool {
        self.coordinates.len() >= MIN_VERTICES
    }

    pub fn area_m2(&self) -> f64 {
        geometry::geodesic_area(&self.coordinates)
    }
}
