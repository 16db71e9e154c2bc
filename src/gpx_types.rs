use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use crate::error::{Result, TrackerError};
use crate::segment::TrackSegment;

/// Parsed or exported GPX content: waypoints and tracks.
#[derive(Debug, Clone, Default)]
pub struct GpxDocument {
    pub creator: Option<String>,
    pub waypoints: Vec<Waypoint>,
    pub tracks: Vec<Track>,
}

/// A WGS84 latitude/longitude pair in degrees.
///
/// Only constructed through [`Coordinate::new`], so NaN, infinite and
/// out-of-range values never reach distance accumulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        if !valid {
            return Err(TrackerError::InvalidCoordinate {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// A single location sample. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Fix {
    coordinate: Option<Coordinate>,
    elevation: Option<f64>,
    time: Option<DateTime<Utc>>,
}

impl Fix {
    /// A located fix. Fails on non-finite or out-of-range coordinates.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        Ok(Self::at(Coordinate::new(latitude, longitude)?))
    }

    pub fn at(coordinate: Coordinate) -> Self {
        Self {
            coordinate: Some(coordinate),
            elevation: None,
            time: None,
        }
    }

    /// A fix without a position (e.g. an altimeter-only sample).
    pub fn unlocated() -> Self {
        Self {
            coordinate: None,
            elevation: None,
            time: None,
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Result<Self> {
        if !elevation.is_finite() {
            return Err(TrackerError::InvalidElevation(elevation));
        }
        self.elevation = Some(elevation);
        Ok(self)
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        self.coordinate
    }

    pub fn elevation(&self) -> Option<f64> {
        self.elevation
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        self.time
    }
}

static NEXT_WAYPOINT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a waypoint, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WaypointId(u64);

impl WaypointId {
    fn next() -> Self {
        Self(NEXT_WAYPOINT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for WaypointId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for WaypointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A user-placed point of interest (<wpt>).
#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    id: WaypointId,
    pub coordinate: Coordinate,
    elevation: Option<f64>,
    pub time: Option<DateTime<Utc>>,
    pub name: Option<String>,
    pub desc: Option<String>,
    pub cmt: Option<String>,
    pub sym: Option<String>,
    pub point_type: Option<String>,
}

impl Waypoint {
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            id: WaypointId::next(),
            coordinate,
            elevation: None,
            time: None,
            name: None,
            desc: None,
            cmt: None,
            sym: None,
            point_type: None,
        }
    }

    pub fn id(&self) -> WaypointId {
        self.id
    }

    /// Rejects NaN and infinite elevations, like [`Fix::with_elevation`].
    pub fn with_elevation(mut self, elevation: f64) -> Result<Self> {
        if !elevation.is_finite() {
            return Err(TrackerError::InvalidElevation(elevation));
        }
        self.elevation = Some(elevation);
        Ok(self)
    }

    pub fn elevation(&self) -> Option<f64> {
        self.elevation
    }

    /// Same position and metadata, ignoring identity.
    pub fn same_content(&self, other: &Waypoint) -> bool {
        self.coordinate == other.coordinate
            && self.elevation == other.elevation
            && self.time == other.time
            && self.name == other.name
            && self.desc == other.desc
            && self.cmt == other.cmt
            && self.sym == other.sym
            && self.point_type == other.point_type
    }
}

/// A closed track (<trk>) made of one or more segments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    pub name: Option<String>,
    pub segments: Vec<TrackSegment>,
}

impl Track {
    pub fn new(segments: Vec<TrackSegment>) -> Self {
        Self {
            name: None,
            segments,
        }
    }
}
