use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::segment::TrackSegment;

/// Summary of one or more segments. Distances and elevations are in meters,
/// moving time in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_distance: f64,
    pub total_elevation_gain: f64,
    pub total_elevation_loss: f64,
    pub min_elevation: Option<f64>,
    pub max_elevation: Option<f64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub moving_time: f64,
}

impl Stats {
    /// Merge two summaries. Sums add; optional bounds keep whichever side is
    /// defined, or the extreme of both.
    pub fn combine(self, other: Stats) -> Stats {
        Stats {
            total_distance: self.total_distance + other.total_distance,
            total_elevation_gain: self.total_elevation_gain + other.total_elevation_gain,
            total_elevation_loss: self.total_elevation_loss + other.total_elevation_loss,
            min_elevation: merge(self.min_elevation, other.min_elevation, f64::min),
            max_elevation: merge(self.max_elevation, other.max_elevation, f64::max),
            start_time: merge(self.start_time, other.start_time, std::cmp::min),
            end_time: merge(self.end_time, other.end_time, std::cmp::max),
            moving_time: self.moving_time + other.moving_time,
        }
    }

    /// Average speed over moving time in m/s, 0 when nothing moved.
    pub fn average_speed(&self) -> f64 {
        if self.moving_time > 0.0 {
            self.total_distance / self.moving_time
        } else {
            0.0
        }
    }
}

fn merge<T>(a: Option<T>, b: Option<T>, pick: impl FnOnce(T, T) -> T) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(pick(a, b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Free-function form of [`Stats::combine`].
pub fn combine(a: Stats, b: Stats) -> Stats {
    a.combine(b)
}

/// Fold the statistics of every segment, left to right.
pub fn reduce_all<'a, I>(segments: I) -> Stats
where
    I: IntoIterator<Item = &'a TrackSegment>,
{
    segments
        .into_iter()
        .map(TrackSegment::calculate_stats)
        .fold(Stats::default(), combine)
}
