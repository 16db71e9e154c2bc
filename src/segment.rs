use crate::geo_utils::haversine_distance;
use crate::gpx_types::{Coordinate, Fix};
use crate::stats::Stats;

/// Pairs of fixes moving faster than this (m/s) count towards moving time.
pub const MOVING_SPEED_THRESHOLD: f64 = 0.5;

/// An ordered run of fixes (<trkseg>). Insertion order is chronological
/// order and is never changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackSegment {
    fixes: Vec<Fix>,
    // Elevation of the most recent fix that reported one.
    last_elevation: Option<f64>,
}

impl TrackSegment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixes(fixes: Vec<Fix>) -> Self {
        let last_elevation = fixes.iter().rev().find_map(Fix::elevation);
        Self {
            fixes,
            last_elevation,
        }
    }

    pub fn append(&mut self, fix: Fix) {
        if let Some(ele) = fix.elevation() {
            self.last_elevation = Some(ele);
        }
        self.fixes.push(fix);
    }

    pub fn fixes(&self) -> &[Fix] {
        &self.fixes
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }

    pub fn last(&self) -> Option<&Fix> {
        self.fixes.last()
    }

    /// Elevation of the latest fix that has one, in O(1).
    pub fn last_elevation(&self) -> Option<f64> {
        self.last_elevation
    }

    /// Ordered coordinates of the located fixes, for drawing the segment.
    pub fn coordinates(&self) -> Vec<Coordinate> {
        self.fixes.iter().filter_map(Fix::coordinate).collect()
    }

    /// Length in meters. Fixes without a coordinate are skipped, so the
    /// distance runs between the located neighbours on either side.
    pub fn length(&self) -> f64 {
        if self.fixes.len() < 2 {
            return 0.0;
        }
        let mut length = 0.0;
        let mut prev: Option<Coordinate> = None;
        for coord in self.fixes.iter().filter_map(Fix::coordinate) {
            if let Some(p) = prev {
                length += haversine_distance(&p, &coord);
            }
            prev = Some(coord);
        }
        length
    }

    /// Sum of positive elevation deltas, measured against the last fix that
    /// reported an elevation.
    pub fn elevation_gain(&self) -> f64 {
        if self.fixes.len() < 2 {
            return 0.0;
        }
        let mut gain = 0.0;
        let mut baseline: Option<f64> = None;
        for ele in self.fixes.iter().filter_map(Fix::elevation) {
            if let Some(prev) = baseline {
                let diff = ele - prev;
                if diff > 0.0 {
                    gain += diff;
                }
            }
            baseline = Some(ele);
        }
        gain
    }

    /// Full statistics for this segment in a single scan.
    pub fn calculate_stats(&self) -> Stats {
        let mut stats = Stats {
            total_distance: self.length(),
            ..Stats::default()
        };

        let (Some(first), Some(last)) = (self.fixes.first(), self.fixes.last()) else {
            return stats;
        };
        stats.start_time = first.time();
        stats.end_time = last.time();

        let mut baseline: Option<f64> = None;
        let mut prev: Option<&Fix> = None;
        for fix in &self.fixes {
            if let Some(ele) = fix.elevation() {
                stats.min_elevation = Some(stats.min_elevation.map_or(ele, |m| m.min(ele)));
                stats.max_elevation = Some(stats.max_elevation.map_or(ele, |m| m.max(ele)));
                if let Some(base) = baseline {
                    let diff = ele - base;
                    if diff > 0.0 {
                        stats.total_elevation_gain += diff;
                    } else {
                        stats.total_elevation_loss -= diff;
                    }
                }
                baseline = Some(ele);
            }
            if let Some(p) = prev {
                stats.moving_time += moving_seconds(p, fix);
            }
            prev = Some(fix);
        }
        stats
    }
}

/// Seconds between two consecutive fixes if both are located and timed and
/// the implied speed exceeds [`MOVING_SPEED_THRESHOLD`], otherwise zero.
fn moving_seconds(prev: &Fix, curr: &Fix) -> f64 {
    let (Some(a), Some(b)) = (prev.coordinate(), curr.coordinate()) else {
        return 0.0;
    };
    let (Some(t0), Some(t1)) = (prev.time(), curr.time()) else {
        return 0.0;
    };
    let dt = (t1 - t0).num_milliseconds() as f64 / 1000.0;
    if dt <= 0.0 {
        return 0.0;
    }
    if haversine_distance(&a, &b) / dt > MOVING_SPEED_THRESHOLD {
        dt
    } else {
        0.0
    }
}
