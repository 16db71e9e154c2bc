use crate::geo_utils::haversine_distance;
use crate::gpx_types::{Coordinate, Fix};
use crate::segment::TrackSegment;

/// Circle of fixes to remove. Segments are split where fixes disappear;
/// fixes from different input segments never end up in the same output.
#[derive(Debug, Clone, Copy)]
pub struct EraseFilter {
    center: Coordinate,
    radius: f64,
}

impl EraseFilter {
    /// Returns `None` for a negative or NaN radius, which erases nothing.
    /// A zero radius still removes fixes exactly at `center`.
    pub fn new(center: Coordinate, radius_meters: f64) -> Option<Self> {
        if radius_meters.is_nan() || radius_meters < 0.0 {
            return None;
        }
        Some(Self {
            center,
            radius: radius_meters,
        })
    }

    /// Unlocated fixes are always kept.
    pub fn keeps(&self, fix: &Fix) -> bool {
        match fix.coordinate() {
            Some(c) => haversine_distance(&c, &self.center) > self.radius,
            None => true,
        }
    }

    /// Filter a list of segments, returning the surviving runs and the number
    /// of fixes removed.
    pub fn apply(&self, segments: &[TrackSegment]) -> (Vec<TrackSegment>, usize) {
        let mut output = Vec::new();
        let mut removed = 0;
        for segment in segments {
            removed += self.split_into(segment, &mut output);
        }
        (output, removed)
    }

    fn split_into(&self, segment: &TrackSegment, output: &mut Vec<TrackSegment>) -> usize {
        let mut removed = 0;
        let mut run: Vec<Fix> = Vec::new();
        for fix in segment.fixes() {
            if self.keeps(fix) {
                run.push(fix.clone());
            } else {
                removed += 1;
                if !run.is_empty() {
                    output.push(TrackSegment::from_fixes(std::mem::take(&mut run)));
                }
            }
        }
        if !run.is_empty() {
            output.push(TrackSegment::from_fixes(run));
        }
        removed
    }
}

/// Rebuild the open segment from the pieces left after erasing it.
///
/// Returns the new current segment and the pieces (in order) to close
/// before it. Only the last piece stays open.
pub fn reassemble_current(mut pieces: Vec<TrackSegment>) -> (TrackSegment, Vec<TrackSegment>) {
    match pieces.pop() {
        Some(last) => (last, pieces),
        None => (TrackSegment::new(), Vec::new()),
    }
}
