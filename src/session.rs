use log::{debug, info, warn};
use serde::Serialize;

use crate::erase::{EraseFilter, reassemble_current};
use crate::error::{Result, TrackerError};
use crate::geo_utils::haversine_distance;
use crate::gpx_types::{Coordinate, Fix, GpxDocument, Track, Waypoint, WaypointId};
use crate::parser::parse_gpx;
use crate::segment::TrackSegment;
use crate::stats::{Stats, reduce_all};
use crate::writer::write_gpx;

/// Cached distance and elevation totals, in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningTotals {
    /// Every segment of every track.
    pub total_tracked_distance: f64,
    pub total_elevation_gain: f64,
    /// The open track's closed segments plus the current segment.
    pub current_track_distance: f64,
    pub current_segment_distance: f64,
}

/// Waypoints, closed tracks, the segments of the track being recorded and
/// the segment currently receiving fixes.
///
/// The running totals are advanced in O(1) by [`TrackSession::add_fix`] and
/// rebuilt by [`TrackSession::recalculate_stats`] after every structural
/// change. [`TrackSession::global_stats`] never reads them.
#[derive(Debug, Clone, Default)]
pub struct TrackSession {
    waypoints: Vec<Waypoint>,
    tracks: Vec<Track>,
    track_segments: Vec<TrackSegment>,
    current_segment: TrackSegment,
    totals: RunningTotals,
}

impl TrackSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a GPX document and resume recording from it.
    pub fn from_gpx_str(xml: &str) -> Result<Self> {
        let mut session = Self::new();
        session.load_gpx_str(xml)?;
        Ok(session)
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track_segments(&self) -> &[TrackSegment] {
        &self.track_segments
    }

    pub fn current_segment(&self) -> &TrackSegment {
        &self.current_segment
    }

    pub fn totals(&self) -> RunningTotals {
        self.totals
    }

    pub fn total_tracked_distance(&self) -> f64 {
        self.totals.total_tracked_distance
    }

    pub fn total_elevation_gain(&self) -> f64 {
        self.totals.total_elevation_gain
    }

    pub fn current_track_distance(&self) -> f64 {
        self.totals.current_track_distance
    }

    pub fn current_segment_distance(&self) -> f64 {
        self.totals.current_segment_distance
    }

    pub fn add_waypoint(&mut self, waypoint: Waypoint) -> WaypointId {
        let id = waypoint.id();
        self.waypoints.push(waypoint);
        id
    }

    pub fn remove_waypoint(&mut self, id: WaypointId) -> Result<Waypoint> {
        match self.waypoints.iter().position(|w| w.id() == id) {
            Some(index) => Ok(self.waypoints.remove(index)),
            None => {
                warn!("Waypoint {id} not found, nothing removed");
                Err(TrackerError::WaypointNotFound(id))
            }
        }
    }

    /// Append a live fix to the current segment and advance the running
    /// totals without rescanning the segment.
    ///
    /// Fixes without a coordinate are rejected and leave the session as is.
    pub fn add_fix(&mut self, fix: Fix) -> Result<()> {
        let Some(coordinate) = fix.coordinate() else {
            return Err(TrackerError::MissingCoordinate);
        };

        if let (Some(baseline), Some(ele)) = (self.current_segment.last_elevation(), fix.elevation())
        {
            let diff = ele - baseline;
            if diff > 0.0 {
                self.totals.total_elevation_gain += diff;
            }
        }

        let previous = self.current_segment.last().and_then(Fix::coordinate);
        self.current_segment.append(fix);

        if let Some(previous) = previous {
            let distance = haversine_distance(&previous, &coordinate);
            self.totals.current_track_distance += distance;
            self.totals.total_tracked_distance += distance;
            self.totals.current_segment_distance += distance;
        }
        Ok(())
    }

    /// Close the current segment and open an empty one. Does nothing when the
    /// current segment has no fixes.
    pub fn start_new_segment(&mut self) {
        if self.current_segment.is_empty() {
            return;
        }
        let closed = std::mem::take(&mut self.current_segment);
        debug!("Closing segment with {} fixes", closed.len());
        self.track_segments.push(closed);
        self.totals.current_segment_distance = 0.0;
    }

    /// Discard everything recorded in this session.
    pub fn reset(&mut self) {
        self.waypoints.clear();
        self.tracks.clear();
        self.track_segments.clear();
        self.current_segment = TrackSegment::new();
        self.totals = RunningTotals::default();
        debug!("Session reset");
    }

    /// Resume from previously saved tracks. The last track is reopened: its
    /// segments become the open track's segments, earlier tracks stay closed.
    pub fn load_from(&mut self, mut tracks: Vec<Track>) {
        self.track_segments = tracks
            .pop()
            .map(|track| track.segments)
            .unwrap_or_default()
            .into_iter()
            .filter(|segment| !segment.is_empty())
            .collect();
        self.tracks = tracks;
        self.recalculate_stats();
        info!(
            "Loaded {} closed tracks and {} open segments",
            self.tracks.len(),
            self.track_segments.len()
        );
    }

    /// Load waypoints and tracks from a parsed document.
    pub fn load_document(&mut self, document: GpxDocument) {
        self.waypoints.extend(document.waypoints);
        self.load_from(document.tracks);
    }

    pub fn load_gpx_str(&mut self, xml: &str) -> Result<()> {
        let document = parse_gpx(xml)?;
        self.load_document(document);
        Ok(())
    }

    /// Remove fixes within `radius_meters` of `at`, splitting segments where
    /// fixes disappear, then rebuild the running totals.
    ///
    /// A negative or NaN radius erases nothing. Returns the number of fixes
    /// removed.
    pub fn erase(&mut self, at: Coordinate, radius_meters: f64) -> usize {
        let Some(filter) = EraseFilter::new(at, radius_meters) else {
            warn!("Ignoring erase with invalid radius {radius_meters}");
            return 0;
        };

        let (pieces, mut removed) = filter.apply(std::slice::from_ref(&self.current_segment));
        let (current, closed) = reassemble_current(pieces);

        let (mut segments, count) = filter.apply(&self.track_segments);
        removed += count;
        segments.extend(closed);
        self.track_segments = segments;
        self.current_segment = current;

        for track in &mut self.tracks {
            let (segments, count) = filter.apply(&track.segments);
            removed += count;
            track.segments = segments;
        }

        debug!(
            "Erased {removed} fixes within {radius_meters} m of ({}, {})",
            at.latitude(),
            at.longitude()
        );
        self.recalculate_stats();
        removed
    }

    /// Rebuild the running totals from every segment.
    pub fn recalculate_stats(&mut self) {
        let history = reduce_all(self.tracks.iter().flat_map(|track| &track.segments));
        let open = reduce_all(&self.track_segments);
        let current = self.current_segment.calculate_stats();

        let open_track = open.combine(current);
        let all = history.combine(open_track);

        self.totals = RunningTotals {
            total_tracked_distance: all.total_distance,
            total_elevation_gain: all.total_elevation_gain,
            current_track_distance: open_track.total_distance,
            current_segment_distance: current.total_distance,
        };
        debug!("Recalculated totals: {:?}", self.totals);
    }

    /// Every segment of the session: closed tracks, the open track's segments
    /// and the current segment.
    pub fn all_segments(&self) -> impl Iterator<Item = &TrackSegment> {
        self.tracks
            .iter()
            .flat_map(|track| track.segments.iter())
            .chain(self.track_segments.iter())
            .chain(std::iter::once(&self.current_segment))
    }

    /// Statistics over all segments, computed from the fixes themselves.
    pub fn global_stats(&self) -> Stats {
        reduce_all(self.all_segments())
    }

    /// The open track's segments, with the current segment last if it has
    /// any fixes.
    pub fn export_segments(&self) -> impl Iterator<Item = &TrackSegment> {
        self.track_segments
            .iter()
            .chain(Some(&self.current_segment).filter(|segment| !segment.is_empty()))
    }

    /// Snapshot of the session as a document: closed tracks followed by the
    /// open track, which is always present so a reload reopens it.
    pub fn to_document(&self, creator: &str) -> GpxDocument {
        let mut tracks = self.tracks.clone();
        tracks.push(Track::new(self.export_segments().cloned().collect()));
        GpxDocument {
            creator: Some(creator.to_string()),
            waypoints: self.waypoints.clone(),
            tracks,
        }
    }

    /// Fixes without a coordinate have no GPX form and are not written, so a
    /// session holding them reloads with different statistics.
    pub fn to_gpx_string(&self, creator: &str) -> Result<String> {
        info!(
            "Exporting session: {} waypoints, {} closed tracks",
            self.waypoints.len(),
            self.tracks.len()
        );
        write_gpx(&self.to_document(creator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    const EPS: f64 = 1e-6;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_735_689_600 + secs, 0).unwrap()
    }

    fn fix(lat: f64, lon: f64) -> Fix {
        Fix::new(lat, lon).unwrap()
    }

    fn fix_ele(lat: f64, lon: f64, ele: f64) -> Fix {
        fix(lat, lon).with_elevation(ele).unwrap()
    }

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    fn record(session: &mut TrackSession, n: usize, lat: f64) {
        for i in 0..n {
            session.add_fix(fix(lat, i as f64 * 0.001)).unwrap();
        }
    }

    fn assert_totals_consistent(session: &TrackSession) {
        let mut fresh = session.clone();
        fresh.recalculate_stats();
        let a = session.totals();
        let b = fresh.totals();
        assert!((a.total_tracked_distance - b.total_tracked_distance).abs() < EPS);
        assert!((a.total_elevation_gain - b.total_elevation_gain).abs() < EPS);
        assert!((a.current_track_distance - b.current_track_distance).abs() < EPS);
        assert!((a.current_segment_distance - b.current_segment_distance).abs() < EPS);
    }

    #[test]
    fn test_add_fix_accumulates_distance() {
        let mut session = TrackSession::new();
        session.add_fix(fix(0.0, 0.0).with_time(t(0))).unwrap();
        assert_eq!(session.total_tracked_distance(), 0.0);
        session
            .add_fix(fix(0.0, 0.001).with_time(t(10)))
            .unwrap();

        let d = session.total_tracked_distance();
        assert!((d - 111.19).abs() < 1.0);
        assert_eq!(session.current_track_distance(), d);
        assert_eq!(session.current_segment_distance(), d);
        assert!((session.global_stats().total_distance - d).abs() < EPS);
        assert_eq!(session.global_stats().moving_time, 10.0);
    }

    #[test]
    fn test_add_fix_rejects_unlocated() {
        let mut session = TrackSession::new();
        let err = session.add_fix(Fix::unlocated().with_time(t(0)));
        assert!(matches!(err, Err(TrackerError::MissingCoordinate)));
        assert!(session.current_segment().is_empty());
    }

    #[test]
    fn test_add_fix_elevation_uses_last_known_elevation() {
        let mut session = TrackSession::new();
        session.add_fix(fix_ele(0.0, 0.0, 100.0)).unwrap();
        session.add_fix(fix(0.0, 0.001)).unwrap();
        session.add_fix(fix_ele(0.0, 0.002, 104.0)).unwrap();
        session.add_fix(fix_ele(0.0, 0.003, 101.0)).unwrap();
        session.add_fix(fix_ele(0.0, 0.004, 103.0)).unwrap();

        assert!((session.total_elevation_gain() - 6.0).abs() < EPS);
        assert!((session.current_segment().elevation_gain() - 6.0).abs() < EPS);
        assert_totals_consistent(&session);
    }

    #[test]
    fn test_totals_match_reduction_across_segments() {
        let mut session = TrackSession::new();
        record(&mut session, 4, 0.0);
        session.start_new_segment();
        record(&mut session, 3, 1.0);
        session.start_new_segment();
        record(&mut session, 5, 2.0);

        let reduced = session.global_stats().total_distance;
        assert!((session.total_tracked_distance() - reduced).abs() < EPS);
        assert!((session.current_track_distance() - reduced).abs() < EPS);
        assert!(
            (session.current_segment_distance() - session.current_segment().length()).abs() < EPS
        );
        assert_totals_consistent(&session);
    }

    #[test]
    fn test_start_new_segment_is_idempotent() {
        let mut session = TrackSession::new();
        session.start_new_segment();
        assert!(session.track_segments().is_empty());

        record(&mut session, 3, 0.0);
        session.start_new_segment();
        assert_eq!(session.track_segments().len(), 1);
        assert_eq!(session.current_segment_distance(), 0.0);
        assert!(session.current_track_distance() > 0.0);

        session.start_new_segment();
        assert_eq!(session.track_segments().len(), 1);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut session = TrackSession::new();
        record(&mut session, 3, 0.0);
        session.start_new_segment();
        session.add_fix(fix(0.0, 1.0).with_time(t(5))).unwrap();
        session.add_waypoint(Waypoint::new(coord(1.0, 1.0)));
        session.reset();

        assert!(session.waypoints().is_empty());
        assert!(session.tracks().is_empty());
        assert!(session.track_segments().is_empty());
        assert!(session.current_segment().is_empty());
        assert_eq!(session.totals(), RunningTotals::default());

        let stats = session.global_stats();
        assert_eq!(stats.total_distance, 0.0);
        assert_eq!(stats.moving_time, 0.0);
        assert_eq!(stats.start_time, None);
        assert_eq!(stats.end_time, None);
    }

    #[test]
    fn test_remove_missing_waypoint_is_reported() {
        let mut session = TrackSession::new();
        let id = session.add_waypoint(Waypoint::new(coord(1.0, 2.0)));
        let other = Waypoint::new(coord(3.0, 4.0)).id();

        assert!(matches!(
            session.remove_waypoint(other),
            Err(TrackerError::WaypointNotFound(_))
        ));
        assert_eq!(session.waypoints().len(), 1);

        let removed = session.remove_waypoint(id).unwrap();
        assert_eq!(removed.id(), id);
        assert!(session.waypoints().is_empty());
    }

    #[test]
    fn test_erase_interior_splits_current_segment() {
        let mut session = TrackSession::new();
        record(&mut session, 5, 0.0);
        let removed = session.erase(coord(0.0, 0.002), 0.0);

        assert_eq!(removed, 1);
        assert_eq!(session.track_segments().len(), 1);
        assert_eq!(session.track_segments()[0].len(), 2);
        assert_eq!(session.current_segment().len(), 2);
        assert_totals_consistent(&session);
        assert!((session.current_segment_distance() - session.current_segment().length()).abs() < EPS);
    }

    #[test]
    fn test_erase_whole_current_segment() {
        let mut session = TrackSession::new();
        record(&mut session, 5, 0.0);
        let removed = session.erase(coord(0.0, 0.002), 5_000.0);

        assert_eq!(removed, 5);
        assert!(session.current_segment().is_empty());
        assert!(session.track_segments().is_empty());
        assert_eq!(session.totals(), RunningTotals::default());
    }

    #[test]
    fn test_erase_closed_segments_and_tracks() {
        let mut session = TrackSession::new();
        let old = TrackSegment::from_fixes((0..4).map(|i| fix(10.0, i as f64 * 0.001)).collect());
        session.load_from(vec![Track::new(vec![old]), Track::new(Vec::new())]);
        record(&mut session, 3, 0.0);
        session.start_new_segment();
        record(&mut session, 3, 0.0);

        // Far from the recorded fixes, hits the second fix of the old track.
        let removed = session.erase(coord(10.0, 0.001), 1.0);
        assert_eq!(removed, 1);
        assert_eq!(session.tracks()[0].segments.len(), 2);
        assert_eq!(session.tracks()[0].segments[0].len(), 1);
        assert_eq!(session.tracks()[0].segments[1].len(), 2);
        assert_eq!(session.track_segments().len(), 1);
        assert_eq!(session.current_segment().len(), 3);
        assert_totals_consistent(&session);

        // Hits the same spot in the closed open-track segment and the current one.
        let removed = session.erase(coord(0.0, 0.0), 1.0);
        assert_eq!(removed, 2);
        assert_eq!(session.track_segments()[0].len(), 2);
        assert_eq!(session.current_segment().len(), 2);
        assert_totals_consistent(&session);
    }

    #[test]
    fn test_erase_invalid_radius_is_noop() {
        let mut session = TrackSession::new();
        record(&mut session, 3, 0.0);
        let before = session.totals();
        assert_eq!(session.erase(coord(0.0, 0.0), -1.0), 0);
        assert_eq!(session.erase(coord(0.0, 0.0), f64::NAN), 0);
        assert_eq!(session.current_segment().len(), 3);
        assert_eq!(session.totals(), before);
    }

    #[test]
    fn test_load_reopens_last_track_and_recomputes() {
        let mut session = TrackSession::new();
        record(&mut session, 3, 5.0);
        let first_pass = session.total_tracked_distance();

        let closed = Track::new(vec![TrackSegment::from_fixes(vec![
            fix_ele(1.0, 0.0, 10.0),
            fix_ele(1.0, 0.001, 20.0),
        ])]);
        let open = Track::new(vec![
            TrackSegment::from_fixes(vec![fix(2.0, 0.0), fix(2.0, 0.001)]),
            TrackSegment::new(),
        ]);
        session.load_from(vec![closed.clone(), open.clone()]);
        session.load_from(vec![closed.clone(), open.clone()]);

        assert_eq!(session.tracks().len(), 1);
        assert_eq!(session.track_segments().len(), 1);
        // Loading twice must not double count.
        let expected = first_pass + closed.segments[0].length() + open.segments[0].length();
        assert!((session.total_tracked_distance() - expected).abs() < EPS);
        assert!((session.total_elevation_gain() - 10.0).abs() < EPS);
        assert_totals_consistent(&session);
    }

    #[test]
    fn test_export_segments_appends_non_empty_current() {
        let mut session = TrackSession::new();
        record(&mut session, 2, 0.0);
        session.start_new_segment();
        assert_eq!(session.export_segments().count(), 1);
        record(&mut session, 2, 1.0);
        assert_eq!(session.export_segments().count(), 2);

        let doc = session.to_document("test");
        assert_eq!(doc.tracks.len(), 1);
        assert_eq!(doc.tracks[0].segments.len(), 2);
        assert_eq!(doc.creator.as_deref(), Some("test"));
    }

    #[test]
    fn test_global_stats_ignores_stale_totals() {
        let mut session = TrackSession::new();
        session.add_fix(fix(0.0, 0.0).with_time(t(0))).unwrap();
        session
            .add_fix(fix(0.0, 0.01).with_time(t(0) + Duration::seconds(60)))
            .unwrap();
        session.totals.total_tracked_distance = 1.0e9;
        let stats = session.global_stats();
        assert!(stats.total_distance < 2_000.0);
    }
}
