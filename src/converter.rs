use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::{Map, Value as JsonValue};

use crate::gpx_types::{Coordinate, Fix, Waypoint};
use crate::options::{GpxElementType, TrackerOptions};
use crate::segment::TrackSegment;
use crate::session::TrackSession;

/// Convert a session to a GeoJSON FeatureCollection for drawing on a map.
///
/// Closed tracks come first, then the track being recorded, whose features
/// carry `"recording": true`.
pub fn to_feature_collection(session: &TrackSession, opts: &TrackerOptions) -> FeatureCollection {
    let mut features = Vec::new();

    if opts.should_include(GpxElementType::Waypoint) {
        for wpt in session.waypoints() {
            features.push(waypoint_to_feature(wpt, opts));
        }
    }

    if opts.should_include(GpxElementType::Track) {
        for trk in session.tracks() {
            let segments: Vec<&TrackSegment> = trk.segments.iter().collect();
            features.extend(track_to_features(trk.name.as_deref(), &segments, false, opts));
        }
        let open: Vec<&TrackSegment> = session.export_segments().collect();
        features.extend(track_to_features(None, &open, true, opts));
    }

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn feature(geometry: Geometry, props: Map<String, JsonValue>) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

fn waypoint_to_feature(wpt: &Waypoint, opts: &TrackerOptions) -> Feature {
    let coords = point_coords(&wpt.coordinate, wpt.elevation(), opts.include_elevation);
    let geometry = Geometry::new(Value::Point(coords));

    let mut props = Map::new();
    props.insert(
        "gpxType".to_string(),
        JsonValue::String("waypoint".to_string()),
    );
    props.insert("id".to_string(), JsonValue::from(wpt.id().get()));
    insert_optional(&mut props, "name", &wpt.name);
    insert_optional(&mut props, "cmt", &wpt.cmt);
    insert_optional(&mut props, "desc", &wpt.desc);
    insert_optional(&mut props, "sym", &wpt.sym);
    insert_optional(&mut props, "type", &wpt.point_type);
    if let Some(ele) = wpt.elevation() {
        props.insert("ele".to_string(), JsonValue::from(ele));
    }
    if let Some(time) = wpt.time {
        props.insert("time".to_string(), JsonValue::String(time.to_rfc3339()));
    }

    feature(geometry, props)
}

/// Located fixes of a segment; unlocated fixes cannot be drawn.
fn located(seg: &TrackSegment) -> Vec<(Coordinate, &Fix)> {
    seg.fixes()
        .iter()
        .filter_map(|fix| fix.coordinate().map(|c| (c, fix)))
        .collect()
}

fn track_to_features(
    name: Option<&str>,
    segments: &[&TrackSegment],
    recording: bool,
    opts: &TrackerOptions,
) -> Vec<Feature> {
    let lines: Vec<Vec<(Coordinate, &Fix)>> = segments
        .iter()
        .map(|seg| located(seg))
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        return Vec::new();
    }

    let props = build_track_props(name, segments, recording);

    // Single point across all segments → Point Feature
    let total_points: usize = lines.iter().map(Vec::len).sum();
    if total_points == 1 {
        let (coord, fix) = lines[0][0];
        let geometry = Geometry::new(Value::Point(point_coords(
            &coord,
            fix.elevation(),
            opts.include_elevation,
        )));
        return vec![feature(geometry, props)];
    }

    let drawable: Vec<&Vec<(Coordinate, &Fix)>> = lines.iter().filter(|l| l.len() >= 2).collect();

    if opts.join_track_segments || lines.len() == 1 {
        if drawable.len() == 1 {
            let geometry = Geometry::new(Value::LineString(line_coords(drawable[0], opts)));
            let mut props = props;
            if opts.include_time {
                let times = line_times(drawable[0]);
                insert_coordinate_times(&mut props, JsonValue::Array(times));
            }
            return vec![feature(geometry, props)];
        }

        if drawable.is_empty() {
            return Vec::new();
        }

        let line_strings: Vec<Vec<Vec<f64>>> =
            drawable.iter().map(|line| line_coords(line, opts)).collect();
        let geometry = Geometry::new(Value::MultiLineString(line_strings));
        let mut props = props;
        if opts.include_time {
            let all_times: Vec<JsonValue> = drawable
                .iter()
                .map(|line| JsonValue::Array(line_times(line)))
                .collect();
            insert_coordinate_times(&mut props, JsonValue::Array(all_times));
        }
        vec![feature(geometry, props)]
    } else {
        // Each segment as a separate Feature
        drawable
            .iter()
            .map(|line| {
                let geometry = Geometry::new(Value::LineString(line_coords(line, opts)));
                let mut props = props.clone();
                if opts.include_time {
                    insert_coordinate_times(&mut props, JsonValue::Array(line_times(line)));
                }
                feature(geometry, props)
            })
            .collect()
    }
}

fn build_track_props(
    name: Option<&str>,
    segments: &[&TrackSegment],
    recording: bool,
) -> Map<String, JsonValue> {
    let mut props = Map::new();
    props.insert(
        "gpxType".to_string(),
        JsonValue::String("track".to_string()),
    );
    if let Some(name) = name {
        props.insert("name".to_string(), JsonValue::String(name.to_string()));
    }
    let distance: f64 = segments.iter().map(|seg| seg.length()).sum();
    props.insert("distance".to_string(), JsonValue::from(distance));
    if recording {
        props.insert("recording".to_string(), JsonValue::Bool(true));
    }
    props
}

/// Build [lon, lat] or [lon, lat, ele] coordinate array.
fn point_coords(coord: &Coordinate, ele: Option<f64>, include_elevation: bool) -> Vec<f64> {
    match (include_elevation, ele) {
        (true, Some(ele)) => vec![coord.longitude(), coord.latitude(), ele],
        _ => vec![coord.longitude(), coord.latitude()],
    }
}

fn line_coords(line: &[(Coordinate, &Fix)], opts: &TrackerOptions) -> Vec<Vec<f64>> {
    line.iter()
        .map(|(coord, fix)| point_coords(coord, fix.elevation(), opts.include_elevation))
        .collect()
}

fn line_times(line: &[(Coordinate, &Fix)]) -> Vec<JsonValue> {
    line.iter()
        .map(|(_, fix)| match fix.time() {
            Some(t) => JsonValue::String(t.to_rfc3339()),
            None => JsonValue::Null,
        })
        .collect()
}

fn has_any_time(times: &JsonValue) -> bool {
    match times {
        JsonValue::Array(items) => items.iter().any(has_any_time),
        JsonValue::Null => false,
        _ => true,
    }
}

fn insert_coordinate_times(props: &mut Map<String, JsonValue>, times: JsonValue) {
    // Only include if at least one time is present
    if has_any_time(&times) {
        let mut coord_props = Map::new();
        coord_props.insert("times".to_string(), times);
        props.insert(
            "coordinateProperties".to_string(),
            JsonValue::Object(coord_props),
        );
    }
}

fn insert_optional(props: &mut Map<String, JsonValue>, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        props.insert(key.to_string(), JsonValue::String(v.clone()));
    }
}
