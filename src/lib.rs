pub mod converter;
pub mod erase;
pub mod error;
pub mod file_info;
pub mod geo_utils;
pub mod gpx_types;
pub mod options;
pub mod parser;
pub mod segment;
pub mod session;
pub mod shared;
pub mod stats;
pub mod writer;

use chrono::DateTime;
use wasm_bindgen::prelude::*;

pub use crate::error::TrackerError;
pub use crate::gpx_types::{Coordinate, Fix, GpxDocument, Track, Waypoint, WaypointId};
pub use crate::options::TrackerOptions;
pub use crate::segment::TrackSegment;
pub use crate::session::{RunningTotals, TrackSession};
pub use crate::shared::SharedSession;
pub use crate::stats::Stats;

/// A GPS recording session driven from JavaScript.
#[wasm_bindgen]
pub struct GpxTracker {
    session: TrackSession,
    options: TrackerOptions,
}

#[wasm_bindgen]
impl GpxTracker {
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<GpxTracker, JsValue> {
        console_error_panic_hook::set_once();

        Ok(GpxTracker {
            session: TrackSession::new(),
            options: parse_options(options)?,
        })
    }

    /// Append a live location. `timestampMs` is milliseconds since the Unix epoch.
    #[wasm_bindgen(js_name = addFix)]
    pub fn add_fix(
        &mut self,
        latitude: f64,
        longitude: f64,
        elevation: Option<f64>,
        timestamp_ms: Option<f64>,
    ) -> Result<(), JsValue> {
        let mut fix = Fix::new(latitude, longitude)?;
        if let Some(ele) = elevation {
            fix = fix.with_elevation(ele)?;
        }
        if let Some(ms) = timestamp_ms {
            let time = DateTime::from_timestamp_millis(ms as i64)
                .filter(|_| ms.is_finite())
                .ok_or_else(|| JsValue::from_str(&format!("Invalid timestamp {ms}")))?;
            fix = fix.with_time(time);
        }
        self.session.add_fix(fix)?;
        Ok(())
    }

    #[wasm_bindgen(js_name = startNewSegment)]
    pub fn start_new_segment(&mut self) {
        self.session.start_new_segment();
    }

    pub fn reset(&mut self) {
        self.session.reset();
    }

    /// Remove fixes within `radiusMeters` of a point. An invalid point or a
    /// negative radius erases nothing. Returns the number of fixes removed.
    pub fn erase(&mut self, latitude: f64, longitude: f64, radius_meters: f64) -> u32 {
        match Coordinate::new(latitude, longitude) {
            Ok(at) => self.session.erase(at, radius_meters) as u32,
            Err(e) => {
                log::warn!("Ignoring erase: {e}");
                0
            }
        }
    }

    #[wasm_bindgen(js_name = addWaypoint)]
    pub fn add_waypoint(
        &mut self,
        latitude: f64,
        longitude: f64,
        name: Option<String>,
        elevation: Option<f64>,
    ) -> Result<u64, JsValue> {
        let mut wpt = Waypoint::new(Coordinate::new(latitude, longitude)?);
        if let Some(ele) = elevation {
            wpt = wpt.with_elevation(ele)?;
        }
        wpt.name = name;
        Ok(self.session.add_waypoint(wpt).get())
    }

    #[wasm_bindgen(js_name = removeWaypoint)]
    pub fn remove_waypoint(&mut self, id: u64) -> Result<(), JsValue> {
        self.session.remove_waypoint(WaypointId::from(id))?;
        Ok(())
    }

    /// Running totals: totalTrackedDistance, totalElevationGain,
    /// currentTrackDistance, currentSegmentDistance.
    pub fn totals(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.totals())
    }

    #[wasm_bindgen(js_name = globalStats)]
    pub fn global_stats(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.global_stats())
    }

    #[wasm_bindgen(js_name = exportGpx)]
    pub fn export_gpx(&self) -> Result<String, JsValue> {
        Ok(self.session.to_gpx_string(&self.options.creator)?)
    }

    /// Resume from a saved GPX document.
    #[wasm_bindgen(js_name = loadGpx)]
    pub fn load_gpx(&mut self, gpx_string: &str) -> Result<(), JsValue> {
        self.session.load_gpx_str(gpx_string)?;
        Ok(())
    }

    #[wasm_bindgen(js_name = toGeoJson)]
    pub fn to_geojson(&self) -> Result<JsValue, JsValue> {
        to_js(&converter::to_feature_collection(&self.session, &self.options))
    }

    #[wasm_bindgen(js_name = toGeoJsonString)]
    pub fn to_geojson_string(&self) -> Result<String, JsValue> {
        let fc = converter::to_feature_collection(&self.session, &self.options);
        serde_json::to_string(&fc).map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Flat `[lon, lat, lon, lat, ...]` of the segment being recorded.
    #[wasm_bindgen(js_name = currentSegmentCoordinates)]
    pub fn current_segment_coordinates(&self) -> js_sys::Float64Array {
        let flat: Vec<f64> = self
            .session
            .current_segment()
            .coordinates()
            .iter()
            .flat_map(|c| [c.longitude(), c.latitude()])
            .collect();
        js_sys::Float64Array::from(flat.as_slice())
    }
}

/// Statistics of every track in a GPX string, returned as a JS object.
#[wasm_bindgen(js_name = gpxStats)]
pub fn gpx_stats(gpx_string: &str) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let session = TrackSession::from_gpx_str(gpx_string)?;
    to_js(&session.global_stats())
}

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn parse_options(options: JsValue) -> Result<TrackerOptions, JsValue> {
    if options.is_undefined() || options.is_null() {
        Ok(TrackerOptions::default())
    } else {
        serde_wasm_bindgen::from_value(options).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}
