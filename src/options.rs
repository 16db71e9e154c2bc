use serde::Deserialize;

/// Creator string written on exported GPX files when none is configured.
pub const DEFAULT_CREATOR: &str = "GPX Tracker";

/// Options for a tracking session's export and map output.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerOptions {
    /// Value of the `creator` attribute on exported GPX (default: "GPX Tracker")
    #[serde(default = "default_creator")]
    pub creator: String,

    /// Include elevation as the 3rd coordinate value (default: true)
    #[serde(default = "default_true")]
    pub include_elevation: bool,

    /// Include timestamps in coordinateProperties.times (default: true)
    #[serde(default = "default_true")]
    pub include_time: bool,

    /// Which elements to draw (default: all)
    #[serde(default)]
    pub types: Option<Vec<GpxElementType>>,

    /// Join track segments into a single MultiLineString (default: false)
    #[serde(default)]
    pub join_track_segments: bool,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            creator: default_creator(),
            include_elevation: true,
            include_time: true,
            types: None,
            join_track_segments: false,
        }
    }
}

impl TrackerOptions {
    pub fn should_include(&self, element_type: GpxElementType) -> bool {
        match &self.types {
            None => true,
            Some(types) => types.contains(&element_type),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpxElementType {
    Waypoint,
    Track,
}

fn default_true() -> bool {
    true
}

fn default_creator() -> String {
    DEFAULT_CREATOR.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let opts: TrackerOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts.creator, DEFAULT_CREATOR);
        assert!(opts.include_elevation);
        assert!(opts.include_time);
        assert!(!opts.join_track_segments);
        assert!(opts.should_include(GpxElementType::Waypoint));
    }

    #[test]
    fn test_camel_case_fields() {
        let opts: TrackerOptions = serde_json::from_str(
            r#"{"creator": "Tracker for watchOS", "includeTime": false, "types": ["track"]}"#,
        )
        .unwrap();
        assert_eq!(opts.creator, "Tracker for watchOS");
        assert!(!opts.include_time);
        assert!(opts.should_include(GpxElementType::Track));
        assert!(!opts.should_include(GpxElementType::Waypoint));
    }
}
