use std::string::FromUtf8Error;
use wasm_bindgen::JsValue;

use crate::gpx_types::WaypointId;

pub type Result<T> = std::result::Result<T, TrackerError>;

#[derive(Debug)]
pub enum TrackerError {
    XmlParse(quick_xml::Error),
    XmlWrite(std::io::Error),
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
    InvalidAttribute {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },
    InvalidCoordinate {
        latitude: f64,
        longitude: f64,
    },
    InvalidElevation(f64),
    MissingCoordinate,
    WaypointNotFound(WaypointId),
    Utf8(FromUtf8Error),
}

impl std::fmt::Display for TrackerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::XmlParse(e) => write!(f, "XML parse error: {e}"),
            Self::XmlWrite(e) => write!(f, "XML write error: {e}"),
            Self::MissingAttribute { element, attribute } => {
                write!(f, "Missing attribute '{attribute}' on <{element}>")
            }
            Self::InvalidAttribute {
                element,
                attribute,
                value,
            } => write!(
                f,
                "Invalid value '{value}' for attribute '{attribute}' on <{element}>"
            ),
            Self::InvalidCoordinate {
                latitude,
                longitude,
            } => write!(f, "Invalid coordinate ({latitude}, {longitude})"),
            Self::InvalidElevation(ele) => write!(f, "Invalid elevation {ele}"),
            Self::MissingCoordinate => write!(f, "Fix has no coordinate"),
            Self::WaypointNotFound(id) => write!(f, "Waypoint {id} not found"),
            Self::Utf8(e) => write!(f, "Generated GPX is not valid UTF-8: {e}"),
        }
    }
}

impl std::error::Error for TrackerError {}

impl From<quick_xml::Error> for TrackerError {
    fn from(e: quick_xml::Error) -> Self {
        Self::XmlParse(e)
    }
}

impl From<std::io::Error> for TrackerError {
    fn from(e: std::io::Error) -> Self {
        Self::XmlWrite(e)
    }
}

impl From<FromUtf8Error> for TrackerError {
    fn from(e: FromUtf8Error) -> Self {
        Self::Utf8(e)
    }
}

impl From<TrackerError> for JsValue {
    fn from(e: TrackerError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}
