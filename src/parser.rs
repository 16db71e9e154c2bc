use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Result, TrackerError};
use crate::gpx_types::*;
use crate::segment::TrackSegment;

/// Parse a GPX XML string into waypoints and tracks.
///
/// Points with missing or invalid coordinates are skipped, as are empty
/// track segments. Unparseable elevations and times are dropped from the
/// point rather than failing the document.
pub fn parse_gpx(xml: &str) -> Result<GpxDocument> {
    let mut reader = Reader::from_str(xml);
    let mut data = GpxDocument::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"gpx" => data.creator = attribute(&e, b"creator")?,
                b"wpt" => {
                    if let Some(pt) = parse_point(&e, &mut reader)? {
                        data.waypoints.push(pt.into_waypoint()?);
                    }
                }
                b"trk" => data.tracks.push(parse_track(&mut reader)?),
                b"metadata" | b"rte" | b"extensions" => {
                    reader
                        .read_to_end(e.name())
                        .map_err(TrackerError::XmlParse)?;
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"wpt" {
                    if let Ok(coordinate) = parse_lat_lon(&e) {
                        data.waypoints.push(Waypoint::new(coordinate));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(TrackerError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(data)
}

/// Children of a <wpt> or <trkpt> that this crate keeps.
struct PointFields {
    coordinate: Coordinate,
    ele: Option<f64>,
    time: Option<DateTime<Utc>>,
    name: Option<String>,
    desc: Option<String>,
    cmt: Option<String>,
    sym: Option<String>,
    point_type: Option<String>,
}

impl PointFields {
    fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            ele: None,
            time: None,
            name: None,
            desc: None,
            cmt: None,
            sym: None,
            point_type: None,
        }
    }

    fn into_fix(self) -> Result<Fix> {
        let mut fix = Fix::at(self.coordinate);
        if let Some(ele) = self.ele {
            fix = fix.with_elevation(ele)?;
        }
        if let Some(time) = self.time {
            fix = fix.with_time(time);
        }
        Ok(fix)
    }

    fn into_waypoint(self) -> Result<Waypoint> {
        let mut wpt = Waypoint::new(self.coordinate);
        if let Some(ele) = self.ele {
            wpt = wpt.with_elevation(ele)?;
        }
        wpt.time = self.time;
        wpt.name = self.name;
        wpt.desc = self.desc;
        wpt.cmt = self.cmt;
        wpt.sym = self.sym;
        wpt.point_type = self.point_type;
        Ok(wpt)
    }
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    match e
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == key)
    {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

/// Parse lat/lon attributes from a point element's start tag.
fn parse_lat_lon(e: &BytesStart<'_>) -> Result<Coordinate> {
    let mut lat: Option<f64> = None;
    let mut lon: Option<f64> = None;

    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|e| TrackerError::XmlParse(e.into()))?;
        let key = attr.key.local_name();
        let val = std::str::from_utf8(&attr.value).unwrap_or_default();
        match key.as_ref() {
            b"lat" => {
                lat = Some(val.trim().parse::<f64>().map_err(|_| {
                    TrackerError::InvalidAttribute {
                        element: "point",
                        attribute: "lat",
                        value: val.to_string(),
                    }
                })?);
            }
            b"lon" => {
                lon = Some(val.trim().parse::<f64>().map_err(|_| {
                    TrackerError::InvalidAttribute {
                        element: "point",
                        attribute: "lon",
                        value: val.to_string(),
                    }
                })?);
            }
            _ => {}
        }
    }

    let lat = lat.ok_or(TrackerError::MissingAttribute {
        element: "point",
        attribute: "lat",
    })?;
    let lon = lon.ok_or(TrackerError::MissingAttribute {
        element: "point",
        attribute: "lon",
    })?;

    Coordinate::new(lat, lon)
}

/// Parse a point element (wpt, trkpt) and its children.
/// Called after receiving Event::Start for the point element.
fn parse_point<'a>(
    start: &BytesStart<'a>,
    reader: &mut Reader<&'a [u8]>,
) -> Result<Option<PointFields>> {
    let coordinate = match parse_lat_lon(start) {
        Ok(coordinate) => coordinate,
        Err(e) => {
            log::debug!("Skipping point: {e}");
            reader
                .read_to_end(start.name())
                .map_err(TrackerError::XmlParse)?;
            return Ok(None);
        }
    };

    let mut point = PointFields::new(coordinate);
    let end_name = start.name().0.to_vec();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"ele" => {
                    let text = reader
                        .read_text(e.name())
                        .map_err(TrackerError::XmlParse)?;
                    point.ele = text.trim().parse::<f64>().ok().filter(|v| v.is_finite());
                }
                b"time" => point.time = parse_time(&read_text_owned(reader, &e)?),
                b"name" => point.name = Some(read_text_owned(reader, &e)?),
                b"desc" => point.desc = Some(read_text_owned(reader, &e)?),
                b"cmt" => point.cmt = Some(read_text_owned(reader, &e)?),
                b"sym" => point.sym = Some(read_text_owned(reader, &e)?),
                b"type" => point.point_type = Some(read_text_owned(reader, &e)?),
                _ => {
                    // extensions, links and GPX 1.0 extras
                    reader
                        .read_to_end(e.name())
                        .map_err(TrackerError::XmlParse)?;
                }
            },
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(TrackerError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(Some(point))
}

fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(text.trim()) {
        Ok(time) => Some(time.with_timezone(&Utc)),
        Err(e) => {
            log::debug!("Ignoring unparseable time '{text}': {e}");
            None
        }
    }
}

/// Parse a <trk> element.
fn parse_track<'a>(reader: &mut Reader<&'a [u8]>) -> Result<Track> {
    let mut track = Track::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"name" => track.name = Some(read_text_owned(reader, &e)?),
                b"trkseg" => {
                    let seg = parse_segment(reader)?;
                    if !seg.is_empty() {
                        track.segments.push(seg);
                    }
                }
                _ => {
                    reader
                        .read_to_end(e.name())
                        .map_err(TrackerError::XmlParse)?;
                }
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"trk" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(TrackerError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(track)
}

/// Parse a <trkseg> element.
fn parse_segment<'a>(reader: &mut Reader<&'a [u8]>) -> Result<TrackSegment> {
    let mut segment = TrackSegment::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"trkpt" => {
                    if let Some(pt) = parse_point(&e, reader)? {
                        segment.append(pt.into_fix()?);
                    }
                }
                _ => {
                    reader
                        .read_to_end(e.name())
                        .map_err(TrackerError::XmlParse)?;
                }
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"trkpt" {
                    if let Ok(coordinate) = parse_lat_lon(&e) {
                        segment.append(Fix::at(coordinate));
                    }
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"trkseg" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(TrackerError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(segment)
}

/// Read text content of an element as an owned String.
/// Handles regular text, CDATA sections, and entity references (Event::GeneralRef).
fn read_text_owned<'a>(reader: &mut Reader<&'a [u8]>, start: &BytesStart<'_>) -> Result<String> {
    let end_name = start.name().0.to_vec();
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) => {
                let raw = std::str::from_utf8(e.as_ref()).unwrap_or_default();
                text.push_str(raw);
            }
            Ok(Event::CData(e)) => {
                let s = std::str::from_utf8(e.as_ref()).unwrap_or_default();
                text.push_str(s);
            }
            Ok(Event::GeneralRef(e)) => {
                if let Ok(Some(ch)) = e.resolve_char_ref() {
                    text.push(ch);
                } else {
                    let name = std::str::from_utf8(e.as_ref()).unwrap_or_default();
                    match name {
                        "amp" => text.push('&'),
                        "lt" => text.push('<'),
                        "gt" => text.push('>'),
                        "quot" => text.push('"'),
                        "apos" => text.push('\''),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(TrackerError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(text)
}
