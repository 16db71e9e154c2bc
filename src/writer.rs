use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::Result;
use crate::gpx_types::*;
use crate::options::DEFAULT_CREATOR;
use crate::segment::TrackSegment;

const GPX_NAMESPACE: &str = "http://www.topografix.com/GPX/1/1";

type XmlWriter = Writer<Vec<u8>>;

/// Serialize a document as GPX 1.1.
///
/// Fixes without a coordinate cannot be represented in GPX and are left out
/// with a warning.
pub fn write_gpx(doc: &GpxDocument) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    let creator = doc.creator.as_deref().unwrap_or(DEFAULT_CREATOR);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("gpx");
    root.push_attribute(("xmlns", GPX_NAMESPACE));
    root.push_attribute(("version", "1.1"));
    root.push_attribute(("creator", creator));
    writer.write_event(Event::Start(root))?;

    for wpt in &doc.waypoints {
        write_waypoint(&mut writer, wpt)?;
    }
    let mut skipped = 0;
    for trk in &doc.tracks {
        skipped += write_track(&mut writer, trk)?;
    }
    if skipped > 0 {
        log::warn!("Left {skipped} fixes without coordinates out of the GPX output");
    }

    writer.write_event(Event::End(BytesEnd::new("gpx")))?;
    Ok(String::from_utf8(writer.into_inner())?)
}

fn point_start<'a>(name: &'a str, coordinate: &Coordinate) -> BytesStart<'a> {
    let mut start = BytesStart::new(name);
    start.push_attribute(("lat", coordinate.latitude().to_string().as_str()));
    start.push_attribute(("lon", coordinate.longitude().to_string().as_str()));
    start
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn write_text_element(writer: &mut XmlWriter, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_optional(writer: &mut XmlWriter, name: &str, value: &Option<String>) -> Result<()> {
    if let Some(v) = value {
        write_text_element(writer, name, v)?;
    }
    Ok(())
}

/// Write ele/time children, the part shared by <wpt> and <trkpt>.
fn write_ele_time(
    writer: &mut XmlWriter,
    ele: Option<f64>,
    time: Option<&DateTime<Utc>>,
) -> Result<()> {
    if let Some(ele) = ele {
        write_text_element(writer, "ele", &ele.to_string())?;
    }
    if let Some(time) = time {
        write_text_element(writer, "time", &format_time(time))?;
    }
    Ok(())
}

fn write_waypoint(writer: &mut XmlWriter, wpt: &Waypoint) -> Result<()> {
    writer.write_event(Event::Start(point_start("wpt", &wpt.coordinate)))?;
    write_ele_time(writer, wpt.elevation(), wpt.time.as_ref())?;
    write_optional(writer, "name", &wpt.name)?;
    write_optional(writer, "cmt", &wpt.cmt)?;
    write_optional(writer, "desc", &wpt.desc)?;
    write_optional(writer, "sym", &wpt.sym)?;
    write_optional(writer, "type", &wpt.point_type)?;
    writer.write_event(Event::End(BytesEnd::new("wpt")))?;
    Ok(())
}

/// Returns the number of fixes left out.
fn write_track(writer: &mut XmlWriter, trk: &Track) -> Result<usize> {
    writer.write_event(Event::Start(BytesStart::new("trk")))?;
    write_optional(writer, "name", &trk.name)?;
    let mut skipped = 0;
    for seg in &trk.segments {
        skipped += write_segment(writer, seg)?;
    }
    writer.write_event(Event::End(BytesEnd::new("trk")))?;
    Ok(skipped)
}

fn write_segment(writer: &mut XmlWriter, seg: &TrackSegment) -> Result<usize> {
    writer.write_event(Event::Start(BytesStart::new("trkseg")))?;
    let mut skipped = 0;
    for fix in seg.fixes() {
        let Some(coordinate) = fix.coordinate() else {
            skipped += 1;
            continue;
        };
        let start = point_start("trkpt", &coordinate);
        if fix.elevation().is_none() && fix.time().is_none() {
            writer.write_event(Event::Empty(start))?;
            continue;
        }
        writer.write_event(Event::Start(start))?;
        write_ele_time(writer, fix.elevation(), fix.time().as_ref())?;
        writer.write_event(Event::End(BytesEnd::new("trkpt")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("trkseg")))?;
    Ok(skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_gpx;

    fn sample_document() -> GpxDocument {
        let t = DateTime::from_timestamp(1_735_689_600, 250_000_000).unwrap();
        let mut wpt = Waypoint::new(Coordinate::new(35.6762, 139.6503).unwrap())
            .with_elevation(40.5)
            .unwrap();
        wpt.name = Some("Caf\u{e9} <Tokyo> & more".to_string());

        let seg = TrackSegment::from_fixes(vec![
            Fix::new(35.0, 139.0).unwrap().with_elevation(10.0).unwrap().with_time(t),
            Fix::new(35.001, 139.001).unwrap(),
            Fix::unlocated(),
        ]);
        let mut trk = Track::new(vec![seg]);
        trk.name = Some("Morning".to_string());

        GpxDocument {
            creator: Some("Tracker for tests".to_string()),
            waypoints: vec![wpt],
            tracks: vec![trk, Track::default()],
        }
    }

    #[test]
    fn test_root_carries_creator() {
        let xml = write_gpx(&sample_document()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("creator=\"Tracker for tests\""));
        assert!(xml.contains(GPX_NAMESPACE));
    }

    #[test]
    fn test_default_creator() {
        let xml = write_gpx(&GpxDocument::default()).unwrap();
        assert!(xml.contains(&format!("creator=\"{DEFAULT_CREATOR}\"")));
    }

    #[test]
    fn test_written_document_parses_back() {
        let doc = sample_document();
        let parsed = parse_gpx(&write_gpx(&doc).unwrap()).unwrap();

        assert_eq!(parsed.creator, doc.creator);
        assert_eq!(parsed.waypoints.len(), 1);
        assert!(parsed.waypoints[0].same_content(&doc.waypoints[0]));

        assert_eq!(parsed.tracks.len(), 2);
        assert_eq!(parsed.tracks[0].name.as_deref(), Some("Morning"));
        let fixes = parsed.tracks[0].segments[0].fixes();
        // the unlocated fix cannot be written
        assert_eq!(fixes.len(), 2);
        assert_eq!(&fixes[..], &doc.tracks[0].segments[0].fixes()[..2]);
        assert!(parsed.tracks[1].segments.is_empty());
    }

    #[test]
    fn test_creator_with_markup_survives_parse() {
        let doc = GpxDocument {
            creator: Some("Tom & Jerry <GPS>".to_string()),
            ..GpxDocument::default()
        };
        let xml = write_gpx(&doc).unwrap();
        assert!(xml.contains("creator=\"Tom &amp; Jerry &lt;GPS&gt;\""));

        let parsed = parse_gpx(&xml).unwrap();
        assert_eq!(parsed.creator.as_deref(), Some("Tom & Jerry <GPS>"));
    }

    #[test]
    fn test_unlocated_fixes_are_counted() {
        let doc = sample_document();
        let mut writer = Writer::new(Vec::new());
        assert_eq!(write_track(&mut writer, &doc.tracks[0]).unwrap(), 1);
        assert_eq!(write_track(&mut writer, &doc.tracks[1]).unwrap(), 0);
    }
}
