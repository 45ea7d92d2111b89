//! rekordbox XML serialization
//!
//! Tag and attribute names are fixed by rekordbox's import format:
//! https://cdn.rekordbox.com/files/20200410160904/xml_format_list.pdf

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use crate::collection::{Document, PlaylistNode};
use crate::error::{Error, Result};
use crate::track::{CuePoint, TrackRecord};

/// Node types in the playlist tree
const NODE_TYPE_FOLDER: &str = "0";
const NODE_TYPE_PLAYLIST: &str = "1";

/// Playlist entries reference tracks by `TrackID`
const KEY_TYPE_TRACK_ID: &str = "0";

/// `POSITION_MARK` type for a plain cue
const MARK_TYPE_CUE: &str = "0";

fn xml_error<E: std::fmt::Display>(e: E) -> Error {
    Error::Xml(e.to_string())
}

fn element<'a>(name: &'a str, attrs: &[(&str, &str)]) -> BytesStart<'a> {
    let mut start = BytesStart::new(name);
    for attr in attrs {
        start.push_attribute(*attr);
    }
    start
}

/// Serialize the document, XML declaration included
pub fn write_document<W: Write>(document: &Document, out: W) -> Result<()> {
    let mut writer = Writer::new_with_indent(out, b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;

    let root = element("DJ_PLAYLISTS", &[("Version", document.version)]);
    writer.write_event(Event::Start(root)).map_err(xml_error)?;

    let product = element(
        "PRODUCT",
        &[
            ("Name", document.product.name),
            ("Version", document.product.version),
            ("Company", document.product.company),
        ],
    );
    writer.write_event(Event::Empty(product)).map_err(xml_error)?;

    let entries = document.collection.entries.to_string();
    let collection = element("COLLECTION", &[("Entries", entries.as_str())]);
    writer.write_event(Event::Start(collection)).map_err(xml_error)?;
    for track in &document.collection.tracks {
        write_track(&mut writer, track)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("COLLECTION")))
        .map_err(xml_error)?;

    writer
        .write_event(Event::Start(BytesStart::new("PLAYLISTS")))
        .map_err(xml_error)?;
    let count = document.playlists.count.to_string();
    let folder = element(
        "NODE",
        &[
            ("Type", NODE_TYPE_FOLDER),
            ("Name", document.playlists.name.as_str()),
            ("Count", count.as_str()),
        ],
    );
    writer.write_event(Event::Start(folder)).map_err(xml_error)?;
    for node in &document.playlists.nodes {
        write_playlist(&mut writer, node)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("NODE")))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new("PLAYLISTS")))
        .map_err(xml_error)?;

    writer
        .write_event(Event::End(BytesEnd::new("DJ_PLAYLISTS")))
        .map_err(xml_error)?;

    let mut out = writer.into_inner();
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

fn write_track<W: Write>(writer: &mut Writer<W>, track: &TrackRecord) -> Result<()> {
    let ctx = &track.context;
    let total_time = ctx.duration.to_string();
    let sample_rate = ctx.sample_rate.to_string();
    let bpm = format!("{:.2}", ctx.bpm);
    let rating = ctx.rekordbox_rating().to_string();
    let colour = ctx.colour_hex();
    let location = ctx.location_uri();

    let start = element(
        "TRACK",
        &[
            ("TrackID", track.id.as_str()),
            ("TotalTime", total_time.as_str()),
            ("Name", ctx.title.as_str()),
            ("Artist", ctx.artist.as_str()),
            ("Album", ctx.album.as_str()),
            ("Genre", ctx.genre.as_str()),
            ("SampleRate", sample_rate.as_str()),
            ("AverageBpm", bpm.as_str()),
            ("Tonality", ctx.key.as_deref().unwrap_or_default()),
            ("Rating", rating.as_str()),
            ("Colour", colour.as_str()),
            ("Location", location.as_str()),
        ],
    );

    if track.beat_grid.is_none() && track.cue_points.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(xml_error)?;
        return Ok(());
    }
    writer.write_event(Event::Start(start)).map_err(xml_error)?;

    if let Some(grid) = &track.beat_grid {
        let inizio = format!("{:.3}", grid.start_sec);
        let bpm = format!("{:.2}", grid.bpm);
        let tempo = element(
            "TEMPO",
            &[
                ("Inizio", inizio.as_str()),
                ("Bpm", bpm.as_str()),
                ("Metro", "4/4"),
                ("Battito", "1"),
            ],
        );
        writer.write_event(Event::Empty(tempo)).map_err(xml_error)?;
    }

    for cue in &track.cue_points {
        write_position_mark(writer, cue)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("TRACK")))
        .map_err(xml_error)?;
    Ok(())
}

fn write_position_mark<W: Write>(writer: &mut Writer<W>, cue: &CuePoint) -> Result<()> {
    let num = cue.index.to_string();
    let start = format!("{:.3}", cue.start_seconds());
    let red = cue.color.red.to_string();
    let green = cue.color.green.to_string();
    let blue = cue.color.blue.to_string();

    let mark = element(
        "POSITION_MARK",
        &[
            ("Name", cue.label.as_str()),
            ("Type", MARK_TYPE_CUE),
            ("Start", start.as_str()),
            ("Num", num.as_str()),
            ("Red", red.as_str()),
            ("Green", green.as_str()),
            ("Blue", blue.as_str()),
        ],
    );
    writer.write_event(Event::Empty(mark)).map_err(xml_error)?;
    Ok(())
}

fn write_playlist<W: Write>(writer: &mut Writer<W>, node: &PlaylistNode) -> Result<()> {
    let entries = node.entries.to_string();
    let start = element(
        "NODE",
        &[
            ("Name", node.name.as_str()),
            ("Type", NODE_TYPE_PLAYLIST),
            ("KeyType", KEY_TYPE_TRACK_ID),
            ("Entries", entries.as_str()),
        ],
    );

    if node.keys.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(xml_error)?;
        return Ok(());
    }
    writer.write_event(Event::Start(start)).map_err(xml_error)?;

    for key in &node.keys {
        let entry = element("TRACK", &[("Key", key.as_str())]);
        writer.write_event(Event::Empty(entry)).map_err(xml_error)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("NODE")))
        .map_err(xml_error)?;
    Ok(())
}

/// Serialize into memory
pub fn to_bytes(document: &Document) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(64 * 1024);
    write_document(document, &mut buffer)?;
    Ok(buffer)
}

/// Serialize to `path`, replacing any existing file
pub fn write_file<P: AsRef<Path>>(document: &Document, path: P) -> Result<()> {
    let file = File::create(path)?;
    write_document(document, BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beats::BeatGridKind;
    use crate::collection::{merge_playlist, CollectionIndex};
    use crate::color::CueColor;
    use crate::track::{BeatGridInfo, CueKind, TrackContext, TrackId};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn sample_track() -> Arc<TrackRecord> {
        Arc::new(TrackRecord {
            id: TrackId::from_library_id(12),
            context: TrackContext {
                library_id: 12,
                title: "Rise & Shine".into(),
                artist: "DJ \"Quote\"".into(),
                album: String::new(),
                genre: "Techno".into(),
                duration: 301,
                sample_rate: 44_100,
                channels: 2,
                bpm: 128.0,
                location: "/music/rise.mp3".into(),
                key: Some("8A".into()),
                rating: Some(3),
                colour: Some(0xFF007F),
            },
            beat_grid: Some(BeatGridInfo {
                kind: BeatGridKind::Fixed,
                anchor_frame: 132_300,
                sample_rate: 44_100,
                bpm: 128.0,
                offset_ms: 26,
                start_sec: 1.151,
            }),
            cue_points: vec![CuePoint {
                kind: CueKind::HotCue,
                index: 2,
                position_ms: 1026.0,
                color: CueColor::ORANGE,
                label: "Break".into(),
            }],
        })
    }

    fn render(document: &Document) -> String {
        String::from_utf8(to_bytes(document).unwrap()).unwrap()
    }

    #[test]
    fn test_header_and_product() {
        let doc = merge_playlist(&mut CollectionIndex::new(), None, "Empty", Vec::new());
        let xml = render(&doc);
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<DJ_PLAYLISTS Version=\"1.0.0\">"));
        assert!(xml.contains("<PRODUCT Name=\"rekordbox\" Version=\"6.5.2\" Company=\"AlphaTheta\"/>"));
        assert!(xml.contains("<COLLECTION Entries=\"0\">"));
        assert!(xml.contains("<NODE Type=\"0\" Name=\"ROOT\" Count=\"1\">"));
        assert!(xml.contains("<NODE Name=\"Empty\" Type=\"1\" KeyType=\"0\" Entries=\"0\"/>"));
    }

    #[test]
    fn test_track_attributes() {
        let doc = merge_playlist(&mut CollectionIndex::new(), None, "Set", vec![sample_track()]);
        let xml = render(&doc);

        assert!(xml.contains("TrackID=\"0000000012\""));
        assert!(xml.contains("TotalTime=\"301\""));
        assert!(xml.contains("Name=\"Rise &amp; Shine\""));
        assert!(xml.contains("Artist=\"DJ &quot;Quote&quot;\""));
        assert!(xml.contains("AverageBpm=\"128.00\""));
        assert!(xml.contains("Tonality=\"8A\""));
        assert!(xml.contains("Rating=\"153\""));
        assert!(xml.contains("Colour=\"0xFF007F\""));
        assert!(xml.contains("Location=\"file://localhost/music/rise.mp3\""));
        assert!(xml.contains("<TEMPO Inizio=\"1.151\" Bpm=\"128.00\" Metro=\"4/4\" Battito=\"1\"/>"));
        assert!(xml.contains(
            "<POSITION_MARK Name=\"Break\" Type=\"0\" Start=\"1.026\" Num=\"2\" Red=\"248\" Green=\"130\" Blue=\"26\"/>"
        ));
        assert!(xml.contains("<TRACK Key=\"0000000012\"/>"));
    }

    #[test]
    fn test_write_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rekordbox.xml");
        let doc = merge_playlist(&mut CollectionIndex::new(), None, "Set", vec![sample_track()]);

        write_file(&doc, &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, render(&doc));
    }

    #[test]
    fn test_unwritable_path() {
        let doc = Document::new();
        assert!(matches!(
            write_file(&doc, "/nonexistent/dir/rekordbox.xml"),
            Err(Error::Io(_))
        ));
    }
}
