//! Track data structures
//!
//! [`RawTrack`] is what the Mixxx library hands us, [`TrackRecord`] is what
//! goes into the rekordbox collection. All positions in a record already
//! include the decoder offset; nothing downstream adds it again.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::beats::{self, BeatData, BeatGridKind};
use crate::color::CueColor;
use crate::error::{Error, Result};
use crate::key::{Key, KeyNotation};
use crate::offset::OffsetResolver;

/// Audio file type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileType {
    #[default]
    Unknown,
    Mp3,
    M4a,
    Flac,
    Wav,
    Aiff,
}

impl FileType {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "mp3" => FileType::Mp3,
            "m4a" => FileType::M4a,
            "flac" => FileType::Flac,
            "wav" => FileType::Wav,
            "aiff" | "aif" => FileType::Aiff,
            _ => FileType::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(FileType::from_extension)
            .unwrap_or_default()
    }
}

/// rekordbox `TrackID`: ten zero-padded decimal digits
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(String);

impl TrackId {
    pub const WIDTH: usize = 10;

    pub fn from_library_id(id: i64) -> Self {
        Self(format!("{:0width$}", id, width = Self::WIDTH))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdMode {
    Library,
    Random,
}

/// Hands out track identifiers for one run.
///
/// A library row always maps to the same identifier, so a track shared by
/// several playlists is recognised as the same collection entry.
pub struct TrackIdAllocator {
    mode: IdMode,
    rng: StdRng,
    issued: HashSet<TrackId>,
    by_row: HashMap<i64, TrackId>,
}

impl TrackIdAllocator {
    /// Identifiers derived from the Mixxx library row id
    pub fn library() -> Self {
        Self::with_mode(IdMode::Library, StdRng::from_entropy())
    }

    /// Random identifiers, unique within the run
    pub fn random() -> Self {
        Self::with_mode(IdMode::Random, StdRng::from_entropy())
    }

    pub fn seeded_random(seed: u64) -> Self {
        Self::with_mode(IdMode::Random, StdRng::seed_from_u64(seed))
    }

    fn with_mode(mode: IdMode, rng: StdRng) -> Self {
        Self {
            mode,
            rng,
            issued: HashSet::new(),
            by_row: HashMap::new(),
        }
    }

    /// Identifier already handed out for `library_id`, if any
    pub fn lookup(&self, library_id: i64) -> Option<&TrackId> {
        self.by_row.get(&library_id)
    }

    pub fn assign(&mut self, library_id: i64) -> TrackId {
        if let Some(id) = self.by_row.get(&library_id) {
            return id.clone();
        }

        let id = match self.mode {
            IdMode::Library => TrackId::from_library_id(library_id),
            IdMode::Random => loop {
                let candidate = random_digits(&mut self.rng);
                if !self.issued.contains(&candidate) {
                    break candidate;
                }
                debug!("Track id collision on {}, regenerating", candidate);
            },
        };

        self.issued.insert(id.clone());
        self.by_row.insert(library_id, id.clone());
        id
    }
}

fn random_digits(rng: &mut StdRng) -> TrackId {
    let digits = (0..TrackId::WIDTH)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect();
    TrackId(digits)
}

/// Library metadata of a track
#[derive(Debug, Clone, PartialEq)]
pub struct TrackContext {
    pub library_id: i64,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    /// Whole seconds
    pub duration: i64,
    pub sample_rate: u32,
    pub channels: u32,
    pub bpm: f64,
    pub location: String,
    /// Already rendered in the selected notation
    pub key: Option<String>,
    /// Mixxx stars, 0-5
    pub rating: Option<u8>,
    /// 0xRRGGBB
    pub colour: Option<u32>,
}

impl TrackContext {
    /// `file://localhost` URI. Drive-letter paths need an extra separator.
    pub fn location_uri(&self) -> String {
        let bytes = self.location.as_bytes();
        let has_drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
        if has_drive {
            format!("file://localhost/{}", self.location)
        } else {
            format!("file://localhost{}", self.location)
        }
    }

    /// rekordbox rating scale: 0, 51, 102, 153, 204, 255
    pub fn rekordbox_rating(&self) -> u8 {
        match self.rating {
            Some(stars) if stars <= 5 => stars * 51,
            _ => 0,
        }
    }

    pub fn colour_hex(&self) -> String {
        self.colour
            .map(|rgb| format!("0x{:06X}", rgb & 0xFF_FFFF))
            .unwrap_or_default()
    }
}

/// Cue point type. Only hot cues are exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CueKind {
    #[default]
    HotCue,
}

/// Hot cue, offset-corrected
#[derive(Debug, Clone, PartialEq)]
pub struct CuePoint {
    pub kind: CueKind,
    /// Hot cue slot, 0-based
    pub index: u32,
    /// Milliseconds from track start
    pub position_ms: f64,
    pub color: CueColor,
    pub label: String,
}

impl CuePoint {
    pub fn start_seconds(&self) -> f64 {
        self.position_ms / 1000.0
    }
}

/// Beat grid anchor, offset-corrected
#[derive(Debug, Clone, PartialEq)]
pub struct BeatGridInfo {
    pub kind: BeatGridKind,
    pub anchor_frame: i64,
    pub sample_rate: u32,
    pub bpm: f64,
    pub offset_ms: i64,
    /// `Inizio`: anchor (bar-wrapped for fixed grids) plus offset
    pub start_sec: f64,
}

/// One `TRACK` of the rekordbox collection
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRecord {
    pub id: TrackId,
    pub context: TrackContext,
    pub beat_grid: Option<BeatGridInfo>,
    pub cue_points: Vec<CuePoint>,
}

/// Hot cue row as stored by Mixxx
#[derive(Debug, Clone, Default)]
pub struct RawCue {
    pub hotcue: i64,
    /// Interleaved sample index
    pub position: f64,
    pub color: Option<i64>,
    pub label: Option<String>,
}

/// Library row as stored by Mixxx
#[derive(Debug, Clone, Default)]
pub struct RawTrack {
    pub library_id: i64,
    pub location: String,
    pub sample_rate: Option<i64>,
    pub channels: Option<i64>,
    /// Seconds
    pub duration: Option<f64>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub bpm: Option<f64>,
    pub beats: Option<Vec<u8>>,
    pub beats_version: Option<String>,
    pub key_id: Option<i64>,
    pub rating: Option<i64>,
    pub color: Option<i64>,
    pub cues: Vec<RawCue>,
}

/// Turns [`RawTrack`]s into [`TrackRecord`]s
pub struct TrackBuilder<'a> {
    offsets: &'a mut OffsetResolver,
    ids: &'a mut TrackIdAllocator,
    notation: KeyNotation,
}

impl<'a> TrackBuilder<'a> {
    pub fn new(
        offsets: &'a mut OffsetResolver,
        ids: &'a mut TrackIdAllocator,
        notation: KeyNotation,
    ) -> Self {
        Self {
            offsets,
            ids,
            notation,
        }
    }

    pub fn build(&mut self, raw: RawTrack) -> Result<TrackRecord> {
        let sample_rate = required_positive(raw.library_id, "samplerate", raw.sample_rate)?;
        let channels = required_positive(raw.library_id, "channels", raw.channels)?;
        let duration = raw.duration.ok_or(Error::MissingField {
            track_id: raw.library_id,
            field: "duration",
        })?;

        let offset_ms = self.offsets.resolve_ms(&raw.location);

        let context = TrackContext {
            library_id: raw.library_id,
            title: raw.title.unwrap_or_default(),
            artist: raw.artist.unwrap_or_default(),
            album: raw.album.unwrap_or_default(),
            genre: raw.genre.unwrap_or_default(),
            duration: duration as i64,
            sample_rate,
            channels,
            bpm: raw.bpm.unwrap_or(0.0),
            location: raw.location,
            key: raw
                .key_id
                .and_then(Key::from_mixxx_id)
                .map(|key| key.render(self.notation)),
            rating: raw.rating.and_then(|r| u8::try_from(r).ok()),
            colour: raw.color.and_then(|c| u32::try_from(c).ok()),
        };

        let beat_grid = match (raw.beats.as_deref(), raw.beats_version.as_deref()) {
            (Some(blob), Some(version)) => {
                beat_grid_info(version, blob, sample_rate, context.bpm, offset_ms)
            }
            (Some(_), None) => {
                debug!("Track {} has beats without a version tag", raw.library_id);
                None
            }
            _ => None,
        };

        let cue_points = cue_points(&raw.cues, sample_rate, channels, offset_ms);
        let id = self.ids.assign(raw.library_id);

        Ok(TrackRecord {
            id,
            context,
            beat_grid,
            cue_points,
        })
    }
}

fn required_positive(track_id: i64, field: &'static str, value: Option<i64>) -> Result<u32> {
    value
        .filter(|v| *v > 0)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or(Error::MissingField { track_id, field })
}

/// Decode a beat blob into the grid anchor rekordbox needs.
///
/// Returns `None` for undecodable blobs and for beat maps without a usable
/// anchor; the track is then exported without a `TEMPO` element.
pub fn beat_grid_info(
    version: &str,
    blob: &[u8],
    sample_rate: u32,
    track_bpm: f64,
    offset_ms: i64,
) -> Option<BeatGridInfo> {
    let data = match BeatData::parse(version, blob) {
        Ok(data) => data,
        Err(e) => {
            debug!("Skipping beat grid: {}", e);
            return None;
        }
    };

    let bpm = data.bpm().filter(|bpm| *bpm > 0.0).unwrap_or(track_bpm);
    let Some(anchor_frame) = data.anchor_frame() else {
        debug!("No usable beat anchor in {} data", version);
        return None;
    };
    let anchor_sec = data.anchor_seconds(sample_rate, bpm)?;

    Some(BeatGridInfo {
        kind: data.kind(),
        anchor_frame,
        sample_rate,
        bpm,
        offset_ms,
        start_sec: anchor_sec + offset_ms as f64 / 1000.0,
    })
}

/// Convert hot cues, assigning fallback colours in insertion order
pub fn cue_points(raw: &[RawCue], sample_rate: u32, channels: u32, offset_ms: i64) -> Vec<CuePoint> {
    let mut cues: Vec<CuePoint> = Vec::with_capacity(raw.len());

    for cue in raw {
        let Ok(index) = u32::try_from(cue.hotcue) else {
            debug!("Skipping cue with hotcue index {}", cue.hotcue);
            continue;
        };

        let position_ms = beats::sample_index_to_ms(cue.position, sample_rate, channels) + offset_ms as f64;
        let label = cue
            .label
            .as_deref()
            .unwrap_or_default()
            .trim_end_matches('\0')
            .to_string();

        cues.push(CuePoint {
            kind: CueKind::HotCue,
            index,
            position_ms,
            color: CueColor::resolve(cue.color, cues.len()),
            label,
        });
    }

    cues
}
