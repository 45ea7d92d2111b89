//! Mixxx beat data and position conversion
//!
//! Mixxx serializes beats as protobuf, tagged by the `beats_version` column:
//! - `BeatGrid-2.0`: constant tempo, one anchor beat plus a BPM
//! - `BeatMap-1.0`: a list of independently placed beats, no BPM
//!
//! rekordbox wants a single `TEMPO` anchor (`Inizio`) in seconds. For a
//! constant-tempo grid the anchor is folded into the first bar.

use crate::error::{Error, Result};

pub const BEAT_GRID_VERSION: &str = "BeatGrid-2.0";
pub const BEAT_MAP_VERSION: &str = "BeatMap-1.0";

/// rekordbox grids are always written as 4/4
pub const BEATS_PER_BAR: u32 = 4;

/// Where a beat came from. Higher values take precedence.
pub mod source {
    pub const ANALYZER: u32 = 0;
    pub const FILE_METADATA: u32 = 1;
    pub const USER: u32 = 2;
}

/// Single beat as stored by Mixxx
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Beat {
    pub frame_position: i64,
    pub enabled: bool,
    pub source: u32,
}

impl Default for Beat {
    fn default() -> Self {
        Self {
            frame_position: 0,
            enabled: true,
            source: source::ANALYZER,
        }
    }
}

/// Which encoding a track's beats came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeatGridKind {
    /// Constant tempo from a single anchor
    Fixed,
    /// Independently timed beats
    Variable,
}

/// Decoded beat blob
#[derive(Debug, Clone, PartialEq)]
pub enum BeatData {
    Grid {
        first_beat: Option<Beat>,
        bpm: Option<f64>,
    },
    Map {
        beats: Vec<Beat>,
    },
}

impl BeatData {
    /// Decode a blob according to its `beats_version` tag
    pub fn parse(version: &str, blob: &[u8]) -> Result<Self> {
        match version {
            BEAT_GRID_VERSION => parse_grid(blob),
            BEAT_MAP_VERSION => parse_map(blob),
            other => Err(Error::Beats(format!("unsupported beats version '{}'", other))),
        }
    }

    pub fn kind(&self) -> BeatGridKind {
        match self {
            BeatData::Grid { .. } => BeatGridKind::Fixed,
            BeatData::Map { .. } => BeatGridKind::Variable,
        }
    }

    /// Tempo stored with the beats. Beat maps never carry one.
    pub fn bpm(&self) -> Option<f64> {
        match self {
            BeatData::Grid { bpm, .. } => *bpm,
            BeatData::Map { .. } => None,
        }
    }

    /// Frame position of the beat rekordbox should anchor its grid on
    pub fn anchor_frame(&self) -> Option<i64> {
        match self {
            BeatData::Grid { first_beat, .. } => first_beat.map(|b| b.frame_position),
            BeatData::Map { beats } => select_map_anchor(beats).map(|b| b.frame_position),
        }
    }

    /// Anchor in seconds before offset correction.
    ///
    /// `bpm` is the tempo to fold a fixed grid with; it is ignored for maps.
    pub fn anchor_seconds(&self, sample_rate: u32, bpm: f64) -> Option<f64> {
        let seconds = frames_to_seconds(self.anchor_frame()?, sample_rate);
        match self.kind() {
            BeatGridKind::Fixed => Some(wrap_to_first_bar(seconds, bpm)),
            BeatGridKind::Variable => Some(seconds),
        }
    }
}

/// First enabled beat past frame 1, scanning by descending source.
/// Beats sharing a source keep their stored order.
pub fn select_map_anchor(beats: &[Beat]) -> Option<&Beat> {
    let mut ordered: Vec<&Beat> = beats.iter().collect();
    ordered.sort_by(|a, b| b.source.cmp(&a.source));
    ordered
        .into_iter()
        .find(|beat| beat.enabled && beat.frame_position > 1)
}

pub fn frames_to_seconds(frame: i64, sample_rate: u32) -> f64 {
    frame as f64 / sample_rate as f64
}

/// Fold a position into the first bar. A non-positive tempo has no bar
/// length, so the position is returned unchanged.
pub fn wrap_to_first_bar(seconds: f64, bpm: f64) -> f64 {
    if bpm <= 0.0 {
        return seconds;
    }
    let interval = 60.0 / bpm;
    let bar_period = BEATS_PER_BAR as f64 * interval;
    seconds.rem_euclid(bar_period)
}

/// Cue positions are stored as interleaved sample indices
pub fn sample_index_to_ms(raw: f64, sample_rate: u32, channels: u32) -> f64 {
    (raw * 1000.0) / (sample_rate as f64 * channels as f64)
}

fn parse_grid(blob: &[u8]) -> Result<BeatData> {
    let mut reader = WireReader::new(blob);
    let mut first_beat = None;
    let mut bpm = None;

    while let Some((field, value)) = reader.next_field()? {
        match (field, value) {
            (1, WireValue::Bytes(bytes)) => bpm = parse_bpm(bytes)?,
            (2, WireValue::Bytes(bytes)) => first_beat = Some(parse_beat(bytes)?),
            _ => {}
        }
    }

    Ok(BeatData::Grid { first_beat, bpm })
}

fn parse_map(blob: &[u8]) -> Result<BeatData> {
    let mut reader = WireReader::new(blob);
    let mut beats = Vec::new();

    while let Some((field, value)) = reader.next_field()? {
        if let (1, WireValue::Bytes(bytes)) = (field, value) {
            beats.push(parse_beat(bytes)?);
        }
    }

    Ok(BeatData::Map { beats })
}

fn parse_beat(bytes: &[u8]) -> Result<Beat> {
    let mut reader = WireReader::new(bytes);
    let mut beat = Beat::default();

    while let Some((field, value)) = reader.next_field()? {
        match (field, value) {
            // int32 is sign-extended to 64 bits on the wire
            (1, WireValue::Varint(v)) => beat.frame_position = v as i64 as i32 as i64,
            (2, WireValue::Varint(v)) => beat.enabled = v != 0,
            (3, WireValue::Varint(v)) => beat.source = v as u32,
            _ => {}
        }
    }

    Ok(beat)
}

fn parse_bpm(bytes: &[u8]) -> Result<Option<f64>> {
    let mut reader = WireReader::new(bytes);
    let mut bpm = None;

    while let Some((field, value)) = reader.next_field()? {
        if let (1, WireValue::Fixed64(bits)) = (field, value) {
            bpm = Some(f64::from_bits(bits));
        }
    }

    Ok(bpm)
}

/// Protobuf wire value
#[derive(Debug, Clone, Copy, PartialEq)]
enum WireValue<'a> {
    Varint(u64),
    Fixed64(u64),
    Bytes(&'a [u8]),
    /// No Mixxx field uses 32-bit values, the payload is skipped
    Fixed32,
}

/// Minimal protobuf wire format reader
struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn next_field(&mut self) -> Result<Option<(u32, WireValue<'a>)>> {
        if self.pos >= self.buf.len() {
            return Ok(None);
        }

        let key = self.varint()?;
        let field = (key >> 3) as u32;
        let value = match key & 0x07 {
            0 => WireValue::Varint(self.varint()?),
            1 => WireValue::Fixed64(u64::from_le_bytes(self.array::<8>()?)),
            2 => {
                let len = self.varint()? as usize;
                WireValue::Bytes(self.take(len)?)
            }
            5 => {
                self.take(4)?;
                WireValue::Fixed32
            }
            wire_type => {
                return Err(Error::Beats(format!(
                    "unsupported wire type {} for field {}",
                    wire_type, field
                )))
            }
        };

        Ok(Some((field, value)))
    }

    fn varint(&mut self) -> Result<u64> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = *self
                .buf
                .get(self.pos)
                .ok_or_else(|| Error::Beats("truncated varint".into()))?;
            self.pos += 1;
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(Error::Beats("varint longer than 10 bytes".into()))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| Error::Beats("truncated field".into()))?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}
