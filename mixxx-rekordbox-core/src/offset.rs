//! Decoder latency compensation
//!
//! Every decoder drops or delays a few milliseconds of audio at stream start,
//! depending on which headers the encoder wrote. Mixxx stores positions
//! relative to what *its* decoder produced, so every cue and beat has to be
//! shifted forward by that amount to line up in rekordbox.
//!
//! Offsets per decoder and MP3 header case were measured by
//! https://github.com/FrankwaP/mixxx-utils

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use crate::error::{Error, Result};
use crate::mpeg::{self, Mp3Case};
use crate::track::FileType;

/// Fixed offset for AAC in an MP4 container
pub const M4A_OFFSET_MS: i64 = 48;

/// MP3 decoder Mixxx was built with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mp3Decoder {
    #[default]
    Mad,
    CoreAudio,
    FFmpeg,
}

impl FromStr for Mp3Decoder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mad" => Ok(Mp3Decoder::Mad),
            "coreaudio" => Ok(Mp3Decoder::CoreAudio),
            "ffmpeg" => Ok(Mp3Decoder::FFmpeg),
            _ => Err(Error::UnsupportedDecoder(s.to_string())),
        }
    }
}

impl fmt::Display for Mp3Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mp3Decoder::Mad => "MAD",
            Mp3Decoder::CoreAudio => "CoreAudio",
            Mp3Decoder::FFmpeg => "FFmpeg",
        };
        f.write_str(name)
    }
}

/// Offset table lookup. Pairs not listed are 0.
pub fn mp3_offset_ms(decoder: Mp3Decoder, case: Mp3Case) -> i64 {
    match (decoder, case) {
        (Mp3Decoder::Mad, Mp3Case::A | Mp3Case::D) => 26,
        (Mp3Decoder::CoreAudio, Mp3Case::A) => 13,
        (Mp3Decoder::CoreAudio, Mp3Case::B) => 11,
        (Mp3Decoder::CoreAudio, Mp3Case::C) => 26,
        (Mp3Decoder::CoreAudio, Mp3Case::D) => 50,
        (Mp3Decoder::FFmpeg, Mp3Case::D) => 26,
        _ => 0,
    }
}

/// A file whose offset could not be determined
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetWarning {
    pub path: String,
    pub message: String,
}

impl fmt::Display for OffsetWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Resolves per-file offsets and collects the files it had to give up on.
///
/// Warnings accumulate until [`OffsetResolver::take_warnings`] is called,
/// which the exporter does once per playlist.
#[derive(Debug, Default)]
pub struct OffsetResolver {
    decoder: Mp3Decoder,
    warnings: Vec<OffsetWarning>,
}

impl OffsetResolver {
    pub fn new(decoder: Mp3Decoder) -> Self {
        Self {
            decoder,
            warnings: Vec::new(),
        }
    }

    pub fn decoder(&self) -> Mp3Decoder {
        self.decoder
    }

    /// Offset in milliseconds to add to every position of `location`.
    ///
    /// Never fails: unreadable MP3 headers resolve to 0 and leave a warning.
    pub fn resolve_ms(&mut self, location: &str) -> i64 {
        match FileType::from_path(Path::new(location)) {
            FileType::M4a => M4A_OFFSET_MS,
            FileType::Mp3 => match mpeg::inspect_file(location) {
                Ok(info) => {
                    let case = info.case();
                    let offset = mp3_offset_ms(self.decoder, case);
                    debug!("{}: MP3 case {:?}, {} offset {} ms", location, case, self.decoder, offset);
                    offset
                }
                Err(e) => {
                    self.record_warning(location, &e);
                    0
                }
            },
            _ => 0,
        }
    }

    /// Offset in seconds, for beat grid anchors
    pub fn resolve_sec(&mut self, location: &str) -> f64 {
        self.resolve_ms(location) as f64 / 1000.0
    }

    fn record_warning(&mut self, location: &str, error: &Error) {
        debug!("Offset detection failed for {}: {}", location, error);
        if self.warnings.iter().any(|w| w.path == location) {
            return;
        }
        self.warnings.push(OffsetWarning {
            path: location.to_string(),
            message: error.to_string(),
        });
    }

    pub fn warnings(&self) -> &[OffsetWarning] {
        &self.warnings
    }

    /// Hand over the pending warnings and start a new batch
    pub fn take_warnings(&mut self) -> Vec<OffsetWarning> {
        std::mem::take(&mut self.warnings)
    }
}
