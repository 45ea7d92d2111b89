//! mixxx-rekordbox-core: Mixxx library data to rekordbox XML
//!
//! This crate provides:
//! - beat blob decoding (BeatGrid-2.0, BeatMap-1.0)
//! - MP3 header inspection for decoder offset correction
//! - track, cue and beat grid records with offsets applied
//! - the rekordbox `DJ_PLAYLISTS` document and its XML writer
//!
//! Reading the Mixxx database and moving audio files is left to the caller.

pub mod beats;
pub mod collection;
pub mod color;
pub mod error;
pub mod key;
pub mod mpeg;
pub mod offset;
pub mod session;
pub mod track;
pub mod xml;

pub use collection::{merge_playlist, CollectionIndex, Document};
pub use error::{Error, Result};
pub use key::KeyNotation;
pub use offset::{Mp3Decoder, OffsetResolver, OffsetWarning};
pub use session::ExportSession;
pub use track::{RawCue, RawTrack, TrackIdAllocator, TrackRecord};
