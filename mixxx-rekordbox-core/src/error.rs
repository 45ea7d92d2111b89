//! Error types for mixxx-rekordbox-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Binary format error: {0}")]
    BinRw(String),

    #[error("MPEG header error: {0}")]
    Mpeg(String),

    #[error("Beat data error: {0}")]
    Beats(String),

    #[error("Unsupported MP3 decoder '{0}': expecting one of MAD, CoreAudio, FFmpeg")]
    UnsupportedDecoder(String),

    #[error("Unsupported key notation '{0}': expecting one of lancelot, openkey, traditional")]
    UnsupportedKeyNotation(String),

    #[error("Track {track_id} is missing required field '{field}'")]
    MissingField { track_id: i64, field: &'static str },

    #[error("XML error: {0}")]
    Xml(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<binrw::Error> for Error {
    fn from(e: binrw::Error) -> Self {
        Error::BinRw(e.to_string())
    }
}
