//! Run configuration

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use mixxx_rekordbox_core::{KeyNotation, Mp3Decoder};

/// Where tracks are sourced from. The XML always holds playlists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Playlists,
    Crates,
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionKind::Playlists => f.write_str("playlists"),
            CollectionKind::Crates => f.write_str("crates"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Mixxx library database
    pub db_path: PathBuf,
    /// XML file to write
    pub output: PathBuf,
    /// Copy (or transcode) tracks here and point `Location` at the copies
    pub out_dir: Option<PathBuf>,
    /// Target extension for transcoding, requires `out_dir`
    pub format: Option<String>,
    /// Export everything without prompting
    pub export_all: bool,
    pub source: CollectionKind,
    pub key_notation: KeyNotation,
    pub mp3_decoder: Mp3Decoder,
    pub random_track_ids: bool,
    /// Max concurrent copy/transcode jobs
    pub max_concurrent: usize,
}

impl Config {
    /// Reject option combinations that cannot run
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.format.is_some() && self.out_dir.is_none() {
            anyhow::bail!("--format requires --out-dir");
        }
        Ok(())
    }
}

/// Half the available processors, at least one
pub fn default_concurrency() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cpus / 2).max(1)
}

/// Mixxx's default database location for this platform
pub fn default_db_location() -> Option<PathBuf> {
    if let Some(local) = env::var_os("LOCALAPPDATA") {
        return Some(PathBuf::from(local).join("Mixxx").join("mixxxdb.sqlite"));
    }

    let home = PathBuf::from(env::var_os("HOME")?);
    Some(db_location_under(&home))
}

fn db_location_under(home: &Path) -> PathBuf {
    let mac = home.join("Library").join("Application Support").join("Mixxx");
    if mac.is_dir() {
        return mac.join("mixxxdb.sqlite");
    }
    home.join(".mixxx").join("mixxxdb.sqlite")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config() -> Config {
        Config {
            db_path: PathBuf::from("mixxxdb.sqlite"),
            output: PathBuf::from("rekordbox.xml"),
            out_dir: None,
            format: None,
            export_all: false,
            source: CollectionKind::Playlists,
            key_notation: KeyNotation::default(),
            mp3_decoder: Mp3Decoder::default(),
            random_track_ids: false,
            max_concurrent: 1,
        }
    }

    #[test]
    fn test_format_needs_out_dir() {
        let mut cfg = config();
        assert!(cfg.validate().is_ok());

        cfg.format = Some("mp3".into());
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("--out-dir"));

        cfg.out_dir = Some(PathBuf::from("/tmp/usb"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_default_concurrency_at_least_one() {
        assert!(default_concurrency() >= 1);
    }

    #[test]
    fn test_db_location_linux_fallback() {
        let home = TempDir::new().unwrap();
        assert_eq!(
            db_location_under(home.path()),
            home.path().join(".mixxx/mixxxdb.sqlite")
        );
    }

    #[test]
    fn test_db_location_macos() {
        let home = TempDir::new().unwrap();
        fs::create_dir_all(home.path().join("Library/Application Support/Mixxx")).unwrap();
        assert_eq!(
            db_location_under(home.path()),
            home.path().join("Library/Application Support/Mixxx/mixxxdb.sqlite")
        );
    }

    #[test]
    fn test_collection_kind_display() {
        assert_eq!(CollectionKind::Playlists.to_string(), "playlists");
        assert_eq!(CollectionKind::Crates.to_string(), "crates");
    }
}
