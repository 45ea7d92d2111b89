//! Read-only access to the Mixxx library database
//!
//! Older Mixxx schemas lack some columns (`beats_version`, `color`, cue
//! `label`, ...). Those are detected up front and read as NULL.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::debug;

use mixxx_rekordbox_core::{RawCue, RawTrack};

use crate::config::CollectionKind;

/// Hot cue type in the `cues` table
const CUE_TYPE_HOTCUE: i64 = 1;

const OPTIONAL_LIBRARY_COLUMNS: [&str; 5] = ["beats", "beats_version", "key_id", "rating", "color"];
const OPTIONAL_CUE_COLUMNS: [&str; 2] = ["color", "label"];

/// A playlist or crate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRow {
    pub id: i64,
    pub name: String,
}

pub struct MixxxDb {
    conn: Connection,
    library_columns: HashSet<String>,
    cue_columns: HashSet<String>,
}

impl MixxxDb {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open Mixxx database {:?}", path))?;
        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        let library_columns = table_columns(&conn, "library")?;
        let cue_columns = table_columns(&conn, "cues")?;
        debug!(
            "library has {} columns, cues has {}",
            library_columns.len(),
            cue_columns.len()
        );
        Ok(Self {
            conn,
            library_columns,
            cue_columns,
        })
    }

    /// Playlists in sidebar order, or crates by name
    pub fn collections(&self, kind: CollectionKind) -> Result<Vec<CollectionRow>> {
        let sql = match kind {
            CollectionKind::Playlists => {
                "SELECT id, name FROM Playlists WHERE hidden = 0 ORDER BY position"
            }
            CollectionKind::Crates => "SELECT id, name FROM crates ORDER BY name",
        };

        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(CollectionRow {
                    id: row.get(0)?,
                    name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Library row ids of a collection, in collection order
    pub fn members(&self, kind: CollectionKind, collection_id: i64) -> Result<Vec<i64>> {
        let sql = match kind {
            CollectionKind::Playlists => {
                "SELECT track_id FROM PlaylistTracks WHERE playlist_id = ?1 ORDER BY position"
            }
            CollectionKind::Crates => "SELECT track_id FROM crate_tracks WHERE crate_id = ?1",
        };

        let mut stmt = self.conn.prepare(sql)?;
        let ids = stmt
            .query_map(params![collection_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    /// Library row plus its hot cues
    pub fn track(&self, library_id: i64) -> Result<RawTrack> {
        let sql = format!(
            "SELECT l.id, tl.location, l.samplerate, l.channels, l.duration,
                    l.title, l.artist, l.album, l.genre, l.bpm,
                    {}, {}, {}, {}, {}
             FROM library l
             JOIN track_locations tl ON tl.id = l.location
             WHERE l.id = ?1",
            self.library_column("beats"),
            self.library_column("beats_version"),
            self.library_column("key_id"),
            self.library_column("rating"),
            self.library_column("color"),
        );

        let track = self
            .conn
            .query_row(&sql, params![library_id], |row| {
                Ok(RawTrack {
                    library_id: row.get(0)?,
                    location: row.get(1)?,
                    sample_rate: row.get(2)?,
                    channels: row.get(3)?,
                    duration: row.get(4)?,
                    title: row.get(5)?,
                    artist: row.get(6)?,
                    album: row.get(7)?,
                    genre: row.get(8)?,
                    bpm: row.get(9)?,
                    beats: row.get(10)?,
                    beats_version: row.get(11)?,
                    key_id: row.get(12)?,
                    rating: row.get(13)?,
                    color: row.get(14)?,
                    cues: Vec::new(),
                })
            })
            .optional()?
            .with_context(|| format!("Track {} not found in library", library_id))?;

        Ok(RawTrack {
            cues: self.hot_cues(library_id)?,
            ..track
        })
    }

    fn hot_cues(&self, library_id: i64) -> Result<Vec<RawCue>> {
        let sql = format!(
            "SELECT hotcue, position, {}, {}
             FROM cues
             WHERE type = ?1 AND hotcue >= 0 AND track_id = ?2
             ORDER BY id",
            self.cue_column("color"),
            self.cue_column("label"),
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let cues = stmt
            .query_map(params![CUE_TYPE_HOTCUE, library_id], |row| {
                Ok(RawCue {
                    hotcue: row.get(0)?,
                    position: row.get::<_, Option<f64>>(1)?.unwrap_or(0.0),
                    color: row.get(2)?,
                    label: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(cues)
    }

    fn library_column(&self, name: &'static str) -> String {
        optional_column("l", name, &self.library_columns)
    }

    fn cue_column(&self, name: &'static str) -> String {
        optional_column("cues", name, &self.cue_columns)
    }
}

fn optional_column(table: &str, name: &str, present: &HashSet<String>) -> String {
    if present.contains(name) {
        format!("{}.{}", table, name)
    } else {
        "NULL".to_string()
    }
}

fn table_columns(conn: &Connection, table: &str) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<HashSet<_>, _>>()?;

    let expected: &[&str] = match table {
        "library" => &OPTIONAL_LIBRARY_COLUMNS,
        "cues" => &OPTIONAL_CUE_COLUMNS,
        _ => &[],
    };
    for missing in expected.iter().filter(|c| !columns.contains(**c)) {
        debug!("{}.{} not present, reading as NULL", table, missing);
    }

    Ok(columns)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    const SCHEMA: &str = "
        CREATE TABLE track_locations (id INTEGER PRIMARY KEY, location TEXT);
        CREATE TABLE library (
            id INTEGER PRIMARY KEY, location INTEGER, samplerate INTEGER, channels INTEGER,
            duration REAL, title TEXT, artist TEXT, album TEXT, genre TEXT, bpm REAL,
            beats BLOB, beats_version TEXT, key_id INTEGER, rating INTEGER, color INTEGER
        );
        CREATE TABLE cues (
            id INTEGER PRIMARY KEY, track_id INTEGER, type INTEGER, position INTEGER,
            hotcue INTEGER, color INTEGER, label TEXT
        );
        CREATE TABLE Playlists (id INTEGER PRIMARY KEY, name TEXT, position INTEGER, hidden INTEGER);
        CREATE TABLE PlaylistTracks (id INTEGER PRIMARY KEY, playlist_id INTEGER, track_id INTEGER, position INTEGER);
        CREATE TABLE crates (id INTEGER PRIMARY KEY, name TEXT);
        CREATE TABLE crate_tracks (crate_id INTEGER, track_id INTEGER);
    ";

    /// Two visible playlists sharing track 1, a hidden one and a crate
    pub(crate) fn fixture(dir: &Path, music: &Path) -> std::path::PathBuf {
        let path = dir.join("mixxxdb.sqlite");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        for id in 1..=2i64 {
            let location = music.join(format!("track{}.flac", id));
            conn.execute(
                "INSERT INTO track_locations (id, location) VALUES (?1, ?2)",
                params![id + 100, location.to_str().unwrap()],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO library (id, location, samplerate, channels, duration, title, artist, bpm, key_id, rating)
                 VALUES (?1, ?2, 44100, 2, 180.5, ?3, 'Artist', 124.0, 22, 4)",
                params![id, id + 100, format!("Track {}", id)],
            )
            .unwrap();
        }

        conn.execute_batch(
            "INSERT INTO cues (track_id, type, position, hotcue, color, label) VALUES
                (1, 1, 88200, 0, 16711680, 'Drop'),
                (1, 0, 0, -1, 0, ''),
                (1, 1, 0, -1, 0, ''),
                (2, 1, 176400, 2, NULL, NULL);
             INSERT INTO Playlists (id, name, position, hidden) VALUES
                (10, 'Peak Time', 2, 0), (11, 'Warmup', 1, 0), (12, 'Auto DJ', 0, 2);
             INSERT INTO PlaylistTracks (playlist_id, track_id, position) VALUES
                (11, 2, 2), (11, 1, 1), (10, 1, 1);
             INSERT INTO crates (id, name) VALUES (20, 'Techno'), (21, 'Ambient');
             INSERT INTO crate_tracks (crate_id, track_id) VALUES (20, 2), (20, 1);",
        )
        .unwrap();

        path
    }

    #[test]
    fn test_playlists_in_position_order() {
        let tmp = TempDir::new().unwrap();
        let db = MixxxDb::open(&fixture(tmp.path(), tmp.path())).unwrap();

        let playlists = db.collections(CollectionKind::Playlists).unwrap();
        let names: Vec<&str> = playlists.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Warmup", "Peak Time"]);
        assert_eq!(db.members(CollectionKind::Playlists, 11).unwrap(), [1, 2]);
    }

    #[test]
    fn test_crates() {
        let tmp = TempDir::new().unwrap();
        let db = MixxxDb::open(&fixture(tmp.path(), tmp.path())).unwrap();

        let crates = db.collections(CollectionKind::Crates).unwrap();
        assert_eq!(crates[0], CollectionRow { id: 21, name: "Ambient".into() });
        assert_eq!(db.members(CollectionKind::Crates, 20).unwrap(), [2, 1]);
        assert!(db.members(CollectionKind::Crates, 21).unwrap().is_empty());
    }

    #[test]
    fn test_track_with_hot_cues_only() {
        let tmp = TempDir::new().unwrap();
        let db = MixxxDb::open(&fixture(tmp.path(), tmp.path())).unwrap();

        let track = db.track(1).unwrap();
        assert_eq!(track.location, tmp.path().join("track1.flac").to_str().unwrap());
        assert_eq!(track.sample_rate, Some(44_100));
        assert_eq!(track.duration, Some(180.5));
        assert_eq!(track.key_id, Some(22));
        assert_eq!(track.beats, None);
        assert_eq!(track.cues.len(), 1);
        assert_eq!(track.cues[0].position, 88_200.0);
        assert_eq!(track.cues[0].color, Some(0xFF0000));
        assert_eq!(track.cues[0].label.as_deref(), Some("Drop"));

        assert!(db.track(99).is_err());
    }

    #[test]
    fn test_old_schema_reads_null() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("old.sqlite");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE track_locations (id INTEGER PRIMARY KEY, location TEXT);
             CREATE TABLE library (
                id INTEGER PRIMARY KEY, location INTEGER, samplerate INTEGER, channels INTEGER,
                duration REAL, title TEXT, artist TEXT, album TEXT, genre TEXT, bpm REAL
             );
             CREATE TABLE cues (id INTEGER PRIMARY KEY, track_id INTEGER, type INTEGER, position INTEGER, hotcue INTEGER);
             INSERT INTO track_locations VALUES (1, '/music/old.mp3');
             INSERT INTO library (id, location, samplerate, channels, duration) VALUES (5, 1, NULL, 2, 100.0);
             INSERT INTO cues (track_id, type, position, hotcue) VALUES (5, 1, 4410, 1);",
        )
        .unwrap();
        drop(conn);

        let db = MixxxDb::open(&path).unwrap();
        let track = db.track(5).unwrap();
        assert_eq!(track.sample_rate, None);
        assert_eq!(track.color, None);
        assert_eq!(track.beats_version, None);
        assert_eq!(track.cues[0].color, None);
        assert_eq!(track.cues[0].label, None);
    }
}
