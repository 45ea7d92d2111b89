//! Export run
//!
//! Walks the selected playlists (or crates), builds a record for every track
//! not yet in the collection and merges each playlist into one rekordbox XML
//! document, written once at the end.

use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{debug, info, warn};

use mixxx_rekordbox_core::{xml, ExportSession, OffsetWarning, RawTrack, TrackIdAllocator, TrackRecord};

use crate::config::Config;
use crate::db::MixxxDb;
use crate::transcode::Relocator;

pub async fn run(config: &Config) -> Result<()> {
    let db = MixxxDb::open(&config.db_path)?;
    let collections = db.collections(config.source)?;
    info!("Preparing to export {} {}", collections.len(), config.source);

    let ids = if config.random_track_ids {
        TrackIdAllocator::random()
    } else {
        TrackIdAllocator::library()
    };
    let mut session = ExportSession::new(config.mp3_decoder, config.key_notation, ids);

    let mut relocator = match &config.out_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let dir = std::path::absolute(dir)?;
            Some(Relocator::new(dir, config.format.clone(), config.max_concurrent))
        }
        None => None,
    };

    let stdin = io::stdin();
    for collection in &collections {
        if !config.export_all && !confirm(&collection.name, &mut stdin.lock(), &mut io::stdout())? {
            debug!("Skipping {}", collection.name);
            continue;
        }

        info!("{}:", collection.name);
        let members = db.members(config.source, collection.id)?;
        export_collection(&db, &mut session, relocator.as_mut(), &collection.name, &members).await?;
        flush_warnings(&collection.name, session.take_warnings());
    }

    match session.finish() {
        Some(document) => {
            xml::write_file(&document, &config.output)?;
            info!(
                "Wrote {} tracks in {} playlists to {:?}",
                document.collection.entries, document.playlists.count, config.output
            );
        }
        None => info!("Nothing exported, {:?} not written", config.output),
    }

    Ok(())
}

/// Ask before exporting a collection. Only `y` (any case) accepts.
pub fn confirm<R: BufRead, W: Write>(name: &str, input: &mut R, output: &mut W) -> io::Result<bool> {
    write!(output, "Export {}? [y/n]", name)?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

/// Build and merge one playlist node
pub async fn export_collection(
    db: &MixxxDb,
    session: &mut ExportSession,
    relocator: Option<&mut Relocator>,
    name: &str,
    members: &[i64],
) -> Result<()> {
    // New rows, in first-appearance order
    let mut pending: Vec<RawTrack> = Vec::new();
    for &row in members {
        if session.cached(row).is_some() {
            debug!("Track {} already in collection", row);
            continue;
        }
        if pending.iter().any(|raw| raw.library_id == row) {
            continue;
        }
        pending.push(db.track(row)?);
    }

    if let Some(relocator) = relocator {
        let jobs = pending
            .iter()
            .map(|raw| (raw.library_id, raw.location.clone()))
            .collect();
        let mut moved = relocator.relocate_all(jobs).await?;
        for raw in &mut pending {
            if let Some(location) = moved.remove(&raw.library_id) {
                raw.location = location;
            }
        }
    }

    let mut built: HashMap<i64, Arc<TrackRecord>> = HashMap::with_capacity(pending.len());
    for raw in pending {
        let row = raw.library_id;
        let record = session.build(raw)?;
        debug!("Built track {} as {}", row, record.id);
        built.insert(row, record);
    }

    let records = members
        .iter()
        .map(|row| {
            session
                .cached(*row)
                .or_else(|| built.get(row).cloned())
                .ok_or_else(|| anyhow!("Track {} was neither cached nor built", row))
        })
        .collect::<Result<Vec<_>>>()?;

    info!("{}: {} tracks, {} new", name, records.len(), built.len());
    session.merge(name, records);
    Ok(())
}

fn flush_warnings(name: &str, warnings: Vec<OffsetWarning>) {
    if warnings.is_empty() {
        return;
    }
    warn!("Offset could not be determined for {} tracks in {}:", warnings.len(), name);
    for warning in &warnings {
        warn!("  {}", warning);
    }
}
