//! Moving tracks into the output directory
//!
//! Tracks are either copied as-is or transcoded with `ffmpeg`. Jobs for one
//! playlist run concurrently, bounded by a semaphore, and the caller waits
//! for all of them before any record is built.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Encoder bitrate for lossy targets, by extension
pub fn bitrate_for(format: &str) -> Option<&'static str> {
    match format.to_ascii_lowercase().as_str() {
        "mp3" => Some("320k"),
        "aac" => Some("256k"),
        _ => None,
    }
}

/// Copies or transcodes tracks into `out_dir`, at most once per library row
pub struct Relocator {
    out_dir: PathBuf,
    format: Option<String>,
    semaphore: Arc<Semaphore>,
    relocated: HashMap<i64, String>,
    /// Target paths handed out so far, with the row that owns each
    targets: HashMap<PathBuf, i64>,
}

impl Relocator {
    pub fn new(out_dir: PathBuf, format: Option<String>, max_concurrent: usize) -> Self {
        Self {
            out_dir,
            format,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            relocated: HashMap::new(),
            targets: HashMap::new(),
        }
    }

    /// Where `source` ends up: same file name, extension swapped when transcoding
    pub fn target_path(&self, source: &Path) -> PathBuf {
        match &self.format {
            Some(format) => {
                let stem = source.file_stem().unwrap_or(source.as_os_str());
                let mut name = stem.to_os_string();
                name.push(".");
                name.push(format);
                self.out_dir.join(name)
            }
            None => match source.file_name() {
                Some(name) => self.out_dir.join(name),
                None => self.out_dir.join(source),
            },
        }
    }

    /// Reserve a target for `row`. A name already owned by another row gets
    /// the row id appended to its stem.
    fn claim_target(&mut self, row: i64, source: &Path) -> PathBuf {
        let mut target = self.target_path(source);
        if self.targets.get(&target).is_some_and(|owner| *owner != row) {
            let renamed = with_row_suffix(&target, row);
            debug!("{:?} already taken, track {} goes to {:?}", target, row, renamed);
            target = renamed;
        }
        self.targets.insert(target.clone(), row);
        target
    }

    /// Relocate `(library_id, location)` pairs and return the new location
    /// of each row. Rows handled by an earlier call are not touched again.
    pub async fn relocate_all(&mut self, jobs: Vec<(i64, String)>) -> Result<HashMap<i64, String>> {
        let mut locations = HashMap::with_capacity(jobs.len());
        let mut set = JoinSet::new();

        for (row, source) in jobs {
            if let Some(done) = self.relocated.get(&row) {
                debug!("Track {} already relocated to {}", row, done);
                locations.insert(row, done.clone());
                continue;
            }
            if locations.contains_key(&row) {
                continue;
            }

            let source = tokio::fs::canonicalize(&source)
                .await
                .with_context(|| format!("Track {} not found at {:?}", row, source))?;
            let target = self.claim_target(row, &source);

            if is_same_file(&source, &target).await {
                debug!("Track {} already in {:?}, leaving it in place", row, self.out_dir);
                let location = source.to_string_lossy().into_owned();
                self.relocated.insert(row, location.clone());
                locations.insert(row, location);
                continue;
            }

            // Placeholder so duplicates within this batch spawn one job
            locations.insert(row, String::new());

            let format = self.format.clone();
            let semaphore = Arc::clone(&self.semaphore);

            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await?;
                match format {
                    Some(format) => transcode(&source, &target, &format).await?,
                    None => copy(&source, &target).await?,
                }
                Ok::<_, anyhow::Error>((row, target))
            });
        }

        let spawned = set.len();
        while let Some(joined) = set.join_next().await {
            let (row, target) = joined.context("Relocation task panicked")??;
            let location = target.to_string_lossy().into_owned();
            self.relocated.insert(row, location.clone());
            locations.insert(row, location);
        }

        if spawned > 0 {
            info!("Relocated {} tracks to {:?}", spawned, self.out_dir);
        }
        Ok(locations)
    }
}

/// Both paths name the same existing file
async fn is_same_file(source: &Path, target: &Path) -> bool {
    match tokio::fs::canonicalize(target).await {
        Ok(target) => target == source,
        Err(_) => false,
    }
}

fn with_row_suffix(path: &Path, row: i64) -> PathBuf {
    let mut name = path.file_stem().unwrap_or_default().to_os_string();
    name.push(format!("-{}", row));
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    path.with_file_name(name)
}

async fn copy(source: &Path, target: &Path) -> Result<()> {
    debug!("Copying {:?} -> {:?}", source, target);
    tokio::fs::copy(source, target)
        .await
        .with_context(|| format!("Failed to copy {:?} to {:?}", source, target))?;
    Ok(())
}

async fn transcode(source: &Path, target: &Path, format: &str) -> Result<()> {
    debug!("Transcoding {:?} -> {:?}", source, target);

    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-y")
        .args(["-loglevel", "error"])
        .arg("-i")
        .arg(source)
        .args(["-map", "0:a", "-map_metadata", "0"]);
    if let Some(bitrate) = bitrate_for(format) {
        cmd.args(["-b:a", bitrate]);
    }
    cmd.arg(target);

    let output = cmd
        .output()
        .await
        .context("Failed to run ffmpeg, is it installed?")?;
    if !output.status.success() {
        bail!(
            "ffmpeg failed on {:?}: {}",
            source,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}
