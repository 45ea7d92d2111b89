//! Mixxx to rekordbox exporter
//!
//! Reads playlists (or crates) from the Mixxx library and writes a rekordbox
//! XML collection, optionally copying or transcoding the tracks.

mod config;
mod db;
mod export;
mod transcode;

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::{CollectionKind, Config};
use mixxx_rekordbox_core::{KeyNotation, Mp3Decoder};

#[derive(Parser)]
#[command(name = "mixxx2rb")]
#[command(about = "Export Mixxx playlists to rekordbox XML")]
struct Cli {
    /// Copy tracks into this directory and point the XML at the copies
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Transcode tracks into this format (extension), requires --out-dir
    #[arg(long)]
    format: Option<String>,

    /// Export every playlist without prompting
    #[arg(long)]
    export_all: bool,

    /// Mixxx database, if not in the default location
    #[arg(long)]
    mixxx_db_location: Option<PathBuf>,

    /// Key notation: lancelot, openkey or traditional
    #[arg(long, default_value = "lancelot")]
    key_type: KeyNotation,

    /// Source tracks from crates; the XML still holds playlists
    #[arg(long)]
    use_crates: bool,

    /// Decoder the target rekordbox uses for MP3: MAD, CoreAudio or FFmpeg
    #[arg(long, default_value = "MAD")]
    mp3_decoder: Mp3Decoder,

    /// Random 10-digit track ids instead of Mixxx library ids
    #[arg(long)]
    random_track_ids: bool,

    /// Output XML file
    #[arg(short, long, default_value = "rekordbox.xml")]
    output: PathBuf,

    /// Maximum concurrent copy/transcode jobs (default: half the CPUs)
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let db_path = match cli.mixxx_db_location {
        Some(path) => path,
        None => match config::default_db_location() {
            Some(path) => path,
            None => anyhow::bail!("Cannot locate the Mixxx database, use --mixxx-db-location"),
        },
    };

    let config = Config {
        db_path,
        output: cli.output,
        out_dir: cli.out_dir,
        format: cli.format,
        export_all: cli.export_all,
        source: if cli.use_crates {
            CollectionKind::Crates
        } else {
            CollectionKind::Playlists
        },
        key_notation: cli.key_type,
        mp3_decoder: cli.mp3_decoder,
        random_track_ids: cli.random_track_ids,
        max_concurrent: cli
            .max_concurrent
            .unwrap_or_else(config::default_concurrency)
            .max(1),
    };
    config.validate()?;

    info!("Mixxx database: {:?}", config.db_path);
    info!("MP3 decoder: {}, key notation: {}", config.mp3_decoder, config.key_notation);

    export::run(&config).await?;

    info!("Done");
    Ok(())
}
