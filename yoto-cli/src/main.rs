//! Yoto CLI
//!
//! Command-line client for managing Yoto playlists, icons, and players.
//!
//! # Usage
//!
//! ```bash
//! # Authorize this machine (device flow)
//! yoto login
//!
//! # List playlists and show one
//! yoto playlists
//! yoto playlist 5ukMR --json
//!
//! # Upload audio and add it to a playlist in one step
//! yoto track:import 5ukMR "Chapter 1" ./audio.mp3
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};
use yoto_core::editor::{ChapterChanges, NewTrack, PlaylistChanges, TrackChanges};
use yoto_core::model::OnEnd;

mod commands;
mod config;
mod context;
mod output;

use commands::{audio, auth, devices, icons, playlists};
use config::Settings;
use context::Session;

#[derive(Parser)]
#[command(name = "yoto")]
#[command(about = "Manage Yoto playlists, icons, and players from the command line")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate with your Yoto account using device flow
    Login,

    /// Remove stored credentials
    Logout,

    /// Check if you are authenticated
    Status,

    /// List your MYO playlists
    Playlists {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Get playlist details including chapters and tracks
    Playlist {
        /// The playlist card ID (e.g., 5ukMR)
        card_id: String,

        /// Include playable URLs for tracks
        #[arg(long)]
        playable: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a new empty playlist
    #[command(name = "playlist:create")]
    PlaylistCreate {
        /// The playlist title
        title: String,

        /// Set playlist description
        #[arg(long)]
        description: Option<String>,

        /// Set playlist author
        #[arg(long)]
        author: Option<String>,
    },

    /// Edit playlist properties (title, description, author)
    #[command(name = "playlist:edit")]
    PlaylistEdit {
        card_id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        author: Option<String>,

        /// Update playback type (e.g., linear)
        #[arg(long)]
        playback_type: Option<String>,
    },

    /// Delete a playlist
    #[command(name = "playlist:delete")]
    PlaylistDelete { card_id: String },

    /// Add a new chapter to a playlist
    #[command(name = "chapter:add")]
    ChapterAdd {
        card_id: String,

        /// The chapter title
        title: String,

        /// Chapter icon (mediaId or yoto:#mediaId)
        #[arg(long)]
        icon: Option<String>,
    },

    /// Update a chapter's title or icon
    #[command(name = "chapter:update")]
    ChapterUpdate {
        card_id: String,

        /// Chapter index (0-based)
        chapter_idx: usize,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        icon: Option<String>,
    },

    /// Delete a chapter from a playlist
    #[command(name = "chapter:delete")]
    ChapterDelete {
        card_id: String,

        /// Chapter index (0-based)
        chapter_idx: usize,
    },

    /// Add a new track to a chapter
    #[command(name = "track:add")]
    TrackAdd {
        card_id: String,

        /// Chapter index (0-based)
        chapter_idx: usize,

        title: String,

        /// Track URL (yoto:#hash or https://...)
        url: String,

        #[arg(long)]
        icon: Option<String>,

        /// Track duration in seconds
        #[arg(long)]
        duration: Option<u64>,
    },

    /// Update a track's properties (title, icon, URL, playback behavior)
    #[command(name = "track:update")]
    TrackUpdate {
        card_id: String,

        /// Chapter index (0-based)
        chapter_idx: usize,

        /// Track index within chapter (0-based)
        track_idx: usize,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        icon: Option<String>,

        #[arg(long)]
        url: Option<String>,

        /// Action when track ends: none (continue), stop (pause), repeat (loop)
        #[arg(long)]
        on_end: Option<OnEnd>,
    },

    /// Delete a track from a chapter
    #[command(name = "track:delete")]
    TrackDelete {
        card_id: String,

        /// Chapter index (0-based)
        chapter_idx: usize,

        /// Track index within chapter (0-based)
        track_idx: usize,
    },

    /// Import audio file as a new chapter with track (upload + transcode + create)
    #[command(name = "track:import")]
    TrackImport {
        card_id: String,

        /// Title for the chapter and track
        title: String,

        /// Path to audio file (MP3, M4A, FLAC, WAV, etc.)
        file: PathBuf,

        #[arg(long)]
        icon: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Upload an audio file and get a track URL
    #[command(name = "track:upload")]
    TrackUpload {
        file: PathBuf,

        #[arg(long)]
        json: bool,

        /// Don't wait for transcoding to complete
        #[arg(long)]
        no_wait: bool,
    },

    /// Check transcoding status for an uploaded audio file
    #[command(name = "track:transcode-status")]
    TranscodeStatus {
        /// The upload ID (from track:upload --no-wait)
        upload_id: String,

        #[arg(long)]
        json: bool,

        /// Wait for transcoding to complete
        #[arg(long)]
        wait: bool,
    },

    /// List public Yoto icons
    Icons {
        /// Filter by tag
        #[arg(long)]
        tag: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// List your custom icons
    #[command(name = "icons:mine")]
    IconsMine {
        #[arg(long)]
        json: bool,
    },

    /// Upload a custom icon
    #[command(name = "icons:upload")]
    IconsUpload {
        file: PathBuf,

        /// Don't auto-resize (must be 16x16 PNG)
        #[arg(long)]
        no_convert: bool,

        #[arg(long)]
        json: bool,
    },

    /// List your Yoto devices
    Devices {
        #[arg(long)]
        json: bool,
    },

    /// Get device status
    Device {
        device_id: String,

        #[arg(long)]
        json: bool,
    },

    /// Send command to device (play, pause, stop, next, previous, volume)
    #[command(name = "device:cmd")]
    DeviceCmd {
        device_id: String,

        command: String,

        /// Volume level for `volume` (default 50)
        value: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = config::load_settings()?;
    init_logging(cli.verbose, &settings.log_level);
    debug!("Loaded settings from {:?}", settings.settings_path);

    match cli.command {
        Commands::Login => auth::login(settings).await,
        Commands::Logout => auth::logout(settings).await,
        Commands::Status => auth::status(settings).await,

        Commands::Playlists { json } => playlists::list(Session::open(settings)?, json).await,
        Commands::Playlist {
            card_id,
            playable,
            json,
        } => playlists::show(Session::open(settings)?, &card_id, playable, json).await,
        Commands::PlaylistCreate {
            title,
            description,
            author,
        } => playlists::create(Session::open(settings)?, title, description, author).await,
        Commands::PlaylistEdit {
            card_id,
            title,
            description,
            author,
            playback_type,
        } => {
            let changes = PlaylistChanges {
                title,
                description,
                author,
                playback_type,
            };
            playlists::edit(Session::open(settings)?, &card_id, changes).await
        }
        Commands::PlaylistDelete { card_id } => {
            playlists::delete(Session::open(settings)?, &card_id).await
        }

        Commands::ChapterAdd {
            card_id,
            title,
            icon,
        } => playlists::add_chapter(Session::open(settings)?, &card_id, title, icon).await,
        Commands::ChapterUpdate {
            card_id,
            chapter_idx,
            title,
            icon,
        } => {
            let changes = ChapterChanges { title, icon };
            playlists::update_chapter(Session::open(settings)?, &card_id, chapter_idx, changes)
                .await
        }
        Commands::ChapterDelete {
            card_id,
            chapter_idx,
        } => playlists::delete_chapter(Session::open(settings)?, &card_id, chapter_idx).await,

        Commands::TrackAdd {
            card_id,
            chapter_idx,
            title,
            url,
            icon,
            duration,
        } => {
            let track = NewTrack {
                title,
                url,
                icon,
                duration,
            };
            playlists::add_track(Session::open(settings)?, &card_id, chapter_idx, track).await
        }
        Commands::TrackUpdate {
            card_id,
            chapter_idx,
            track_idx,
            title,
            icon,
            url,
            on_end,
        } => {
            let changes = TrackChanges {
                title,
                icon,
                url,
                on_end,
            };
            playlists::update_track(
                Session::open(settings)?,
                &card_id,
                chapter_idx,
                track_idx,
                changes,
            )
            .await
        }
        Commands::TrackDelete {
            card_id,
            chapter_idx,
            track_idx,
        } => {
            playlists::delete_track(Session::open(settings)?, &card_id, chapter_idx, track_idx)
                .await
        }

        Commands::TrackImport {
            card_id,
            title,
            file,
            icon,
            json,
        } => audio::import(Session::open(settings)?, &card_id, &title, &file, icon, json).await,
        Commands::TrackUpload {
            file,
            json,
            no_wait,
        } => audio::upload(Session::open(settings)?, &file, json, no_wait).await,
        Commands::TranscodeStatus {
            upload_id,
            json,
            wait,
        } => audio::transcode_status(Session::open(settings)?, &upload_id, json, wait).await,

        Commands::Icons { tag, json } => {
            icons::list_public(Session::open(settings)?, tag.as_deref(), json).await
        }
        Commands::IconsMine { json } => icons::list_mine(Session::open(settings)?, json).await,
        Commands::IconsUpload {
            file,
            no_convert,
            json,
        } => icons::upload(Session::open(settings)?, &file, no_convert, json).await,

        Commands::Devices { json } => devices::list(Session::open(settings)?, json).await,
        Commands::Device { device_id, json } => {
            devices::status(Session::open(settings)?, &device_id, json).await
        }
        Commands::DeviceCmd {
            device_id,
            command,
            value,
        } => {
            devices::command(
                Session::open(settings)?,
                &device_id,
                &command,
                value.as_deref(),
            )
            .await
        }
    }
}

/// Logs go to stderr so `--json` output stays parseable.
fn init_logging(verbose: bool, default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new(default_level)
        }
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
