use std::{fs::File, io, sync::Mutex, time::Duration};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// File to write the log to. If not specified, logs will be written to stderr.
    #[clap(long, short)]
    log_file: Option<String>,
    /// Seconds to wait for each reply from a player. 0 waits forever.
    #[clap(long, short, default_value_t = 25.0, value_parser = parse_timeout)]
    timeout: f64,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the bus names of all MPRIS players
    List,
    /// Bring the player's user interface to the front
    Raise { player: String },
    /// Ask the player to exit
    Quit { player: String },
    Play { player: String },
    Pause { player: String },
    PlayPause { player: String },
    Next { player: String },
    Previous { player: String },
    Stop { player: String },
    /// Open and play a URI
    OpenUri { player: String, uri: String },
    /// Seek by OFFSET microseconds; negative seeks backwards
    Seek {
        player: String,
        #[clap(allow_hyphen_values = true)]
        offset: i64,
    },
    /// Jump to POSITION microseconds into TRACK_ID
    SetPosition {
        player: String,
        track_id: String,
        position: i64,
    },
    ActivatePlaylist { player: String, playlist_id: String },
    /// List the player's playlists
    Playlists {
        player: String,
        #[clap(long, default_value_t = 0)]
        index: u32,
        #[clap(long, default_value_t = 100)]
        max_count: u32,
        /// One of the player's `Orderings`
        #[clap(long, default_value = "Alphabetical")]
        order: String,
        #[clap(long)]
        reverse: bool,
    },
    /// Print the metadata of one or more tracks
    TracksMetadata {
        player: String,
        #[clap(required = true)]
        track_ids: Vec<String>,
    },
    AddTrack {
        player: String,
        uri: String,
        after_track: String,
        #[clap(long)]
        set_as_current: bool,
    },
    RemoveTrack { player: String, track_id: String },
    GoTo { player: String, track_id: String },
    /// Print every property of an interface
    Properties {
        player: String,
        #[clap(long, default_value = "org.mpris.MediaPlayer2.Player")]
        interface: String,
    },
    /// Print every MPRIS signal until interrupted
    Listen,
}

/// Accept any finite, non-negative number of seconds that fits a [`Duration`]
fn parse_timeout(s: &str) -> Result<f64, String> {
    let secs: f64 = s.parse().map_err(|e| format!("{e}"))?;
    Duration::try_from_secs_f64(secs)
        .map(|_| secs)
        .map_err(|_| format!("{s} is not a non-negative number of seconds"))
}

impl Args {
    /// Reply timeout for the client, `None` if disabled
    pub fn call_timeout(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(self.timeout)
            .ok()
            .filter(|t| !t.is_zero())
    }

    /// Build the tracing subscriber using parameters from the command line arguments
    ///
    /// # Errors
    ///
    /// Returns an error if the log file cannot be created.
    pub fn init_tracing_subscriber(&self) -> Result<()> {
        let builder = tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(EnvFilter::from_default_env());

        match self.log_file.as_ref() {
            None => builder.with_writer(io::stderr).init(),
            Some(f) => builder
                .with_writer(Mutex::new(
                    File::create(f).with_context(|| format!("Failed to create log file {f}"))?,
                ))
                .init(),
        }
        Ok(())
    }
}
