/*!
    tutplayer

    Plays the audio track of a media file: a demux thread feeds a packet
    queue and the output callback decodes from it on demand.

    Usage:
      tutplayer song.wav --output rendered.wav
      tutplayer song.wav                       (needs the `device` feature)
      tutplayer movie.mp4                      (needs the `ffmpeg` feature)

    Set RUST_LOG to override the log filter.
*/

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tutplayer::{Player, Settings};

#[derive(Parser, Debug)]
#[command(name = "tutplayer", version)]
#[command(about = "Play the audio stream of a media file")]
struct Args {
    /// Media file to play
    input: PathBuf,

    /// Render into this WAV file instead of the audio device
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Stop after reading this many packets
    #[arg(long)]
    max_packets: Option<u64>,

    /// Maximum queued packets before the demuxer waits
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Frames per output callback
    #[arg(long)]
    buffer_samples: Option<usize>,

    /// Render to the output file as fast as possible
    #[arg(long)]
    no_realtime: bool,

    /// Settings file to use instead of the default location
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log decoder and queue activity
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.settings {
            Some(path) => Settings::load_from(path)?,
            None => Settings::load()?,
        };

        if let Some(max) = self.max_packets {
            settings.max_packets = Some(max);
        }
        if let Some(capacity) = self.queue_capacity {
            settings.queue_capacity = Some(capacity);
        }
        if let Some(samples) = self.buffer_samples {
            settings.buffer_samples = samples;
        }
        if self.no_realtime {
            settings.realtime_sink = false;
        }

        settings.validate()?;
        Ok(settings)
    }

    fn run(self) -> Result<()> {
        let settings = self.settings().context("failed to load settings")?;

        let mut player = Player::open(&self.input, self.output.clone(), &settings)
            .with_context(|| format!("failed to play {}", self.input.display()))?;
        let report = player.wait().context("playback failed")?;

        info!(
            packets = report.demux.audio_packets,
            frames = report.frames_decoded,
            decode_errors = report.decode_errors,
            underruns = report.underruns,
            written = ?report.frames_written,
            "playback finished"
        );
        Ok(())
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "tutplayer=debug,media_source=debug,media_decode=debug"
    } else {
        "tutplayer=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    args.run()
}
