use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use media_source::DEFAULT_PACKET_FRAMES;

use crate::audio::DEFAULT_BUFFER_SAMPLES;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to access settings at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed settings in {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid setting: {0}")]
    Invalid(&'static str),
}

/**
    Persistent player settings.

    Missing fields take their defaults, so a settings file only needs the
    values it changes.
*/
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Frames per device callback.
    pub buffer_samples: usize,
    /// Packets the queue holds before the producer waits; `None` is unbounded.
    pub queue_capacity: Option<usize>,
    /// Frames per packet when demuxing raw PCM.
    pub packet_frames: usize,
    /// Pace the WAV output like a real device.
    pub realtime_sink: bool,
    /// Stop demuxing after this many packets.
    pub max_packets: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            buffer_samples: DEFAULT_BUFFER_SAMPLES,
            queue_capacity: None,
            packet_frames: DEFAULT_PACKET_FRAMES,
            realtime_sink: true,
            max_packets: None,
        }
    }
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("tutplayer").join("settings.json"))
    }

    /**
        Load from the default location, or return defaults if there is no
        settings file.
    */
    pub fn load() -> Result<Self, SettingsError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self =
            serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), ?settings, "loaded settings");
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let io_error = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let contents = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, contents).map_err(io_error)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.buffer_samples == 0 {
            return Err(SettingsError::Invalid("buffer_samples must be at least 1"));
        }
        if self.packet_frames == 0 {
            return Err(SettingsError::Invalid("packet_frames must be at least 1"));
        }
        if self.queue_capacity == Some(0) {
            return Err(SettingsError::Invalid("queue_capacity must be at least 1"));
        }
        Ok(())
    }
}
