use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::timing::DEFAULT_RETRY_DELAY;

pub const DEFAULT_CLIENT_NAME: &str = "midiloom";

/// Player settings, read from a RON file.
///
/// ```ron
/// (
///     port: Some("FluidSynth"),
///     retry_delay_ms: 20,
///     panic_on_cancel: true,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Name this client registers with the MIDI backend.
    pub client_name: String,
    /// Output port index or name substring; first port when unset.
    pub port: Option<String>,
    pub retry_delay_ms: u64,
    /// Send "all notes off" on every used channel when playback is cancelled.
    pub panic_on_cancel: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            port: None,
            retry_delay_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
            panic_on_cancel: false,
        }
    }
}

impl PlayerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let ron_string = fs::read_to_string(path)?;
        let config: PlayerConfig = ron::from_str(&ron_string)?;
        Ok(config)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
