use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::events::MidiMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventField {
    Pitch,
    Velocity,
    Channel,
    StartTime,
    Duration,
}

impl fmt::Display for EventField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventField::Pitch => "pitch",
            EventField::Velocity => "velocity",
            EventField::Channel => "channel",
            EventField::StartTime => "start_time",
            EventField::Duration => "duration",
        };
        f.write_str(name)
    }
}

/// A note event violated its range invariants at timeline construction.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("event #{index} has invalid {field}: {value}")]
pub struct InvalidEventError {
    pub index: usize,
    pub field: EventField,
    /// The offending value, formatted as given.
    pub value: String,
}

/// Another playback currently owns the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("MIDI sink is already in use by another playback")]
pub struct SinkBusyError;

/// A backend failed to deliver a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("MIDI send failed: {0}")]
    Send(String),
    #[error("MIDI output is disconnected")]
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningOutcome {
    /// The first attempt failed and the retry went through.
    Recovered,
    /// Both attempts failed; the message was skipped.
    Dropped,
}

impl fmt::Display for WarningOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningOutcome::Recovered => f.write_str("recovered on retry"),
            WarningOutcome::Dropped => f.write_str("dropped after retry"),
        }
    }
}

/// Non-fatal failure of a single message during playback.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at {at:?} {outcome}: {error}")]
pub struct PlaybackWarning {
    pub message: MidiMessage,
    pub at: Duration,
    pub event_index: Option<usize>,
    pub outcome: WarningOutcome,
    pub error: SinkError,
}

/// Errors from loading compositions, configs and opening devices.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    InvalidEvent(#[from] InvalidEventError),

    #[error(transparent)]
    SinkBusy(#[from] SinkBusyError),

    #[error("invalid program change: program {program} on channel {channel}")]
    InvalidProgram { channel: u8, program: u8 },

    #[error("invalid tempo: {0} bpm")]
    InvalidTempo(f64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse RON: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("failed to write RON: {0}")]
    Serialize(#[from] ron::Error),

    #[error("script error in part '{part}': {source}")]
    Script {
        part: String,
        #[source]
        source: mlua::Error,
    },

    #[error("failed to initialise MIDI output: {0}")]
    MidiInit(#[from] midir::InitError),

    #[error("no MIDI output ports available")]
    NoPorts,

    #[error("no MIDI output port matches '{0}'")]
    PortNotFound(String),

    #[error("failed to connect to MIDI port '{port}': {reason}")]
    Connect { port: String, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
