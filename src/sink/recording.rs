use std::collections::HashSet;
use std::time::Duration;

use tracing::info;

use super::MidiSink;
use crate::error::SinkError;
use crate::events::MidiMessage;
use crate::timing::{Clock, VirtualClock};

/// Sink that keeps every message it accepts, optionally stamped with the
/// time of a shared `VirtualClock`. Individual send attempts can be made to
/// fail.
#[derive(Debug, Default)]
pub struct RecordingSink {
    clock: Option<VirtualClock>,
    received: Vec<(Duration, MidiMessage)>,
    failing_attempts: HashSet<usize>,
    attempts: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: VirtualClock) -> Self {
        Self {
            clock: Some(clock),
            ..Self::default()
        }
    }

    /// Makes the `attempt`-th send (zero-based, counting failures) fail.
    pub fn fail_attempt(mut self, attempt: usize) -> Self {
        self.failing_attempts.insert(attempt);
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn messages(&self) -> Vec<MidiMessage> {
        self.received.iter().map(|(_, message)| *message).collect()
    }

    pub fn timed(&self) -> &[(Duration, MidiMessage)] {
        &self.received
    }

    fn record(&mut self, message: MidiMessage) -> Result<(), SinkError> {
        let attempt = self.attempts;
        self.attempts += 1;
        if self.failing_attempts.contains(&attempt) {
            return Err(SinkError::Send(format!("injected failure on attempt {attempt}")));
        }
        let at = self.clock.as_ref().map_or(Duration::ZERO, |clock| clock.now());
        self.received.push((at, message));
        Ok(())
    }
}

impl MidiSink for RecordingSink {
    fn note_on(&mut self, channel: u8, pitch: u8, velocity: u8) -> Result<(), SinkError> {
        self.record(MidiMessage::NoteOn {
            channel,
            pitch,
            velocity,
        })
    }

    fn note_off(&mut self, channel: u8, pitch: u8) -> Result<(), SinkError> {
        self.record(MidiMessage::NoteOff { channel, pitch })
    }

    fn program_change(&mut self, channel: u8, program: u8) -> Result<(), SinkError> {
        self.record(MidiMessage::ProgramChange { channel, program })
    }

    fn all_notes_off(&mut self, channel: u8) -> Result<(), SinkError> {
        self.record(MidiMessage::AllNotesOff { channel })
    }
}

/// Sink for dry runs: writes every message to the log.
#[derive(Debug, Default)]
pub struct LogSink {
    clock: Option<VirtualClock>,
    sent: usize,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: VirtualClock) -> Self {
        Self {
            clock: Some(clock),
            sent: 0,
        }
    }

    pub fn sent(&self) -> usize {
        self.sent
    }

    fn log(&mut self, message: MidiMessage) -> Result<(), SinkError> {
        self.sent += 1;
        match &self.clock {
            Some(clock) => info!("[{:>9.3}s] {}", clock.now().as_secs_f64(), message),
            None => info!("{}", message),
        }
        Ok(())
    }
}

impl MidiSink for LogSink {
    fn note_on(&mut self, channel: u8, pitch: u8, velocity: u8) -> Result<(), SinkError> {
        self.log(MidiMessage::NoteOn {
            channel,
            pitch,
            velocity,
        })
    }

    fn note_off(&mut self, channel: u8, pitch: u8) -> Result<(), SinkError> {
        self.log(MidiMessage::NoteOff { channel, pitch })
    }

    fn program_change(&mut self, channel: u8, program: u8) -> Result<(), SinkError> {
        self.log(MidiMessage::ProgramChange { channel, program })
    }

    fn all_notes_off(&mut self, channel: u8) -> Result<(), SinkError> {
        self.log(MidiMessage::AllNotesOff { channel })
    }
}
