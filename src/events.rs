use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const MAX_PITCH: u8 = 127;
pub const MAX_VELOCITY: u8 = 127;
pub const MAX_CHANNEL: u8 = 15;
pub const MAX_PROGRAM: u8 = 127;

/// A single timed instruction to sound one pitch on one channel.
///
/// Times are in seconds relative to the start of the timeline. Fields are
/// not validated here; `Timeline::build` rejects anything out of range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub pitch: u8,
    pub velocity: u8,
    pub channel: u8,
    pub start_time: f64,
    pub duration: f64,
}

impl NoteEvent {
    pub fn new(channel: u8, pitch: u8, velocity: u8, start_time: f64, duration: f64) -> Self {
        Self {
            pitch,
            velocity,
            channel,
            start_time,
            duration,
        }
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MidiMessage {
    NoteOn { channel: u8, pitch: u8, velocity: u8 },
    NoteOff { channel: u8, pitch: u8 },
    ProgramChange { channel: u8, program: u8 },
    AllNotesOff { channel: u8 },
}

impl MidiMessage {
    pub fn channel(&self) -> u8 {
        match *self {
            MidiMessage::NoteOn { channel, .. }
            | MidiMessage::NoteOff { channel, .. }
            | MidiMessage::ProgramChange { channel, .. }
            | MidiMessage::AllNotesOff { channel } => channel,
        }
    }

    /// Raw channel-voice bytes. Returns the buffer and how many of its bytes
    /// are used.
    pub fn encode(&self) -> ([u8; 3], usize) {
        match *self {
            MidiMessage::NoteOn {
                channel,
                pitch,
                velocity,
            } => ([0x90 | (channel & 0x0F), pitch, velocity], 3),
            MidiMessage::NoteOff { channel, pitch } => ([0x80 | (channel & 0x0F), pitch, 0], 3),
            MidiMessage::ProgramChange { channel, program } => {
                ([0xC0 | (channel & 0x0F), program, 0], 2)
            }
            // CC 123
            MidiMessage::AllNotesOff { channel } => ([0xB0 | (channel & 0x0F), 123, 0], 3),
        }
    }

    /// At equal timestamps lower ranks go out first, so a note is always
    /// released before anything is struck on top of it.
    pub(crate) fn dispatch_rank(&self) -> u8 {
        match self {
            MidiMessage::AllNotesOff { .. } => 0,
            MidiMessage::NoteOff { .. } => 1,
            MidiMessage::ProgramChange { .. } => 2,
            MidiMessage::NoteOn { .. } => 3,
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MidiMessage::NoteOn {
                channel,
                pitch,
                velocity,
            } => write!(f, "note_on ch={channel} pitch={pitch} vel={velocity}"),
            MidiMessage::NoteOff { channel, pitch } => {
                write!(f, "note_off ch={channel} pitch={pitch}")
            }
            MidiMessage::ProgramChange { channel, program } => {
                write!(f, "program ch={channel} program={program}")
            }
            MidiMessage::AllNotesOff { channel } => write!(f, "all_notes_off ch={channel}"),
        }
    }
}

/// A message with the offset from playback start at which it goes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledMessage {
    pub at: Duration,
    /// Position of the originating note in its timeline.
    pub event_index: usize,
    pub message: MidiMessage,
}
