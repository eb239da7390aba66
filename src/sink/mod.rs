//! MIDI output sinks.
//!
//! The scheduler only needs `note_on` and `note_off`. Program changes and
//! "all notes off" are optional and default to doing nothing, so a sink
//! that can't express them doesn't have to pretend.

mod midir_out;
mod recording;

pub use midir_out::{MidirSink, list_output_ports};
pub use recording::{LogSink, RecordingSink};

use parking_lot::{Mutex, MutexGuard};

use crate::error::{SinkBusyError, SinkError};
use crate::events::MidiMessage;

pub trait MidiSink {
    fn note_on(&mut self, channel: u8, pitch: u8, velocity: u8) -> Result<(), SinkError>;

    fn note_off(&mut self, channel: u8, pitch: u8) -> Result<(), SinkError>;

    fn program_change(&mut self, _channel: u8, _program: u8) -> Result<(), SinkError> {
        Ok(())
    }

    fn all_notes_off(&mut self, _channel: u8) -> Result<(), SinkError> {
        Ok(())
    }
}

impl<S: MidiSink + ?Sized> MidiSink for Box<S> {
    fn note_on(&mut self, channel: u8, pitch: u8, velocity: u8) -> Result<(), SinkError> {
        (**self).note_on(channel, pitch, velocity)
    }

    fn note_off(&mut self, channel: u8, pitch: u8) -> Result<(), SinkError> {
        (**self).note_off(channel, pitch)
    }

    fn program_change(&mut self, channel: u8, program: u8) -> Result<(), SinkError> {
        (**self).program_change(channel, program)
    }

    fn all_notes_off(&mut self, channel: u8) -> Result<(), SinkError> {
        (**self).all_notes_off(channel)
    }
}

/// Routes a message to the matching sink operation.
pub fn dispatch<S: MidiSink + ?Sized>(sink: &mut S, message: &MidiMessage) -> Result<(), SinkError> {
    match *message {
        MidiMessage::NoteOn {
            channel,
            pitch,
            velocity,
        } => sink.note_on(channel, pitch, velocity),
        MidiMessage::NoteOff { channel, pitch } => sink.note_off(channel, pitch),
        MidiMessage::ProgramChange { channel, program } => sink.program_change(channel, program),
        MidiMessage::AllNotesOff { channel } => sink.all_notes_off(channel),
    }
}

/// Exclusive-use wrapper around a sink. Only one playback may hold it at a
/// time; a second one fails immediately instead of interleaving messages.
pub struct SinkHandle<S> {
    inner: Mutex<S>,
}

impl<S> SinkHandle<S> {
    pub fn new(sink: S) -> Self {
        Self {
            inner: Mutex::new(sink),
        }
    }

    pub fn try_acquire(&self) -> Result<MutexGuard<'_, S>, SinkBusyError> {
        self.inner.try_lock().ok_or(SinkBusyError)
    }

    pub fn into_inner(self) -> S {
        self.inner.into_inner()
    }
}
