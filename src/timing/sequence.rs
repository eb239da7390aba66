use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::events::NoteEvent;
use crate::scripting::LuaRuntime;

pub const DEFAULT_VELOCITY: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    pub fn new(bpm: f64) -> Result<Self> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(Error::InvalidTempo(bpm));
        }
        Ok(Self { bpm })
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.bpm
    }

    pub fn beats_to_seconds(&self, beats: f64) -> f64 {
        beats * self.seconds_per_beat()
    }
}

/// A note authored in beats, independent of channel and tempo.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: u8,
    #[serde(default = "default_velocity")]
    pub velocity: u8,
    pub start_beat: f64,
    pub duration_beats: f64,
}

fn default_velocity() -> u8 {
    DEFAULT_VELOCITY
}

impl Note {
    pub fn to_event(&self, channel: u8, tempo: Tempo) -> NoteEvent {
        NoteEvent {
            pitch: self.pitch,
            velocity: self.velocity,
            channel,
            start_time: tempo.beats_to_seconds(self.start_beat),
            duration: tempo.beats_to_seconds(self.duration_beats),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Sequence {
    Static(StaticPattern),
    Generated(GeneratedPattern),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticPattern {
    pub notes: Vec<Note>,
}

/// Lua chunk that evaluates to a list of note tables
/// (`pitch`, `velocity`, `start_beat`, `duration_beats`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedPattern {
    pub function: String,
}

impl Sequence {
    pub fn is_generated(&self) -> bool {
        matches!(self, Sequence::Generated(_))
    }

    /// Static notes are returned as written; generated ones need a runtime.
    pub fn get_notes(&self, lua_runtime: Option<&LuaRuntime>) -> std::result::Result<Vec<Note>, mlua::Error> {
        match self {
            Sequence::Static(pattern) => Ok(pattern.notes.clone()),
            Sequence::Generated(pattern) => match lua_runtime {
                Some(runtime) => runtime.execute_pattern(&pattern.function),
                None => Err(mlua::Error::runtime(
                    "generated pattern requires a Lua runtime",
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_beats_at_tempo() {
        let tempo = Tempo::new(120.0).unwrap();
        assert_eq!(tempo.seconds_per_beat(), 0.5);

        let note = Note {
            pitch: 64,
            velocity: 70,
            start_beat: 3.0,
            duration_beats: 0.5,
        };
        let event = note.to_event(2, tempo);
        assert_eq!(event.channel, 2);
        assert_eq!(event.start_time, 1.5);
        assert_eq!(event.duration, 0.25);
        assert_eq!(event.velocity, 70);
    }

    #[test]
    fn rejects_non_positive_tempo() {
        assert!(matches!(Tempo::new(0.0), Err(Error::InvalidTempo(_))));
        assert!(matches!(Tempo::new(-90.0), Err(Error::InvalidTempo(_))));
        assert!(matches!(Tempo::new(f64::NAN), Err(Error::InvalidTempo(_))));
    }

    #[test]
    fn generated_pattern_needs_runtime() {
        let sequence = Sequence::Generated(GeneratedPattern {
            function: "return {}".into(),
        });
        assert!(sequence.get_notes(None).is_err());
    }
}
