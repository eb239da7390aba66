use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::events::NoteEvent;
use crate::scripting::LuaRuntime;
use crate::timing::{Sequence, Tempo, Timeline};

/// Anything that can produce the note events of a piece.
pub trait NoteSource {
    fn note_events(&self) -> Result<Vec<NoteEvent>>;

    fn timeline(&self) -> Result<Timeline> {
        Ok(Timeline::build(self.note_events()?)?)
    }
}

impl NoteSource for Vec<NoteEvent> {
    fn note_events(&self) -> Result<Vec<NoteEvent>> {
        Ok(self.clone())
    }
}

impl NoteSource for [NoteEvent] {
    fn note_events(&self) -> Result<Vec<NoteEvent>> {
        Ok(self.to_vec())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub name: String,
    pub channel: u8,
    /// General MIDI program selected on the channel before playback.
    #[serde(default)]
    pub program: Option<u8>,
    pub sequence: Sequence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub name: String,
    pub bpm: f64,
    /// Seeds `math.random` for generated parts.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Lua run once before any generated part, for shared helpers.
    #[serde(default)]
    pub prelude: Option<String>,
    pub parts: Vec<Part>,
}

impl Composition {
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        fs::write(path, ron_string)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let ron_string = fs::read_to_string(path)?;
        let composition: Composition = ron::from_str(&ron_string)?;
        Ok(composition)
    }

    pub fn tempo(&self) -> Result<Tempo> {
        Tempo::new(self.bpm)
    }

    /// (channel, program) pairs to send before playback, in part order.
    pub fn programs(&self) -> Vec<(u8, u8)> {
        self.parts
            .iter()
            .filter_map(|part| part.program.map(|program| (part.channel, program)))
            .collect()
    }

    fn lua_runtime(&self) -> Result<Option<LuaRuntime>> {
        if !self.parts.iter().any(|p| p.sequence.is_generated()) {
            return Ok(None);
        }

        let script_error = |source| Error::Script {
            part: "<prelude>".to_string(),
            source,
        };
        let runtime = LuaRuntime::new().map_err(script_error)?;
        if let Some(seed) = self.seed {
            runtime.seed(seed).map_err(script_error)?;
        }
        if let Some(prelude) = &self.prelude {
            runtime.execute(prelude).map_err(script_error)?;
        }
        Ok(Some(runtime))
    }
}

impl NoteSource for Composition {
    fn note_events(&self) -> Result<Vec<NoteEvent>> {
        let tempo = self.tempo()?;
        let lua_runtime = self.lua_runtime()?;

        let mut events = Vec::new();
        for part in &self.parts {
            let notes = part
                .sequence
                .get_notes(lua_runtime.as_ref())
                .map_err(|source| Error::Script {
                    part: part.name.clone(),
                    source,
                })?;
            debug!("Part '{}': {} notes on channel {}", part.name, notes.len(), part.channel);
            events.extend(notes.iter().map(|note| note.to_event(part.channel, tempo)));
        }

        Ok(events)
    }
}
