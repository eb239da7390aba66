use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::{EventField, InvalidEventError};
use crate::events::{MAX_CHANNEL, MAX_PITCH, MAX_VELOCITY, NoteEvent};

/// Immutable, time-ordered collection of note events.
///
/// Events are sorted by start time; events that start together keep the
/// order they were given in. A timeline can be iterated (and played) any
/// number of times.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    events: Vec<NoteEvent>,
}

impl Timeline {
    /// Validates every event and sorts them. Nothing is built if any event
    /// is out of range.
    pub fn build<I>(events: I) -> Result<Self, InvalidEventError>
    where
        I: IntoIterator<Item = NoteEvent>,
    {
        let mut events: Vec<NoteEvent> = events.into_iter().collect();
        for (index, event) in events.iter().enumerate() {
            validate(index, event)?;
        }

        // stable: ties keep insertion order
        events.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

        Ok(Self { events })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// End of the last sounding note in seconds, zero when empty.
    pub fn duration(&self) -> f64 {
        self.events
            .iter()
            .map(NoteEvent::end_time)
            .fold(0.0, f64::max)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NoteEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Distinct channels used, ascending.
    pub fn channels(&self) -> Vec<u8> {
        self.events
            .iter()
            .map(|e| e.channel)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = &'a NoteEvent;
    type IntoIter = std::slice::Iter<'a, NoteEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn validate(index: usize, event: &NoteEvent) -> Result<(), InvalidEventError> {
    let invalid = |field: EventField, value: String| InvalidEventError {
        index,
        field,
        value,
    };

    if event.pitch > MAX_PITCH {
        return Err(invalid(EventField::Pitch, event.pitch.to_string()));
    }
    if event.velocity > MAX_VELOCITY {
        return Err(invalid(EventField::Velocity, event.velocity.to_string()));
    }
    if event.channel > MAX_CHANNEL {
        return Err(invalid(EventField::Channel, event.channel.to_string()));
    }
    // The scheduler converts both to `Duration`, which also rules out
    // negative, NaN and infinite values.
    if Duration::try_from_secs_f64(event.start_time).is_err() {
        return Err(invalid(EventField::StartTime, event.start_time.to_string()));
    }
    if event.duration <= 0.0
        || Duration::try_from_secs_f64(event.duration).is_err()
        || Duration::try_from_secs_f64(event.end_time()).is_err()
    {
        return Err(invalid(EventField::Duration, event.duration.to_string()));
    }

    Ok(())
}
