//! Timed MIDI note playback.
//!
//! Note events from any source are validated into a [`Timeline`], which a
//! [`Scheduler`] plays through a [`MidiSink`] in time order. Overlapping
//! notes on the same pitch and channel are serialized, failed sends are
//! retried once and then reported as warnings, and cancelling playback
//! releases every sounding note.
//!
//! ```no_run
//! use midiloom::{CancelToken, MidirSink, NoteEvent, Scheduler, SinkHandle, Timeline};
//!
//! let timeline = Timeline::build(vec![
//!     NoteEvent::new(0, 64, 70, 0.0, 0.5),
//!     NoteEvent::new(0, 62, 70, 0.5, 0.5),
//!     NoteEvent::new(0, 60, 70, 1.0, 1.0),
//! ])?;
//! let sink = SinkHandle::new(MidirSink::connect("midiloom", None)?);
//! let report = Scheduler::new().play(&timeline, &sink, &CancelToken::new())?;
//! assert!(report.warnings.is_empty());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod project;
pub mod scripting;
pub mod session;
pub mod sink;
pub mod timing;

pub use config::PlayerConfig;
pub use error::{
    Error, EventField, InvalidEventError, PlaybackWarning, SinkBusyError, SinkError,
    WarningOutcome,
};
pub use events::{MidiMessage, NoteEvent, ScheduledMessage};
pub use project::{Composition, NoteSource, Part};
pub use session::{Session, SessionReport};
pub use sink::{LogSink, MidiSink, MidirSink, RecordingSink, SinkHandle, list_output_ports};
pub use timing::{
    CancelToken, Clock, Plan, PlaybackReport, Scheduler, SystemClock, Tempo, Timeline,
    VirtualClock,
};
