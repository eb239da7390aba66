use std::time::Duration;

use tracing::info;

use crate::error::{Error, PlaybackWarning, Result, SinkBusyError, WarningOutcome};
use crate::events::{MAX_CHANNEL, MAX_PROGRAM, MidiMessage};
use crate::project::{Composition, NoteSource};
use crate::sink::{MidiSink, SinkHandle};
use crate::timing::{CancelToken, Clock, Scheduler, Timeline};

/// A timeline plus what has to happen around it: program selection before
/// the first note and repeated passes.
#[derive(Debug, Clone)]
pub struct Session {
    timeline: Timeline,
    programs: Vec<(u8, u8)>,
    /// Zero repeats until cancelled.
    loops: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionReport {
    pub passes: u32,
    pub dispatched: usize,
    pub warnings: Vec<PlaybackWarning>,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl SessionReport {
    pub fn dropped(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| w.outcome == WarningOutcome::Dropped)
            .count()
    }
}

impl Session {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            timeline,
            programs: Vec::new(),
            loops: 1,
        }
    }

    pub fn from_composition(composition: &Composition) -> Result<Self> {
        Self::new(composition.timeline()?).with_programs(composition.programs())
    }

    /// (channel, program) pairs selected before the first pass. Fails on the
    /// first pair out of MIDI range.
    pub fn with_programs(mut self, programs: Vec<(u8, u8)>) -> Result<Self> {
        if let Some(&(channel, program)) = programs
            .iter()
            .find(|&&(channel, program)| channel > MAX_CHANNEL || program > MAX_PROGRAM)
        {
            return Err(Error::InvalidProgram { channel, program });
        }
        self.programs = programs;
        Ok(self)
    }

    pub fn loops(mut self, loops: u32) -> Self {
        self.loops = loops;
        self
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Holds the sink from the first program change to the end of the last
    /// pass, so nothing from another player lands in between.
    pub fn run<C: Clock, S: MidiSink>(
        &self,
        scheduler: &mut Scheduler<C>,
        sink: &SinkHandle<S>,
        cancel: &CancelToken,
    ) -> Result<SessionReport, SinkBusyError> {
        let mut guard = sink.try_acquire()?;
        let sink = &mut *guard;

        let mut report = SessionReport::default();
        self.select_programs(scheduler, sink, &mut report);

        // an empty timeline returns instantly; looping it forever would spin
        let loops = if self.timeline.is_empty() { 1 } else { self.loops };

        while loops == 0 || report.passes < loops {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if loops != 1 {
                info!("Pass {}", report.passes + 1);
            }

            let pass = scheduler.play_on(&self.timeline, sink, cancel);
            report.passes += 1;
            report.dispatched += pass.dispatched;
            report.warnings.extend(pass.warnings);
            report.elapsed += pass.elapsed;
            if pass.cancelled {
                report.cancelled = true;
                break;
            }
        }

        Ok(report)
    }

    fn select_programs<C: Clock, S: MidiSink>(
        &self,
        scheduler: &mut Scheduler<C>,
        sink: &mut S,
        report: &mut SessionReport,
    ) {
        let messages: Vec<MidiMessage> = self
            .programs
            .iter()
            .map(|&(channel, program)| MidiMessage::ProgramChange { channel, program })
            .collect();
        let setup = scheduler.send_now(sink, &messages);
        report.dispatched += setup.dispatched;
        report.warnings.extend(setup.warnings);
    }
}
