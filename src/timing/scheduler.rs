use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::clock::{CancelToken, Clock, SystemClock, Wake};
use super::timeline::Timeline;
use crate::error::{PlaybackWarning, SinkBusyError, WarningOutcome};
use crate::events::{MidiMessage, ScheduledMessage};
use crate::sink::{self, MidiSink, SinkHandle};

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Shortest interval between a note-on and its note-off. Keeps the pair in
/// order for durations below the `Duration` resolution.
const MIN_NOTE_LENGTH: Duration = Duration::from_nanos(1);

/// Dispatch plan derived from a timeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub messages: Vec<ScheduledMessage>,
    /// Notes whose start moved to wait for an earlier note on the same
    /// pitch and channel.
    pub deferred: usize,
}

impl Plan {
    /// Orders a timeline into timed messages.
    ///
    /// Overlapping notes on the same (channel, pitch) are serialized: the
    /// later note starts when the earlier one is released and keeps its
    /// duration. At equal times, releases go out before new notes.
    pub fn build(timeline: &Timeline) -> Self {
        let mut released_at: HashMap<(u8, u8), Duration> = HashMap::new();
        let mut messages = Vec::with_capacity(timeline.len() * 2);
        let mut deferred = 0;

        for (event_index, event) in timeline.iter().enumerate() {
            let requested = Duration::from_secs_f64(event.start_time);
            let length = Duration::from_secs_f64(event.duration).max(MIN_NOTE_LENGTH);
            let key = (event.channel, event.pitch);

            let on_at = match released_at.get(&key) {
                Some(&free_at) if free_at > requested => {
                    debug!(
                        "Deferring note {} on channel {} from {:?} to {:?}",
                        event.pitch, event.channel, requested, free_at
                    );
                    deferred += 1;
                    free_at
                }
                _ => requested,
            };
            let off_at = on_at.saturating_add(length);
            released_at.insert(key, off_at);

            messages.push(ScheduledMessage {
                at: on_at,
                event_index,
                message: MidiMessage::NoteOn {
                    channel: event.channel,
                    pitch: event.pitch,
                    velocity: event.velocity,
                },
            });
            messages.push(ScheduledMessage {
                at: off_at,
                event_index,
                message: MidiMessage::NoteOff {
                    channel: event.channel,
                    pitch: event.pitch,
                },
            });
        }

        messages.sort_by_key(|m| (m.at, m.message.dispatch_rank(), m.event_index));

        Self { messages, deferred }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Offset of the last message, zero when empty.
    pub fn end(&self) -> Duration {
        self.messages.last().map_or(Duration::ZERO, |m| m.at)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackReport {
    /// Messages the sink accepted.
    pub dispatched: usize,
    pub warnings: Vec<PlaybackWarning>,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl PlaybackReport {
    pub fn dropped(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| w.outcome == WarningOutcome::Dropped)
            .count()
    }
}

/// Plays timelines against a sink in real (or virtual) time.
pub struct Scheduler<C = SystemClock> {
    clock: C,
    retry_delay: Duration,
    panic_on_cancel: bool,
}

impl Scheduler<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock::new())
    }
}

impl Default for Scheduler<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Scheduler<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            retry_delay: DEFAULT_RETRY_DELAY,
            panic_on_cancel: false,
        }
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Also send "all notes off" on every channel of the timeline when
    /// playback is cancelled.
    pub fn panic_on_cancel(mut self, enabled: bool) -> Self {
        self.panic_on_cancel = enabled;
        self
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Plays `timeline` through `sink`, returning once the last note-off has
    /// gone out or playback was cancelled.
    ///
    /// Fails only when another playback holds the sink. Individual send
    /// failures are retried once and then reported as warnings.
    pub fn play<S: MidiSink>(
        &mut self,
        timeline: &Timeline,
        sink: &SinkHandle<S>,
        cancel: &CancelToken,
    ) -> Result<PlaybackReport, SinkBusyError> {
        let mut guard = sink.try_acquire()?;
        Ok(self.play_on(timeline, &mut *guard, cancel))
    }

    /// Sends `messages` right away, with the same retry as timed messages.
    pub(crate) fn send_now<S: MidiSink + ?Sized>(
        &mut self,
        sink: &mut S,
        messages: &[MidiMessage],
    ) -> PlaybackReport {
        let mut report = PlaybackReport::default();
        for &message in messages {
            let at = self.clock.now();
            self.send(sink, message, at, None, &mut report);
        }
        report
    }

    /// `play` against a sink the caller already holds.
    pub(crate) fn play_on<S: MidiSink + ?Sized>(
        &mut self,
        timeline: &Timeline,
        sink: &mut S,
        cancel: &CancelToken,
    ) -> PlaybackReport {
        let mut report = PlaybackReport::default();
        let plan = Plan::build(timeline);
        if plan.is_empty() {
            return report;
        }

        info!(
            "Playing {} notes ({} messages, {:.2}s)",
            timeline.len(),
            plan.len(),
            plan.end().as_secs_f64()
        );

        // (channel, pitch) pairs whose note-on went out and whose note-off hasn't
        let mut sounding: BTreeSet<(u8, u8)> = BTreeSet::new();

        self.clock.start();
        for scheduled in &plan.messages {
            if self.clock.wait_until(scheduled.at, cancel) == Wake::Cancelled {
                report.cancelled = true;
                break;
            }

            debug!("[{:?}] {}", scheduled.at, scheduled.message);
            let sent = self.send(
                sink,
                scheduled.message,
                scheduled.at,
                Some(scheduled.event_index),
                &mut report,
            );
            match scheduled.message {
                MidiMessage::NoteOn { channel, pitch, .. } if sent => {
                    sounding.insert((channel, pitch));
                }
                MidiMessage::NoteOff { channel, pitch } if sent => {
                    sounding.remove(&(channel, pitch));
                }
                _ => {}
            }
        }

        if report.cancelled {
            self.silence(sink, &sounding, timeline, &mut report);
        }

        report.elapsed = self.clock.now();
        info!(
            "Playback {} after {:.2}s: {} messages, {} warnings",
            if report.cancelled { "cancelled" } else { "finished" },
            report.elapsed.as_secs_f64(),
            report.dispatched,
            report.warnings.len()
        );
        report
    }

    fn silence<S: MidiSink + ?Sized>(
        &mut self,
        sink: &mut S,
        sounding: &BTreeSet<(u8, u8)>,
        timeline: &Timeline,
        report: &mut PlaybackReport,
    ) {
        info!("Releasing {} sounding notes", sounding.len());
        for &(channel, pitch) in sounding {
            let at = self.clock.now();
            self.send(sink, MidiMessage::NoteOff { channel, pitch }, at, None, report);
        }

        if self.panic_on_cancel {
            for channel in timeline.channels() {
                let at = self.clock.now();
                self.send(sink, MidiMessage::AllNotesOff { channel }, at, None, report);
            }
        }
    }

    /// Sends with one retry. Returns whether the sink accepted the message.
    fn send<S: MidiSink + ?Sized>(
        &mut self,
        sink: &mut S,
        message: MidiMessage,
        at: Duration,
        event_index: Option<usize>,
        report: &mut PlaybackReport,
    ) -> bool {
        let first = match sink::dispatch(sink, &message) {
            Ok(()) => {
                report.dispatched += 1;
                return true;
            }
            Err(e) => e,
        };

        warn!("{} failed ({}), retrying in {:?}", message, first, self.retry_delay);
        self.clock.pause(self.retry_delay);

        let (outcome, error, sent) = match sink::dispatch(sink, &message) {
            Ok(()) => {
                report.dispatched += 1;
                (WarningOutcome::Recovered, first, true)
            }
            Err(second) => (WarningOutcome::Dropped, second, false),
        };

        let warning = PlaybackWarning {
            message,
            at,
            event_index,
            outcome,
            error,
        };
        warn!("{}", warning);
        report.warnings.push(warning);
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoteEvent;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn overlapping_same_pitch_is_deferred() {
        let timeline = Timeline::build(vec![
            NoteEvent::new(0, 60, 100, 0.0, 1.0),
            NoteEvent::new(0, 60, 100, 0.5, 1.0),
        ])
        .unwrap();

        let plan = Plan::build(&timeline);
        assert_eq!(plan.deferred, 1);

        let order: Vec<(Duration, bool)> = plan
            .messages
            .iter()
            .map(|m| (m.at, matches!(m.message, MidiMessage::NoteOn { .. })))
            .collect();
        assert_eq!(
            order,
            vec![
                (secs(0.0), true),
                (secs(1.0), false),
                (secs(1.0), true),
                (secs(2.0), false),
            ]
        );
    }

    #[test]
    fn deferral_chains_through_several_notes() {
        let timeline = Timeline::build(vec![
            NoteEvent::new(3, 40, 90, 0.0, 1.0),
            NoteEvent::new(3, 40, 90, 0.2, 0.5),
            NoteEvent::new(3, 40, 90, 0.4, 0.25),
        ])
        .unwrap();

        let plan = Plan::build(&timeline);
        assert_eq!(plan.deferred, 2);
        let ons: Vec<Duration> = plan
            .messages
            .iter()
            .filter(|m| matches!(m.message, MidiMessage::NoteOn { .. }))
            .map(|m| m.at)
            .collect();
        assert_eq!(ons, vec![secs(0.0), secs(1.0), secs(1.5)]);
        assert_eq!(plan.end(), secs(1.75));
    }

    #[test]
    fn different_channels_do_not_defer() {
        let timeline = Timeline::build(vec![
            NoteEvent::new(0, 60, 100, 0.0, 1.0),
            NoteEvent::new(1, 60, 100, 0.5, 1.0),
        ])
        .unwrap();
        assert_eq!(Plan::build(&timeline).deferred, 0);
    }

    #[test]
    fn touching_notes_release_before_restrike() {
        let timeline = Timeline::build(vec![
            NoteEvent::new(0, 62, 80, 0.5, 0.5),
            NoteEvent::new(0, 62, 80, 0.0, 0.5),
        ])
        .unwrap();

        let plan = Plan::build(&timeline);
        assert_eq!(plan.deferred, 0);
        assert!(matches!(plan.messages[1].message, MidiMessage::NoteOff { .. }));
        assert!(matches!(plan.messages[2].message, MidiMessage::NoteOn { .. }));
        assert_eq!(plan.messages[1].at, plan.messages[2].at);
    }

    #[test]
    fn tiny_durations_keep_on_before_off() {
        let timeline = Timeline::build(vec![NoteEvent::new(0, 60, 100, 1.0, 1e-12)]).unwrap();
        let plan = Plan::build(&timeline);
        assert!(matches!(plan.messages[0].message, MidiMessage::NoteOn { .. }));
        assert!(plan.messages[1].at > plan.messages[0].at);
    }

    #[test]
    fn empty_plan() {
        let plan = Plan::build(&Timeline::empty());
        assert!(plan.is_empty());
        assert_eq!(plan.end(), Duration::ZERO);
    }
}
