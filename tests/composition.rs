use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use midiloom::{
    CancelToken, Composition, Error, EventField, MidiMessage, NoteSource, RecordingSink, Scheduler,
    Session, SinkHandle, VirtualClock,
};

fn shipped(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("compositions")
        .join(name)
}

#[test]
fn shipped_static_composition_plays_through() {
    let composition = Composition::load(&shipped("mary.ron")).unwrap();
    let session = Session::from_composition(&composition).unwrap();
    assert_eq!(session.timeline().len(), 26);
    // 32 beats at 90 bpm
    assert!((session.timeline().duration() - 32.0 * 60.0 / 90.0).abs() < 1e-9);

    let clock = VirtualClock::new();
    let sink = SinkHandle::new(RecordingSink::with_clock(clock.clone()));
    let mut scheduler = Scheduler::with_clock(clock);
    let report = session.run(&mut scheduler, &sink, &CancelToken::new()).unwrap();

    assert!(!report.cancelled);
    assert_eq!(report.dispatched, 1 + 26 * 2);
    let messages = sink.into_inner().messages();
    assert_eq!(
        messages[0],
        MidiMessage::ProgramChange {
            channel: 0,
            program: 0
        }
    );
    // the repeated E's are released before they are struck again
    assert_eq!(
        messages[9..13],
        [
            MidiMessage::NoteOn {
                channel: 0,
                pitch: 64,
                velocity: 70
            },
            MidiMessage::NoteOff {
                channel: 0,
                pitch: 64
            },
            MidiMessage::NoteOn {
                channel: 0,
                pitch: 64,
                velocity: 70
            },
            MidiMessage::NoteOff {
                channel: 0,
                pitch: 64
            },
        ]
    );
}

#[test]
fn shipped_generated_composition_is_reproducible() {
    let composition = Composition::load(&shipped("synthpop.ron")).unwrap();

    let first = composition.timeline().unwrap();
    let second = composition.timeline().unwrap();
    assert_eq!(first, second);

    assert_eq!(first.channels(), vec![1, 4, 5, 9]);
    assert_eq!(composition.programs(), vec![(1, 38), (5, 89), (4, 80)]);
    // 8 bars of 4 beats at 125 bpm
    assert!(first.duration() <= 32.0 * 60.0 / 125.0 + 1e-9);
}

#[test]
fn generated_composition_dry_run_matches_its_plan() {
    let composition = Composition::load(&shipped("synthpop.ron")).unwrap();
    let session = Session::from_composition(&composition).unwrap().loops(2);

    let clock = VirtualClock::new();
    let sink = SinkHandle::new(RecordingSink::with_clock(clock.clone()));
    let mut scheduler = Scheduler::with_clock(clock);
    let report = session.run(&mut scheduler, &sink, &CancelToken::new()).unwrap();

    let plan = midiloom::Plan::build(session.timeline());
    assert_eq!(report.passes, 2);
    assert_eq!(report.dispatched, 3 + 2 * plan.len());
    assert_eq!(report.elapsed, plan.end() * 2);

    let timed = sink.into_inner().timed().to_vec();
    let first_pass: Vec<(Duration, MidiMessage)> = timed[3..3 + plan.len()].to_vec();
    let planned: Vec<(Duration, MidiMessage)> =
        plan.messages.iter().map(|m| (m.at, m.message)).collect();
    assert_eq!(first_pass, planned);
}

#[test]
fn malformed_event_fails_before_anything_plays() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.ron");
    fs::write(
        &path,
        r#"(
            name: "out of range",
            bpm: 100.0,
            parts: [
                (
                    name: "lead",
                    channel: 0,
                    sequence: Static((
                        notes: [
                            (pitch: 60, start_beat: 0.0, duration_beats: 1.0),
                            (pitch: 130, start_beat: 1.0, duration_beats: 1.0),
                        ],
                    )),
                ),
            ],
        )"#,
    )
    .unwrap();

    let composition = Composition::load(&path).unwrap();
    match Session::from_composition(&composition) {
        Err(Error::InvalidEvent(e)) => {
            assert_eq!(e.field, EventField::Pitch);
            assert_eq!(e.index, 1);
        }
        other => panic!("expected invalid event, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn channel_out_of_range_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("channel.ron");
    fs::write(
        &path,
        r#"(
            name: "channel 17",
            bpm: 100.0,
            parts: [
                (
                    name: "lead",
                    channel: 16,
                    sequence: Static((notes: [(pitch: 60, start_beat: 0.0, duration_beats: 1.0)])),
                ),
            ],
        )"#,
    )
    .unwrap();

    let composition = Composition::load(&path).unwrap();
    match composition.timeline() {
        Err(Error::InvalidEvent(e)) => assert_eq!(e.field, EventField::Channel),
        other => panic!("expected invalid event, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn unreadable_file_reports_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.ron");
    fs::write(&path, "(name: \"missing everything\"").unwrap();

    assert!(matches!(Composition::load(&path), Err(Error::Parse(_))));
    assert!(matches!(
        Composition::load(&dir.path().join("absent.ron")),
        Err(Error::Io(_))
    ));
}

#[test]
fn out_of_range_program_change_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("program.ron");
    fs::write(
        &path,
        r#"(
            name: "silent part",
            bpm: 100.0,
            parts: [
                (
                    name: "pad",
                    channel: 20,
                    program: Some(200),
                    sequence: Static((notes: [])),
                ),
            ],
        )"#,
    )
    .unwrap();

    let composition = Composition::load(&path).unwrap();
    match Session::from_composition(&composition) {
        Err(Error::InvalidProgram { channel, program }) => {
            assert_eq!(channel, 20);
            assert_eq!(program, 200);
        }
        other => panic!("expected invalid program, got {:?}", other.map(|_| ())),
    }
}
