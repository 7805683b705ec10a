//! Scan Scenario Tests
//!
//! Drives the processing loop record by record through the session
//! lifecycles the dispatcher sees on the observation stream, asserting on the
//! emitted triggers and the project state left behind.

use tokio_util::sync::CancellationToken;
use vla_dispatcher::pipeline::{Delivery, ProcessingLoop, StateChange, TransitionClassifier};
use vla_dispatcher::types::{NoticeType, ScanRecord, ScanTime, FINISH_SOURCE, UNSET};
use vla_dispatcher::{Classification, FilterConfig};

fn record(project: &str, n: u32, intent: &str, source: &str, t: f64) -> ScanRecord {
    ScanRecord {
        project_id: project.to_string(),
        scan_number: n,
        scan_intent: intent.to_string(),
        source_name: source.to_string(),
        ra_deg: 83.633,
        dec_deg: 22.014,
        start_time: ScanTime::Unix(t),
    }
}

fn pipeline(project: &str, intent: &str) -> ProcessingLoop {
    let classifier = TransitionClassifier::new(FilterConfig {
        project: project.to_string(),
        intent: intent.to_string(),
    });
    ProcessingLoop::new(classifier, CancellationToken::new())
}

#[tokio::test]
async fn ready_session_then_finish_lifecycle() {
    let mut pipeline = pipeline("", "A");

    let first = pipeline.process_record(&record("X", 1, "A", "3C286", 1_000.0)).await;
    let ready = first.event().expect("first scan raises READY").clone();
    assert_eq!(ready.notice_type, NoticeType::Ready);
    assert_eq!(ready.event_time, 1_000.0);
    assert_eq!(ready.ra_deg, UNSET);
    assert_eq!(ready.duration_seconds, UNSET);
    assert_eq!(first.state_change, StateChange::Opened);

    let second = pipeline.process_record(&record("X", 2, "B", "J0542", 1_040.0)).await;
    let session = second.event().expect("matching session raises SESSION");
    assert_eq!(session.notice_type, NoticeType::Session);
    assert_eq!(session.duration_seconds, 10.0);
    // The SESSION event carries the stored scan, not the arriving one.
    assert_eq!(session.event_id, ready.event_id);
    assert_eq!(session.event_time, 1_000.0);
    assert_eq!(session.source, "3C286");
    assert_eq!(session.intent, "A");
    assert_eq!(session.ra_deg, 83.633);
    assert_eq!(second.state_change, StateChange::Updated);

    // Stored intent is now "B", which no longer contains "A": FINISH is DONE.
    let finish = pipeline.process_record(&record("X", 3, "B", FINISH_SOURCE, 1_100.0)).await;
    let done = finish.event().expect("finish after mismatch raises DONE");
    assert_eq!(done.notice_type, NoticeType::Done);
    assert_eq!(done.event_time, 1_100.0);
    assert_eq!(finish.state_change, StateChange::Closed);
    assert!(pipeline.state_table().is_empty());
}

#[tokio::test]
async fn finish_with_matching_session_is_session() {
    let mut pipeline = pipeline("", "");

    pipeline.process_record(&record("X", 1, "OBSERVE_TARGET", "J0000", 0.0)).await;
    let finish = pipeline.process_record(&record("X", 2, "OBSERVE_TARGET", FINISH_SOURCE, 90.0)).await;

    match &finish.classification {
        Classification::Event { event, .. } => {
            assert_eq!(event.notice_type, NoticeType::Session);
            assert_eq!(event.duration_seconds, 60.0);
        }
        other => panic!("expected SESSION, got {:?}", other),
    }
    assert_eq!(finish.state_change, StateChange::Closed);
    assert!(!pipeline.state_table().contains("X"));
}

#[tokio::test]
async fn finish_without_session_is_done() {
    let mut pipeline = pipeline("", "");

    let finish = pipeline.process_record(&record("Y", 7, "None", FINISH_SOURCE, 500.0)).await;
    let done = finish.event().expect("FINISH with no session raises DONE");
    assert_eq!(done.notice_type, NoticeType::Done);
    assert_eq!(done.scan_number, 7);
    assert_eq!(finish.state_change, StateChange::AlreadyClosed);
    assert!(pipeline.state_table().is_empty());
}

#[tokio::test]
async fn mid_block_scan_without_session_only_opens_state() {
    let mut pipeline = pipeline("", "");

    let outcome = pipeline.process_record(&record("Z", 4, "A", "J1234", 0.0)).await;
    assert!(outcome.event().is_none());
    assert!(matches!(outcome.delivery, Delivery::NoEvent));
    assert_eq!(outcome.state_change, StateChange::Opened);

    // The next scan sees an open session.
    let next = pipeline.process_record(&record("Z", 5, "A", "J1235", 100.0)).await;
    assert_eq!(next.event().map(|e| e.notice_type), Some(NoticeType::Session));
}

#[tokio::test]
async fn negative_duration_suppresses_event_but_updates_state() {
    let mut pipeline = pipeline("", "");

    pipeline.process_record(&record("X", 1, "A", "J0000", 0.0)).await;
    let early = pipeline.process_record(&record("X", 2, "A", "J0001", 10.0)).await;

    assert!(early.event().is_none());
    assert_eq!(early.state_change, StateChange::Updated);
    let stored = pipeline.state_table().get("X").expect("session stays open");
    assert_eq!(stored.unix_time, 10.0);
    assert_eq!(stored.source_name, "J0001");
    assert_eq!(pipeline.stats().negative_durations, 1);
}

#[tokio::test]
async fn intent_mismatch_without_finish_is_silent() {
    let mut pipeline = pipeline("", "CALIBRATE");

    pipeline.process_record(&record("X", 1, "OBSERVE_TARGET", "J0000", 0.0)).await;
    let outcome = pipeline.process_record(&record("X", 2, "OBSERVE_TARGET", "J0001", 100.0)).await;

    assert!(outcome.event().is_none());
    assert_eq!(pipeline.stats().intent_skips, 1);
    assert_eq!(pipeline.stats().ready_events, 1);
}

#[tokio::test]
async fn project_filter_skips_but_tracks_state() {
    let mut pipeline = pipeline("19A-", "");

    let outcome = pipeline.process_record(&record("20B-001", 1, "A", "J0000", 0.0)).await;
    assert!(outcome.event().is_none());
    assert!(pipeline.state_table().contains("20B-001"));

    let finish = pipeline.process_record(&record("20B-001", 2, "A", FINISH_SOURCE, 60.0)).await;
    assert!(finish.event().is_none());
    assert!(!pipeline.state_table().contains("20B-001"));

    let wanted = pipeline.process_record(&record("19A-123", 1, "A", "J0000", 0.0)).await;
    assert_eq!(wanted.event().map(|e| e.notice_type), Some(NoticeType::Ready));
    assert_eq!(pipeline.stats().project_skips, 2);
}

#[tokio::test]
async fn projects_are_tracked_independently() {
    let mut pipeline = pipeline("", "");

    pipeline.process_record(&record("P1", 1, "A", "S1", 0.0)).await;
    pipeline.process_record(&record("P2", 1, "A", "S2", 10.0)).await;
    pipeline.process_record(&record("P1", 2, "A", FINISH_SOURCE, 100.0)).await;

    assert!(!pipeline.state_table().contains("P1"));
    let p2 = pipeline.state_table().get("P2").expect("P2 still open");
    assert_eq!(p2.source_name, "S2");
    assert_eq!(pipeline.stats().open_sessions, 1);
}

#[tokio::test]
async fn mjd_start_times_are_converted() {
    let mut pipeline = pipeline("", "");

    // MJD 40587.0 is the Unix epoch.
    let mut first = record("X", 1, "A", "J0000", 0.0);
    first.start_time = ScanTime::Mjd(40_587.0);
    let outcome = pipeline.process_record(&first).await;

    let ready = outcome.event().expect("READY");
    assert!(ready.event_time.abs() < 1e-3, "got {}", ready.event_time);
}

#[tokio::test]
async fn listening_mode_never_dispatches() {
    let mut pipeline = pipeline("", "");
    assert!(!pipeline.dispatch_enabled());

    for (n, source, t) in [(1, "J0000", 0.0), (2, "J0001", 100.0), (3, FINISH_SOURCE, 200.0)] {
        let outcome = pipeline.process_record(&record("X", n, "A", source, t)).await;
        assert!(matches!(outcome.delivery, Delivery::Listening));
    }
    assert_eq!(pipeline.stats().events_classified(), 3);
    assert_eq!(pipeline.stats().dispatched, 0);
    assert_eq!(pipeline.stats().dispatch_failures, 0);
}
