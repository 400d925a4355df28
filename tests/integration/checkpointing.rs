//! Pause, cancel, and resume behavior of the extraction engine

use std::sync::atomic::Ordering;
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crm_data_extractor::extract::{
    EngineState, ExtractionEngine, ExtractionJob, ResumePoint,
};
use crm_data_extractor::resume::{CheckpointDetails, CheckpointPhase};

use super::support::{deals_page, test_client, RecordingHooks};

const DEALS: &str = "/crm/v3/objects/deals";

fn engine(server_uri: &str, hooks: &RecordingHooks) -> ExtractionEngine {
    ExtractionEngine::new(
        Arc::new(test_client(server_uri)),
        ExtractionJob::new("scan-1", "org-1").with_page_size(2),
        Arc::new(hooks.clone()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_cancel_before_first_fetch_emits_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DEALS))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(deals_page(&["1", "2"], Some("p2"))),
        )
        .expect(0)
        .mount(&server)
        .await;

    let hooks = RecordingHooks::new();
    hooks.cancel.store(true, Ordering::SeqCst);
    let mut engine = engine(&server.uri(), &hooks);

    assert!(engine.next_record().await.is_none());
    assert_eq!(engine.state(), EngineState::Cancelled);
    assert_eq!(engine.records_processed(), 0);

    // Exactly one checkpoint attempt, phase cancelled
    let saved = hooks.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].phase, CheckpointPhase::Cancelled);
    assert_eq!(saved[0].records_processed, 0);
    assert_eq!(saved[0].cursor, None);
}

#[tokio::test]
async fn test_cancel_between_pages_keeps_forward_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DEALS))
        .and(query_param_is_missing("after"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(deals_page(&["1", "2"], Some("p2"))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let hooks = RecordingHooks::new();
    let mut engine = engine(&server.uri(), &hooks);

    assert!(engine.next_record().await.unwrap().is_ok());
    assert!(engine.next_record().await.unwrap().is_ok());
    // Page 1 consumed; cancel before page 2 is fetched
    hooks.cancel.store(true, Ordering::SeqCst);
    assert!(engine.next_record().await.is_none());

    assert_eq!(engine.state(), EngineState::Cancelled);
    let last = hooks.saved().pop().unwrap();
    assert_eq!(last.phase, CheckpointPhase::Cancelled);
    assert_eq!(last.records_processed, 2);
    assert_eq!(last.page_number, 1);
    assert_eq!(last.cursor.as_deref(), Some("p2"));
}

#[tokio::test]
async fn test_pause_at_page_boundary_then_resume_without_refetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DEALS))
        .and(query_param_is_missing("after"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(deals_page(&["1", "2"], Some("p2"))),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DEALS))
        .and(query_param("after", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(deals_page(&["3", "4"], None)))
        .expect(1)
        .mount(&server)
        .await;

    let hooks = RecordingHooks::new();
    let mut first = engine(&server.uri(), &hooks);
    assert!(first.next_record().await.unwrap().is_ok());
    assert!(first.next_record().await.unwrap().is_ok());
    hooks.pause.store(true, Ordering::SeqCst);
    assert!(first.next_record().await.is_none());
    assert_eq!(first.state(), EngineState::Paused);

    let checkpoint = hooks.saved().pop().unwrap();
    assert_eq!(checkpoint.phase, CheckpointPhase::Paused);
    // Cursor points at the start of the *next* page
    assert_eq!(checkpoint.cursor.as_deref(), Some("p2"));
    assert_eq!(checkpoint.records_processed, 2);

    // Resume a new run from the checkpoint; page 1 must not be refetched
    // (its mock expects exactly one request)
    let resume = ResumePoint::from_checkpoint(&checkpoint).unwrap();
    let resumed_hooks = RecordingHooks::new();
    let mut resumed = engine(&server.uri(), &resumed_hooks).with_resume(Some(resume));

    let mut ids = Vec::new();
    while let Some(item) = resumed.next_record().await {
        match item.unwrap() {
            crm_data_extractor::MappedRecord::Deal(deal) => {
                ids.push(deal.hubspot_deal_id.unwrap())
            }
            other => panic!("expected deal records, got {other:?}"),
        }
    }

    assert_eq!(ids, vec!["3", "4"]);
    assert_eq!(resumed.state(), EngineState::Completed);
    let last = resumed_hooks.saved().pop().unwrap();
    assert_eq!(last.phase, CheckpointPhase::Completed);
    assert_eq!(last.records_processed, 4);
    assert_eq!(last.page_number, 2);
}

#[tokio::test]
async fn test_mid_page_pause_after_k_records_checkpoints_k() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DEALS))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(deals_page(&["1", "2", "3", "4"], Some("p2"))),
        )
        .mount(&server)
        .await;

    let hooks = RecordingHooks::new();
    let mut engine = ExtractionEngine::new(
        Arc::new(test_client(&server.uri())),
        ExtractionJob::new("scan-1", "org-1").with_page_size(4),
        Arc::new(hooks.clone()),
    )
    .unwrap();

    // Pull K=2 of M=4 records, then pause
    assert!(engine.next_record().await.unwrap().is_ok());
    assert!(engine.next_record().await.unwrap().is_ok());
    hooks.pause.store(true, Ordering::SeqCst);
    assert!(engine.next_record().await.is_none());

    assert_eq!(engine.state(), EngineState::PausedMidPage);
    let saved = hooks.saved();
    assert_eq!(saved.len(), 1);
    let checkpoint = &saved[0];
    assert_eq!(checkpoint.phase, CheckpointPhase::PausedMidPage);
    assert_eq!(checkpoint.records_processed, 2);
    // First page of a fresh run: the refetch cursor is still absent
    assert_eq!(checkpoint.cursor, None);
    match &checkpoint.checkpoint_data {
        CheckpointDetails::PausedMidPage {
            records_completed_in_page,
            ..
        } => assert_eq!(*records_completed_in_page, 2),
        other => panic!("expected PausedMidPage details, got {other:?}"),
    }
}

#[tokio::test]
async fn test_mid_page_pause_resume_re_emits_the_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DEALS))
        .and(query_param_is_missing("after"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(deals_page(&["1", "2"], Some("p2"))),
        )
        .expect(1)
        .mount(&server)
        .await;
    // Page 2 is fetched twice: once before the pause, once after resume
    Mock::given(method("GET"))
        .and(path(DEALS))
        .and(query_param("after", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(deals_page(&["3", "4"], None)))
        .expect(2)
        .mount(&server)
        .await;

    let hooks = RecordingHooks::new();
    let mut engine = engine(&server.uri(), &hooks);
    for _ in 0..3 {
        assert!(engine.next_record().await.unwrap().is_ok());
    }
    hooks.pause.store(true, Ordering::SeqCst);
    assert!(engine.next_record().await.is_none());

    let checkpoint = hooks.saved().pop().unwrap();
    assert_eq!(checkpoint.phase, CheckpointPhase::PausedMidPage);
    assert_eq!(checkpoint.records_processed, 3);
    assert_eq!(checkpoint.cursor.as_deref(), Some("p2"));

    // Resuming refetches page 2 from its start: record "3" is re-emitted.
    // Bounded duplication is the accepted at-least-once semantic here.
    let resume = ResumePoint::from_checkpoint(&checkpoint).unwrap();
    let resumed_hooks = RecordingHooks::new();
    let mut resumed = engine_with_page_size(&server.uri(), &resumed_hooks, 2)
        .with_resume(Some(resume));

    let mut ids = Vec::new();
    while let Some(item) = resumed.next_record().await {
        match item.unwrap() {
            crm_data_extractor::MappedRecord::Deal(deal) => {
                ids.push(deal.hubspot_deal_id.unwrap())
            }
            other => panic!("expected deal records, got {other:?}"),
        }
    }
    assert_eq!(ids, vec!["3", "4"]);
    assert_eq!(resumed.records_processed(), 5);
}

fn engine_with_page_size(
    server_uri: &str,
    hooks: &RecordingHooks,
    page_size: u32,
) -> ExtractionEngine {
    ExtractionEngine::new(
        Arc::new(test_client(server_uri)),
        ExtractionJob::new("scan-1", "org-1").with_page_size(page_size),
        Arc::new(hooks.clone()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_resume_from_completed_checkpoint_finishes_immediately() {
    // No mock server: a fetch attempt would fail loudly
    let hooks = RecordingHooks::new();
    let mut engine = ExtractionEngine::new(
        Arc::new(test_client("http://127.0.0.1:9")),
        ExtractionJob::new("scan-1", "org-1").with_page_size(2),
        Arc::new(hooks.clone()),
    )
    .unwrap()
    .with_resume(Some(ResumePoint {
        cursor: None,
        page_number: 2,
        records_processed: 4,
    }));

    assert!(engine.next_record().await.is_none());
    assert_eq!(engine.state(), EngineState::Completed);
    assert_eq!(engine.records_processed(), 4);

    let last = hooks.saved().pop().unwrap();
    assert_eq!(last.phase, CheckpointPhase::Completed);
    assert_eq!(last.records_processed, 4);
    assert_eq!(last.cursor, None);
}

#[tokio::test]
async fn test_checkpoint_save_failures_never_abort_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DEALS))
        .and(query_param_is_missing("after"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(deals_page(&["1", "2"], Some("p2"))),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DEALS))
        .and(query_param("after", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(deals_page(&["3", "4"], None)))
        .mount(&server)
        .await;

    let hooks = RecordingHooks::new();
    hooks.fail_saves.store(true, Ordering::SeqCst);
    let mut engine = engine(&server.uri(), &hooks).with_checkpoint_interval(1);

    let mut records = 0;
    while let Some(item) = engine.next_record().await {
        item.unwrap();
        records += 1;
    }

    assert_eq!(records, 4);
    assert_eq!(engine.state(), EngineState::Completed);
    assert!(hooks.saved().is_empty());
}

#[tokio::test]
async fn test_cancel_wins_when_both_signals_are_set() {
    let hooks = RecordingHooks::new();
    hooks.cancel.store(true, Ordering::SeqCst);
    hooks.pause.store(true, Ordering::SeqCst);

    let mut engine = ExtractionEngine::new(
        Arc::new(test_client("http://127.0.0.1:9")),
        ExtractionJob::new("scan-1", "org-1"),
        Arc::new(hooks.clone()),
    )
    .unwrap();

    assert!(engine.next_record().await.is_none());
    assert_eq!(engine.state(), EngineState::Cancelled);
    assert_eq!(hooks.phases(), vec![CheckpointPhase::Cancelled]);
}

#[tokio::test]
async fn test_page_safety_cap_stops_without_completion_checkpoint() {
    let server = MockServer::start().await;
    // Every page hands out another cursor: a runaway API
    Mock::given(method("GET"))
        .and(path(DEALS))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(deals_page(&["1"], Some("again"))),
        )
        .mount(&server)
        .await;

    let hooks = RecordingHooks::new();
    let mut engine = engine(&server.uri(), &hooks).with_max_pages(3);

    let mut records = 0;
    while let Some(item) = engine.next_record().await {
        item.unwrap();
        records += 1;
    }

    assert_eq!(records, 3);
    assert_eq!(engine.state(), EngineState::Completed);
    // Implicit stop: no completion checkpoint is written
    assert!(hooks.saved().is_empty());
}
