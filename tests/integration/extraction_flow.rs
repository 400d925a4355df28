//! End-to-end extraction scenarios against a mock API

use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crm_data_extractor::client::{CrmClientConfig, CrmHttpClient};
use crm_data_extractor::extract::{EngineState, ExtractError, ExtractionEngine, ExtractionJob};
use crm_data_extractor::resume::{CheckpointDetails, CheckpointPhase};
use crm_data_extractor::MappedRecord;
use rust_decimal::Decimal;
use std::str::FromStr;

use super::support::{deals_page, test_client, RecordingHooks};

const DEALS: &str = "/crm/v3/objects/deals";

/// Mount two pages: ids 1-2 with cursor "p2", then ids 3-4 with no cursor.
async fn mount_two_pages(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(DEALS))
        .and(query_param_is_missing("after"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(deals_page(&["1", "2"], Some("p2"))),
        )
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(DEALS))
        .and(query_param("after", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(deals_page(&["3", "4"], None)))
        .expect(1)
        .mount(server)
        .await;
}

fn engine(
    server_uri: &str,
    hooks: &RecordingHooks,
) -> ExtractionEngine {
    ExtractionEngine::new(
        Arc::new(test_client(server_uri)),
        ExtractionJob::new("scan-1", "org-1").with_page_size(2),
        Arc::new(hooks.clone()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_two_pages_extract_in_order_with_final_checkpoint() {
    let server = MockServer::start().await;
    mount_two_pages(&server).await;

    let hooks = RecordingHooks::new();
    let mut engine = engine(&server.uri(), &hooks);

    let mut ids = Vec::new();
    let mut pages = Vec::new();
    while let Some(item) = engine.next_record().await {
        let record = item.unwrap();
        match &record {
            MappedRecord::Deal(deal) => {
                ids.push(deal.hubspot_deal_id.clone().unwrap());
                pages.push(deal.meta.page_number);
                assert_eq!(deal.amount, Some(Decimal::from_str("123.45").unwrap()));
                assert_eq!(deal.meta.scan_id, "scan-1");
                assert_eq!(deal.meta.tenant_id, "org-1");
            }
            other => panic!("expected default-schema records, got {other:?}"),
        }
    }

    assert_eq!(ids, vec!["1", "2", "3", "4"]);
    assert_eq!(pages, vec![1, 1, 2, 2]);
    assert_eq!(engine.state(), EngineState::Completed);
    assert_eq!(engine.records_processed(), 4);

    // Exactly one checkpoint at the default interval: the completion one
    let saved = hooks.saved();
    assert_eq!(saved.len(), 1);
    let last = saved.last().unwrap();
    assert_eq!(last.phase, CheckpointPhase::Completed);
    assert_eq!(last.records_processed, 4);
    assert_eq!(last.cursor, None);
    assert_eq!(last.page_number, 2);
}

#[tokio::test]
async fn test_periodic_checkpoint_records_next_unread_cursor() {
    let server = MockServer::start().await;
    mount_two_pages(&server).await;

    let hooks = RecordingHooks::new();
    let mut engine = engine(&server.uri(), &hooks).with_checkpoint_interval(1);
    while let Some(item) = engine.next_record().await {
        item.unwrap();
    }

    let phases = hooks.phases();
    assert_eq!(
        phases,
        vec![
            CheckpointPhase::MainData,
            CheckpointPhase::MainData,
            CheckpointPhase::Completed
        ]
    );

    let saved = hooks.saved();
    // After page 1 the checkpoint must point at the unread page 2
    assert_eq!(saved[0].cursor.as_deref(), Some("p2"));
    assert_eq!(saved[0].records_processed, 2);
    assert_eq!(saved[0].page_number, 1);
    match &saved[0].checkpoint_data {
        CheckpointDetails::Progress {
            pages_processed,
            last_page_records,
            ..
        } => {
            assert_eq!(*pages_processed, 1);
            assert_eq!(*last_page_records, 2);
        }
        other => panic!("expected Progress details, got {other:?}"),
    }
    // After the final page there is no cursor left
    assert_eq!(saved[1].cursor, None);
}

#[tokio::test]
async fn test_empty_collection_completes_with_zero_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DEALS))
        .respond_with(ResponseTemplate::new(200).set_body_json(deals_page(&[], None)))
        .expect(1)
        .mount(&server)
        .await;

    let hooks = RecordingHooks::new();
    let mut engine = engine(&server.uri(), &hooks);
    assert!(engine.next_record().await.is_none());
    assert_eq!(engine.state(), EngineState::Completed);
    assert_eq!(engine.records_processed(), 0);

    let last = hooks.saved().pop().unwrap();
    assert_eq!(last.phase, CheckpointPhase::Completed);
    assert_eq!(last.records_processed, 0);
}

#[tokio::test]
async fn test_fetch_failure_records_error_checkpoint_and_propagates() {
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
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = CrmHttpClient::new(
        "test-token",
        CrmClientConfig::default()
            .with_base_url(server.uri())
            .with_max_retries(0)
            .with_backoff(Duration::from_millis(10), Duration::from_millis(20))
            .with_rate_limit(10_000, Duration::from_secs(1)),
    )
    .unwrap();
    let hooks = RecordingHooks::new();
    let mut engine = ExtractionEngine::new(
        Arc::new(client),
        ExtractionJob::new("scan-1", "org-1").with_page_size(2),
        Arc::new(hooks.clone()),
    )
    .unwrap();

    let mut records = 0;
    let mut saw_error = false;
    while let Some(item) = engine.next_record().await {
        match item {
            Ok(_) => records += 1,
            Err(ExtractError::Api(_)) => saw_error = true,
            Err(other) => panic!("unexpected error kind: {other:?}"),
        }
    }

    assert_eq!(records, 2);
    assert!(saw_error);
    assert_eq!(engine.state(), EngineState::Failed);

    let last = hooks.saved().pop().unwrap();
    assert_eq!(last.phase, CheckpointPhase::Error);
    assert_eq!(last.records_processed, 2);
    assert_eq!(last.cursor.as_deref(), Some("p2"));
    match &last.checkpoint_data {
        CheckpointDetails::Error {
            recovery_cursor,
            error_page,
            error,
            ..
        } => {
            assert_eq!(recovery_cursor.as_deref(), Some("p2"));
            assert_eq!(*error_page, 2);
            assert!(error.contains("server error"), "message was {error}");
        }
        other => panic!("expected Error details, got {other:?}"),
    }
}

#[tokio::test]
async fn test_stream_adapter_yields_the_same_sequence() {
    let server = MockServer::start().await;
    mount_two_pages(&server).await;

    let hooks = RecordingHooks::new();
    let stream = engine(&server.uri(), &hooks).into_stream();
    let items: Vec<_> = stream.collect().await;

    assert_eq!(items.len(), 4);
    for item in items {
        item.unwrap();
    }
}

#[tokio::test]
async fn test_allow_list_records_flow_through_the_engine() {
    let server = MockServer::start().await;
    mount_two_pages(&server).await;

    let hooks = RecordingHooks::new();
    let mut engine = ExtractionEngine::new(
        Arc::new(test_client(&server.uri())),
        ExtractionJob::new("scan-1", "org-1")
            .with_page_size(2)
            .with_properties(vec!["archived".to_string()]),
        Arc::new(hooks.clone()),
    )
    .unwrap();

    let mut records = Vec::new();
    while let Some(item) = engine.next_record().await {
        records.push(item.unwrap());
    }
    assert_eq!(records.len(), 4);
    match &records[0] {
        MappedRecord::Filtered(map) => {
            assert_eq!(map.get("archived"), Some(&serde_json::json!(false)));
            assert_eq!(map.get("id"), Some(&serde_json::json!("1")));
            assert_eq!(map.get("_page_number"), Some(&serde_json::json!(1)));
        }
        other => panic!("expected filtered records, got {other:?}"),
    }
}
