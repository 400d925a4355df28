//! Record mapping and coercion unit tests (through the public mapper API)

use rust_decimal::Decimal;
use serde_json::json;
use std::str::FromStr;

use crm_data_extractor::client::RawDeal;
use crm_data_extractor::extract::{ExtractionJob, RecordMapper};
use crm_data_extractor::MappedRecord;

fn mapper() -> RecordMapper {
    RecordMapper::for_job(&ExtractionJob::new("scan-9", "org-9"))
}

fn deal_with_properties(properties: serde_json::Value) -> RawDeal {
    serde_json::from_value(json!({"id": "1", "properties": properties})).unwrap()
}

fn map(properties: serde_json::Value) -> crm_data_extractor::DealRecord {
    match mapper().map_record(&deal_with_properties(properties), 1) {
        MappedRecord::Deal(deal) => *deal,
        other => panic!("expected default-schema record, got {other:?}"),
    }
}

#[test]
fn test_epoch_millis_string_and_iso_normalize_to_the_same_instant() {
    let from_epoch = map(json!({"closedate": "1700000000000"}));
    let from_iso = map(json!({"closedate": "2023-11-14T22:13:20+00:00"}));
    assert_eq!(from_epoch.closedate, from_iso.closedate);
    assert_eq!(
        from_epoch.closedate.unwrap().to_rfc3339(),
        "2023-11-14T22:13:20+00:00"
    );
}

#[test]
fn test_empty_or_absent_timestamps_map_to_absent() {
    assert_eq!(map(json!({"closedate": ""})).closedate, None);
    assert_eq!(map(json!({})).closedate, None);
    assert_eq!(map(json!({"closedate": null})).closedate, None);
}

#[test]
fn test_numeric_coercion_matrix() {
    assert_eq!(
        map(json!({"amount": "123.45"})).amount,
        Some(Decimal::from_str("123.45").unwrap())
    );
    assert_eq!(map(json!({"amount": "null"})).amount, None);
    assert_eq!(map(json!({"amount": ""})).amount, None);
    assert_eq!(map(json!({})).amount, None);
    assert_eq!(map(json!({"amount": "12x"})).amount, None);
}

#[test]
fn test_archived_defaults_to_false() {
    let record = map(json!({}));
    assert!(!record.archived);

    let archived: RawDeal =
        serde_json::from_value(json!({"id": "1", "archived": true})).unwrap();
    match mapper().map_record(&archived, 1) {
        MappedRecord::Deal(deal) => assert!(deal.archived),
        other => panic!("expected default-schema record, got {other:?}"),
    }
}

#[test]
fn test_metadata_serializes_with_underscore_keys() {
    let record = mapper().map_record(&deal_with_properties(json!({})), 4);
    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value.get("_scan_id"), Some(&json!("scan-9")));
    assert_eq!(value.get("_organization_id"), Some(&json!("org-9")));
    assert_eq!(value.get("_tenant_id"), Some(&json!("org-9")));
    assert_eq!(value.get("_page_number"), Some(&json!(4)));
    assert_eq!(value.get("_source_service"), Some(&json!("hubspot_deals")));
    assert!(value.get("_extracted_at").is_some());
}
