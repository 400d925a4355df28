//! Raw-record normalization
//!
//! Maps one raw API record into the flat output schema. Timestamp and
//! numeric coercions degrade malformed values to `None` instead of failing
//! the record; the identifier is always preserved under an allow-list.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;
use tracing::debug;

use crate::client::response::RawDeal;
use crate::extract::config::SOURCE_SERVICE;
use crate::extract::job::ExtractionJob;
use crate::{DealRecord, ExtractionMeta, MappedRecord};

/// Maps raw API records into output records for one extraction run.
#[derive(Debug, Clone)]
pub struct RecordMapper {
    scan_id: String,
    organization_id: String,
    properties: Option<Vec<String>>,
}

impl RecordMapper {
    /// Build a mapper from the job's identity and filter settings.
    pub fn for_job(job: &ExtractionJob) -> Self {
        Self {
            scan_id: job.scan_id.clone(),
            organization_id: job.organization_id.clone(),
            properties: job.properties.clone().filter(|p| !p.is_empty()),
        }
    }

    /// Map one raw record fetched from `page_number` (1-based).
    pub fn map_record(&self, raw: &RawDeal, page_number: u64) -> MappedRecord {
        let meta = ExtractionMeta {
            extracted_at: Utc::now(),
            scan_id: self.scan_id.clone(),
            organization_id: self.organization_id.clone(),
            tenant_id: self.organization_id.clone(),
            page_number,
            source_service: SOURCE_SERVICE.to_string(),
        };

        match &self.properties {
            Some(properties) => MappedRecord::Filtered(project(raw, properties, &meta)),
            None => MappedRecord::Deal(Box::new(map_default(raw, meta))),
        }
    }
}

/// Default schema mapping with type coercions.
fn map_default(raw: &RawDeal, meta: ExtractionMeta) -> DealRecord {
    DealRecord {
        hubspot_deal_id: raw.id.clone(),
        dealname: string_property(raw, "dealname"),
        amount: to_decimal(raw.property("amount")),
        dealstage: string_property(raw, "dealstage"),
        pipeline: string_property(raw, "pipeline"),
        closedate: to_timestamp(raw.property("closedate")),
        createdate: to_timestamp(raw.property("createdate")),
        hs_lastmodifieddate: to_timestamp(raw.property("hs_lastmodifieddate")),
        hs_object_id: string_property(raw, "hs_object_id"),
        archived: raw.archived.unwrap_or(false),
        meta,
    }
}

/// Allow-list projection: only listed top-level properties present on the
/// raw record, plus the identifier and the extraction metadata.
fn project(raw: &RawDeal, properties: &[String], meta: &ExtractionMeta) -> Map<String, Value> {
    let mut out = Map::new();
    for property in properties {
        if let Some(value) = raw.top_level(property) {
            out.insert(property.clone(), value);
        }
    }
    // The identifier is always preserved
    out.insert(
        "id".to_string(),
        raw.id.clone().map(Value::String).unwrap_or(Value::Null),
    );

    match serde_json::to_value(meta) {
        Ok(Value::Object(meta_map)) => out.extend(meta_map),
        other => debug!(?other, "extraction metadata did not serialize to an object"),
    }
    out
}

fn string_property(raw: &RawDeal, name: &str) -> Option<String> {
    match raw.property(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Coerce a timestamp-like value to UTC.
///
/// Accepts an epoch-milliseconds value (number, or all-digit string) or an
/// ISO-8601 string with offset. Anything else maps to `None`.
pub(crate) fn to_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            DateTime::from_timestamp_millis(millis)
        }
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if s.bytes().all(|b| b.is_ascii_digit()) {
                let millis: i64 = s.parse().ok()?;
                return DateTime::from_timestamp_millis(millis);
            }
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }
        _ => None,
    }
}

/// Coerce a numeric-like value to a decimal.
///
/// Empty strings, the literal `"null"`, and unparseable input map to
/// `None`.
pub(crate) fn to_decimal(value: Option<&Value>) -> Option<Decimal> {
    match value? {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || s == "null" {
                return None;
            }
            Decimal::from_str(s)
                .ok()
                .or_else(|| Decimal::from_scientific(s).ok())
        }
        _ => None,
    }
}
