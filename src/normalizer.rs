// 🧹 Response Normalizer
// The registry never sends the same shape twice. Walk a fixed, ordered list of
// candidate keys and take the first one that yields something usable.

use crate::dates::parse_date_lenient;
use crate::period::EnrollmentPeriod;
use chrono::NaiveDate;
use serde_json::{Map, Value};
use tracing::warn;

// ============================================================================
// CANDIDATE KEYS (order matters: first non-empty match wins)
// ============================================================================

pub const PERIOD_LIST_KEYS: [&str; 8] = [
    "simples_nacional_periodos_anteriores",
    "simples_nacional_periodos",
    "periodos_simples",
    "simples_periodos",
    "simples_nacional",
    "periodos",
    "permanencia",
    "periodo",
];

pub const START_KEYS: [&str; 4] = ["inicio_data", "data_inicio", "inicio", "data"];
pub const END_KEYS: [&str; 3] = ["fim_data", "data_fim", "fim"];
pub const DETAIL_KEYS: [&str; 3] = ["detalhamento", "detalhe", "motivo"];
pub const STATUS_KEYS: [&str; 3] = ["simples_nacional_situacao", "situacao_simples", "situacao"];

// ============================================================================
// ROOT RESOLUTION
// ============================================================================

/// Where the payload lives: `data[0]`, `data`, or the response itself.
pub fn resolve_root(response: &Value) -> Option<&Value> {
    let envelope = response.as_object()?;
    match envelope.get("data") {
        Some(Value::Array(items)) if !items.is_empty() => items.first(),
        Some(data @ Value::Object(_)) => Some(data),
        _ => Some(response),
    }
}

/// Only the `data` envelope carries the current-status narrative.
fn resolve_data_item(response: &Value) -> Option<&Map<String, Value>> {
    match response.as_object()?.get("data")? {
        Value::Array(items) => items.first()?.as_object(),
        Value::Object(item) => Some(item),
        _ => None,
    }
}

// ============================================================================
// EXTRACTION
// ============================================================================

/// Pull enrollment periods out of a registry response. Never fails:
/// anything unrecognizable yields an empty list.
pub fn extract_periods(response: Option<&Value>) -> Vec<EnrollmentPeriod> {
    let root = match response.and_then(resolve_root).and_then(Value::as_object) {
        Some(root) => root,
        None => return Vec::new(),
    };

    for key in PERIOD_LIST_KEYS {
        let items = match root.get(key) {
            Some(Value::Array(items)) => items,
            _ => continue,
        };

        let periods: Vec<EnrollmentPeriod> = items
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|item| period_from_record(key, item))
            .collect();

        if !periods.is_empty() {
            return periods;
        }
    }

    Vec::new()
}

/// Raw status narrative, e.g. "Optante pelo Simples Nacional desde 01/01/2018".
pub fn extract_status_text(response: Option<&Value>) -> Option<String> {
    let item = response.and_then(resolve_data_item)?;
    STATUS_KEYS.iter().find_map(|key| match item.get(*key) {
        Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
        _ => None,
    })
}

fn period_from_record(key: &str, item: &Map<String, Value>) -> Option<EnrollmentPeriod> {
    let start = first_present(item, &START_KEYS).and_then(value_as_date)?;
    let end = first_present(item, &END_KEYS).and_then(value_as_date);
    let detail = first_present(item, &DETAIL_KEYS)
        .map(value_as_text)
        .unwrap_or_default();

    match EnrollmentPeriod::new(start, end, detail) {
        Ok(period) => Some(period),
        Err(err) => {
            warn!(list = key, %err, "discarding malformed period record");
            None
        }
    }
}

/// First key whose value is neither null nor the empty string.
fn first_present<'a>(item: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| match item.get(*key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(value) => Some(value),
    })
}

fn value_as_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(text) => parse_date_lenient(text),
        _ => None,
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Bool(false) => String::new(),
        Value::Number(n) if n.as_f64() == Some(0.0) => String::new(),
        other => other.to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
