//! In-memory record source backing the integration suites.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::DateTime;
use dealer_analytics::analytics::{FetchError, RecordFetcher, RecordFilter, RecordKind};
use serde_json::Value;

/// Seeded row store with per-kind failure injection.
#[derive(Default)]
pub struct InMemoryFetcher {
    rows: HashMap<RecordKind, Vec<Value>>,
    failing: Option<RecordKind>,
}

impl InMemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, kind: RecordKind, rows: Vec<Value>) -> Self {
        self.rows.entry(kind).or_default().extend(rows);
        self
    }

    pub fn failing(mut self, kind: RecordKind) -> Self {
        self.failing = Some(kind);
        self
    }

    fn select(&self, kind: RecordKind, filter: &RecordFilter) -> Result<Vec<Value>, FetchError> {
        if self.failing == Some(kind) {
            return Err(FetchError::Unavailable(format!(
                "{} store offline",
                kind.label()
            )));
        }
        let mut selected: Vec<Value> = self
            .rows
            .get(&kind)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches(row, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if let Some(cap) = filter.limit {
            selected.truncate(cap);
        }
        Ok(selected)
    }
}

fn matches(row: &Value, filter: &RecordFilter) -> bool {
    if let Some(tenant) = &filter.tenant {
        if row.get("tenant_id").and_then(Value::as_str) != Some(tenant.as_str()) {
            return false;
        }
    }

    let created_at = row
        .get("created_at")
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok());
    if let Some(after) = filter.created_after {
        match created_at {
            Some(stamp) if stamp >= after => {}
            _ => return false,
        }
    }
    if let Some(before) = filter.created_before {
        match created_at {
            Some(stamp) if stamp < before => {}
            _ => return false,
        }
    }

    for (field, expected) in &filter.field_eq {
        // Store convention: an absent flag field reads as false.
        let actual = row.get(field).cloned().unwrap_or(Value::Bool(false));
        if &actual != expected {
            return false;
        }
    }

    for (field, allowed) in &filter.field_in {
        match row.get(field).and_then(Value::as_str) {
            Some(value) if allowed.iter().any(|candidate| candidate == value) => {}
            _ => return false,
        }
    }

    true
}

#[async_trait]
impl RecordFetcher for InMemoryFetcher {
    async fn fetch(&self, kind: RecordKind, filter: RecordFilter) -> Result<Vec<Value>, FetchError> {
        self.select(kind, &filter)
    }

    async fn count(&self, kind: RecordKind, filter: RecordFilter) -> Result<u64, FetchError> {
        self.select(kind, &filter).map(|rows| rows.len() as u64)
    }
}
