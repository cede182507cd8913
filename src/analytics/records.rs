//! Typed views over the raw rows returned by the record fetcher.
//!
//! Source rows are loosely shaped: numbers arrive as strings, statuses vary in
//! case, and fields go missing entirely. Normalization happens here, at
//! deserialization time, so the aggregation code downstream only ever sees
//! defaulted, well-typed values and a single bad row can never abort a
//! computation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Statuses that mean a payment has settled, matched case-insensitively.
pub(crate) const SETTLED_STATUSES: [&str; 6] = [
    "CAPTURED",
    "PAID",
    "SUCCESS",
    "COMPLETED",
    "SETTLED",
    "RECONCILED",
];

/// Insurance sub-statuses that count as done for pending classification.
pub(crate) const INSURANCE_DONE_STATUSES: [&str; 3] = ["COMPLETED", "ACTIVE", "ISSUED"];

pub(crate) fn normalize_status(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

pub(crate) fn is_settled_status(status: &str) -> bool {
    let normalized = normalize_status(status);
    SETTLED_STATUSES.contains(&normalized.as_str())
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(number) => number.as_f64().unwrap_or(0.0),
        Value::String(text) => text.trim().parse().unwrap_or(0.0),
        Value::Bool(flag) => {
            if flag {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    })
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_f64(deserializer).map(|parsed| parsed.round() as i64)
}

fn lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        _ => String::new(),
    })
}

fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = lenient_string(deserializer)?;
    if text.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(text))
    }
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(flag) => flag,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(false),
        Value::String(text) => matches!(text.trim().to_ascii_lowercase().as_str(), "true" | "1"),
        _ => false,
    })
}

fn lenient_metadata<'de, D>(deserializer: D) -> Result<EventMetadata, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc)),
        _ => None,
    })
}

/// Deserializes each raw row into `T`, skipping rows that are not objects at
/// all. Field-level problems never reach this point: every field of every
/// record type degrades to its default instead of failing.
pub fn decode_rows<T>(rows: Vec<Value>) -> Vec<T>
where
    T: serde::de::DeserializeOwned,
{
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<T>(row) {
            Ok(record) => Some(record),
            Err(reason) => {
                tracing::debug!(%reason, "skipping undecodable row");
                None
            }
        })
        .collect()
}

/// A booking in the sales pipeline, carrying its stage label and the four
/// independent milestone sub-statuses.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BookingRecord {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub total_amount: f64,
    #[serde(deserialize_with = "lenient_string")]
    pub stage: String,
    #[serde(deserialize_with = "lenient_string")]
    pub status: String,
    #[serde(deserialize_with = "lenient_string")]
    pub payment_status: String,
    #[serde(deserialize_with = "lenient_string")]
    pub allotment_status: String,
    #[serde(deserialize_with = "lenient_string")]
    pub pdi_status: String,
    #[serde(deserialize_with = "lenient_string")]
    pub insurance_status: String,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub sku_id: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub color_id: Option<String>,
    #[serde(deserialize_with = "lenient_i64")]
    pub quantity: i64,
    #[serde(deserialize_with = "lenient_bool")]
    pub is_deleted: bool,
    #[serde(deserialize_with = "lenient_datetime")]
    pub created_at: Option<DateTime<Utc>>,
}

impl BookingRecord {
    /// Product key for trend aggregation: SKU id, falling back to color id.
    pub fn product_key(&self) -> Option<&str> {
        self.sku_id
            .as_deref()
            .or(self.color_id.as_deref())
    }

    /// A recorded booking always represents at least one unit.
    pub fn unit_quantity(&self) -> i64 {
        self.quantity.max(1)
    }

    pub fn is_cancelled_or_refunded(&self) -> bool {
        let normalized = normalize_status(&self.status);
        normalized.contains("CANCEL") || normalized.contains("REFUND")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PaymentRecord {
    #[serde(deserialize_with = "lenient_f64")]
    pub amount: f64,
    #[serde(deserialize_with = "lenient_string")]
    pub status: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub reconciled: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub is_deleted: bool,
}

impl PaymentRecord {
    pub fn is_settled(&self) -> bool {
        self.reconciled || is_settled_status(&self.status)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FinanceAttemptRecord {
    #[serde(deserialize_with = "lenient_string")]
    pub status: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub loan_amount: f64,
    #[serde(deserialize_with = "lenient_bool")]
    pub is_deleted: bool,
}

impl FinanceAttemptRecord {
    pub fn is_disbursed(&self) -> bool {
        normalize_status(&self.status) == "DISBURSED"
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StockRecord {
    #[serde(deserialize_with = "lenient_string")]
    pub status: String,
    #[serde(deserialize_with = "lenient_opt_f64")]
    pub purchase_order_value: Option<f64>,
    #[serde(deserialize_with = "lenient_bool")]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PurchaseOrderRecord {
    #[serde(deserialize_with = "lenient_f64")]
    pub total_value: f64,
    #[serde(deserialize_with = "lenient_string")]
    pub status: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub is_deleted: bool,
}

impl PurchaseOrderRecord {
    pub fn is_received(&self) -> bool {
        normalize_status(&self.status) == "RECEIVED"
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeedbackRecord {
    #[serde(deserialize_with = "lenient_string")]
    pub booking_id: String,
    #[serde(deserialize_with = "lenient_opt_f64")]
    pub nps_score: Option<f64>,
    #[serde(deserialize_with = "lenient_bool")]
    pub is_deleted: bool,
}

/// A behavioral event emitted by the storefront: a product page view or a
/// dwell measurement.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalyticsEvent {
    #[serde(deserialize_with = "lenient_string")]
    pub event_name: String,
    #[serde(deserialize_with = "lenient_metadata")]
    pub metadata: EventMetadata,
    #[serde(deserialize_with = "lenient_bool")]
    pub is_deleted: bool,
    #[serde(deserialize_with = "lenient_datetime")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventMetadata {
    #[serde(deserialize_with = "lenient_opt_string")]
    pub sku_id: Option<String>,
    #[serde(deserialize_with = "lenient_i64")]
    pub duration_ms: i64,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub lead_id: Option<String>,
}

impl AnalyticsEvent {
    pub fn product_key(&self) -> Option<&str> {
        self.metadata.sku_id.as_deref()
    }

    pub fn dwell_ms(&self) -> i64 {
        self.metadata.duration_ms.max(0)
    }
}

/// A catalog SKU plus the links needed to compose its display label.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogEntry {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub color: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub model_id: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub vehicle_variant_id: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub accessory_variant_id: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub service_variant_id: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogModel {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub brand_id: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    pub is_deleted: bool,
}

/// Brand and variant rows only contribute a display name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NamedRow {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub is_deleted: bool,
}

/// Maps a lead to the tenant considered to own it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LeadTenantLink {
    #[serde(deserialize_with = "lenient_string")]
    pub lead_id: String,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub selected_dealer_tenant_id: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub primary_tenant_id: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    pub owner_tenant_id: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    pub is_deleted: bool,
}

impl LeadTenantLink {
    /// Owning tenant by priority: selected dealer, then primary, then owner.
    pub fn owning_tenant(&self) -> Option<&str> {
        self.selected_dealer_tenant_id
            .as_deref()
            .or(self.primary_tenant_id.as_deref())
            .or(self.owner_tenant_id.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn malformed_fields_degrade_to_defaults() {
        let rows = vec![json!({
            "id": 42,
            "total_amount": "125000.50",
            "stage": "payment",
            "quantity": "not-a-number",
            "is_deleted": "false"
        })];

        let decoded: Vec<BookingRecord> = decode_rows(rows);
        assert_eq!(decoded.len(), 1);
        let booking = &decoded[0];
        assert_eq!(booking.id, "42");
        assert_eq!(booking.total_amount, 125000.5);
        assert_eq!(booking.quantity, 0);
        assert_eq!(booking.unit_quantity(), 1);
        assert!(!booking.is_deleted);
    }

    #[test]
    fn non_object_rows_are_skipped() {
        let rows = vec![json!("garbage"), json!({"amount": 100})];
        let decoded: Vec<PaymentRecord> = decode_rows(rows);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].amount, 100.0);
    }

    #[test]
    fn settled_matches_status_set_or_reconciliation_flag() {
        for status in ["paid", "CAPTURED", " success ", "Settled"] {
            let payment = PaymentRecord {
                status: status.to_string(),
                ..PaymentRecord::default()
            };
            assert!(payment.is_settled(), "{status} should settle");
        }

        let unreconciled = PaymentRecord {
            status: "PENDING".to_string(),
            ..PaymentRecord::default()
        };
        assert!(!unreconciled.is_settled());

        let reconciled = PaymentRecord {
            status: "PENDING".to_string(),
            reconciled: true,
            ..PaymentRecord::default()
        };
        assert!(reconciled.is_settled());
    }

    #[test]
    fn lead_tenant_resolution_priority() {
        let link = LeadTenantLink {
            lead_id: "lead-1".to_string(),
            selected_dealer_tenant_id: Some("dealer-a".to_string()),
            primary_tenant_id: Some("dealer-b".to_string()),
            owner_tenant_id: Some("dealer-c".to_string()),
            ..LeadTenantLink::default()
        };
        assert_eq!(link.owning_tenant(), Some("dealer-a"));

        let fallback = LeadTenantLink {
            lead_id: "lead-2".to_string(),
            owner_tenant_id: Some("dealer-c".to_string()),
            ..LeadTenantLink::default()
        };
        assert_eq!(fallback.owning_tenant(), Some("dealer-c"));

        let unresolved = LeadTenantLink::default();
        assert_eq!(unresolved.owning_tenant(), None);
    }
}
