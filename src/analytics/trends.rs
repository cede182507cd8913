//! Product trend ranking over bookings and behavioral events.
//!
//! Bookings and events aggregate independently into one product universe;
//! the two top-N lists share a tie-break chain but differ in their primary
//! key. Ordering is fully deterministic: equal metrics fall back to an
//! ascending label comparison.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::records::{AnalyticsEvent, BookingRecord, LeadTenantLink};

pub const EVENT_SKU_VIEW: &str = "sku_view";
pub const EVENT_SKU_DWELL: &str = "sku_dwell";

/// Asymmetric lookback windows: bookings are low-frequency/high-value and
/// keep a long window; view/dwell signals are recency-weighted.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LookbackDays {
    pub bookings: i64,
    pub visitors: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendRow {
    pub product_id: String,
    pub label: String,
    pub booking_count: i64,
    pub view_count: i64,
    pub dwell_ms: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendsResult {
    pub updated_at: DateTime<Utc>,
    pub lookback_days: LookbackDays,
    pub top_booked: Vec<TrendRow>,
    pub top_dwell: Vec<TrendRow>,
}

#[derive(Debug, Default, Clone)]
struct ProductMetrics {
    booking_count: i64,
    view_count: i64,
    dwell_ms: i64,
}

/// Ranks the product universe seen across `bookings` and `events`.
///
/// When `tenant` is set, an event is attributed only if it carries a lead
/// reference that resolves to that tenant through `lead_links`; everything
/// else is dropped outright rather than counted as global. Bookings are
/// expected to be tenant-filtered at the fetch.
pub fn rank_trends(
    bookings: &[BookingRecord],
    events: &[AnalyticsEvent],
    lead_links: &HashMap<String, String>,
    labels: &HashMap<String, String>,
    tenant: Option<&str>,
    top_n: usize,
    lookback_days: LookbackDays,
) -> TrendsResult {
    // BTreeMap keeps the universe in key order so equal-metric products
    // already sit in their final relative position.
    let mut universe: BTreeMap<String, ProductMetrics> = BTreeMap::new();

    for booking in bookings.iter().filter(|booking| !booking.is_deleted) {
        if booking.is_cancelled_or_refunded() {
            continue;
        }
        let Some(key) = booking.product_key() else {
            continue;
        };
        universe.entry(key.to_string()).or_default().booking_count +=
            booking.unit_quantity();
    }

    for event in events.iter().filter(|event| !event.is_deleted) {
        let name = event.event_name.as_str();
        if name != EVENT_SKU_VIEW && name != EVENT_SKU_DWELL {
            continue;
        }
        let Some(key) = event.product_key() else {
            continue;
        };
        if let Some(tenant) = tenant {
            let resolved = event
                .metadata
                .lead_id
                .as_deref()
                .and_then(|lead| lead_links.get(lead));
            if resolved.map(String::as_str) != Some(tenant) {
                continue;
            }
        }

        let metrics = universe.entry(key.to_string()).or_default();
        match name {
            EVENT_SKU_VIEW => metrics.view_count += 1,
            _ => metrics.dwell_ms += event.dwell_ms(),
        }
    }

    let rows: Vec<TrendRow> = universe
        .into_iter()
        .map(|(product_id, metrics)| {
            let label = labels
                .get(&product_id)
                .cloned()
                .unwrap_or_else(|| product_id.clone());
            TrendRow {
                product_id,
                label,
                booking_count: metrics.booking_count,
                view_count: metrics.view_count,
                dwell_ms: metrics.dwell_ms,
            }
        })
        .collect();

    let cap = top_n.max(1);
    TrendsResult {
        updated_at: Utc::now(),
        lookback_days,
        top_booked: top_list(&rows, cap, |a, b| {
            b.booking_count
                .cmp(&a.booking_count)
                .then_with(|| b.dwell_ms.cmp(&a.dwell_ms))
                .then_with(|| b.view_count.cmp(&a.view_count))
        }),
        top_dwell: top_list(&rows, cap, |a, b| {
            b.dwell_ms
                .cmp(&a.dwell_ms)
                .then_with(|| b.booking_count.cmp(&a.booking_count))
                .then_with(|| b.view_count.cmp(&a.view_count))
        }),
    }
}

fn top_list(
    rows: &[TrendRow],
    cap: usize,
    by: impl Fn(&TrendRow, &TrendRow) -> Ordering,
) -> Vec<TrendRow> {
    let mut list: Vec<TrendRow> = rows
        .iter()
        .filter(|row| row.booking_count != 0 || row.view_count != 0 || row.dwell_ms != 0)
        .cloned()
        .collect();
    list.sort_by(|a, b| by(a, b).then_with(|| a.label.cmp(&b.label)));
    list.truncate(cap);
    list
}
