//! Read-only KPI orchestration: issues the independent fetches for each
//! snapshot concurrently, joins them, and hands the rows to the pure
//! calculators. A snapshot either fully succeeds or fails with the fetch
//! stage that broke; partial results are never returned.

use std::collections::{BTreeSet, HashMap};

use chrono::{Duration, NaiveTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::try_join;

use super::fetcher::{RecordFetcher, RecordFilter, RecordKind};
use super::funnel::{classify_funnel, FunnelResult};
use super::labels::LabelResolver;
use super::records::{
    decode_rows, normalize_status, AnalyticsEvent, BookingRecord, FeedbackRecord,
    FinanceAttemptRecord, LeadTenantLink, PaymentRecord, PurchaseOrderRecord, StockRecord,
    INSURANCE_DONE_STATUSES,
};
use super::stage::Stage;
use super::trends::{
    rank_trends, LookbackDays, TrendsResult, EVENT_SKU_DWELL, EVENT_SKU_VIEW,
};
use super::wallet::{compute_wallet, WalletResult};
use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, FetchStage};

/// Tenant dashboard counters. Every field comes from its own independent
/// counting or summing query.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardKpis {
    pub leads_total: u64,
    pub leads_today: u64,
    pub quotes_total: u64,
    pub quotes_pending: u64,
    pub bookings_total: u64,
    pub bookings_value: i64,
    pub deliveries_total: u64,
    pub deliveries_pdi_ready: u64,
    pub payments_total: u64,
    pub payments_today: u64,
    pub insurance_total: u64,
    pub insurance_pending: u64,
    pub feedback_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_nps: Option<f64>,
}

/// Platform-wide counters: the dashboard shape unscoped, plus tenant and
/// membership totals.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlatformKpis {
    pub leads_total: u64,
    pub leads_today: u64,
    pub quotes_total: u64,
    pub quotes_pending: u64,
    pub bookings_total: u64,
    pub bookings_value: i64,
    pub deliveries_total: u64,
    pub deliveries_pdi_ready: u64,
    pub payments_total: u64,
    pub payments_today: u64,
    pub insurance_total: u64,
    pub insurance_pending: u64,
    pub feedback_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_nps: Option<f64>,
    pub active_dealer_tenants: u64,
    pub active_financier_tenants: u64,
    pub total_members: u64,
}

/// The engine facade. Stateless across invocations: every call owns its own
/// working set, so no locks and no caches.
pub struct AnalyticsEngine<F> {
    fetcher: F,
    config: AnalyticsConfig,
}

impl<F> AnalyticsEngine<F>
where
    F: RecordFetcher,
{
    pub fn new(fetcher: F, config: AnalyticsConfig) -> Self {
        Self { fetcher, config }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Pipeline funnel for one tenant.
    pub async fn funnel(&self, tenant: &str) -> Result<FunnelResult, AnalyticsError> {
        let rows = self
            .fetch(
                RecordKind::Bookings,
                FetchStage::Bookings,
                RecordFilter::new().tenant(tenant),
            )
            .await?;
        let bookings: Vec<BookingRecord> = decode_rows(rows);
        let result = classify_funnel(&bookings);
        tracing::info!(
            tenant,
            open = result.open_pipeline_count,
            closed = result.closed_count,
            "funnel snapshot computed"
        );
        Ok(result)
    }

    /// Financial rollup for one tenant. All four monetary sources must
    /// arrive; a miss would make the net position misleading.
    pub async fn wallet(&self, tenant: &str) -> Result<WalletResult, AnalyticsError> {
        let (payment_rows, finance_rows, stock_rows, order_rows) = try_join!(
            self.fetch(
                RecordKind::Payments,
                FetchStage::Payments,
                RecordFilter::new().tenant(tenant),
            ),
            self.fetch(
                RecordKind::FinanceAttempts,
                FetchStage::FinanceAttempts,
                RecordFilter::new().tenant(tenant),
            ),
            self.fetch(
                RecordKind::Stock,
                FetchStage::Stock,
                RecordFilter::new().tenant(tenant),
            ),
            self.fetch(
                RecordKind::PurchaseOrders,
                FetchStage::PurchaseOrders,
                RecordFilter::new().tenant(tenant),
            ),
        )?;

        let payments: Vec<PaymentRecord> = decode_rows(payment_rows);
        let finance: Vec<FinanceAttemptRecord> = decode_rows(finance_rows);
        let stock: Vec<StockRecord> = decode_rows(stock_rows);
        let orders: Vec<PurchaseOrderRecord> = decode_rows(order_rows);

        let result = compute_wallet(&payments, &finance, &stock, &orders);
        tracing::info!(
            tenant,
            captured = result.cash_in_captured,
            net = result.net_cash_position,
            "wallet snapshot computed"
        );
        Ok(result)
    }

    /// Ranked product trends, optionally scoped to one tenant. Lead-link
    /// resolution is gated on the event fetch (the leads to resolve are
    /// discovered from the event rows); label resolution is gated on the
    /// catalog fetch.
    pub async fn trends(
        &self,
        tenant: Option<&str>,
        top_n: usize,
    ) -> Result<TrendsResult, AnalyticsError> {
        let now = Utc::now();
        let lookback = LookbackDays {
            bookings: self.config.lookback.booking_days,
            visitors: self.config.lookback.visitor_days,
        };

        let (booking_rows, event_rows) = try_join!(
            self.fetch(
                RecordKind::Bookings,
                FetchStage::Bookings,
                RecordFilter::new()
                    .tenant_opt(tenant)
                    .created_after(now - Duration::days(lookback.bookings)),
            ),
            self.fetch(
                RecordKind::Events,
                FetchStage::Events,
                RecordFilter::new()
                    .created_after(now - Duration::days(lookback.visitors))
                    .field_in("event_name", [EVENT_SKU_VIEW, EVENT_SKU_DWELL]),
            ),
        )?;

        let bookings: Vec<BookingRecord> = decode_rows(booking_rows);
        let events: Vec<AnalyticsEvent> = decode_rows(event_rows);

        let lead_links = if tenant.is_some() {
            self.resolve_lead_links(&events).await?
        } else {
            HashMap::new()
        };

        let mut universe: BTreeSet<String> = BTreeSet::new();
        for booking in bookings
            .iter()
            .filter(|booking| !booking.is_deleted && !booking.is_cancelled_or_refunded())
        {
            if let Some(key) = booking.product_key() {
                universe.insert(key.to_string());
            }
        }
        for event in events.iter().filter(|event| !event.is_deleted) {
            if let Some(key) = event.product_key() {
                universe.insert(key.to_string());
            }
        }

        let labels = LabelResolver::new(&self.fetcher).resolve(&universe).await?;

        let result = rank_trends(
            &bookings,
            &events,
            &lead_links,
            &labels,
            tenant,
            top_n,
            lookback,
        );
        tracing::info!(
            tenant = tenant.unwrap_or("all"),
            products = result.top_booked.len(),
            "trend snapshot computed"
        );
        Ok(result)
    }

    /// The tenant dashboard snapshot: independent counting/sum queries, all
    /// logically parallel.
    pub async fn dashboard_kpis(&self, tenant: &str) -> Result<DashboardKpis, AnalyticsError> {
        self.overview(Some(tenant)).await
    }

    /// The platform snapshot: the dashboard shape unscoped, plus tenant and
    /// membership counts.
    pub async fn platform_kpis(&self) -> Result<PlatformKpis, AnalyticsError> {
        let (overview, dealers, financiers, members) = try_join!(
            self.overview(None),
            self.count(
                RecordKind::Tenants,
                FetchStage::Tenants,
                self.live()
                    .field_eq("kind", "DEALER")
                    .field_eq("status", "ACTIVE"),
            ),
            self.count(
                RecordKind::Tenants,
                FetchStage::Tenants,
                self.live()
                    .field_eq("kind", "FINANCIER")
                    .field_eq("status", "ACTIVE"),
            ),
            self.count(RecordKind::Members, FetchStage::Members, self.live()),
        )?;

        Ok(PlatformKpis {
            leads_total: overview.leads_total,
            leads_today: overview.leads_today,
            quotes_total: overview.quotes_total,
            quotes_pending: overview.quotes_pending,
            bookings_total: overview.bookings_total,
            bookings_value: overview.bookings_value,
            deliveries_total: overview.deliveries_total,
            deliveries_pdi_ready: overview.deliveries_pdi_ready,
            payments_total: overview.payments_total,
            payments_today: overview.payments_today,
            insurance_total: overview.insurance_total,
            insurance_pending: overview.insurance_pending,
            feedback_count: overview.feedback_count,
            average_nps: overview.average_nps,
            active_dealer_tenants: dealers,
            active_financier_tenants: financiers,
            total_members: members,
        })
    }

    async fn overview(&self, tenant: Option<&str>) -> Result<DashboardKpis, AnalyticsError> {
        let today = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
        let scoped = |filter: RecordFilter| filter.tenant_opt(tenant);

        let (
            leads_total,
            leads_today,
            quotes_total,
            quotes_pending,
            bookings_total,
            booking_rows,
            deliveries_total,
            deliveries_pdi_ready,
            payments_total,
            payments_today,
            insurance_rows,
            feedback_rows,
        ) = try_join!(
            self.count(RecordKind::Leads, FetchStage::Leads, scoped(self.live())),
            self.count(
                RecordKind::Leads,
                FetchStage::Leads,
                scoped(self.live()).created_after(today),
            ),
            self.count(RecordKind::Quotes, FetchStage::Quotes, scoped(self.live())),
            self.count(
                RecordKind::Quotes,
                FetchStage::Quotes,
                scoped(self.live()).field_eq("status", "PENDING"),
            ),
            self.count(
                RecordKind::Bookings,
                FetchStage::Bookings,
                scoped(self.live()),
            ),
            self.fetch(
                RecordKind::Bookings,
                FetchStage::Bookings,
                scoped(RecordFilter::new()),
            ),
            self.count(
                RecordKind::Bookings,
                FetchStage::Bookings,
                scoped(self.live()).field_eq("stage", Stage::Delivered.label()),
            ),
            self.count(
                RecordKind::Bookings,
                FetchStage::Bookings,
                scoped(self.live())
                    .field_eq("stage", Stage::Delivery.label())
                    .field_eq("pdi_status", "PASSED"),
            ),
            self.count(
                RecordKind::Payments,
                FetchStage::Payments,
                scoped(self.live()),
            ),
            self.count(
                RecordKind::Payments,
                FetchStage::Payments,
                scoped(self.live()).created_after(today),
            ),
            self.fetch(
                RecordKind::Bookings,
                FetchStage::Bookings,
                scoped(RecordFilter::new()).field_eq("stage", Stage::Insurance.label()),
            ),
            self.fetch(
                RecordKind::Feedback,
                FetchStage::Feedback,
                scoped(RecordFilter::new()),
            ),
        )?;

        let bookings: Vec<BookingRecord> = decode_rows(booking_rows);
        let bookings_value: f64 = bookings
            .iter()
            .filter(|booking| !booking.is_deleted)
            .map(|booking| booking.total_amount)
            .sum();

        let insurance_bookings: Vec<BookingRecord> = decode_rows(insurance_rows);
        let insurance_live: Vec<&BookingRecord> = insurance_bookings
            .iter()
            .filter(|booking| !booking.is_deleted)
            .collect();
        let insurance_total = insurance_live.len() as u64;
        let insurance_pending = insurance_live
            .iter()
            .filter(|booking| {
                let status = normalize_status(&booking.insurance_status);
                !INSURANCE_DONE_STATUSES.contains(&status.as_str())
            })
            .count() as u64;

        let feedback: Vec<FeedbackRecord> = decode_rows(feedback_rows);
        let live_feedback: Vec<&FeedbackRecord> = feedback
            .iter()
            .filter(|entry| !entry.is_deleted)
            .collect();
        let positive_scores: Vec<f64> = live_feedback
            .iter()
            .filter_map(|entry| entry.nps_score)
            .filter(|score| *score > 0.0)
            .collect();
        let average_nps = if positive_scores.is_empty() {
            None
        } else {
            let sum: f64 = positive_scores.iter().sum();
            Some((sum / positive_scores.len() as f64 * 10.0).round() / 10.0)
        };

        Ok(DashboardKpis {
            leads_total,
            leads_today,
            quotes_total,
            quotes_pending,
            bookings_total,
            bookings_value: bookings_value.round() as i64,
            deliveries_total,
            deliveries_pdi_ready,
            payments_total,
            payments_today,
            insurance_total,
            insurance_pending,
            feedback_count: live_feedback.len() as u64,
            average_nps,
        })
    }

    async fn resolve_lead_links(
        &self,
        events: &[AnalyticsEvent],
    ) -> Result<HashMap<String, String>, AnalyticsError> {
        let lead_ids: BTreeSet<String> = events
            .iter()
            .filter(|event| !event.is_deleted)
            .filter_map(|event| event.metadata.lead_id.clone())
            .collect();
        if lead_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = self
            .fetch(
                RecordKind::LeadTenantLinks,
                FetchStage::LeadTenantLinks,
                RecordFilter::new().field_in("lead_id", lead_ids),
            )
            .await?;
        let links: Vec<LeadTenantLink> = decode_rows(rows);
        Ok(links
            .iter()
            .filter(|link| !link.is_deleted)
            .filter_map(|link| {
                link.owning_tenant()
                    .map(|tenant| (link.lead_id.clone(), tenant.to_string()))
            })
            .collect())
    }

    /// Counting queries push the soft-delete predicate down to the source;
    /// fetch-based aggregations re-check the flag after decoding instead.
    fn live(&self) -> RecordFilter {
        RecordFilter::new().field_eq("is_deleted", false)
    }

    async fn fetch(
        &self,
        kind: RecordKind,
        stage: FetchStage,
        filter: RecordFilter,
    ) -> Result<Vec<Value>, AnalyticsError> {
        self.fetcher
            .fetch(kind, filter)
            .await
            .map_err(|source| AnalyticsError::fetch(stage, source))
    }

    async fn count(
        &self,
        kind: RecordKind,
        stage: FetchStage,
        filter: RecordFilter,
    ) -> Result<u64, AnalyticsError> {
        self.fetcher
            .count(kind, filter)
            .await
            .map_err(|source| AnalyticsError::fetch(stage, source))
    }
}
