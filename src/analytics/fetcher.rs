//! The narrow data-access seam between the engine and whatever datastore
//! backs it. The engine never asks the fetcher for sorting or joins; all
//! joining and ranking happens in-process on the returned rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Entity kinds the engine reads. The fetcher maps these onto collections,
/// tables, or remote endpoints as it sees fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Leads,
    Quotes,
    Bookings,
    Payments,
    FinanceAttempts,
    Stock,
    PurchaseOrders,
    Feedback,
    Events,
    LeadTenantLinks,
    CatalogItems,
    CatalogModels,
    CatalogBrands,
    VehicleVariants,
    AccessoryVariants,
    ServiceVariants,
    Tenants,
    Members,
}

impl RecordKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Leads => "leads",
            Self::Quotes => "quotes",
            Self::Bookings => "bookings",
            Self::Payments => "payments",
            Self::FinanceAttempts => "finance_attempts",
            Self::Stock => "stock",
            Self::PurchaseOrders => "purchase_orders",
            Self::Feedback => "feedback",
            Self::Events => "events",
            Self::LeadTenantLinks => "lead_tenant_links",
            Self::CatalogItems => "catalog_items",
            Self::CatalogModels => "catalog_models",
            Self::CatalogBrands => "catalog_brands",
            Self::VehicleVariants => "vehicle_variants",
            Self::AccessoryVariants => "accessory_variants",
            Self::ServiceVariants => "service_variants",
            Self::Tenants => "tenants",
            Self::Members => "members",
        }
    }
}

/// Declarative filter the fetcher applies at the source. Only the predicates
/// the engine actually needs: tenant equality, creation-time bounds, field
/// equality, field in-set, and a row cap.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub tenant: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub field_eq: Vec<(String, Value)>,
    pub field_in: Vec<(String, Vec<String>)>,
    pub limit: Option<usize>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn tenant_opt(mut self, tenant: Option<&str>) -> Self {
        self.tenant = tenant.map(str::to_string);
        self
    }

    pub fn created_after(mut self, bound: DateTime<Utc>) -> Self {
        self.created_after = Some(bound);
        self
    }

    pub fn created_before(mut self, bound: DateTime<Utc>) -> Self {
        self.created_before = Some(bound);
        self
    }

    pub fn field_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.field_eq.push((field.into(), value.into()));
        self
    }

    pub fn field_in<I, S>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.field_in
            .push((field.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn limit(mut self, cap: usize) -> Self {
        self.limit = Some(cap);
        self
    }
}

/// Failure reported by the record source. The engine never retries; the
/// error propagates and fails the whole snapshot.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("record source unavailable: {0}")]
    Unavailable(String),
    #[error("query rejected by record source: {0}")]
    Rejected(String),
}

/// Storage abstraction so the engine can be exercised against an in-memory
/// source in tests and against the real datastore in production.
#[async_trait]
pub trait RecordFetcher: Send + Sync {
    /// Returns raw, unvalidated rows for `kind` matching `filter`.
    async fn fetch(&self, kind: RecordKind, filter: RecordFilter) -> Result<Vec<Value>, FetchError>;

    /// Cheaper counting variant for plain KPI counting queries.
    async fn count(&self, kind: RecordKind, filter: RecordFilter) -> Result<u64, FetchError>;
}
