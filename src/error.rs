use crate::analytics::fetcher::FetchError;

/// The fetch stages a snapshot fans out to. Carried in [`AnalyticsError`] so
/// a failed snapshot names exactly which fetch broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
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
    Catalog,
    CatalogModels,
    CatalogBrands,
    CatalogVariants,
    Tenants,
    Members,
}

impl FetchStage {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Leads => "leads",
            Self::Quotes => "quotes",
            Self::Bookings => "bookings",
            Self::Payments => "payments",
            Self::FinanceAttempts => "finance attempts",
            Self::Stock => "stock",
            Self::PurchaseOrders => "purchase orders",
            Self::Feedback => "feedback",
            Self::Events => "behavioral events",
            Self::LeadTenantLinks => "lead tenant links",
            Self::Catalog => "catalog items",
            Self::CatalogModels => "catalog models",
            Self::CatalogBrands => "catalog brands",
            Self::CatalogVariants => "catalog variants",
            Self::Tenants => "tenants",
            Self::Members => "members",
        }
    }
}

impl std::fmt::Display for FetchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A snapshot either fully succeeds or fails with the stage that broke.
/// Malformed rows, unresolvable references, and undefined ratios are not
/// errors: they degrade locally to defaults, raw identifiers, and `None`.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error("{stage} fetch failed: {source}")]
    Fetch {
        stage: FetchStage,
        #[source]
        source: FetchError,
    },
}

impl AnalyticsError {
    pub fn fetch(stage: FetchStage, source: FetchError) -> Self {
        Self::Fetch { stage, source }
    }

    /// Which fetch stage failed, for callers that branch on it.
    pub fn stage(&self) -> FetchStage {
        match self {
            Self::Fetch { stage, .. } => *stage,
        }
    }
}
