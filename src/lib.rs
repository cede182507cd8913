//! Analytics aggregation engine for dealership operations.
//!
//! Turns raw, unnormalized transactional rows (bookings, payments, finance
//! attempts, inventory, purchase orders, feedback, behavioral events) into
//! consistent KPIs: pipeline-stage funnel counts, financial rollups, and
//! ranked product-trend lists. Pure per invocation; the only effect is
//! reading through the [`analytics::RecordFetcher`] seam.

pub mod analytics;
pub mod config;
pub mod error;
pub mod telemetry;

pub use analytics::{AnalyticsEngine, DashboardKpis, FunnelResult, PlatformKpis, Stage,
    TrendsResult, WalletResult};
pub use config::AnalyticsConfig;
pub use error::{AnalyticsError, FetchStage};
