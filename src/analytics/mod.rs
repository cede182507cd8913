//! The analytics aggregation engine: stage model, record normalization,
//! funnel/wallet/trend calculators, label resolution, and the KPI facade
//! that fans out the fetches.

pub mod fetcher;
pub mod funnel;
pub mod kpi;
pub mod labels;
pub mod records;
pub mod stage;
pub mod trends;
pub mod wallet;

pub use fetcher::{FetchError, RecordFetcher, RecordFilter, RecordKind};
pub use funnel::{classify_funnel, FunnelResult};
pub use kpi::{AnalyticsEngine, DashboardKpis, PlatformKpis};
pub use labels::LabelResolver;
pub use stage::Stage;
pub use trends::{rank_trends, LookbackDays, TrendRow, TrendsResult};
pub use wallet::{compute_wallet, WalletResult};
