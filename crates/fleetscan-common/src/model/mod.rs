//! Data model shared by the scan engine, provider bindings and the CLI

mod inventory;
mod os_family;
mod row;
mod target;
mod version;

pub use inventory::{
    ClusterDescriptor, ClusterEndpoint, ImageMetadata, ImageRecommendation, NodeRecord,
    Readiness, RecommendationSet,
};
pub use os_family::OsFamily;
pub use row::{AggregateReport, EnrichedNodeRow, FailedTask, ScanOutcome, ScanResult};
pub use target::{ScanTask, TenantTarget};
pub use version::PlatformVersion;
