//! Provider-agnostic fleet scan engine
//!
//! Control flow: [`planner::plan`] builds tasks, the [`executor::Executor`]
//! dispatches each to a [`executor::TaskRunner`] (federate, then collect and
//! enrich), results stream into the [`aggregator::Aggregator`], and the
//! finalized report goes to a [`sink::ReportSink`]. [`pipeline::ScanPipeline`]
//! wires these together.

pub mod aggregator;
pub mod collector;
pub mod enrich;
pub mod executor;
pub mod pipeline;
pub mod planner;
pub mod provider;
pub mod runner;
pub mod sink;

pub use aggregator::Aggregator;
pub use collector::{CollectorSettings, TargetCollector};
pub use executor::{ExecutionStatus, Executor, ExecutorConfig, TaskRunner};
pub use pipeline::{RunOutcome, ScanPipeline};
pub use planner::{plan, ScanPlan};
pub use provider::{CallerIdentity, CloudInventory, CredentialFederator, InventoryConnector};
pub use runner::ScanRunner;
pub use sink::{CsvFileSink, FanoutSink, ReportSink};
