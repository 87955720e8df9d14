//! AWS binding for fleetscan
//!
//! Implements the engine's provider seams over the AWS SDK: STS role
//! federation, EKS/EC2/SSM/IAM inventory, node readiness through each
//! cluster's API with presigned bearer tokens, and S3 report upload.

#![deny(missing_docs)]

pub mod catalog;
pub mod config;
mod error;
pub mod inventory;
pub mod readiness;
pub mod s3;
pub mod sts;
pub mod token;

pub use aws_config::SdkConfig;
pub use config::{load_base_config, scoped_config, DEFAULT_HOME_REGION};
pub use inventory::{AwsConnector, AwsInventory};
pub use readiness::ClusterTimeouts;
pub use s3::{S3Sink, UploadRole};
pub use sts::StsFederator;
