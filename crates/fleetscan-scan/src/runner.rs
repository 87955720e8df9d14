//! Task runner: federate, collect, and fold any error into a failed result

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info, info_span, Instrument};

use fleetscan_common::model::{EnrichedNodeRow, ScanResult, ScanTask};
use fleetscan_common::retry::retry_transient;
use fleetscan_common::{classify, Error, Result, ScanPolicy};

use crate::collector::TargetCollector;
use crate::enrich::RowContext;
use crate::executor::TaskRunner;
use crate::provider::{CredentialFederator, InventoryConnector};

/// Production [`TaskRunner`] built from the provider seams
pub struct ScanRunner {
    federator: Arc<dyn CredentialFederator>,
    connector: Arc<dyn InventoryConnector>,
    collector: TargetCollector,
    policy: ScanPolicy,
    audit_time: DateTime<Utc>,
}

impl ScanRunner {
    /// Create a runner. `audit_time` is stamped on every row of the run.
    pub fn new(
        federator: Arc<dyn CredentialFederator>,
        connector: Arc<dyn InventoryConnector>,
        collector: TargetCollector,
        policy: ScanPolicy,
        audit_time: DateTime<Utc>,
    ) -> Self {
        Self {
            federator,
            connector,
            collector,
            policy,
            audit_time,
        }
    }

    async fn try_run(&self, task: &ScanTask) -> Result<Vec<EnrichedNodeRow>> {
        let credential = retry_transient(&self.collector.settings().retry, "sts:AssumeRole", || {
            self.federator
                .acquire(&task.tenant_id, &task.role_name, &task.region)
        })
        .await?;

        let budget = credential.remaining(Utc::now());
        let inventory = self.connector.connect(&credential);
        let ctx = RowContext {
            tenant_id: task.tenant_id.clone(),
            tenant_name: task.tenant_id.clone(),
            region: task.region.clone(),
            policy: self.policy,
            now: self.audit_time,
        };

        tokio::time::timeout(budget, self.collector.collect(task, inventory.as_ref(), ctx))
            .await
            .map_err(|_| {
                Error::api_with_code(
                    "scan task",
                    "ExpiredToken",
                    format!(
                        "credential lifetime ({}s) ran out before the task finished",
                        budget.as_secs()
                    ),
                )
            })?
    }
}

#[async_trait]
impl TaskRunner for ScanRunner {
    async fn run(&self, task: ScanTask) -> ScanResult {
        let span = info_span!("scan_task", tenant = %task.tenant_id, region = %task.region);
        async {
            match self.try_run(&task).await {
                Ok(rows) => {
                    info!(rows = rows.len(), "Task complete");
                    ScanResult::success(task, rows)
                }
                Err(e) => {
                    let detail = classify(&e);
                    error!(category = %detail.category, error = %detail.message, "Task failed");
                    ScanResult::failure(task, detail)
                }
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::CollectorSettings;
    use crate::provider::{CallerIdentity, CloudInventory, MockCloudInventory, MockCredentialFederator};
    use chrono::TimeZone;
    use fleetscan_common::model::{ClusterDescriptor, FailedTask, NodeRecord};
    use fleetscan_common::retry::RetryConfig;
    use fleetscan_common::{CredentialHandle, FailureCategory};
    use std::collections::HashMap;
    use std::time::Duration;

    const TENANT: &str = "123456789012";
    const OTHER: &str = "210987654321";

    fn audit_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    /// Hands out a prepared inventory per (tenant, region)
    struct FakeConnector {
        inventories: HashMap<(String, String), Arc<MockCloudInventory>>,
    }

    impl InventoryConnector for FakeConnector {
        fn connect(&self, credential: &CredentialHandle) -> Arc<dyn CloudInventory> {
            let key = (
                credential.tenant_id().to_string(),
                credential.region().to_string(),
            );
            self.inventories
                .get(&key)
                .cloned()
                .map(|inv| inv as Arc<dyn CloudInventory>)
                .unwrap_or_else(|| Arc::new(MockCloudInventory::new()))
        }
    }

    fn federator_allowing(tenants: &'static [&'static str]) -> MockCredentialFederator {
        let mut fed = MockCredentialFederator::new();
        fed.expect_acquire().returning(move |tenant, role, region| {
            if tenants.contains(&tenant) {
                Ok(CredentialHandle::ambient(tenant, region, role, Utc::now()))
            } else {
                Err(Error::federation(
                    tenant,
                    role,
                    Some("AccessDenied".to_string()),
                    "not authorized to perform sts:AssumeRole",
                ))
            }
        });
        fed
    }

    fn base_inventory(tenant: &'static str, clusters: Vec<&'static str>) -> MockCloudInventory {
        let mut inv = MockCloudInventory::new();
        inv.expect_caller_identity().returning(move || {
            Ok(CallerIdentity {
                account: tenant.to_string(),
                arn: format!("arn:aws:sts::{tenant}:assumed-role/Audit/fleetscan-{tenant}"),
            })
        });
        inv.expect_tenant_alias().returning(|| Ok(None));
        inv.expect_list_clusters()
            .returning(move || Ok(clusters.iter().map(|c| c.to_string()).collect()));
        inv.expect_describe_cluster().returning(|name| {
            Ok(ClusterDescriptor {
                name: name.to_string(),
                version: Some("1.30".to_string()),
                endpoint: None,
            })
        });
        inv.expect_recommended_image().returning(|_, _| Ok(None));
        inv.expect_newest_catalog_version().returning(|v| Ok(Some(v)));
        inv.expect_describe_images().returning(|_| Ok(HashMap::new()));
        inv.expect_node_readiness().returning(|_| Ok(HashMap::new()));
        inv
    }

    fn running(ids: &[&str]) -> Vec<NodeRecord> {
        ids.iter()
            .map(|id| NodeRecord {
                instance_id: id.to_string(),
                image_id: Some("ami-1".to_string()),
                instance_class: Some("t3.large".to_string()),
                lifecycle_state: "running".to_string(),
                launch_time: None,
                image: None,
            })
            .collect()
    }

    fn runner(federator: MockCredentialFederator, connector: FakeConnector) -> ScanRunner {
        let settings = CollectorSettings {
            retry: RetryConfig {
                max_attempts: 2,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                backoff_multiplier: 2.0,
            },
            ..Default::default()
        };
        ScanRunner::new(
            Arc::new(federator),
            Arc::new(connector),
            TargetCollector::new(settings),
            ScanPolicy::default(),
            audit_time(),
        )
    }

    /// Story: one tenant in two regions, one with a two-node cluster and one
    /// with no clusters, yields exactly two rows, both owned by that tenant.
    #[tokio::test]
    async fn story_one_tenant_two_regions() {
        let mut east = base_inventory(TENANT, vec!["core"]);
        east.expect_running_nodes()
            .returning(|_| Ok(running(&["i-1", "i-2"])));
        let west = base_inventory(TENANT, vec![]);

        let connector = FakeConnector {
            inventories: HashMap::from([
                ((TENANT.to_string(), "us-east-1".to_string()), Arc::new(east)),
                ((TENANT.to_string(), "us-west-2".to_string()), Arc::new(west)),
            ]),
        };
        let runner = runner(federator_allowing(&[TENANT]), connector);

        let a = runner.run(ScanTask::new(TENANT, "us-east-1", "Audit")).await;
        let b = runner.run(ScanTask::new(TENANT, "us-west-2", "Audit")).await;

        assert!(a.is_success() && b.is_success());
        let rows: Vec<_> = a.rows().iter().chain(b.rows()).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.tenant_id == TENANT && r.region == "us-east-1"));
        assert_eq!(rows[0].audit_timestamp, audit_time());
    }

    /// Story: a trust-policy denial fails only that task, with a hint
    #[tokio::test]
    async fn story_access_denied_fails_only_that_task() {
        let mut ok = base_inventory(TENANT, vec!["core"]);
        ok.expect_running_nodes().returning(|_| Ok(running(&["i-1"])));
        let connector = FakeConnector {
            inventories: HashMap::from([(
                (TENANT.to_string(), "us-east-1".to_string()),
                Arc::new(ok),
            )]),
        };
        let runner = runner(federator_allowing(&[TENANT]), connector);

        let denied = runner.run(ScanTask::new(OTHER, "us-east-1", "Audit")).await;
        let allowed = runner.run(ScanTask::new(TENANT, "us-east-1", "Audit")).await;

        assert!(!denied.is_success());
        assert!(denied.rows().is_empty());
        let detail = denied.error_detail().unwrap();
        assert_eq!(detail.category, FailureCategory::AccessDenied);
        assert!(detail.message.contains("trust policy"));
        assert!(detail.message.contains(OTHER));

        assert!(allowed.is_success());
        assert_eq!(allowed.rows().len(), 1);

        let failed = FailedTask {
            task: denied.task.clone(),
            detail: detail.clone(),
        };
        assert_eq!(failed.task.tenant_id, OTHER);
    }

    #[tokio::test]
    async fn test_transient_federation_failure_retried_once() {
        let mut fed = MockCredentialFederator::new();
        let mut calls = 0;
        fed.expect_acquire()
            .times(2)
            .returning(move |tenant, role, region| {
                calls += 1;
                if calls == 1 {
                    Err(Error::federation(
                        tenant,
                        role,
                        Some("Throttling".to_string()),
                        "rate exceeded",
                    ))
                } else {
                    Ok(CredentialHandle::ambient(tenant, region, role, Utc::now()))
                }
            });
        let inv = base_inventory(TENANT, vec![]);
        let connector = FakeConnector {
            inventories: HashMap::from([(
                (TENANT.to_string(), "eu-west-1".to_string()),
                Arc::new(inv),
            )]),
        };

        let result = runner(fed, connector)
            .run(ScanTask::new(TENANT, "eu-west-1", "Audit"))
            .await;
        assert!(result.is_success());
        assert!(result.rows().is_empty());
    }
}
