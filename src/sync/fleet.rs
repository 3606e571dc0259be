//! Every authorized organization, concurrently

use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::ConfigLoader;
use crate::context::{LogLevel, SyncContext, SyncEvent};
use crate::directory::DirectorySource;
use crate::error::Result;
use crate::platforms::TeamApi;
use crate::types::{FleetSyncResult, OrgSyncResult};

use super::org::OrgSyncOrchestrator;

/// Clients bound to one organization
#[derive(Clone)]
pub struct OrgClients {
    pub api: Arc<dyn TeamApi>,
    pub config: Arc<dyn ConfigLoader>,
}

/// Knows which organizations to sync and how to talk to each
#[async_trait]
pub trait OrgConnector: Send + Sync {
    /// Organizations the sync is authorized for
    async fn organizations(&self) -> Result<Vec<String>>;

    /// Build authenticated clients for one organization
    async fn connect(&self, org: &str) -> Result<OrgClients>;
}

/// Runs an [`OrgSyncOrchestrator`] per organization.
///
/// Each organization runs in its own task. A task that fails to connect,
/// or panics, becomes a `failed` result carrying the correlation id its
/// log lines were tagged with; the other organizations are unaffected.
pub struct FleetSync {
    ctx: SyncContext,
    directory: Arc<dyn DirectorySource>,
    connector: Arc<dyn OrgConnector>,
}

impl FleetSync {
    pub fn new(ctx: SyncContext, directory: Arc<dyn DirectorySource>, connector: Arc<dyn OrgConnector>) -> Self {
        FleetSync {
            ctx,
            directory,
            connector,
        }
    }

    /// Sync every organization. Only a failure to list the organizations
    /// is returned as an error.
    pub async fn run(&self) -> Result<FleetSyncResult> {
        let mut fleet = FleetSyncResult::new(Uuid::new_v4());
        let orgs = self.connector.organizations().await?;
        info!(
            correlation_id = %fleet.correlation_id,
            orgs = orgs.len(),
            "Starting fleet sync"
        );

        let mut tasks: Vec<(String, Uuid, JoinHandle<OrgSyncResult>)> = Vec::new();
        for org in orgs {
            if self.ctx.config.is_ignored_org(&org) {
                info!(org = %org, "Organization is ignored, skipping");
                continue;
            }
            let correlation_id = Uuid::new_v4();
            let handle = tokio::spawn(sync_org(
                self.ctx.clone(),
                self.directory.clone(),
                self.connector.clone(),
                org.clone(),
                correlation_id,
            ));
            tasks.push((org, correlation_id, handle));
        }

        for (org, correlation_id, handle) in tasks {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!(org = %org, correlation_id = %correlation_id, error = %e, "Organization sync task failed");
                    self.ctx.emit(
                        SyncEvent::new(LogLevel::Error, "org_sync", org.as_str(), "failed", correlation_id)
                            .with_detail(e.to_string()),
                    );
                    OrgSyncResult::failed(org, correlation_id, format!("organization sync task failed: {e}"))
                }
            };
            fleet.orgs.push(result);
        }

        let fleet = fleet.finish();
        info!(
            correlation_id = %fleet.correlation_id,
            status = fleet.status.as_str(),
            orgs = fleet.orgs.len(),
            failed = fleet.failed_orgs().count(),
            "Fleet sync finished"
        );
        Ok(fleet)
    }
}

async fn sync_org(
    ctx: SyncContext,
    directory: Arc<dyn DirectorySource>,
    connector: Arc<dyn OrgConnector>,
    org: String,
    correlation_id: Uuid,
) -> OrgSyncResult {
    let clients = match connector.connect(&org).await {
        Ok(clients) => clients,
        Err(e) => {
            error!(org = %org, correlation_id = %correlation_id, error = %e, "Failed to connect to organization");
            ctx.emit(
                SyncEvent::new(LogLevel::Error, "connect", org.as_str(), "failed", correlation_id)
                    .with_detail(e.to_string()),
            );
            return OrgSyncResult::failed(org, correlation_id, e.to_string());
        }
    };

    OrgSyncOrchestrator::new(ctx, directory, clients.api, clients.config)
        .with_correlation_id(correlation_id)
        .run()
        .await
}
