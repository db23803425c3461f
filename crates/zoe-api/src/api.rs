use std::sync::Arc;

use tracing::{debug, info, warn};
use zoe_domain::{
    ApplicationDescription, ClusterStatus, Execution, ExecutionId, ExecutionStatus, Role, Service,
    ServiceId, UserId,
};
use zoe_driver::{ClusterDriver, ClusterInfo, LogStream};
use zoe_scheduler::{Scheduler, SchedulerStats};
use zoe_store::{ExecutionFilters, ServiceFilters, StateStore};

use crate::error::ApiError;

/// §4.6's quota: guests may have at most one active execution at a time.
pub const QUOTA_MAX_APPS_GUESTS: usize = 1;

fn is_authorized(uid: UserId, role: Role, owner: UserId) -> bool {
    role == Role::Admin || uid == owner
}

/// C6: the thin, load-bearing authorization and dispatch layer. Every public
/// operation goes through one of these methods — `is_authorized` backs every
/// by-id/list/terminate/delete/logs check, never reimplemented per-endpoint.
pub struct ApiEndpoint {
    store: Arc<dyn StateStore>,
    scheduler: Arc<Scheduler>,
    driver: Arc<dyn ClusterDriver>,
    deployment_name: String,
}

impl ApiEndpoint {
    pub fn new(
        store: Arc<dyn StateStore>,
        scheduler: Arc<Scheduler>,
        driver: Arc<dyn ClusterDriver>,
        deployment_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            scheduler,
            driver,
            deployment_name: deployment_name.into(),
        }
    }

    pub async fn execution_start(
        &self,
        uid: UserId,
        role: Role,
        user_name: &str,
        name: &str,
        raw_description: &serde_json::Value,
    ) -> Result<ExecutionId, ApiError> {
        zoe_domain::validate_execution_name(name)
            .map_err(|e| ApiError::NameInvalid(e.reason().to_string()))?;

        if role == Role::Guest {
            let active = self
                .store
                .execution_list(&ExecutionFilters::by_user(uid))
                .await?
                .iter()
                .filter(|e| e.status.is_active())
                .count();
            if active >= QUOTA_MAX_APPS_GUESTS {
                return Err(ApiError::QuotaExceeded);
            }
        }

        let description: ApplicationDescription = zoe_domain::validate(raw_description)?;
        let id = self.store.execution_new(name, uid, description).await?;
        self.scheduler.incoming(id, user_name).await;
        debug!(execution_id = %id, user = user_name, "execution_start: enqueued");
        Ok(id)
    }

    pub async fn execution_by_id(&self, uid: UserId, role: Role, id: ExecutionId) -> Result<Execution, ApiError> {
        let execution = self.store.execution_get(id).await?.ok_or(ApiError::NotFound)?;
        if !is_authorized(uid, role, execution.user_id) {
            return Err(ApiError::Forbidden);
        }
        Ok(execution)
    }

    pub async fn execution_list(
        &self,
        uid: UserId,
        role: Role,
        filters: &ExecutionFilters,
    ) -> Result<Vec<Execution>, ApiError> {
        let executions = self.store.execution_list(filters).await?;
        Ok(executions
            .into_iter()
            .filter(|e| is_authorized(uid, role, e.user_id))
            .collect())
    }

    pub async fn execution_terminate(&self, uid: UserId, role: Role, id: ExecutionId) -> Result<(), ApiError> {
        let execution = self.store.execution_get(id).await?.ok_or(ApiError::NotFound)?;
        if !is_authorized(uid, role, execution.user_id) {
            return Err(ApiError::Forbidden);
        }
        if !execution.status.is_active() {
            return Err(ApiError::NotRunning);
        }
        self.scheduler.terminate(id).await;
        Ok(())
    }

    /// If the execution is active, terminates it first and waits for it to
    /// reach TERMINATED before removing it from the store.
    pub async fn execution_delete(&self, uid: UserId, role: Role, id: ExecutionId) -> Result<(), ApiError> {
        let execution = self.store.execution_get(id).await?.ok_or(ApiError::NotFound)?;
        if !is_authorized(uid, role, execution.user_id) {
            return Err(ApiError::Forbidden);
        }

        if execution.status.is_active() {
            self.scheduler.terminate(id).await;
            self.wait_for_terminated(id).await?;
        }

        self.store.execution_delete(id).await?;
        Ok(())
    }

    async fn wait_for_terminated(&self, id: ExecutionId) -> Result<(), ApiError> {
        for _ in 0..600 {
            match self.store.execution_get(id).await? {
                Some(e) if e.status == ExecutionStatus::Terminated => return Ok(()),
                Some(_) => tokio::time::sleep(std::time::Duration::from_millis(50)).await,
                None => return Ok(()),
            }
        }
        Err(ApiError::Internal(format!(
            "execution {id} did not reach TERMINATED within the deletion grace period"
        )))
    }

    pub async fn service_by_id(&self, uid: UserId, role: Role, id: ServiceId) -> Result<Service, ApiError> {
        let service = self.store.service_get(id).await?.ok_or(ApiError::NotFound)?;
        if !is_authorized(uid, role, service.user_id) {
            return Err(ApiError::Forbidden);
        }
        Ok(service)
    }

    pub async fn service_list(
        &self,
        uid: UserId,
        role: Role,
        filters: &ServiceFilters,
    ) -> Result<Vec<Service>, ApiError> {
        let services = self.store.service_list(filters).await?;
        Ok(services
            .into_iter()
            .filter(|s| is_authorized(uid, role, s.user_id))
            .collect())
    }

    pub async fn service_logs(&self, uid: UserId, role: Role, id: ServiceId, stream: bool) -> Result<LogStream, ApiError> {
        let service = self.store.service_get(id).await?.ok_or(ApiError::NotFound)?;
        if !is_authorized(uid, role, service.user_id) {
            return Err(ApiError::Forbidden);
        }
        let cluster_id = service.cluster_id.ok_or(ApiError::NotFound)?;
        self.driver
            .logs(&cluster_id, stream)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))
    }

    pub async fn statistics_scheduler(&self) -> SchedulerStats {
        self.scheduler.stats().await
    }

    /// Periodically re-enqueues executions left in SUBMITTED due to a
    /// transient master outage.
    pub async fn retry_submit_error_executions(&self) -> Result<(), ApiError> {
        let waiting = self
            .store
            .execution_list(&ExecutionFilters::by_status(ExecutionStatus::Submitted))
            .await?;
        let Some(execution) = waiting.into_iter().next() else {
            return Ok(());
        };
        info!(execution_id = %execution.id, "retry_submit_error_executions: resubmitting");
        self.scheduler
            .incoming(execution.id, format!("user-{}", execution.user_id))
            .await;
        Ok(())
    }

    /// For every RUNNING execution, if any `monitor=true` service's
    /// `cluster_status = died`, terminates the whole execution.
    pub async fn cleanup_dead_executions(&self) -> Result<(), ApiError> {
        debug!("cleanup_dead_executions: scanning");
        let executions = self
            .store
            .execution_list(&ExecutionFilters::by_status(ExecutionStatus::Running))
            .await?;

        for execution in executions {
            let monitor_died = execution
                .services
                .iter()
                .any(|s| s.description.monitor && s.cluster_status == ClusterStatus::Died);
            if monitor_died {
                warn!(execution_id = %execution.id, "cleanup_dead_executions: monitor service died, terminating");
                self.scheduler.terminate(execution.id).await;
            }
        }
        Ok(())
    }

    pub async fn cluster_info(&self) -> Result<ClusterInfo, ApiError> {
        self.driver.info().await.map_err(|e| ApiError::Internal(e.to_string()))
    }

    pub fn deployment_name(&self) -> &str {
        &self.deployment_name
    }
}
