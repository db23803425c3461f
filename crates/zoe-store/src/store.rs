use async_trait::async_trait;
use zoe_domain::{
    ApplicationDescription, ClusterStatus, Execution, ExecutionId, Service, ServiceId, UserId,
};

use crate::error::StoreError;
use crate::filters::{ExecutionFilters, ServiceFilters};

/// C2: durable mapping of executions, services and users; query and transition
/// primitives. Every creation and every state transition is durable before it
/// is observable to other components. Transitions on a single execution are
/// serialized; transitions on different executions may proceed concurrently.
#[async_trait]
pub trait StateStore: Send + Sync + 'static {
    /// Creates the execution (status `SUBMITTED`, `time_submit` set) and one
    /// `Service` row per `ServiceSpec` in `description`, all `inactive`.
    async fn execution_new(
        &self,
        name: &str,
        user_id: UserId,
        description: ApplicationDescription,
    ) -> Result<ExecutionId, StoreError>;

    async fn execution_get(&self, id: ExecutionId) -> Result<Option<Execution>, StoreError>;

    async fn execution_list(
        &self,
        filters: &ExecutionFilters,
    ) -> Result<Vec<Execution>, StoreError>;

    /// Rejects with `ActiveExecutionDelete` if the execution is active (§4.2).
    async fn execution_delete(&self, id: ExecutionId) -> Result<(), StoreError>;

    async fn service_get(&self, id: ServiceId) -> Result<Option<Service>, StoreError>;

    async fn service_list(&self, filters: &ServiceFilters) -> Result<Vec<Service>, StoreError>;

    // ── Execution transition helpers (§4.5's state machine) ─────────────────

    async fn set_scheduled(&self, id: ExecutionId) -> Result<(), StoreError>;

    /// Sets `time_start` the first time this transition actually reaches STARTING.
    async fn set_starting(&self, id: ExecutionId) -> Result<(), StoreError>;

    async fn set_running(&self, id: ExecutionId) -> Result<(), StoreError>;

    async fn set_cleaning_up(&self, id: ExecutionId) -> Result<(), StoreError>;

    /// Sets `time_end`.
    async fn set_terminated(&self, id: ExecutionId) -> Result<(), StoreError>;

    /// Sets `time_end` and `error_message`.
    async fn set_error(&self, id: ExecutionId, message: &str) -> Result<(), StoreError>;

    // ── Service transition helpers ───────────────────────────────────────────

    async fn set_cluster_id(
        &self,
        id: ServiceId,
        cluster_id: Option<String>,
    ) -> Result<(), StoreError>;

    async fn set_ip(&self, id: ServiceId, ip_address: Option<String>) -> Result<(), StoreError>;

    async fn set_cluster_status(
        &self,
        id: ServiceId,
        status: ClusterStatus,
    ) -> Result<(), StoreError>;
}
