use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use zoe_domain::{
    ApplicationDescription, ClusterStatus, Execution, ExecutionId, ExecutionStatus, Service,
    ServiceId, ServiceStatus, UserId,
};

use crate::error::StoreError;
use crate::filters::{ExecutionFilters, ServiceFilters};
use crate::store::StateStore;

/// Everything about an execution except its services, which are kept in a
/// separate map so per-service transitions don't require rewriting the whole
/// execution row.
#[derive(Debug, Clone)]
struct ExecutionRow {
    id: ExecutionId,
    name: String,
    user_id: UserId,
    description: ApplicationDescription,
    status: ExecutionStatus,
    error_message: Option<String>,
    time_submit: chrono::DateTime<Utc>,
    time_start: Option<chrono::DateTime<Utc>>,
    time_end: Option<chrono::DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Inner {
    next_execution_id: i64,
    next_service_id: i64,
    executions: HashMap<ExecutionId, ExecutionRow>,
    services: HashMap<ServiceId, Service>,
}

impl Inner {
    fn services_of(&self, execution_id: ExecutionId) -> Vec<Service> {
        let mut v: Vec<Service> = self
            .services
            .values()
            .filter(|s| s.execution_id == execution_id)
            .cloned()
            .collect();
        v.sort_by_key(|s| s.id.0);
        v
    }

    fn materialize(&self, row: &ExecutionRow) -> Execution {
        Execution {
            id: row.id.clone(),
            name: row.name.clone(),
            user_id: row.user_id,
            description: row.description.clone(),
            status: row.status,
            error_message: row.error_message.clone(),
            time_submit: row.time_submit,
            time_start: row.time_start,
            time_end: row.time_end,
            services: self.services_of(row.id.clone()),
        }
    }
}

/// In-memory implementation of [`StateStore`]. All data is lost on process
/// exit. Used by every unit/integration test and by `zoe-cli --ephemeral`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStore {
    async fn execution_new(
        &self,
        name: &str,
        user_id: UserId,
        description: ApplicationDescription,
    ) -> Result<ExecutionId, StoreError> {
        let mut guard = self.inner.write().await;
        guard.next_execution_id += 1;
        let id = ExecutionId::new(guard.next_execution_id);

        let row = ExecutionRow {
            id: id.clone(),
            name: name.to_string(),
            user_id,
            description: description.clone(),
            status: ExecutionStatus::Submitted,
            error_message: None,
            time_submit: Utc::now(),
            time_start: None,
            time_end: None,
        };
        guard.executions.insert(id.clone(), row);

        for spec in &description.services {
            guard.next_service_id += 1;
            let sid = ServiceId::new(guard.next_service_id);
            guard.services.insert(
                sid.clone(),
                Service {
                    id: sid,
                    execution_id: id.clone(),
                    user_id,
                    name: spec.name.clone(),
                    description: spec.clone(),
                    cluster_id: None,
                    ip_address: None,
                    zoe_status: ServiceStatus::Inactive,
                    cluster_status: ClusterStatus::Undefined,
                },
            );
        }

        Ok(id)
    }

    async fn execution_get(&self, id: ExecutionId) -> Result<Option<Execution>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.executions.get(&id).map(|row| guard.materialize(row)))
    }

    async fn execution_list(
        &self,
        filters: &ExecutionFilters,
    ) -> Result<Vec<Execution>, StoreError> {
        let guard = self.inner.read().await;
        let mut out: Vec<Execution> = guard
            .executions
            .values()
            .filter(|row| filters.id.as_ref().map_or(true, |id| &row.id == id))
            .filter(|row| {
                filters
                    .user_id
                    .as_ref()
                    .map_or(true, |uid| &row.user_id == uid)
            })
            .filter(|row| {
                filters
                    .status
                    .as_ref()
                    .map_or(true, |status| &row.status == status)
            })
            .map(|row| guard.materialize(row))
            .collect();
        out.sort_by_key(|e| e.id.0);
        Ok(out)
    }

    async fn execution_delete(&self, id: ExecutionId) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        let row = guard
            .executions
            .get(&id)
            .ok_or_else(|| StoreError::ExecutionNotFound(id.to_string()))?;
        if row.status.is_active() {
            return Err(StoreError::ActiveExecutionDelete(id.to_string()));
        }
        guard.executions.remove(&id);
        guard.services.retain(|_, s| s.execution_id != id);
        Ok(())
    }

    async fn service_get(&self, id: ServiceId) -> Result<Option<Service>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.services.get(&id).cloned())
    }

    async fn service_list(&self, filters: &ServiceFilters) -> Result<Vec<Service>, StoreError> {
        let guard = self.inner.read().await;
        let mut out: Vec<Service> = guard
            .services
            .values()
            .filter(|s| filters.id.as_ref().map_or(true, |id| &s.id == id))
            .filter(|s| {
                filters
                    .execution_id
                    .as_ref()
                    .map_or(true, |eid| &s.execution_id == eid)
            })
            .filter(|s| {
                filters
                    .user_id
                    .as_ref()
                    .map_or(true, |uid| &s.user_id == uid)
            })
            .cloned()
            .collect();
        out.sort_by_key(|s| s.id.0);
        Ok(out)
    }

    async fn set_scheduled(&self, id: ExecutionId) -> Result<(), StoreError> {
        self.with_execution(id, |row| row.status = ExecutionStatus::Scheduled)
            .await
    }

    async fn set_starting(&self, id: ExecutionId) -> Result<(), StoreError> {
        self.with_execution(id, |row| {
            row.status = ExecutionStatus::Starting;
            if row.time_start.is_none() {
                row.time_start = Some(Utc::now());
            }
        })
        .await
    }

    async fn set_running(&self, id: ExecutionId) -> Result<(), StoreError> {
        self.with_execution(id, |row| row.status = ExecutionStatus::Running)
            .await
    }

    async fn set_cleaning_up(&self, id: ExecutionId) -> Result<(), StoreError> {
        self.with_execution(id, |row| row.status = ExecutionStatus::CleaningUp)
            .await
    }

    async fn set_terminated(&self, id: ExecutionId) -> Result<(), StoreError> {
        self.with_execution(id, |row| {
            row.status = ExecutionStatus::Terminated;
            row.time_end = Some(Utc::now());
        })
        .await
    }

    async fn set_error(&self, id: ExecutionId, message: &str) -> Result<(), StoreError> {
        self.with_execution(id, |row| {
            row.status = ExecutionStatus::Error;
            row.error_message = Some(message.to_string());
            row.time_end = Some(Utc::now());
        })
        .await
    }

    async fn set_cluster_id(
        &self,
        id: ServiceId,
        cluster_id: Option<String>,
    ) -> Result<(), StoreError> {
        self.with_service(id, |s| {
            s.zoe_status = if cluster_id.is_some() {
                ServiceStatus::Active
            } else {
                ServiceStatus::Inactive
            };
            s.cluster_id = cluster_id;
        })
        .await
    }

    async fn set_ip(&self, id: ServiceId, ip_address: Option<String>) -> Result<(), StoreError> {
        self.with_service(id, |s| s.ip_address = ip_address).await
    }

    async fn set_cluster_status(
        &self,
        id: ServiceId,
        status: ClusterStatus,
    ) -> Result<(), StoreError> {
        self.with_service(id, |s| s.cluster_status = status).await
    }
}

impl InMemoryStore {
    async fn with_execution(
        &self,
        id: ExecutionId,
        f: impl FnOnce(&mut ExecutionRow),
    ) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        let row = guard
            .executions
            .get_mut(&id)
            .ok_or_else(|| StoreError::ExecutionNotFound(id.to_string()))?;
        f(row);
        Ok(())
    }

    async fn with_service(
        &self,
        id: ServiceId,
        f: impl FnOnce(&mut Service),
    ) -> Result<(), StoreError> {
        let mut guard = self.inner.write().await;
        let s = guard
            .services
            .get_mut(&id)
            .ok_or_else(|| StoreError::ServiceNotFound(id.to_string()))?;
        f(s);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zoe_domain::{Endpoint, RequiredResources, ServiceSpec};

    fn app() -> ApplicationDescription {
        ApplicationDescription {
            name: "app".into(),
            version: 1,
            will_end: true,
            priority: 512,
            requires_binary: false,
            services: vec![ServiceSpec {
                name: "s1".into(),
                image: "img".into(),
                monitor: true,
                required_resources: RequiredResources { memory: 1024 },
                environment: vec![],
                command: None,
                ports: vec![Endpoint {
                    name: "p".into(),
                    protocol: "http".into(),
                    port_number: 80,
                    path: None,
                    is_main_endpoint: false,
                }],
            }],
        }
    }

    #[tokio::test]
    async fn new_execution_is_submitted_with_services_seeded() {
        let store = InMemoryStore::new();
        let id = store
            .execution_new("exec-one", UserId(1), app())
            .await
            .unwrap();
        let exec = store.execution_get(id).await.unwrap().unwrap();
        assert_eq!(exec.status, ExecutionStatus::Submitted);
        assert_eq!(exec.services.len(), 1);
        assert_eq!(exec.services[0].zoe_status, ServiceStatus::Inactive);
    }

    #[tokio::test]
    async fn transitions_set_timestamps() {
        let store = InMemoryStore::new();
        let id = store
            .execution_new("exec-two", UserId(1), app())
            .await
            .unwrap();
        store.set_scheduled(id.clone()).await.unwrap();
        store.set_starting(id.clone()).await.unwrap();
        let exec = store.execution_get(id.clone()).await.unwrap().unwrap();
        assert!(exec.time_start.is_some());

        store.set_error(id.clone(), "boom").await.unwrap();
        let exec = store.execution_get(id).await.unwrap().unwrap();
        assert_eq!(exec.status, ExecutionStatus::Error);
        assert_eq!(exec.error_message.as_deref(), Some("boom"));
        assert!(exec.time_end.is_some());
    }

    #[tokio::test]
    async fn delete_rejects_active_execution() {
        let store = InMemoryStore::new();
        let id = store
            .execution_new("exec-three", UserId(1), app())
            .await
            .unwrap();
        let err = store.execution_delete(id.clone()).await.unwrap_err();
        assert!(matches!(err, StoreError::ActiveExecutionDelete(_)));

        store.set_scheduled(id.clone()).await.unwrap();
        store.set_starting(id.clone()).await.unwrap();
        store.set_running(id.clone()).await.unwrap();
        store.set_cleaning_up(id.clone()).await.unwrap();
        store.set_terminated(id.clone()).await.unwrap();
        store.execution_delete(id).await.unwrap();
    }

    #[tokio::test]
    async fn service_transitions_track_cluster_state() {
        let store = InMemoryStore::new();
        let id = store
            .execution_new("exec-four", UserId(1), app())
            .await
            .unwrap();
        let exec = store.execution_get(id).await.unwrap().unwrap();
        let sid = exec.services[0].id.clone();

        store
            .set_cluster_id(sid.clone(), Some("c1".into()))
            .await
            .unwrap();
        store.set_ip(sid.clone(), Some("10.0.0.1".into())).await.unwrap();
        store
            .set_cluster_status(sid.clone(), ClusterStatus::Started)
            .await
            .unwrap();

        let svc = store.service_get(sid).await.unwrap().unwrap();
        assert!(svc.is_spawned());
        assert_eq!(svc.zoe_status, ServiceStatus::Active);
        assert_eq!(svc.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(svc.cluster_status, ClusterStatus::Started);
    }

    #[tokio::test]
    async fn list_filters_by_user() {
        let store = InMemoryStore::new();
        store.execution_new("exec-a", UserId(1), app()).await.unwrap();
        store.execution_new("exec-b", UserId(2), app()).await.unwrap();

        let for_user_1 = store
            .execution_list(&ExecutionFilters::by_user(UserId(1)))
            .await
            .unwrap();
        assert_eq!(for_user_1.len(), 1);
    }
}
