use std::sync::Arc;

use tracing::{debug, warn};
use zoe_domain::Execution;
use zoe_driver::{ClusterDriver, ClusterInfo, SpawnOptions};
use zoe_store::StateStore;

use crate::error::MaterializeError;

/// Interpolates `{execution_name}`, `{user_name}`, `{deployment_name}` tokens
/// in a declared environment value.
fn interpolate(template: &str, execution_name: &str, user_name: &str, deployment_name: &str) -> String {
    template
        .replace("{execution_name}", execution_name)
        .replace("{user_name}", user_name)
        .replace("{deployment_name}", deployment_name)
}

fn preflight(execution: &Execution, cluster: &ClusterInfo) -> Result<(), MaterializeError> {
    let total_memory: u64 = execution
        .description
        .services
        .iter()
        .map(|s| s.required_resources.memory)
        .sum();
    let service_count = execution.description.services.len() as u64;

    if total_memory > cluster.memory_total {
        return Err(MaterializeError::FatalStart(format!(
            "required memory {total_memory} exceeds cluster capacity {}",
            cluster.memory_total
        )));
    }
    if service_count > cluster.cores_total {
        return Err(MaterializeError::FatalStart(format!(
            "service count {service_count} exceeds cluster core capacity {}",
            cluster.cores_total
        )));
    }
    Ok(())
}

/// C4 spawn algorithm (§4.4): pre-flight, then spawn each service in
/// declaration order, rolling back all already-spawned siblings on the first
/// failure.
pub async fn spawn(
    store: &Arc<dyn StateStore>,
    driver: &Arc<dyn ClusterDriver>,
    execution: &Execution,
    user_name: &str,
    deployment_name: &str,
) -> Result<(), MaterializeError> {
    let cluster = driver.info().await.map_err(|e| {
        MaterializeError::TransientStart(format!("cluster info unavailable: {e}"))
    })?;
    preflight(execution, &cluster)?;

    for service in &execution.services {
        let environment: Vec<(String, String)> = service
            .description
            .environment
            .iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    interpolate(v, &execution.name, user_name, deployment_name),
                )
            })
            .collect();

        let opts = SpawnOptions {
            environment,
            volume_binds: Vec::new(),
            memory_limit: service.description.required_resources.memory,
            command: service.description.command.clone(),
            network: String::new(),
            volumes: Vec::new(),
        };

        debug!(execution_id = %execution.id, service = %service.name, "materialize: spawning");
        match driver.spawn(&service.description.image, &opts).await {
            Ok(result) => {
                store.set_cluster_id(service.id, Some(result.cluster_id)).await?;
                store.set_ip(service.id, result.ip).await?;
            }
            Err(err) => {
                warn!(execution_id = %execution.id, service = %service.name, error = %err, "materialize: spawn failed, rolling back");
                rollback(store, driver, execution).await;
                return Err(if err.is_transient() {
                    MaterializeError::TransientStart(err.to_string())
                } else {
                    MaterializeError::FatalStart(err.to_string())
                });
            }
        }
    }

    Ok(())
}

async fn rollback(store: &Arc<dyn StateStore>, driver: &Arc<dyn ClusterDriver>, execution: &Execution) {
    for service in &execution.services {
        if let Some(cluster_id) = &service.cluster_id {
            if let Err(err) = driver.terminate(cluster_id).await {
                warn!(service = %service.name, error = %err, "materialize: rollback terminate failed");
            }
        }
        if let Err(err) = store.set_cluster_id(service.id, None).await {
            warn!(service = %service.name, error = %err, "materialize: rollback store update failed");
        }
    }
}

/// C4 teardown algorithm (§4.4): terminate every service with a non-null
/// `cluster_id`, attempting all of them even if some fail.
pub async fn teardown(
    store: &Arc<dyn StateStore>,
    driver: &Arc<dyn ClusterDriver>,
    execution: &Execution,
) -> Result<(), MaterializeError> {
    let mut failures = Vec::new();

    for service in &execution.services {
        let Some(cluster_id) = &service.cluster_id else {
            continue;
        };
        if let Err(err) = driver.terminate(cluster_id).await {
            warn!(service = %service.name, error = %err, "materialize: teardown terminate failed");
            failures.push(format!("{}: {}", service.name, err));
            continue;
        }
        store
            .set_cluster_status(service.id, zoe_domain::ClusterStatus::Destroyed)
            .await?;
        store.set_cluster_id(service.id, None).await?;
        store.set_ip(service.id, None).await?;
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(MaterializeError::FatalStart(format!(
            "teardown failed for: {}",
            failures.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zoe_domain::{ApplicationDescription, RequiredResources, ServiceSpec};
    use zoe_driver::LocalDriver;
    use zoe_store::InMemoryStore;

    fn app(memory: u64) -> ApplicationDescription {
        ApplicationDescription {
            name: "test-app".into(),
            version: 1,
            will_end: false,
            priority: 0,
            requires_binary: false,
            services: vec![
                ServiceSpec {
                    name: "monitor".into(),
                    image: "image:latest".into(),
                    monitor: true,
                    required_resources: RequiredResources { memory },
                    environment: vec![("NAME".into(), "{execution_name}".into())],
                    command: None,
                    ports: vec![],
                },
                ServiceSpec {
                    name: "worker".into(),
                    image: "image:latest".into(),
                    monitor: false,
                    required_resources: RequiredResources { memory },
                    environment: vec![],
                    command: None,
                    ports: vec![],
                },
            ],
        }
    }

    #[tokio::test]
    async fn spawn_populates_cluster_ids() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStore::new());
        let driver: Arc<dyn ClusterDriver> = Arc::new(LocalDriver::new());

        let id = store
            .execution_new("exec1", zoe_domain::UserId(1), app(1024 * 1024 * 1024))
            .await
            .unwrap();
        let execution = store.execution_get(id).await.unwrap().unwrap();

        spawn(&store, &driver, &execution, "alice", "dev").await.unwrap();

        let updated = store.execution_get(id).await.unwrap().unwrap();
        assert!(updated.services.iter().all(|s| s.cluster_id.is_some()));
    }

    #[tokio::test]
    async fn fatal_preflight_rejects_oversized_request() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStore::new());
        let driver: Arc<dyn ClusterDriver> = Arc::new(LocalDriver::new());

        let id = store
            .execution_new("exec2", zoe_domain::UserId(1), app(1_000_000_000_000_000))
            .await
            .unwrap();
        let execution = store.execution_get(id).await.unwrap().unwrap();

        let result = spawn(&store, &driver, &execution, "alice", "dev").await;
        assert!(matches!(result, Err(MaterializeError::FatalStart(_))));
    }

    #[tokio::test]
    async fn transient_spawn_failure_rolls_back_siblings() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStore::new());
        let local = LocalDriver::new();
        local
            .queue_spawn_failure(zoe_driver::DriverError::Transient("busy".into()))
            .await;
        let driver: Arc<dyn ClusterDriver> = Arc::new(local);

        let id = store
            .execution_new("exec3", zoe_domain::UserId(1), app(1024 * 1024 * 1024))
            .await
            .unwrap();
        let execution = store.execution_get(id).await.unwrap().unwrap();

        let result = spawn(&store, &driver, &execution, "alice", "dev").await;
        assert!(matches!(result, Err(MaterializeError::TransientStart(_))));

        let updated = store.execution_get(id).await.unwrap().unwrap();
        assert!(updated.services.iter().all(|s| s.cluster_id.is_none()));
    }
}
