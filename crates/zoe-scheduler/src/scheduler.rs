use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use zoe_domain::ExecutionId;
use zoe_driver::ClusterDriver;
use zoe_store::StateStore;

use crate::error::MaterializeError;
use crate::materialize;

const REAP_TIMEOUT: Duration = Duration::from_secs(1);

/// A queued execution plus the owner's display name, needed for the
/// `{user_name}` environment interpolation token at materialization time.
#[derive(Debug, Clone)]
struct Submission {
    execution_id: ExecutionId,
    user_name: String,
}

struct State {
    queue: VecDeque<Submission>,
    termination_workers: Vec<JoinHandle<()>>,
    shutdown: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerStats {
    pub queue_length: usize,
    pub termination_workers: usize,
}

/// C5: the single long-lived loop that turns queued executions into running
/// ones, plus asynchronous termination workers for the reverse direction.
pub struct Scheduler {
    store: Arc<dyn StateStore>,
    driver: Arc<dyn ClusterDriver>,
    deployment_name: String,
    state: Mutex<State>,
    notify: Notify,
}

impl Scheduler {
    /// Builds the scheduler and spawns its main loop as a `tokio` task.
    /// Returns the shared handle; drop all clones and call `shutdown` to stop
    /// the loop.
    pub fn spawn(
        store: Arc<dyn StateStore>,
        driver: Arc<dyn ClusterDriver>,
        deployment_name: impl Into<String>,
    ) -> Arc<Self> {
        let scheduler = Arc::new(Self {
            store,
            driver,
            deployment_name: deployment_name.into(),
            state: Mutex::new(State {
                queue: VecDeque::new(),
                termination_workers: Vec::new(),
                shutdown: false,
            }),
            notify: Notify::new(),
        });

        let loop_handle = scheduler.clone();
        tokio::spawn(async move { loop_handle.run().await });

        scheduler
    }

    /// Appends to the FIFO queue and wakes the main loop.
    pub async fn incoming(&self, execution_id: ExecutionId, user_name: impl Into<String>) {
        let mut state = self.state.lock().await;
        state.queue.push_back(Submission {
            execution_id,
            user_name: user_name.into(),
        });
        self.notify.notify_one();
    }

    /// Removes `execution_id` from the queue if still present, and spawns an
    /// asynchronous teardown worker regardless (it is a no-op if the
    /// execution never reached STARTING).
    pub async fn terminate(self: &Arc<Self>, execution_id: ExecutionId) {
        {
            let mut state = self.state.lock().await;
            state.queue.retain(|s| s.execution_id != execution_id);
        }

        let this = self.clone();
        let handle = tokio::spawn(async move {
            this.run_termination(execution_id).await;
        });

        let mut state = self.state.lock().await;
        state.termination_workers.push(handle);
    }

    pub async fn stats(&self) -> SchedulerStats {
        let state = self.state.lock().await;
        SchedulerStats {
            queue_length: state.queue.len(),
            termination_workers: state.termination_workers.len(),
        }
    }

    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        state.shutdown = true;
        drop(state);
        self.notify.notify_one();
    }

    async fn run_termination(&self, execution_id: ExecutionId) {
        if let Err(err) = self.store.set_cleaning_up(execution_id).await {
            warn!(%execution_id, error = %err, "scheduler: set_cleaning_up failed");
        }

        match self.store.execution_get(execution_id).await {
            Ok(Some(execution)) => {
                if let Err(err) = materialize::teardown(&self.store, &self.driver, &execution).await {
                    warn!(%execution_id, error = %err, "scheduler: teardown reported failures");
                }
            }
            Ok(None) => warn!(%execution_id, "scheduler: execution vanished before teardown"),
            Err(err) => warn!(%execution_id, error = %err, "scheduler: execution_get failed during teardown"),
        }

        if let Err(err) = self.store.set_terminated(execution_id).await {
            warn!(%execution_id, error = %err, "scheduler: set_terminated failed");
        }

        self.notify.notify_one();
    }

    async fn run(self: Arc<Self>) {
        info!("scheduler: main loop started");
        loop {
            let next = {
                let mut state = self.state.lock().await;
                if state.shutdown {
                    info!("scheduler: shutdown requested, exiting loop");
                    return;
                }
                state.queue.pop_front()
            };

            let Some(submission) = next else {
                match tokio::time::timeout(REAP_TIMEOUT, self.notify.notified()).await {
                    Ok(()) => continue,
                    Err(_elapsed) => {
                        self.reap_termination_workers().await;
                        continue;
                    }
                }
            };

            self.process(submission).await;
        }
    }

    async fn reap_termination_workers(&self) {
        let mut state = self.state.lock().await;
        state.termination_workers.retain(|h| !h.is_finished());
    }

    async fn process(&self, submission: Submission) {
        let execution_id = submission.execution_id;

        if let Err(err) = self.store.set_starting(execution_id).await {
            error!(%execution_id, error = %err, "scheduler: set_starting failed, dropping submission");
            return;
        }

        let execution = match self.store.execution_get(execution_id).await {
            Ok(Some(e)) => e,
            Ok(None) => {
                error!(%execution_id, "scheduler: execution vanished before start");
                return;
            }
            Err(err) => {
                error!(%execution_id, error = %err, "scheduler: execution_get failed");
                return;
            }
        };

        let outcome = materialize::spawn(
            &self.store,
            &self.driver,
            &execution,
            &submission.user_name,
            &self.deployment_name,
        )
        .await;

        match outcome {
            Ok(()) => {
                if let Err(err) = self.store.set_running(execution_id).await {
                    error!(%execution_id, error = %err, "scheduler: set_running failed");
                }
            }
            Err(MaterializeError::TransientStart(msg)) => {
                warn!(%execution_id, msg, "scheduler: transient start failure, requeueing");
                let _ = materialize::teardown(&self.store, &self.driver, &execution).await;
                if let Err(err) = self.store.set_scheduled(execution_id).await {
                    error!(%execution_id, error = %err, "scheduler: set_scheduled failed");
                }
                let mut state = self.state.lock().await;
                state.queue.push_back(submission);
                drop(state);
                self.notify.notify_one();
            }
            Err(MaterializeError::FatalStart(msg)) => {
                error!(%execution_id, msg, "scheduler: fatal start failure");
                let _ = materialize::teardown(&self.store, &self.driver, &execution).await;
                if let Err(err) = self.store.set_error(execution_id, &msg).await {
                    error!(%execution_id, error = %err, "scheduler: set_error failed");
                }
            }
            Err(MaterializeError::Store(store_err)) => {
                error!(%execution_id, error = %store_err, "scheduler: unclassified store failure, treating as fatal");
                let _ = materialize::teardown(&self.store, &self.driver, &execution).await;
                let _ = self.store.set_error(execution_id, &store_err.to_string()).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use zoe_domain::{ApplicationDescription, ExecutionStatus, RequiredResources, ServiceSpec, UserId};
    use zoe_driver::LocalDriver;
    use zoe_store::InMemoryStore;

    fn app(memory: u64) -> ApplicationDescription {
        ApplicationDescription {
            name: "app".into(),
            version: 1,
            will_end: false,
            priority: 0,
            requires_binary: false,
            services: vec![ServiceSpec {
                name: "monitor".into(),
                image: "img".into(),
                monitor: true,
                required_resources: RequiredResources { memory },
                environment: vec![],
                command: None,
                ports: vec![],
            }],
        }
    }

    async fn wait_for_status(store: &Arc<dyn StateStore>, id: ExecutionId, status: ExecutionStatus) {
        for _ in 0..200 {
            if let Some(e) = store.execution_get(id).await.unwrap() {
                if e.status == status {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("execution {id} never reached {status}");
    }

    #[tokio::test]
    async fn happy_path_reaches_running() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStore::new());
        let driver: Arc<dyn ClusterDriver> = Arc::new(LocalDriver::new());
        let scheduler = Scheduler::spawn(store.clone(), driver, "dev");

        let id = store
            .execution_new("e1", UserId(1), app(1024 * 1024 * 1024))
            .await
            .unwrap();
        scheduler.incoming(id, "alice").await;

        wait_for_status(&store, id, ExecutionStatus::Running).await;
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn fatal_start_reaches_error_with_message() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStore::new());
        let driver: Arc<dyn ClusterDriver> = Arc::new(LocalDriver::new());
        let scheduler = Scheduler::spawn(store.clone(), driver, "dev");

        let id = store
            .execution_new("e2", UserId(1), app(1_000_000_000_000_000))
            .await
            .unwrap();
        scheduler.incoming(id, "alice").await;

        wait_for_status(&store, id, ExecutionStatus::Error).await;
        let execution = store.execution_get(id).await.unwrap().unwrap();
        assert!(execution.error_message.is_some());
        assert!(execution.services.iter().all(|s| s.cluster_id.is_none()));
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn terminate_drives_running_execution_to_terminated() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStore::new());
        let driver: Arc<dyn ClusterDriver> = Arc::new(LocalDriver::new());
        let scheduler = Scheduler::spawn(store.clone(), driver, "dev");

        let id = store
            .execution_new("e3", UserId(1), app(1024 * 1024 * 1024))
            .await
            .unwrap();
        scheduler.incoming(id, "alice").await;
        wait_for_status(&store, id, ExecutionStatus::Running).await;

        scheduler.terminate(id).await;
        wait_for_status(&store, id, ExecutionStatus::Terminated).await;
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn stats_reports_queue_and_worker_counts() {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStore::new());
        let driver: Arc<dyn ClusterDriver> = Arc::new(LocalDriver::new());
        let scheduler = Scheduler::spawn(store.clone(), driver, "dev");

        let stats = scheduler.stats().await;
        assert_eq!(stats.queue_length, 0);
        assert_eq!(stats.termination_workers, 0);
        scheduler.shutdown().await;
    }
}
