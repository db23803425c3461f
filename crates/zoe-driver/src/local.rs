use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use zoe_domain::ClusterStatus as ServiceClusterStatus;

use crate::driver::{ClusterDriver, ClusterInfo, InspectResult, LogLine, LogStream, SpawnOptions, SpawnResult};
use crate::error::DriverError;

#[derive(Debug, Clone)]
struct Container {
    ip: String,
    status: ServiceClusterStatus,
}

struct Inner {
    next_id: u64,
    containers: HashMap<String, Container>,
    /// Errors to return on the next N `spawn` calls, in order; drained FIFO.
    /// Grounds S2 (transient failure on the first call, success thereafter)
    /// and similar scripted-failure scenarios without a real daemon.
    spawn_failures: VecDeque<DriverError>,
    info: ClusterInfo,
}

/// A stub cluster driver that simulates container spawn/inspect/terminate
/// locally, with no actual container runtime. Used by every scheduler/
/// materializer test and by `zoe-cli --cluster local` for single-node
/// development.
#[derive(Clone)]
pub struct LocalDriver {
    inner: Arc<RwLock<Inner>>,
}

impl Default for LocalDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalDriver {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                next_id: 0,
                containers: HashMap::new(),
                spawn_failures: VecDeque::new(),
                info: ClusterInfo {
                    containers: 0,
                    images: 0,
                    memory_total: 16 * 1024 * 1024 * 1024,
                    cores_total: 4,
                    placement_strategy: "spread".into(),
                    active_filters: vec!["health".into(), "port".into()],
                },
            })),
        }
    }

    pub async fn set_cluster_info(&self, info: ClusterInfo) {
        self.inner.write().await.info = info;
    }

    /// Queue an error to be returned by the next `spawn` call instead of
    /// succeeding. Errors are consumed in the order queued.
    pub async fn queue_spawn_failure(&self, err: DriverError) {
        self.inner.write().await.spawn_failures.push_back(err);
    }
}

#[async_trait]
impl ClusterDriver for LocalDriver {
    async fn info(&self) -> Result<ClusterInfo, DriverError> {
        Ok(self.inner.read().await.info.clone())
    }

    async fn spawn(&self, image: &str, opts: &SpawnOptions) -> Result<SpawnResult, DriverError> {
        let mut guard = self.inner.write().await;
        if let Some(err) = guard.spawn_failures.pop_front() {
            debug!(image, "LocalDriver: scripted spawn failure");
            return Err(err);
        }

        guard.next_id += 1;
        let cluster_id = format!("local-{}", guard.next_id);
        let ip = format!("10.0.{}.{}", (guard.next_id / 254) % 254, guard.next_id % 254 + 1);
        debug!(image, cluster_id, memory_limit = opts.memory_limit, "LocalDriver: spawn");
        guard.containers.insert(
            cluster_id.clone(),
            Container {
                ip: ip.clone(),
                status: ServiceClusterStatus::Started,
            },
        );
        Ok(SpawnResult {
            cluster_id,
            ip: Some(ip),
        })
    }

    async fn inspect(&self, cluster_id: &str) -> Result<InspectResult, DriverError> {
        let guard = self.inner.read().await;
        match guard.containers.get(cluster_id) {
            Some(c) => Ok(InspectResult {
                ip: Some(c.ip.clone()),
                cluster_status: c.status,
            }),
            None => Ok(InspectResult {
                ip: None,
                cluster_status: ServiceClusterStatus::Undefined,
            }),
        }
    }

    async fn terminate(&self, cluster_id: &str) -> Result<(), DriverError> {
        debug!(cluster_id, "LocalDriver: terminate");
        self.inner.write().await.containers.remove(cluster_id);
        Ok(())
    }

    async fn logs(&self, cluster_id: &str, _stream: bool) -> Result<LogStream, DriverError> {
        let lines = vec![
            Ok(LogLine {
                timestamp: Some(chrono::Utc::now()),
                line: format!("{cluster_id}: starting up"),
            }),
            Ok(LogLine {
                timestamp: Some(chrono::Utc::now()),
                line: format!("{cluster_id}: ready"),
            }),
        ];
        Ok(Box::pin(tokio_stream::iter(lines)))
    }
}
