use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_stream::Stream;
use zoe_domain::ClusterStatus as ServiceClusterStatus;

use crate::error::DriverError;

/// Cluster-wide status, as reported by `ClusterDriver::info`.
#[derive(Debug, Clone)]
pub struct ClusterInfo {
    pub containers: u64,
    pub images: u64,
    pub memory_total: u64,
    pub cores_total: u64,
    pub placement_strategy: String,
    pub active_filters: Vec<String>,
}

/// Arguments to `ClusterDriver::spawn`.
#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
    pub environment: Vec<(String, String)>,
    pub volume_binds: Vec<String>,
    pub memory_limit: u64,
    pub command: Option<String>,
    /// Defaults to `"bridge"` if left empty.
    pub network: String,
    pub volumes: Vec<String>,
}

/// Result of a successful `spawn`.
#[derive(Debug, Clone)]
pub struct SpawnResult {
    pub cluster_id: String,
    pub ip: Option<String>,
}

/// Result of `inspect`.
#[derive(Debug, Clone)]
pub struct InspectResult {
    pub ip: Option<String>,
    pub cluster_status: ServiceClusterStatus,
}

/// One line read back from `logs`.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub timestamp: Option<DateTime<Utc>>,
    pub line: String,
}

pub type LogStream = Pin<Box<dyn Stream<Item = Result<LogLine, DriverError>> + Send>>;

/// C3: the thin, failure-prone boundary against the container platform
/// (a Docker Swarm or equivalent). Every method is async since a real
/// implementation talks to a remote daemon over HTTP.
#[async_trait]
pub trait ClusterDriver: Send + Sync + 'static {
    async fn info(&self) -> Result<ClusterInfo, DriverError>;

    async fn spawn(&self, image: &str, opts: &SpawnOptions) -> Result<SpawnResult, DriverError>;

    async fn inspect(&self, cluster_id: &str) -> Result<InspectResult, DriverError>;

    /// Idempotent: terminating a non-existent container is success.
    async fn terminate(&self, cluster_id: &str) -> Result<(), DriverError>;

    /// When `stream` is true, the returned stream yields new lines until the
    /// container dies or the caller stops polling it.
    async fn logs(&self, cluster_id: &str, stream: bool) -> Result<LogStream, DriverError>;
}
