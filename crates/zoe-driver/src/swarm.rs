use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio_stream::StreamExt;
use tracing::{debug, warn};
use zoe_domain::ClusterStatus as ServiceClusterStatus;

use crate::driver::{ClusterDriver, ClusterInfo, InspectResult, LogLine, LogStream, SpawnOptions, SpawnResult};
use crate::error::DriverError;

/// Driver against a real Docker Engine HTTP API (a single daemon acting as
/// swarm manager, or a compatible endpoint). Grounded on the original
/// `SwarmClient`: container create + start + inspect, keyed by the engine's
/// container id (our `cluster_id`).
pub struct SwarmDriver {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct DockerInfo {
    #[serde(rename = "Containers")]
    containers: u64,
    #[serde(rename = "Images")]
    images: u64,
    #[serde(rename = "MemTotal")]
    mem_total: u64,
    #[serde(rename = "NCPU")]
    ncpu: u64,
    #[serde(rename = "DriverStatus", default)]
    driver_status: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
struct CreateContainerResponse {
    #[serde(rename = "Id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct InspectContainerResponse {
    #[serde(rename = "NetworkSettings")]
    network_settings: NetworkSettings,
    #[serde(rename = "State")]
    state: ContainerState,
}

#[derive(Debug, Deserialize)]
struct NetworkSettings {
    #[serde(rename = "IPAddress")]
    ip_address: String,
}

#[derive(Debug, Deserialize)]
struct ContainerState {
    #[serde(rename = "Status")]
    status: String,
}

/// Docker's `timestamps=true` log format prefixes each line with an RFC3339Nano
/// timestamp and a space before the actual message. Falls back to an
/// unstamped line if a chunk boundary or a non-conforming line breaks that
/// assumption rather than losing the line entirely.
fn parse_log_line(raw: &str) -> LogLine {
    match raw.split_once(' ') {
        Some((ts, rest)) => match chrono::DateTime::parse_from_rfc3339(ts) {
            Ok(parsed) => LogLine {
                timestamp: Some(parsed.with_timezone(&chrono::Utc)),
                line: rest.to_string(),
            },
            Err(_) => LogLine { timestamp: None, line: raw.to_string() },
        },
        None => LogLine { timestamp: None, line: raw.to_string() },
    }
}

fn docker_status_to_cluster_status(status: &str) -> ServiceClusterStatus {
    match status {
        "created" => ServiceClusterStatus::Created,
        "running" => ServiceClusterStatus::Started,
        "removing" | "exited" => ServiceClusterStatus::Dying,
        "dead" => ServiceClusterStatus::Died,
        _ => ServiceClusterStatus::Undefined,
    }
}

impl SwarmDriver {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn map_transport_error(err: reqwest::Error) -> DriverError {
        DriverError::Transient(format!("docker api request failed: {err}"))
    }

    async fn error_body(resp: reqwest::Response) -> String {
        resp.text().await.unwrap_or_else(|_| "<unreadable body>".into())
    }
}

#[async_trait]
impl ClusterDriver for SwarmDriver {
    async fn info(&self) -> Result<ClusterInfo, DriverError> {
        let resp = self
            .client
            .get(self.url("/info"))
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !resp.status().is_success() {
            let body = Self::error_body(resp).await;
            return Err(DriverError::Transient(format!("docker /info failed: {body}")));
        }

        let info: DockerInfo = resp
            .json()
            .await
            .map_err(|e| DriverError::Fatal(format!("malformed /info response: {e}")))?;

        let placement_strategy = info
            .driver_status
            .iter()
            .find(|(k, _)| k.contains("Strategy"))
            .map(|(_, v)| v.clone())
            .unwrap_or_default();
        let active_filters = info
            .driver_status
            .iter()
            .find(|(k, _)| k.contains("Filters"))
            .map(|(_, v)| v.split(", ").map(str::to_string).collect())
            .unwrap_or_default();

        Ok(ClusterInfo {
            containers: info.containers,
            images: info.images,
            memory_total: info.mem_total,
            cores_total: info.ncpu,
            placement_strategy,
            active_filters,
        })
    }

    async fn spawn(&self, image: &str, opts: &SpawnOptions) -> Result<SpawnResult, DriverError> {
        let network_mode = if opts.network.is_empty() { "bridge" } else { &opts.network };
        let env: Vec<String> = opts
            .environment
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();

        let body = json!({
            "Image": image,
            "Env": env,
            "Cmd": opts.command.as_ref().map(|c| vec![c.clone()]),
            "Volumes": opts.volumes.iter().map(|v| (v.clone(), json!({}))).collect::<HashMap<_, _>>(),
            "HostConfig": {
                "NetworkMode": network_mode,
                "Binds": opts.volume_binds,
                "Memory": opts.memory_limit,
            },
        });

        debug!(image, network_mode, "SwarmDriver: create container");
        let resp = self
            .client
            .post(self.url("/containers/create"))
            .json(&body)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let status = resp.status();
        if status.as_u16() == 404 {
            let body = Self::error_body(resp).await;
            return Err(DriverError::Fatal(format!("image not found: {body}")));
        }
        if !status.is_success() {
            let body = Self::error_body(resp).await;
            return Err(DriverError::Fatal(format!("container create rejected: {body}")));
        }

        let created: CreateContainerResponse = resp
            .json()
            .await
            .map_err(|e| DriverError::Fatal(format!("malformed create response: {e}")))?;

        let start_resp = self
            .client
            .post(self.url(&format!("/containers/{}/start", created.id)))
            .send()
            .await
            .map_err(Self::map_transport_error)?;
        if !start_resp.status().is_success() {
            let body = Self::error_body(start_resp).await;
            return Err(DriverError::Transient(format!("container start failed: {body}")));
        }

        let inspected = self.inspect(&created.id).await?;
        Ok(SpawnResult {
            cluster_id: created.id,
            ip: inspected.ip,
        })
    }

    async fn inspect(&self, cluster_id: &str) -> Result<InspectResult, DriverError> {
        let resp = self
            .client
            .get(self.url(&format!("/containers/{cluster_id}/json")))
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if resp.status().as_u16() == 404 {
            return Ok(InspectResult {
                ip: None,
                cluster_status: ServiceClusterStatus::Undefined,
            });
        }
        if !resp.status().is_success() {
            let body = Self::error_body(resp).await;
            return Err(DriverError::Transient(format!("inspect failed: {body}")));
        }

        let parsed: InspectContainerResponse = resp
            .json()
            .await
            .map_err(|e| DriverError::Fatal(format!("malformed inspect response: {e}")))?;

        Ok(InspectResult {
            ip: Some(parsed.network_settings.ip_address).filter(|ip| !ip.is_empty()),
            cluster_status: docker_status_to_cluster_status(&parsed.state.status),
        })
    }

    async fn terminate(&self, cluster_id: &str) -> Result<(), DriverError> {
        let resp = self
            .client
            .delete(self.url(&format!("/containers/{cluster_id}?force=true")))
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        match resp.status().as_u16() {
            204 | 404 => Ok(()),
            _ => {
                let body = Self::error_body(resp).await;
                warn!(cluster_id, body, "SwarmDriver: terminate failed");
                Err(DriverError::Transient(format!("terminate failed: {body}")))
            }
        }
    }

    async fn logs(&self, cluster_id: &str, stream: bool) -> Result<LogStream, DriverError> {
        let url = format!(
            "{}?stdout=true&stderr=true&timestamps=true&follow={}",
            self.url(&format!("/containers/{cluster_id}/logs")),
            stream
        );
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        if !resp.status().is_success() {
            let body = Self::error_body(resp).await;
            return Err(DriverError::Transient(format!("logs failed: {body}")));
        }

        let byte_stream = resp.bytes_stream();
        let lines = async_stream::try_stream! {
            tokio::pin!(byte_stream);
            let mut buf = String::new();
            while let Some(chunk) = byte_stream.next().await {
                let chunk = chunk.map_err(|e| DriverError::Transient(format!("log stream error: {e}")))?;
                buf.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(pos) = buf.find('\n') {
                    let line: String = buf.drain(..=pos).collect();
                    yield parse_log_line(line.trim_end_matches('\n'));
                }
            }
            if !buf.is_empty() {
                yield parse_log_line(&buf);
            }
        };
        Ok(Box::pin(lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn info_parses_strategy_and_filters_from_driver_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Containers": 3,
                "Images": 7,
                "MemTotal": 17_179_869_184u64,
                "NCPU": 4,
                "DriverStatus": [["Strategy", "spread"], ["Filters", "health, port"]],
            })))
            .mount(&server)
            .await;

        let driver = SwarmDriver::new(server.uri());
        let info = driver.info().await.unwrap();
        assert_eq!(info.containers, 3);
        assert_eq!(info.placement_strategy, "spread");
        assert_eq!(info.active_filters, vec!["health", "port"]);
    }

    #[tokio::test]
    async fn spawn_creates_starts_and_inspects_the_container() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/containers/create"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "Id": "abc123" })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/containers/abc123/start"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/containers/abc123/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "NetworkSettings": { "IPAddress": "10.0.0.5" },
                "State": { "Status": "running" },
            })))
            .mount(&server)
            .await;

        let driver = SwarmDriver::new(server.uri());
        let result = driver.spawn("nginx", &SpawnOptions::default()).await.unwrap();
        assert_eq!(result.cluster_id, "abc123");
        assert_eq!(result.ip.as_deref(), Some("10.0.0.5"));
    }

    #[tokio::test]
    async fn spawn_on_missing_image_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/containers/create"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such image"))
            .mount(&server)
            .await;

        let driver = SwarmDriver::new(server.uri());
        let err = driver.spawn("missing", &SpawnOptions::default()).await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn inspect_on_404_reports_undefined_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/containers/gone/json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let driver = SwarmDriver::new(server.uri());
        let inspected = driver.inspect("gone").await.unwrap();
        assert_eq!(inspected.cluster_status, ServiceClusterStatus::Undefined);
    }

    #[tokio::test]
    async fn terminate_is_idempotent_on_404() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let driver = SwarmDriver::new(server.uri());
        driver.terminate("gone").await.unwrap();
    }

    #[tokio::test]
    async fn logs_parses_the_leading_timestamp_off_each_line() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/containers/abc123/logs"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "2024-03-01T12:00:00.123456789Z hello\n2024-03-01T12:00:01.000000000Z world\n",
            ))
            .mount(&server)
            .await;

        let driver = SwarmDriver::new(server.uri());
        let mut stream = driver.logs("abc123", false).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.line, "hello");
        assert_eq!(first.timestamp.unwrap().timestamp(), 1709294400);
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.line, "world");
        assert!(second.timestamp.is_some());
        assert!(stream.next().await.is_none());
    }
}
