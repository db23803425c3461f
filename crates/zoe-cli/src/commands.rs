use std::path::Path;

use anyhow::{bail, Context, Result};
use base64::Engine as _;
use serde_json::Value;
use zoe_domain::{Execution, ExecutionId, Service, ServiceId};

use crate::output;

/// Thin wrapper around `reqwest::Client` with HTTP Basic auth pre-configured,
/// matching the `ZOE_URL`/`ZOE_USER`/`ZOE_PASS` client library in the original
/// tool.
pub struct ZoeClient {
    base_url: String,
    client: reqwest::Client,
}

impl ZoeClient {
    pub fn new(base_url: String, user: String, pass: String) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        let credentials = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{pass}"));
        let mut value = reqwest::header::HeaderValue::from_str(&format!("Basic {credentials}"))
            .context("user/pass contain invalid header characters")?;
        value.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .with_context(|| format!("failed to reach server at {}", self.base_url))?;
        response_to_json(resp).await
    }

    pub async fn info(&self) -> Result<Value> {
        self.get_json("/info").await
    }

    pub async fn execution_start(&self, name: &str, application: Value) -> Result<ExecutionId> {
        let resp = self
            .client
            .post(self.url("/execution"))
            .json(&serde_json::json!({ "name": name, "application": application }))
            .send()
            .await
            .with_context(|| format!("failed to reach server at {}", self.base_url))?;
        let body = response_to_json(resp).await?;
        let id = body["execution_id"]
            .as_i64()
            .context("server response did not contain an execution_id")?;
        Ok(ExecutionId(id))
    }

    pub async fn execution_list(&self) -> Result<Vec<Execution>> {
        let body = self.get_json("/execution").await?;
        Ok(serde_json::from_value(body)?)
    }

    pub async fn execution_get(&self, id: ExecutionId) -> Result<Option<Execution>> {
        let resp = self
            .client
            .get(self.url(&format!("/execution/{id}")))
            .send()
            .await
            .with_context(|| format!("failed to reach server at {}", self.base_url))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(response_to_json(resp).await?)?))
    }

    pub async fn execution_terminate(&self, id: ExecutionId) -> Result<()> {
        let resp = self
            .client
            .post(self.url(&format!("/execution/{id}/terminate")))
            .send()
            .await
            .with_context(|| format!("failed to reach server at {}", self.base_url))?;
        ensure_success(resp).await
    }

    pub async fn execution_delete(&self, id: ExecutionId) -> Result<()> {
        let resp = self
            .client
            .delete(self.url(&format!("/execution/{id}")))
            .send()
            .await
            .with_context(|| format!("failed to reach server at {}", self.base_url))?;
        ensure_success(resp).await
    }

    pub async fn service_get(&self, id: ServiceId) -> Result<Service> {
        let body = self.get_json(&format!("/service/{id}")).await?;
        Ok(serde_json::from_value(body)?)
    }

    pub async fn service_logs(&self, id: ServiceId) -> Result<reqwest::Response> {
        self.client
            .get(self.url(&format!("/service/{id}/logs")))
            .send()
            .await
            .with_context(|| format!("failed to reach server at {}", self.base_url))
    }

    pub async fn statistics_scheduler(&self) -> Result<Value> {
        self.get_json("/statistics/scheduler").await
    }
}

async fn response_to_json(resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();
    let body: Value = resp.json().await.context("failed to parse server response")?;
    if !status.is_success() {
        let msg = body.get("error").and_then(|v| v.as_str()).unwrap_or("unknown error");
        bail!("server returned {}: {}", status, msg);
    }
    Ok(body)
}

async fn ensure_success(resp: reqwest::Response) -> Result<()> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body: Value = resp.json().await.unwrap_or(Value::Null);
    let msg = body.get("error").and_then(|v| v.as_str()).unwrap_or("unknown error");
    bail!("server returned {}: {}", status, msg);
}

// ── Subcommand handlers ───────────────────────────────────────────────────────

pub async fn info_cmd(client: &ZoeClient) -> Result<()> {
    let info = client.info().await?;
    println!("Zoe API version: {}", info.get("api_version").and_then(|v| v.as_str()).unwrap_or("-"));
    println!(
        "Deployment name: {}",
        info.get("placement_strategy").and_then(|v| v.as_str()).unwrap_or("-")
    );
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

pub fn app_validate_cmd(jsonfile: &Path) -> Result<()> {
    let content = std::fs::read_to_string(jsonfile)
        .with_context(|| format!("failed to read {}", jsonfile.display()))?;
    let raw: Value = serde_json::from_str(&content).context("invalid JSON")?;
    match zoe_domain::validate(&raw) {
        Ok(_) => println!("Static validation OK"),
        Err(e) => println!("{}", e),
    }
    Ok(())
}

pub async fn exec_start_cmd(client: &ZoeClient, name: &str, jsonfile: &Path) -> Result<()> {
    let content = std::fs::read_to_string(jsonfile)
        .with_context(|| format!("failed to read {}", jsonfile.display()))?;
    let raw: Value = serde_json::from_str(&content).context("invalid JSON")?;
    zoe_domain::validate(&raw)?;
    let id = client.execution_start(name, raw).await?;
    println!("Application scheduled successfully with ID {}, use the exec-get command to check its status", id);
    Ok(())
}

pub async fn exec_ls_cmd(client: &ZoeClient) -> Result<()> {
    let executions = client.execution_list().await?;
    for e in &executions {
        println!("{}", output::render_execution_summary(e));
    }
    Ok(())
}

pub async fn exec_get_cmd(client: &ZoeClient, id: i64) -> Result<()> {
    match client.execution_get(ExecutionId(id)).await? {
        None => println!("Execution not found"),
        Some(e) => print!("{}", output::render_execution_detail(&e)),
    }
    Ok(())
}

pub async fn exec_app_get_cmd(client: &ZoeClient, id: i64) -> Result<()> {
    match client.execution_get(ExecutionId(id)).await? {
        None => println!("no such execution"),
        Some(e) => println!("{}", serde_json::to_string_pretty(&e.description)?),
    }
    Ok(())
}

pub async fn terminate_cmd(client: &ZoeClient, id: i64) -> Result<()> {
    client.execution_terminate(ExecutionId(id)).await
}

pub async fn exec_rm_cmd(client: &ZoeClient, id: i64) -> Result<()> {
    client.execution_delete(ExecutionId(id)).await
}

pub async fn logs_cmd(client: &ZoeClient, service_id: i64, timestamps: bool) -> Result<()> {
    use tokio_stream::StreamExt;

    let resp = client.service_logs(ServiceId(service_id)).await?;
    if !resp.status().is_success() {
        bail!("server returned {}", resp.status());
    }
    let mut stream = resp.bytes_stream();
    let mut buf = String::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("error reading log stream")?;
        buf.push_str(&String::from_utf8_lossy(&chunk));
        while let Some(pos) = buf.find('\n') {
            let line: String = buf.drain(..=pos).collect();
            let line = line.trim_end_matches('\n');
            let (ts, message) = match line.split_once(' ') {
                Some((ts, rest)) if chrono::DateTime::parse_from_rfc3339(ts).is_ok() => (Some(ts), rest),
                _ => (None, line),
            };
            match (timestamps, ts) {
                (true, Some(ts)) => println!("{ts} {message}"),
                _ => println!("{message}"),
            }
        }
    }
    Ok(())
}

pub async fn stats_cmd(client: &ZoeClient) -> Result<()> {
    let stats = client.statistics_scheduler().await?;
    println!(
        "Scheduler queue length: {}",
        stats.get("queue_length").and_then(|v| v.as_u64()).unwrap_or(0)
    );
    println!(
        "Termination threads count: {}",
        stats.get("termination_workers").and_then(|v| v.as_u64()).unwrap_or(0)
    );
    Ok(())
}
