use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use zoe_api::{ApiEndpoint, CsvAuthenticator};
use zoe_config::{AuthType, Config};
use zoe_driver::{ClusterDriver, LocalDriver, SwarmDriver};
use zoe_scheduler::Scheduler;
use zoe_store::{PostgresStore, StateStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let config = Config::load().context("failed to load configuration")?;

    let store: Arc<dyn StateStore> = Arc::new(
        PostgresStore::connect(&config.database_url())
            .await
            .context("failed to connect to postgres")?,
    );

    let driver: Arc<dyn ClusterDriver> = if config.swarm_url == "local" {
        Arc::new(LocalDriver::new())
    } else {
        Arc::new(SwarmDriver::new(config.swarm_url.clone()))
    };

    let scheduler = Scheduler::spawn(store.clone(), driver.clone(), config.deployment_name.clone());

    if config.auth_type != AuthType::Text {
        anyhow::bail!("auth-type {:?} has no authenticator implementation wired up", config.auth_type);
    }
    let authenticator: Arc<dyn zoe_api::Authenticator> =
        Arc::new(CsvAuthenticator::load(&config.auth_file).context("failed to load auth file")?);

    let endpoint = Arc::new(ApiEndpoint::new(
        store,
        scheduler,
        driver,
        config.deployment_name.clone(),
    ));

    spawn_reaper(endpoint.clone(), config.scheduler_reap_interval);

    let app = zoe_api::build_app(endpoint, authenticator);
    let addr = format!("{}:{}", config.listen_address, config.listen_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    info!(addr = %addr, deployment = %config.deployment_name, "zoe-server listening");
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

/// Drives the periodic retry-submitted and dead-execution-cleanup passes,
/// mirroring the scheduler's own internal reap cadence.
fn spawn_reaper(endpoint: Arc<ApiEndpoint>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            if let Err(e) = endpoint.retry_submit_error_executions().await {
                warn!(error = %e, "retry_submit_error_executions failed");
            }
            if let Err(e) = endpoint.cleanup_dead_executions().await {
                error!(error = %e, "cleanup_dead_executions failed");
            }
        }
    });
}
