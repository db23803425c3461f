use std::collections::HashMap;

use axum::body::Body;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_stream::StreamExt;
use zoe_domain::{ExecutionId, ServiceId};
use zoe_store::ExecutionFilters;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn info(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let info = state.endpoint.cluster_info().await?;
    Ok(Json(json!({
        "containers": info.containers,
        "images": info.images,
        "memory_total": info.memory_total,
        "cores_total": info.cores_total,
        "placement_strategy": info.placement_strategy,
        "active_filters": info.active_filters,
    })))
}

#[derive(Debug, Deserialize)]
pub struct StartExecutionBody {
    pub name: String,
    pub application: Value,
}

pub async fn post_execution(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<StartExecutionBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let id = state
        .endpoint
        .execution_start(user.id, user.role, &user.name, &body.name, &body.application)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "execution_id": id.0 }))))
}

#[derive(Debug, Deserialize)]
pub struct ExecutionListQuery {
    pub status: Option<String>,
}

pub async fn list_executions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<ExecutionListQuery>,
) -> Result<Json<Value>, ApiError> {
    let mut filters = ExecutionFilters::default();
    if let Some(status) = query.status {
        filters.status = parse_status(&status);
    }
    let executions = state.endpoint.execution_list(user.id, user.role, &filters).await?;
    Ok(Json(json!(executions)))
}

pub async fn get_execution(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let execution = state
        .endpoint
        .execution_by_id(user.id, user.role, ExecutionId(id))
        .await?;
    Ok(Json(json!(execution)))
}

pub async fn delete_execution(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .endpoint
        .execution_delete(user.id, user.role, ExecutionId(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn terminate_execution(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .endpoint
        .execution_terminate(user.id, user.role, ExecutionId(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_service(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let service = state.endpoint.service_by_id(user.id, user.role, ServiceId(id)).await?;
    Ok(Json(json!(service)))
}

pub async fn service_logs(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let stream = query.get("stream").map(|v| v == "1").unwrap_or(false);
    let log_stream = state
        .endpoint
        .service_logs(user.id, user.role, ServiceId(id), stream)
        .await?;

    let body_stream = log_stream.map(|line| {
        line.map(|l| {
            let rendered = match l.timestamp {
                Some(ts) => format!("{} {}\n", ts.to_rfc3339(), l.line),
                None => format!("{}\n", l.line),
            };
            axum::body::Bytes::from(rendered)
        })
        .map_err(|e| std::io::Error::other(e.to_string()))
    });
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/plain")
        .body(Body::from_stream(body_stream))
        .unwrap())
}

pub async fn statistics_scheduler(State(state): State<AppState>) -> Json<Value> {
    let stats = state.endpoint.statistics_scheduler().await;
    Json(json!({
        "queue_length": stats.queue_length,
        "termination_workers": stats.termination_workers,
    }))
}

fn parse_status(s: &str) -> Option<zoe_domain::ExecutionStatus> {
    use zoe_domain::ExecutionStatus::*;
    match s.to_uppercase().as_str() {
        "SUBMITTED" => Some(Submitted),
        "SCHEDULED" => Some(Scheduled),
        "STARTING" => Some(Starting),
        "RUNNING" => Some(Running),
        "CLEANING_UP" => Some(CleaningUp),
        "TERMINATED" => Some(Terminated),
        "ERROR" => Some(Error),
        _ => None,
    }
}
