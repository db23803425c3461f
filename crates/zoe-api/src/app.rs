use std::sync::Arc;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::ApiEndpoint;
use crate::auth::{require_basic_auth, Authenticator};
use crate::handlers;
use crate::state::AppState;

pub fn build_app(endpoint: Arc<ApiEndpoint>, authenticator: Arc<dyn Authenticator>) -> Router {
    let state = AppState { endpoint, authenticator };

    Router::new()
        .route("/info", get(handlers::info))
        .route(
            "/execution",
            get(handlers::list_executions).post(handlers::post_execution),
        )
        .route(
            "/execution/:id",
            get(handlers::get_execution).delete(handlers::delete_execution),
        )
        .route("/execution/:id/terminate", axum::routing::post(handlers::terminate_execution))
        .route("/service/:id", get(handlers::get_service))
        .route("/service/:id/logs", get(handlers::service_logs))
        .route("/statistics/scheduler", get(handlers::statistics_scheduler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_basic_auth))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use base64::Engine as _;
    use serde_json::json;
    use std::collections::HashMap;
    use tower::util::ServiceExt;
    use zoe_domain::{Role, UserId};
    use zoe_driver::LocalDriver;
    use zoe_scheduler::Scheduler;
    use zoe_store::InMemoryStore;

    use crate::auth::{AuthenticatedUser, Authenticator};

    struct StaticAuthenticator {
        users: HashMap<&'static str, AuthenticatedUser>,
    }

    #[async_trait::async_trait]
    impl Authenticator for StaticAuthenticator {
        async fn authenticate(&self, username: &str, password: &str) -> Option<AuthenticatedUser> {
            if password != "pass" {
                return None;
            }
            self.users.get(username).cloned()
        }
    }

    fn test_authenticator() -> Arc<dyn Authenticator> {
        let mut users = HashMap::new();
        users.insert(
            "alice",
            AuthenticatedUser { id: UserId(1), name: "alice".into(), role: Role::User },
        );
        users.insert(
            "bob",
            AuthenticatedUser { id: UserId(2), name: "bob".into(), role: Role::User },
        );
        users.insert(
            "root",
            AuthenticatedUser { id: UserId(3), name: "root".into(), role: Role::Admin },
        );
        Arc::new(StaticAuthenticator { users })
    }

    fn test_app() -> Router {
        let store = Arc::new(InMemoryStore::new());
        let driver = Arc::new(LocalDriver::new());
        let scheduler = Scheduler::spawn(store.clone(), driver.clone(), "test");
        let endpoint = Arc::new(ApiEndpoint::new(store, scheduler, driver, "test"));
        build_app(endpoint, test_authenticator())
    }

    fn basic_auth(user: &str, pass: &str) -> String {
        format!("Basic {}", base64::engine::general_purpose::STANDARD.encode(format!("{user}:{pass}")))
    }

    #[tokio::test]
    async fn unauthenticated_request_returns_401() {
        let app = test_app();
        let resp = app
            .oneshot(Request::builder().uri("/info").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_password_returns_401() {
        let app = test_app();
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/info")
                    .header("authorization", basic_auth("alice", "wrong"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn info_returns_200_when_authenticated() {
        let app = test_app();
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/info")
                    .header("authorization", basic_auth("alice", "pass"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn execution_not_found_returns_404() {
        let app = test_app();
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/execution/999")
                    .header("authorization", basic_auth("alice", "pass"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn other_users_execution_returns_403() {
        let app = test_app();
        let body = json!({
            "name": "my-app",
            "application": {
                "name": "my-app",
                "version": 1,
                "will_end": false,
                "priority": 512,
                "requires_binary": false,
                "services": [{
                    "name": "web",
                    "image": "nginx",
                    "monitor": true,
                    "required_resources": { "memory": 1024 },
                    "ports": [],
                }],
            },
        });
        let create = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/execution")
                    .header("authorization", basic_auth("alice", "pass"))
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(create.status(), StatusCode::CREATED);
        let bytes = axum::body::to_bytes(create.into_body(), usize::MAX).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let id = parsed["execution_id"].as_i64().unwrap();

        let resp = app
            .oneshot(
                Request::builder()
                    .uri(format!("/execution/{id}"))
                    .header("authorization", basic_auth("bob", "pass"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
