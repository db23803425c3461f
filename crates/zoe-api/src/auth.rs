use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine as _;
use zoe_domain::{Role, UserId};

use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: UserId,
    pub name: String,
    pub role: Role,
}

/// Pluggable authentication back-end. Shipped with a CSV file implementation;
/// an LDAP back-end is a trait implementation point, not wired to a real
/// directory server (§6's `auth-type ∈ {text, ldap}` only the `text` side is
/// materialized here).
#[async_trait]
pub trait Authenticator: Send + Sync + 'static {
    async fn authenticate(&self, username: &str, password: &str) -> Option<AuthenticatedUser>;
}

struct CsvEntry {
    id: UserId,
    password: String,
    role: Role,
}

/// Text authentication against a CSV file of `user,pass,role` lines, loaded
/// once at startup. Lines are assigned stable `UserId`s by their order in the
/// file.
pub struct CsvAuthenticator {
    users: HashMap<String, CsvEntry>,
}

impl CsvAuthenticator {
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut users = HashMap::new();
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.splitn(3, ',');
            let (Some(name), Some(pass), Some(role)) = (parts.next(), parts.next(), parts.next()) else {
                continue;
            };
            let role = match role.trim() {
                "admin" => Role::Admin,
                "guest" => Role::Guest,
                _ => Role::User,
            };
            users.insert(
                name.trim().to_string(),
                CsvEntry {
                    id: UserId(idx as i64 + 1),
                    password: pass.trim().to_string(),
                    role,
                },
            );
        }
        Ok(Self { users })
    }
}

#[async_trait]
impl Authenticator for CsvAuthenticator {
    async fn authenticate(&self, username: &str, password: &str) -> Option<AuthenticatedUser> {
        let entry = self.users.get(username)?;
        if entry.password != password {
            return None;
        }
        Some(AuthenticatedUser {
            id: entry.id,
            name: username.to_string(),
            role: entry.role,
        })
    }
}

fn decode_basic_auth(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, pass) = text.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Axum middleware requiring HTTP Basic auth against the configured
/// `Authenticator`. On success, inserts `AuthenticatedUser` into request
/// extensions for handlers to read.
pub async fn require_basic_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let Some((username, password)) = header.as_deref().and_then(decode_basic_auth) else {
        return (StatusCode::UNAUTHORIZED, "Unauthorized\n").into_response();
    };

    match state.authenticator.authenticate(&username, &password).await {
        Some(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => (StatusCode::UNAUTHORIZED, "Unauthorized\n").into_response(),
    }
}
