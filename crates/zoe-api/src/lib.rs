pub mod api;
pub mod app;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod state;

pub use api::{ApiEndpoint, QUOTA_MAX_APPS_GUESTS};
pub use app::build_app;
pub use auth::{AuthenticatedUser, Authenticator, CsvAuthenticator};
pub use error::ApiError;
pub use state::AppState;
