use std::sync::Arc;

use crate::api::ApiEndpoint;
use crate::auth::Authenticator;

#[derive(Clone)]
pub struct AppState {
    pub endpoint: Arc<ApiEndpoint>,
    pub authenticator: Arc<dyn Authenticator>,
}
