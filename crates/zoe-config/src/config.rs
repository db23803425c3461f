use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::debug;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    Text,
    Ldap,
}

/// The full set of recognized options (§6), parsed once at startup from CLI
/// flags with environment-variable fallback, then handed around as an
/// `Arc<Config>` — no ambient global.
#[derive(Debug, Parser, Clone)]
#[command(name = "zoe", about = "multi-tenant container job orchestration", version)]
pub struct Config {
    /// Enable verbose logging.
    #[arg(long, env = "ZOE_DEBUG")]
    pub debug: bool,

    /// Swarm/Docker API endpoint.
    #[arg(long, env = "ZOE_SWARM_URL", default_value = "http://localhost:2375")]
    pub swarm_url: String,

    /// Name of this Zoe deployment, interpolated into service environments.
    #[arg(long, env = "ZOE_DEPLOYMENT_NAME", default_value = "prod")]
    pub deployment_name: String,

    #[arg(long, env = "ZOE_DBNAME", default_value = "zoe")]
    pub dbname: String,
    #[arg(long, env = "ZOE_DBUSER", default_value = "zoe")]
    pub dbuser: String,
    #[arg(long, env = "ZOE_DBPASS", default_value = "")]
    pub dbpass: String,
    #[arg(long, env = "ZOE_DBHOST", default_value = "localhost")]
    pub dbhost: String,
    #[arg(long, env = "ZOE_DBPORT", default_value_t = 5432)]
    pub dbport: u16,

    /// Master RPC endpoint, for the out-of-process `MasterApi` wiring (§6).
    #[arg(long, env = "ZOE_API_LISTEN_URI", default_value = "tcp://*:4850")]
    pub api_listen_uri: String,

    /// Front-end to master URL, for the out-of-process wiring.
    #[arg(long, env = "ZOE_MASTER_URL", default_value = "tcp://127.0.0.1:4850")]
    pub master_url: String,

    /// Host directory made visible to containers.
    #[arg(long, env = "ZOE_WORKSPACE_BASE_PATH", default_value = "/mnt/zoe-workspaces")]
    pub workspace_base_path: PathBuf,

    /// Name of the cluster overlay network.
    #[arg(long, env = "ZOE_OVERLAY_NETWORK_NAME", default_value = "zoe")]
    pub overlay_network_name: String,

    #[arg(long, env = "ZOE_LISTEN_ADDRESS", default_value = "0.0.0.0")]
    pub listen_address: String,
    #[arg(long, env = "ZOE_LISTEN_PORT", default_value_t = 5001)]
    pub listen_port: u16,

    #[arg(long, env = "ZOE_AUTH_TYPE", default_value = "text", value_enum)]
    pub auth_type: AuthType,

    /// Path to the CSV `user,pass,role` file for text authentication.
    #[arg(long, env = "ZOE_AUTH_FILE", default_value = "zoepass.csv")]
    pub auth_file: PathBuf,

    #[arg(long, env = "ZOE_LDAP_SERVER_URI", default_value = "ldap://localhost")]
    pub ldap_server_uri: String,
    #[arg(long, env = "ZOE_LDAP_BASE_DN", default_value = "ou=something,dc=any,dc=local")]
    pub ldap_base_dn: String,
    #[arg(long, env = "ZOE_LDAP_ADMIN_GID", default_value_t = 5000)]
    pub ldap_admin_gid: u32,
    #[arg(long, env = "ZOE_LDAP_USER_GID", default_value_t = 5001)]
    pub ldap_user_gid: u32,
    #[arg(long, env = "ZOE_LDAP_GUEST_GID", default_value_t = 5002)]
    pub ldap_guest_gid: u32,

    /// Cadence of the resubmit/cleanup background timers, in seconds.
    #[arg(long, env = "ZOE_SCHEDULER_REAP_INTERVAL", default_value_t = 60)]
    pub scheduler_reap_interval: u64,
}

impl Config {
    /// Parses `std::env::args()` and validates the result.
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::parse();
        config.validate()?;
        debug!(deployment_name = %config.deployment_name, auth_type = ?config.auth_type, "configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth_type == AuthType::Ldap && self.ldap_server_uri.is_empty() {
            return Err(ConfigError::Invalid(
                "ldap-server-uri is required when auth-type=ldap".into(),
            ));
        }
        if self.scheduler_reap_interval == 0 {
            return Err(ConfigError::Invalid(
                "scheduler-reap-interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.dbuser, self.dbpass, self.dbhost, self.dbport, self.dbname
        )
    }
}
