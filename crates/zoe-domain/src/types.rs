use serde::{Deserialize, Serialize};

// ── Identifiers ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub i64);

impl ExecutionId {
    pub fn new(id: i64) -> Self {
        ExecutionId(id)
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceId(pub i64);

impl ServiceId {
    pub fn new(id: i64) -> Self {
        ServiceId(id)
    }
}

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── User / role ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Guest,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::User => write!(f, "user"),
            Role::Guest => write!(f, "guest"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub role: Role,
}

// ── Application description (canonical, validated) ────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    pub protocol: String,
    pub port_number: u32,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub is_main_endpoint: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredResources {
    pub memory: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub monitor: bool,
    pub required_resources: RequiredResources,
    #[serde(default)]
    pub environment: Vec<(String, String)>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub ports: Vec<Endpoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDescription {
    pub name: String,
    pub version: i64,
    pub will_end: bool,
    pub priority: u32,
    pub requires_binary: bool,
    pub services: Vec<ServiceSpec>,
}

// ── Execution / Service (runtime state, distinct from the above value objects) ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Submitted,
    Scheduled,
    Starting,
    Running,
    CleaningUp,
    Terminated,
    Error,
}

impl ExecutionStatus {
    /// V5: an execution is active iff its status is not one of the two terminal states.
    pub fn is_active(&self) -> bool {
        !matches!(self, ExecutionStatus::Terminated | ExecutionStatus::Error)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionStatus::Submitted => "SUBMITTED",
            ExecutionStatus::Scheduled => "SCHEDULED",
            ExecutionStatus::Starting => "STARTING",
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::CleaningUp => "CLEANING_UP",
            ExecutionStatus::Terminated => "TERMINATED",
            ExecutionStatus::Error => "ERROR",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Inactive,
    Active,
    Terminating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterStatus {
    Undefined,
    Created,
    Started,
    Dying,
    Died,
    Destroyed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub execution_id: ExecutionId,
    pub user_id: UserId,
    pub name: String,
    pub description: ServiceSpec,
    pub cluster_id: Option<String>,
    pub ip_address: Option<String>,
    pub zoe_status: ServiceStatus,
    pub cluster_status: ClusterStatus,
}

impl Service {
    /// V6: `cluster_id` is set iff the service has ever been spawned and not yet destroyed.
    pub fn is_spawned(&self) -> bool {
        self.cluster_id.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub name: String,
    pub user_id: UserId,
    pub description: ApplicationDescription,
    pub status: ExecutionStatus,
    pub error_message: Option<String>,
    pub time_submit: chrono::DateTime<chrono::Utc>,
    pub time_start: Option<chrono::DateTime<chrono::Utc>>,
    pub time_end: Option<chrono::DateTime<chrono::Utc>>,
    pub services: Vec<Service>,
}

impl Execution {
    /// V5.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_status_active_matches_v5() {
        for s in [
            ExecutionStatus::Submitted,
            ExecutionStatus::Scheduled,
            ExecutionStatus::Starting,
            ExecutionStatus::Running,
            ExecutionStatus::CleaningUp,
        ] {
            assert!(s.is_active(), "{:?} should be active", s);
        }
        assert!(!ExecutionStatus::Terminated.is_active());
        assert!(!ExecutionStatus::Error.is_active());
    }

    #[test]
    fn execution_status_display_matches_state_machine_names() {
        assert_eq!(ExecutionStatus::CleaningUp.to_string(), "CLEANING_UP");
        assert_eq!(ExecutionStatus::Submitted.to_string(), "SUBMITTED");
    }
}
