mod types;
mod validate;
pub mod error;

pub use error::DomainError;
pub use types::{
    ApplicationDescription, ClusterStatus, Endpoint, Execution, ExecutionId, ExecutionStatus,
    RequiredResources, Role, Service, ServiceId, ServiceSpec, ServiceStatus, User, UserId,
};
pub use validate::{validate, validate_execution_name};
