use zoe_domain::{ExecutionId, ExecutionStatus, ServiceId, UserId};

/// Exact-match filters for `execution_list`. Every `Some` field narrows the
/// query; all fields `None` returns every execution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionFilters {
    pub id: Option<ExecutionId>,
    pub user_id: Option<UserId>,
    pub status: Option<ExecutionStatus>,
}

impl ExecutionFilters {
    pub fn by_id(id: ExecutionId) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn by_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    pub fn by_status(status: ExecutionStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// Exact-match filters for `service_list`.
#[derive(Debug, Clone, Default)]
pub struct ServiceFilters {
    pub id: Option<ServiceId>,
    pub execution_id: Option<ExecutionId>,
    pub user_id: Option<UserId>,
}

impl ServiceFilters {
    pub fn by_id(id: ServiceId) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn by_execution(execution_id: ExecutionId) -> Self {
        Self {
            execution_id: Some(execution_id),
            ..Default::default()
        }
    }
}
