use zoe_domain::{ClusterStatus, Execution, ExecutionStatus, Service};

/// Render the one-line summary used by `exec-ls`.
pub fn render_execution_summary(e: &Execution) -> String {
    format!(
        "Execution {} (User: {}, ID: {}): {}",
        e.name, e.user_id, e.id, e.status
    )
}

/// Render the full `exec-get` report: execution metadata followed by one
/// block per service, in the teacher's indented list style.
pub fn render_execution_detail(e: &Execution) -> String {
    let mut out = String::new();
    out.push_str(&format!("Execution {} (ID: {})\n", e.name, e.id));
    out.push_str(&format!("Status: {}\n", e.status));
    if e.status == ExecutionStatus::Error {
        if let Some(msg) = &e.error_message {
            out.push_str(&format!("Last error: {}\n", msg));
        }
    }
    out.push_str(&format!("Time submit: {}\n", e.time_submit));
    out.push_str(&format!(
        "Time start: {}\n",
        e.time_start.map(|t| t.to_string()).unwrap_or_else(|| "not yet".into())
    ));
    out.push_str(&format!(
        "Time end: {}\n",
        e.time_end.map(|t| t.to_string()).unwrap_or_else(|| "not yet".into())
    ));
    out.push_str(&format!("Application name: {}\n", e.description.name));

    for s in &e.services {
        out.push_str(&render_service_detail(s));
    }
    out
}

fn render_service_detail(s: &Service) -> String {
    let mut out = String::new();
    out.push_str(&format!("Service {} (ID: {})\n", s.name, s.id));
    out.push_str(&format!(" - zoe status: {:?}\n", s.zoe_status));
    out.push_str(&format!(" - cluster status: {:?}\n", s.cluster_status));
    if s.cluster_status == ClusterStatus::Started {
        if let Some(ip) = &s.ip_address {
            for port in &s.description.ports {
                let path = port.path.as_deref().unwrap_or("");
                out.push_str(&format!(
                    " - {}: {}://{}:{}{}\n",
                    port.name, port.protocol, ip, port.port_number, path
                ));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use zoe_domain::{ApplicationDescription, ExecutionId, ServiceId, ServiceSpec, ServiceStatus, UserId};

    fn fixture_execution() -> Execution {
        Execution {
            id: ExecutionId(7),
            name: "my-app".into(),
            user_id: UserId(1),
            description: ApplicationDescription {
                name: "my-app".into(),
                version: 1,
                will_end: false,
                priority: 512,
                requires_binary: false,
                services: vec![],
            },
            status: ExecutionStatus::Running,
            error_message: None,
            time_submit: chrono::Utc::now(),
            time_start: None,
            time_end: None,
            services: vec![Service {
                id: ServiceId(3),
                execution_id: ExecutionId(7),
                user_id: UserId(1),
                name: "web".into(),
                description: ServiceSpec {
                    name: "web".into(),
                    image: "nginx".into(),
                    monitor: false,
                    required_resources: zoe_domain::RequiredResources { memory: 1024 },
                    environment: vec![],
                    command: None,
                    ports: vec![],
                },
                cluster_id: None,
                ip_address: None,
                zoe_status: ServiceStatus::Active,
                cluster_status: ClusterStatus::Created,
            }],
        }
    }

    #[test]
    fn summary_contains_name_user_and_status() {
        let e = fixture_execution();
        let s = render_execution_summary(&e);
        assert!(s.contains("my-app"));
        assert!(s.contains("RUNNING"));
    }

    #[test]
    fn detail_lists_each_service() {
        let e = fixture_execution();
        let s = render_execution_detail(&e);
        assert!(s.contains("Service web"));
    }
}
