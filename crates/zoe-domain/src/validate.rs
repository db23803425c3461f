//! C1: AppSpec Validator. Pure, synchronous, no I/O — turns an untyped JSON
//! tree into a canonical `ApplicationDescription`, or rejects it outright.
//!
//! Grounded on the field-by-field coercion in the original's
//! `Application.from_dict` / `Process.from_dict` / `ProcessEndpoint.from_dict`:
//! missing keys and type mismatches are reported with the offending field name,
//! and there is no partial acceptance.

use serde_json::Value;

use crate::error::DomainError;
use crate::types::{ApplicationDescription, Endpoint, RequiredResources, ServiceSpec};

type Result<T> = std::result::Result<T, DomainError>;

fn invalid(reason: impl Into<String>) -> DomainError {
    DomainError::InvalidDescription(reason.into())
}

fn require<'a>(obj: &'a Value, key: &str) -> Result<&'a Value> {
    obj.get(key)
        .ok_or_else(|| invalid(format!("missing required key: {key}")))
}

fn as_non_negative_int(v: &Value, field: &str) -> Result<u64> {
    v.as_u64()
        .or_else(|| v.as_i64().filter(|n| *n >= 0).map(|n| n as u64))
        .ok_or_else(|| invalid(format!("{field} must be a non-negative integer")))
}

fn as_int(v: &Value, field: &str) -> Result<i64> {
    v.as_i64()
        .ok_or_else(|| invalid(format!("{field} must be an integer")))
}

fn as_bool(v: &Value, field: &str) -> Result<bool> {
    v.as_bool()
        .ok_or_else(|| invalid(format!("{field} must be a boolean")))
}

fn as_str<'a>(v: &'a Value, field: &str) -> Result<&'a str> {
    v.as_str()
        .ok_or_else(|| invalid(format!("{field} must be a string")))
}

fn parse_endpoint(v: &Value) -> Result<Endpoint> {
    let obj = v
        .as_object()
        .ok_or_else(|| invalid("ports entry must be an object"))?;
    let name = as_str(require(v, "name")?, "ports.name")?.to_string();
    let protocol = as_str(require(v, "protocol")?, "ports.protocol")?.to_string();
    let port_number = as_non_negative_int(require(v, "port_number")?, "ports.port_number")? as u32;
    let is_main_endpoint = match obj.get("is_main_endpoint") {
        Some(v) => as_bool(v, "ports.is_main_endpoint")?,
        None => return Err(invalid("missing required key: ports.is_main_endpoint")),
    };
    let path = match obj.get("path") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Null) | None => None,
        Some(_) => return Err(invalid("ports.path must be a string")),
    };
    Ok(Endpoint {
        name,
        protocol,
        port_number,
        path,
        is_main_endpoint,
    })
}

fn parse_service(v: &Value) -> Result<ServiceSpec> {
    let name = as_str(require(v, "name")?, "services.name")?.to_string();
    let image = as_str(require(v, "image")?, "services.image")?.to_string();
    let monitor = as_bool(require(v, "monitor")?, "services.monitor")?;

    let ports_val = require(v, "ports")?;
    let ports_arr = ports_val
        .as_array()
        .ok_or_else(|| invalid("services.ports must be an iterable"))?;
    let mut ports = Vec::with_capacity(ports_arr.len());
    for p in ports_arr {
        ports.push(parse_endpoint(p)?);
    }

    let resources = require(v, "required_resources")?;
    let resources_obj = resources
        .as_object()
        .ok_or_else(|| invalid("services.required_resources must be an object"))?;
    let memory_val = resources_obj.get("memory").ok_or_else(|| {
        invalid("missing required key: services.required_resources.memory")
    })?;
    let memory = as_non_negative_int(memory_val, "services.required_resources.memory")?;

    let environment = match v.get("environment") {
        Some(Value::Array(items)) => {
            let mut env = Vec::with_capacity(items.len());
            for item in items {
                let pair = item
                    .as_array()
                    .ok_or_else(|| invalid("environment entry must be a two-element list"))?;
                if pair.len() != 2 {
                    return Err(invalid(
                        "environment variable should have a name and a value",
                    ));
                }
                let name = as_str(&pair[0], "environment[].name")?.to_string();
                let value = as_str(&pair[1], "environment[].value")?.to_string();
                env.push((name, value));
            }
            env
        }
        Some(Value::Null) | None => Vec::new(),
        Some(_) => return Err(invalid("environment should be an iterable")),
    };

    let command = match v.get("command") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Null) | None => None,
        Some(_) => return Err(invalid("command must be a string")),
    };

    Ok(ServiceSpec {
        name,
        image,
        monitor,
        required_resources: RequiredResources { memory },
        environment,
        command,
        ports,
    })
}

/// Validate a raw application description and produce its canonical form.
///
/// Unknown keys are ignored; missing required keys fail. Enforces V1
/// (at least one monitor service), V2 (unique service names), and V3
/// (at most one main endpoint across the whole application).
pub fn validate(raw: &Value) -> Result<ApplicationDescription> {
    let name = as_str(require(raw, "name")?, "name")?.to_string();
    if name.is_empty() {
        return Err(invalid("name must not be empty"));
    }
    let version = as_int(require(raw, "version")?, "version")?;
    let will_end = as_bool(require(raw, "will_end")?, "will_end")?;
    let requires_binary = as_bool(require(raw, "requires_binary")?, "requires_binary")?;
    let priority = as_non_negative_int(require(raw, "priority")?, "priority")? as u32;
    if priority > 1024 {
        return Err(invalid("priority must be between 0 and 1024"));
    }

    let services_val = require(raw, "services")?;
    let services_arr = services_val
        .as_array()
        .ok_or_else(|| invalid("services must be an iterable"))?;
    if services_arr.is_empty() {
        return Err(invalid("services must not be empty"));
    }

    let mut services = Vec::with_capacity(services_arr.len());
    for s in services_arr {
        services.push(parse_service(s)?);
    }

    // V2: service names are unique within an application.
    let mut seen_names = std::collections::HashSet::new();
    for s in &services {
        if !seen_names.insert(s.name.as_str()) {
            return Err(invalid(format!("duplicate service name: {}", s.name)));
        }
    }

    // V1: at least one service has monitor = true.
    if !services.iter().any(|s| s.monitor) {
        return Err(invalid(
            "at least one service should have monitor set to True",
        ));
    }

    // V3: at most one main endpoint across the whole application.
    let main_endpoint_count: usize = services
        .iter()
        .flat_map(|s| s.ports.iter())
        .filter(|e| e.is_main_endpoint)
        .count();
    if main_endpoint_count > 1 {
        return Err(invalid(
            "at most one endpoint may be the main endpoint for the application",
        ));
    }

    Ok(ApplicationDescription {
        name,
        version,
        will_end,
        priority,
        requires_binary,
        services,
    })
}

/// V4: the execution name (distinct from `ApplicationDescription::name`) must
/// match `^[A-Za-z0-9-]+$` and be 4 to 128 characters long.
pub fn validate_execution_name(name: &str) -> Result<()> {
    if !(4..=128).contains(&name.len()) {
        return Err(invalid(
            "execution name must be between 4 and 128 characters long",
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(invalid(format!(
            "execution name can contain only letters, numbers and dashes: '{name}' is not valid"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_app() -> Value {
        json!({
            "name": "test-app",
            "version": 1,
            "will_end": true,
            "priority": 512,
            "requires_binary": false,
            "services": [
                {
                    "name": "master",
                    "image": "example/master:latest",
                    "monitor": true,
                    "required_resources": {"memory": 1073741824u64},
                    "ports": [
                        {"name": "web", "protocol": "http", "port_number": 8080, "is_main_endpoint": true}
                    ]
                },
                {
                    "name": "worker",
                    "image": "example/worker:latest",
                    "monitor": false,
                    "required_resources": {"memory": 1073741824u64},
                    "ports": []
                }
            ]
        })
    }

    #[test]
    fn accepts_a_well_formed_description() {
        let app = validate(&valid_app()).expect("should validate");
        assert_eq!(app.services.len(), 2);
        assert_eq!(app.name, "test-app");
    }

    #[test]
    fn rejects_missing_monitor_service_v1() {
        let mut raw = valid_app();
        raw["services"][0]["monitor"] = json!(false);
        let err = validate(&raw).unwrap_err();
        assert!(err.reason().contains("monitor"));
    }

    #[test]
    fn rejects_duplicate_service_names_v2() {
        let mut raw = valid_app();
        raw["services"][1]["name"] = json!("master");
        let err = validate(&raw).unwrap_err();
        assert!(err.reason().contains("duplicate"));
    }

    #[test]
    fn rejects_two_main_endpoints_v3() {
        let mut raw = valid_app();
        raw["services"][1]["ports"] = json!([
            {"name": "alt", "protocol": "http", "port_number": 9090, "is_main_endpoint": true}
        ]);
        let err = validate(&raw).unwrap_err();
        assert!(err.reason().contains("main endpoint"));
    }

    #[test]
    fn rejects_priority_out_of_range() {
        let mut raw = valid_app();
        raw["priority"] = json!(2000);
        let err = validate(&raw).unwrap_err();
        assert!(err.reason().contains("priority"));
    }

    #[test]
    fn rejects_missing_required_key() {
        let mut raw = valid_app();
        raw.as_object_mut().unwrap().remove("version");
        let err = validate(&raw).unwrap_err();
        assert!(err.reason().contains("version"));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let mut raw = valid_app();
        raw["some_unknown_key"] = json!("ignored");
        assert!(validate(&raw).is_ok());
    }

    #[test]
    fn validate_then_reserialize_round_trips() {
        let raw = valid_app();
        let first = validate(&raw).unwrap();
        let reserialized = serde_json::to_value(&first).unwrap();
        let second = validate(&reserialized).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn execution_name_rules_v4() {
        assert!(validate_execution_name("abc").is_err());
        assert!(validate_execution_name("valid-name-1").is_ok());
        assert!(validate_execution_name("bad_name!").is_err());
        assert!(validate_execution_name(&"a".repeat(200)).is_err());
    }
}
