//! Configuration loading and settings resolution.
//!
//! Settings flow defaults -> global overrides -> host overrides through a
//! recursive merge, then pass JSON-Schema validation before any typed struct
//! is built from them. There is no ambient settings singleton: the loaded
//! [`DeployConfig`](crate::types::DeployConfig) is constructed once at
//! startup and passed by reference to every consumer.

pub mod error;

pub use error::ConfigError;

use std::path::Path;

use serde_json::Value;

use crate::types::DeployConfig;

/// Load and validate the deployment configuration for one environment.
pub fn load_config(path: &Path) -> Result<DeployConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let text = std::fs::read_to_string(path)?;
    let value: Value =
        serde_yaml::from_str(&text).map_err(|e| ConfigError::InvalidYaml {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    let config: DeployConfig = serde_json::from_value(value)?;
    tracing::debug!(
        env = %config.env,
        groups = config.hosts.len(),
        "loaded deployment configuration"
    );
    Ok(config)
}

/// Recursively merge `overrides` on top of `base`.
///
/// Mappings merge key-by-key; any other value type in `overrides` replaces
/// the base value wholesale.
pub fn merge_values(base: &Value, overrides: &Value) -> Value {
    match (base, overrides) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged = base_map.clone();
            for (key, value) in override_map {
                let entry = match merged.get(key) {
                    Some(existing) => merge_values(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), entry);
            }
            Value::Object(merged)
        }
        _ => overrides.clone(),
    }
}

/// Validate `settings` against a JSON-Schema document.
pub fn validate_schema(schema: &Value, settings: &Value) -> Result<(), ConfigError> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|e| ConfigError::InvalidSchema {
            reason: e.to_string(),
        })?;
    let errors: Vec<String> = validator
        .iter_errors(settings)
        .map(|error| format!("{}: {}", error.instance_path, error))
        .collect();
    if !errors.is_empty() {
        return Err(ConfigError::SchemaViolation {
            errors: errors.join("; "),
        });
    }
    Ok(())
}

/// Resolve one settings document from `defaults` plus `overrides` applied in
/// priority order (later entries win), then validate the result.
pub fn resolve_settings(
    schema: &Value,
    defaults: &Value,
    overrides: &[&Value],
) -> Result<Value, ConfigError> {
    let mut resolved = defaults.clone();
    for layer in overrides {
        resolved = merge_values(&resolved, layer);
    }
    validate_schema(schema, &resolved)?;
    Ok(resolved)
}

/// Fetch a required string field out of resolved settings.
pub fn required_str(settings: &Value, key: &str) -> Result<String, ConfigError> {
    settings
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ConfigError::MissingKey {
            key: key.to_string(),
        })
}
