//! Builds a module invocation from the payload file, flags and configuration.
//!
//! Precedence, lowest first: configuration, payload file, flags. The
//! client settings (`region`, `profile`, `endpoint_url`) and `dry_run` are
//! taken out of the payload; everything else is handed to the module as
//! parameters.

use super::Cli;
use crate::config::{AwsConfig, Config};
use crate::error::{Error, Result};
use crate::modules::{ModuleContext, ModuleParams, ParamExt};
use std::path::Path;

/// Payload keys that configure the client rather than the group
const CLIENT_KEYS: &[&str] = &["region", "profile", "endpoint_url"];

/// A fully resolved invocation
#[derive(Debug, Clone)]
pub struct Request {
    pub params: ModuleParams,
    pub context: ModuleContext,
    pub aws: AwsConfig,
}

impl Request {
    pub fn from_cli(cli: &Cli, config: &Config) -> Result<Self> {
        let mut params = match &cli.params {
            Some(path) => load_payload(path)?,
            None => ModuleParams::new(),
        };

        let dry_run = params
            .get_bool("dry_run")
            .map_err(|e| Error::InvalidArgument(e.to_string()))?
            .unwrap_or(false);
        params.remove("dry_run");

        let mut aws = config.aws.clone();
        for key in CLIENT_KEYS {
            let value = params
                .get_string(key)
                .map_err(|e| Error::InvalidArgument(e.to_string()))?;
            params.remove(*key);
            if let Some(value) = value {
                match *key {
                    "region" => aws.region = Some(value),
                    "profile" => aws.profile = Some(value),
                    _ => aws.endpoint_url = Some(value),
                }
            }
        }
        if let Some(ref region) = cli.region {
            aws.region = Some(region.clone());
        }
        if let Some(ref profile) = cli.profile {
            aws.profile = Some(profile.clone());
        }
        if let Some(ref endpoint_url) = cli.endpoint_url {
            aws.endpoint_url = Some(endpoint_url.clone());
        }

        if let Some(ref name) = cli.name {
            params.insert("name".to_string(), serde_json::json!(name));
        }
        if let Some(ref description) = cli.description {
            params.insert("description".to_string(), serde_json::json!(description));
        }
        if let Some(ref vpc_id) = cli.vpc_id {
            params.insert("vpc_id".to_string(), serde_json::json!(vpc_id));
        }
        if !cli.rules.is_empty() {
            let rules = cli
                .rules
                .iter()
                .map(|rule| {
                    serde_json::from_str::<serde_json::Value>(rule).map_err(|e| {
                        Error::InvalidArgument(format!("--rule '{}' is not valid JSON: {}", rule, e))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            params.insert("rules".to_string(), serde_json::Value::Array(rules));
        }

        Ok(Self {
            params,
            context: ModuleContext::new()
                .with_check_mode(cli.check_mode || dry_run)
                .with_diff_mode(cli.diff_mode),
            aws,
        })
    }
}

/// Load a JSON or YAML payload; it must be a mapping.
pub fn load_payload(path: &Path) -> Result<ModuleParams> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::request(path, format!("failed to read: {}", e)))?;

    let value: serde_json::Value = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)?,
        _ => serde_yaml::from_str(&content)?,
    };

    match value {
        serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(Error::request(
            path,
            format!("expected a mapping, found {}", json_type(&other)),
        )),
    }
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a list",
        serde_json::Value::Object(_) => "a mapping",
    }
}
