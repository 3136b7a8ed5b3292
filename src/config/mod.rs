use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Process start-time parameters. There is no further runtime configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub quiet: bool,
    pub html_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 7860,
            quiet: false,
            html_path: PathBuf::from("index.html"),
        }
    }
}

/// Ordered endpoint list for a single model. The configured order is the
/// failover priority order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEndpoints {
    pub endpoints: Vec<String>,
}

/// Routing tables partitioned by image capability, plus public-name aliases.
/// Read-only after startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub image_support: FxHashMap<String, ModelEndpoints>,
    #[serde(default)]
    pub no_image_support: FxHashMap<String, ModelEndpoints>,
    #[serde(default)]
    pub model_aliases: FxHashMap<String, String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        let mut image_support = FxHashMap::default();
        image_support.insert(
            "gpt-4o-mini".to_string(),
            ModelEndpoints {
                endpoints: vec![
                    "https://oi-vscode-server-2.onrender.com".to_string(),
                    "https://oi-vscode-server-0501.onrender.com".to_string(),
                ],
            },
        );
        image_support.insert(
            "google/gemini-2.0-flash-001".to_string(),
            ModelEndpoints {
                endpoints: vec!["https://oi-vscode-server-2.onrender.com".to_string()],
            },
        );

        let mut no_image_support = FxHashMap::default();
        no_image_support.insert(
            "deepseek-v3".to_string(),
            ModelEndpoints {
                endpoints: vec!["https://oi-vscode-server-0501.onrender.com".to_string()],
            },
        );

        let mut model_aliases = FxHashMap::default();
        model_aliases.insert(
            "gemini-2.0-flash".to_string(),
            "google/gemini-2.0-flash-001".to_string(),
        );

        Self {
            image_support,
            no_image_support,
            model_aliases,
        }
    }
}

impl RoutingConfig {
    fn contains_model(&self, model: &str) -> bool {
        self.image_support.contains_key(model) || self.no_image_support.contains_key(model)
    }
}

/// Full application configuration, built once at startup and never mutated.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub routing: RoutingConfig,
}

/// Load the routing tables, either the compiled-in defaults or a YAML file
/// replacing them wholesale.
///
/// # Errors
///
/// Returns `ConfigError` when the file cannot be read or parsed, or when the
/// resulting tables fail validation.
pub fn load_routing(path: Option<&Path>) -> Result<RoutingConfig, ConfigError> {
    let mut routing = match path {
        None => RoutingConfig::default(),
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&raw)?
        }
    };
    validate_routing(&mut routing)?;
    Ok(routing)
}

/// Validate and normalize the routing tables in place: every model must have
/// at least one endpoint, endpoints must be absolute http(s) URLs (trailing
/// slashes are trimmed), and every alias must point at a known model.
fn validate_routing(routing: &mut RoutingConfig) -> Result<(), ConfigError> {
    let alias_targets: Vec<(String, String)> = routing
        .model_aliases
        .iter()
        .map(|(alias, target)| (alias.clone(), target.clone()))
        .collect();
    for (alias, target) in alias_targets {
        if !routing.contains_model(&target) {
            return Err(ConfigError::Validation(format!(
                "alias '{alias}' points at model '{target}' which is not in any routing table"
            )));
        }
    }

    for (category, table) in [
        ("image_support", &mut routing.image_support),
        ("no_image_support", &mut routing.no_image_support),
    ] {
        for (model, entry) in table.iter_mut() {
            if entry.endpoints.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "model '{model}' in {category} has no endpoints"
                )));
            }
            for endpoint in &mut entry.endpoints {
                let parsed = url::Url::parse(endpoint).map_err(|err| {
                    ConfigError::Validation(format!(
                        "endpoint '{endpoint}' for model '{model}' is not a valid URL: {err}"
                    ))
                })?;
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    return Err(ConfigError::Validation(format!(
                        "endpoint '{endpoint}' for model '{model}' must use http or https"
                    )));
                }
                while endpoint.ends_with('/') {
                    endpoint.pop();
                }
            }
        }
    }

    Ok(())
}
