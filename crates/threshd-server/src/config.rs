use serde::{Deserialize, Serialize};
use threshd_eval::definition::EventDefaults;
use threshd_eval::loader::ThresholdConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Fallback `tracing` filter when `RUST_LOG` is not set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Default event identifiers injected into every threshold that does not
    /// set its own
    #[serde(default)]
    pub events: EventDefaults,

    #[serde(default)]
    pub thresholds: Vec<ThresholdConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            events: EventDefaults::default(),
            thresholds: Vec::new(),
        }
    }
}

fn default_log_filter() -> String {
    "threshd=info".to_string()
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path, e))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path, e))?;
        Ok(config)
    }
}
