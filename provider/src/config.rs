//! Bridge configuration
//!
//! Configuration is loaded from environment variables.

use std::env;
use std::time::Duration;

use crate::session::provider::ProviderConfig;

/// Main bridge configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address
    pub host: String,
    /// Port
    pub port: u16,

    /// SCORM session configuration
    pub scorm: ScormConfig,

    /// Demo backend configuration
    pub demo: DemoConfig,
}

/// SCORM session configuration
#[derive(Debug, Clone)]
pub struct ScormConfig {
    /// Protocol version ("1.2" or "2004")
    pub version: String,
    /// Log connection and write failures
    pub debug: bool,
    /// Wait before retrying a refused init
    pub connect_retry_delay: Duration,
}

/// Seed values for the in-memory backend the bridge runs against
#[derive(Debug, Clone, Default)]
pub struct DemoConfig {
    /// Learner name reported by the backend
    pub learner_name: Option<String>,
    /// Initial serialized suspend data
    pub suspend_data: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            scorm: ScormConfig::default(),
            demo: DemoConfig::default(),
        }
    }
}

impl Default for ScormConfig {
    fn default() -> Self {
        Self {
            version: "2004".to_string(),
            debug: false,
            connect_retry_delay: Duration::from_millis(1000),
        }
    }
}

impl From<&ScormConfig> for ProviderConfig {
    fn from(config: &ScormConfig) -> Self {
        ProviderConfig {
            version: config.version.clone(),
            debug: config.debug,
            connect_retry_delay: config.connect_retry_delay,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = env::var("HOST") {
            config.host = host;
        }
        if let Ok(port) = env::var("PORT")
            && let Ok(p) = port.parse()
        {
            config.port = p;
        }

        // SCORM config
        if let Ok(version) = env::var("SCORM_VERSION")
            && !version.is_empty()
        {
            config.scorm.version = version;
        }
        if let Ok(val) = env::var("SCORM_DEBUG") {
            config.scorm.debug = val.to_lowercase() == "true" || val == "1";
        }
        if let Ok(val) = env::var("SCORM_CONNECT_RETRY_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            config.scorm.connect_retry_delay = Duration::from_millis(ms);
        }

        // Demo config
        if let Ok(name) = env::var("SCORM_LEARNER_NAME")
            && !name.is_empty()
        {
            config.demo.learner_name = Some(name);
        }
        if let Ok(data) = env::var("SCORM_SUSPEND_DATA")
            && !data.is_empty()
        {
            config.demo.suspend_data = Some(data);
        }

        config
    }
}
