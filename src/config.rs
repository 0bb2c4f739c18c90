use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub shutdown: ShutdownConfig,
    pub cluster: ClusterConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// IP address to bind to
    #[serde(default = "default_server_ip")]
    pub ip: String,

    /// Port to listen on
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Largest request body accepted by the API bridge
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ShutdownConfig {
    /// Time allowed for draining before the process is forced to exit
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ClusterConfig {
    /// How this worker tells its orchestrator to stop routing traffic here
    #[serde(default)]
    pub mode: ClusterMode,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClusterMode {
    /// No orchestrator; deregistration is only logged
    #[default]
    Standalone,
    /// Signal the parent process that spawned this worker
    ParentSignal,
}

impl ShutdownConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

impl AppConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("server.ip", default_server_ip())?
            .set_default("server.port", default_server_port() as i64)?
            .set_default("server.max_body_bytes", default_max_body_bytes() as i64)?
            .set_default("shutdown.grace_period_ms", default_grace_period_ms() as i64)?
            .set_default("cluster.mode", "standalone")?
            .add_source(File::with_name(&path_str).required(false))
            // MEADOWLARK_SHUTDOWN__GRACE_PERIOD_MS=2000
            .add_source(
                Environment::with_prefix("MEADOWLARK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.port", std::env::var("PORT").ok())?
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Render as TOML, the format `load_from_file` reads
    pub fn to_toml(&self) -> crate::error::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.ip.trim().is_empty() {
            return Err(ConfigError::Message(
                "Server ip must not be empty".to_string(),
            ));
        }

        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::Message(
                "Server max_body_bytes must be greater than 0".to_string(),
            ));
        }

        if self.shutdown.grace_period_ms == 0 {
            return Err(ConfigError::Message(
                "Shutdown grace_period_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                ip: default_server_ip(),
                port: default_server_port(),
                max_body_bytes: default_max_body_bytes(),
            },
            shutdown: ShutdownConfig {
                grace_period_ms: default_grace_period_ms(),
            },
            cluster: ClusterConfig {
                mode: ClusterMode::default(),
            },
        }
    }
}

fn default_server_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_server_port() -> u16 {
    3000
}
fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_grace_period_ms() -> u64 {
    5000
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.shutdown.grace_period(), Duration::from_millis(5000));
        assert_eq!(config.cluster.mode, ClusterMode::Standalone);
    }

    #[test]
    fn test_load_from_file() {
        let file = write_config(
            r#"
[server]
ip = "127.0.0.1"

[shutdown]
grace_period_ms = 250

[cluster]
mode = "parent_signal"
"#,
        );

        let config = AppConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.server.ip, "127.0.0.1");
        assert_eq!(config.server.max_body_bytes, default_max_body_bytes());
        assert_eq!(config.shutdown.grace_period_ms, 250);
        assert_eq!(config.cluster.mode, ClusterMode::ParentSignal);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from_file(dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.shutdown.grace_period_ms, 5000);
        assert_eq!(config.server.ip, "0.0.0.0");
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.shutdown.grace_period_ms = 0;
        assert!(config.validate().is_err());

        config.shutdown.grace_period_ms = 5000;
        config.server.max_body_bytes = 0;
        assert!(config.validate().is_err());

        config.server.max_body_bytes = 1024;
        config.server.ip = "  ".to_string();
        assert!(config.validate().is_err());

        config.server.ip = "127.0.0.1".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_serializes_to_toml() {
        let rendered = AppConfig::default().to_toml().unwrap();

        assert!(rendered.contains("grace_period_ms = 5000"));
        assert!(rendered.contains("mode = \"standalone\""));
    }
}
