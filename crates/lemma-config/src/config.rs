use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 主配置结构体
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub version: String,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// 获取配置值的快捷方法
    pub fn get_value(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["version"] => Some(self.version.clone()),
            ["server", "port"] => Some(self.server.port.to_string()),
            ["server", "host"] => Some(self.server.host.clone()),
            ["server", "cors"] => Some(self.server.cors.to_string()),
            ["storage", "path"] => self.storage.path.clone(),
            ["logging", "level"] => Some(format!("{:?}", self.logging.level).to_lowercase()),
            ["logging", "file"] => self.logging.file.clone(),
            _ => None,
        }
    }

    /// 设置配置值
    pub fn set_value(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["server", "port"] => {
                self.server.port = value.parse().map_err(|_| {
                    ConfigError::Validation(format!("Invalid port number: {}", value))
                })?;
            }
            ["server", "host"] => {
                self.server.host = value.to_string();
            }
            ["server", "cors"] => {
                self.server.cors = value
                    .parse()
                    .map_err(|_| ConfigError::Validation(format!("Invalid boolean: {}", value)))?;
            }
            ["storage", "path"] => {
                self.storage.path = Some(value.to_string());
            }
            ["logging", "level"] => {
                self.logging.level = value.parse()?;
            }
            ["logging", "file"] => {
                self.logging.file = Some(value.to_string());
            }
            _ => return Err(ConfigError::KeyNotFound(key.to_string())),
        }
        Ok(())
    }
}

/// Server 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8082,
            host: "127.0.0.1".to_string(),
            cors: true,
        }
    }
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StorageConfig {
    /// 会话存储根目录，None 时使用 ~/.lemma/sessions
    pub path: Option<String>,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// 日志文件路径，None 时只输出到 stderr
    pub file: Option<String>,
}

/// 日志级别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(ConfigError::Validation(format!(
                "Invalid log level: {}",
                other
            ))),
        }
    }
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// 配置结果类型
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8082);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.server.cors);
        assert!(config.storage.path.is_none());
    }

    #[test]
    fn test_get_value() {
        let config = Config::default();
        assert_eq!(config.get_value("server.port"), Some("8082".to_string()));
        assert_eq!(config.get_value("logging.level"), Some("info".to_string()));
        assert_eq!(config.get_value("storage.path"), None);
        assert_eq!(config.get_value("no.such.key"), None);
    }

    #[test]
    fn test_set_value() {
        let mut config = Config::default();
        config.set_value("server.port", "9000").unwrap();
        assert_eq!(config.server.port, 9000);

        config.set_value("logging.level", "debug").unwrap();
        assert_eq!(config.logging.level, LogLevel::Debug);

        assert!(config.set_value("server.port", "not-a-port").is_err());
        assert!(config.set_value("no.such.key", "x").is_err());
    }
}
