pub mod config;
pub mod manager;

pub use config::{
    Config, ConfigError, ConfigResult, LogLevel, LoggingConfig, ServerConfig, StorageConfig,
};
pub use manager::ConfigManager;

use std::path::PathBuf;

/// 获取 Lemma 配置目录路径
pub fn lemma_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".lemma"))
}

/// 获取默认配置文件路径
pub fn default_config_path() -> Option<PathBuf> {
    lemma_dir().map(|dir| dir.join("config.json"))
}

/// 获取默认 sessions 目录
pub fn default_sessions_dir() -> Option<PathBuf> {
    lemma_dir().map(|dir| dir.join("sessions"))
}

/// 获取默认日志文件路径
pub fn default_log_path() -> Option<PathBuf> {
    lemma_dir().map(|dir| dir.join("logs").join("lemma.log"))
}

/// 初始化 Lemma 目录结构
pub async fn init_lemma_dirs() -> ConfigResult<()> {
    if let Some(lemma) = lemma_dir() {
        tokio::fs::create_dir_all(&lemma).await?;
        tokio::fs::create_dir_all(lemma.join("sessions")).await?;
        tokio::fs::create_dir_all(lemma.join("logs")).await?;
    }
    Ok(())
}

/// 展开路径中的 ~ 为用户主目录
pub fn expand_tilde(path: &str) -> Option<PathBuf> {
    if let Some(stripped) = path.strip_prefix("~/") {
        dirs::home_dir().map(|home| home.join(stripped))
    } else {
        Some(PathBuf::from(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lemma_dir() {
        let dir = lemma_dir();
        assert!(dir.is_some());
        assert!(dir.unwrap().to_string_lossy().contains(".lemma"));
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde("~/.lemma/config.json");
        assert!(expanded.is_some());
        assert!(!expanded.unwrap().to_string_lossy().starts_with("~"));

        let absolute = expand_tilde("/var/lib/lemma");
        assert_eq!(absolute, Some(PathBuf::from("/var/lib/lemma")));
    }
}
