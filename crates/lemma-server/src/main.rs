use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

mod event_bus;
mod handlers;
mod logging;
mod server;
mod state;

use event_bus::EventBus;
use lemma_config::ConfigManager;
use lemma_session::{JsonStorage, JsonStorageConfig, SessionManager, SessionManagerConfig};
use logging::init_logging;
use server::run_server;
use state::AppState;

#[derive(Parser, Debug, Clone)]
#[command(name = "lemma-server")]
#[command(about = "Lemma proof tutoring HTTP server")]
#[command(version)]
struct Cli {
    /// Enable debug mode
    #[arg(long, env = "DEBUG", default_value = "false")]
    debug: bool,

    /// Server port (overrides config)
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// Session storage directory (overrides config)
    #[arg(long, env = "LEMMA_STORAGE")]
    storage_path: Option<String>,

    /// Log level (overrides config)
    #[arg(long, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Config file path
    #[arg(long, env = "LEMMA_CONFIG", default_value = "~/.lemma/config.json")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 展开配置文件路径
    let config_path = lemma_config::expand_tilde(&cli.config)
        .unwrap_or_else(|| std::path::PathBuf::from(&cli.config));

    // 初始化 Lemma 目录结构
    if let Err(e) = lemma_config::init_lemma_dirs().await {
        eprintln!("Warning: Failed to init lemma directories: {}", e);
    }

    // 加载配置
    let config_manager = match ConfigManager::load(&config_path).await {
        Ok(cm) => cm,
        Err(e) => {
            eprintln!("Failed to load config from {:?}: {}", config_path, e);
            std::process::exit(1);
        }
    };
    let config = config_manager.get().read().await.clone();

    // CLI 参数覆盖配置文件
    let port = cli.port.unwrap_or(config.server.port);
    let host = cli.host.unwrap_or_else(|| config.server.host.clone());
    let storage_path = cli
        .storage_path
        .or_else(|| config.storage.path.clone())
        .unwrap_or_else(|| "~/.lemma/sessions".to_string());

    let log_level = cli
        .log_level
        .clone()
        .or_else(|| Some(format!("{:?}", config.logging.level).to_lowercase()));
    init_logging(log_level.as_deref(), cli.debug);

    tracing::info!("Starting Lemma server");
    tracing::info!("  Config: {:?}", config_path);
    tracing::info!("  Storage: {}", storage_path);
    tracing::info!("  CORS: {}", config.server.cors);

    // 装配存储、会话管理器与事件总线
    let storage = JsonStorage::new(JsonStorageConfig::new(&storage_path)).await?;
    let manager = SessionManager::new(SessionManagerConfig::default(), Arc::new(storage));
    let event_bus = Arc::new(EventBus::default());
    let app_state = AppState::new(manager, event_bus);

    run_server(app_state, &host, port, config.server.cors).await
}
