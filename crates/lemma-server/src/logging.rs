//! 日志初始化

use tracing_subscriber::EnvFilter;

/// 初始化 tracing 订阅器
///
/// 优先级：显式 level 参数 > RUST_LOG 环境变量 > debug 标志 > info。
pub fn init_logging(level: Option<&str>, debug: bool) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if debug {
                EnvFilter::new("debug")
            } else {
                EnvFilter::new("info")
            }
        }),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
