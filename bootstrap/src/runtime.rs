//! 服务运行时

use postal_config::AppConfig;
use postal_telemetry::{describe_metrics, init_tracing, init_tracing_json};
use tracing::{error, info};

/// 初始化运行时（日志与指标说明）
pub fn init_runtime(config: &AppConfig) {
    if config.is_production() || config.telemetry.json {
        init_tracing_json(&config.telemetry.log_level);
    } else {
        init_tracing(&config.telemetry.log_level);
    }
    describe_metrics();

    info!(
        app_name = %config.app_name,
        app_env = %config.app_env,
        backend = config.storage.backend.as_str(),
        "Runtime initialized"
    );
}

/// 等待关闭信号（Ctrl+C / SIGTERM）
///
/// 信号处理器安装失败时该分支永不完成
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
