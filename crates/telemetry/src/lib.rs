//! telemetry - 可观测性库

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// 查询成功次数，标签 `source` = storage | remote
pub const RESOLUTIONS_TOTAL: &str = "postal_resolutions_total";
/// 查询失败次数，标签 `kind`
pub const RESOLUTION_ERRORS_TOTAL: &str = "postal_resolution_errors_total";
/// 单次查询耗时
pub const RESOLUTION_DURATION_MS: &str = "postal_resolution_duration_ms";
/// 存储写失败（写回或统计），标签 `operation`
pub const STORAGE_WRITE_FAILURES_TOTAL: &str = "postal_storage_write_failures_total";

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

/// 初始化 tracing
///
/// 重复初始化时保留已有的 subscriber
pub fn init_tracing(log_level: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// 初始化 JSON 格式的 tracing（生产环境）
pub fn init_tracing_json(log_level: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .try_init();
}

/// 初始化 Prometheus metrics，返回用于渲染快照的 handle
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// 注册指标说明
pub fn describe_metrics() {
    metrics::describe_counter!(RESOLUTIONS_TOTAL, "Successful postal code resolutions");
    metrics::describe_counter!(RESOLUTION_ERRORS_TOTAL, "Failed postal code resolutions");
    metrics::describe_histogram!(
        RESOLUTION_DURATION_MS,
        metrics::Unit::Milliseconds,
        "Postal code resolution latency"
    );
    metrics::describe_counter!(
        STORAGE_WRITE_FAILURES_TOTAL,
        "Write-back or statistic updates that failed without failing the resolution"
    );
}
