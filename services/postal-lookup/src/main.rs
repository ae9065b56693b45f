//! Postal Lookup - 邮编查询命令行入口
//!
//! 负责加载配置、装配基础设施，并在所有退出路径上释放连接

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use postal_bootstrap::{Infrastructure, init_runtime, shutdown_signal};
use postal_config::{AppConfig, StorageBackend, load_dotenv};
use postal_errors::{AppError, AppResult};
use postal_lookup::PostalCodeResolver;
use postal_ports::{PostalCodeSource, PostalCodeStore};
use postal_telemetry::init_metrics;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "postal-lookup", version, about = "Cache-aside postal code lookup")]
struct Cli {
    /// 配置目录
    #[arg(long, env = "POSTAL_CONFIG_DIR", default_value = "config", global = true)]
    config_dir: String,

    /// 覆盖配置中的存储后端
    #[arg(long, value_enum, global = true)]
    backend: Option<BackendArg>,

    /// 退出前输出 Prometheus 指标快照（stderr）
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 查询一个或多个邮编
    Resolve {
        #[arg(required = true)]
        codes: Vec<String>,

        /// 以 JSON 输出记录
        #[arg(long)]
        json: bool,
    },
    /// 查看请求统计
    Stats {
        #[arg(required = true)]
        codes: Vec<String>,

        #[arg(long)]
        json: bool,
    },
    /// 执行数据库迁移
    Migrate,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Postgres,
    Redis,
    Memory,
}

impl From<BackendArg> for StorageBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Postgres => Self::Postgres,
            BackendArg::Redis => Self::Redis,
            BackendArg::Memory => Self::Memory,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    load_dotenv();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            exit_code(&e)
        }
    }
}

fn exit_code(error: &AppError) -> ExitCode {
    ExitCode::from(u8::try_from(error.exit_code()).unwrap_or(1))
}

async fn run(cli: Cli) -> AppResult<ExitCode> {
    let mut config = AppConfig::load(&cli.config_dir)
        .map_err(|e| AppError::configuration(e.to_string()))?;
    if let Some(backend) = cli.backend {
        config.storage.backend = backend.into();
    }
    config
        .validate()
        .map_err(|e| AppError::configuration(e.to_string()))?;

    init_runtime(&config);

    let metrics = if cli.metrics {
        Some(init_metrics().map_err(|e| {
            AppError::internal(format!("Failed to install Prometheus recorder: {}", e))
        })?)
    } else {
        None
    };

    let infra = Infrastructure::from_config(config).await?;

    let result = tokio::select! {
        result = execute(&infra, cli.command) => result,
        _ = shutdown_signal() => {
            warn!("Interrupted, abandoning in-flight work");
            Err(AppError::internal("interrupted by shutdown signal"))
        }
    };

    infra.shutdown().await;

    if let Some(handle) = metrics {
        eprint!("{}", handle.render());
    }

    result
}

async fn execute(infra: &Infrastructure, command: Command) -> AppResult<ExitCode> {
    match command {
        Command::Migrate => {
            let result = infra.migrate().await?;
            println!(
                "Applied {} migration(s), {} already applied",
                result.applied_count(),
                result.skipped.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Resolve { codes, json } => {
            infra.initialize().await?;
            resolve_codes(infra, &codes, json).await
        }
        Command::Stats { codes, json } => {
            infra.initialize().await?;
            print_statistics(infra, &codes, json).await
        }
    }
}

fn resolver(infra: &Infrastructure) -> PostalCodeResolver<dyn PostalCodeStore, dyn PostalCodeSource> {
    PostalCodeResolver::new(infra.store(), infra.source())
        .with_lookup_failure(infra.config().resolver.lookup_failure)
}

/// 依次查询，任一失败时以第一个失败的退出码结束
async fn resolve_codes(infra: &Infrastructure, codes: &[String], json: bool) -> AppResult<ExitCode> {
    let resolver = resolver(infra);
    let timeout = Duration::from_secs(infra.config().resolver.resolve_timeout_secs);
    let mut first_failure: Option<AppError> = None;

    for code in codes {
        let failure = match tokio::time::timeout(timeout, resolver.resolve_with_source(code)).await
        {
            Ok(Ok((record, source))) => {
                info!(code = %record.code, source = source.as_str(), "Postal code resolved");
                if json {
                    let line = serde_json::to_string(&record).map_err(|e| {
                        AppError::internal(format!("Failed to encode record: {}", e))
                    })?;
                    println!("{}", line);
                } else {
                    println!("{}", record);
                }
                continue;
            }
            Ok(Err(e)) => {
                eprintln!("Failed to resolve postal code {}: {}", code, e);
                AppError::from(e)
            }
            Err(_) => {
                eprintln!(
                    "Failed to resolve postal code {}: timed out after {}s",
                    code,
                    timeout.as_secs()
                );
                AppError::external_service(format!("resolution of {} timed out", code))
            }
        };
        first_failure.get_or_insert(failure);
    }

    Ok(first_failure
        .map(|e| exit_code(&e))
        .unwrap_or(ExitCode::SUCCESS))
}

async fn print_statistics(
    infra: &Infrastructure,
    codes: &[String],
    json: bool,
) -> AppResult<ExitCode> {
    let resolver = resolver(infra);

    for code in codes {
        let stat = resolver.statistic(code).await?;
        let count = stat.as_ref().map(|s| s.request_count).unwrap_or(0);
        if json {
            println!(
                "{}",
                serde_json::json!({ "code": code.trim(), "requestCount": count })
            );
        } else {
            println!("{}: {}", code.trim(), count);
        }
    }

    Ok(ExitCode::SUCCESS)
}
