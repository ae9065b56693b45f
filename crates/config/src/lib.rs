//! postal-config - 配置加载库
//!
//! 加载顺序（后者覆盖前者）：
//! `{dir}/default.toml` → `{dir}/{APP_ENV}.toml` → `DB_*` 环境变量 → `POSTAL_*` 环境变量

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),

    #[error(
        "All database configuration variables ({}) must be set in the environment variables",
        .0.join(", ")
    )]
    MissingDatabaseVariables(Vec<&'static str>),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 读取 `.env` 文件（不存在时忽略），由进程入口显式调用
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// 数据库配置
///
/// 可以直接给出 `url`，也可以给出 host/port/username/password/name 五项
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<Secret<String>>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<Secret<String>>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// 连接最大生命周期，超过后回收
    #[serde(default = "default_max_lifetime_secs")]
    pub max_lifetime_secs: u64,
    /// 启动时是否执行迁移
    #[serde(default = "default_true")]
    pub auto_migrate: bool,
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

fn default_idle_timeout_secs() -> u64 {
    600
}

fn default_max_lifetime_secs() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: None,
            port: None,
            username: None,
            password: None,
            name: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            max_lifetime_secs: default_max_lifetime_secs(),
            auto_migrate: true,
        }
    }
}

impl DatabaseConfig {
    /// 未设置的连接组件（以环境变量名表示）
    pub fn missing_variables(&self) -> Vec<&'static str> {
        if self.url.is_some() {
            return Vec::new();
        }

        let mut missing = Vec::new();
        if self.host.is_none() {
            missing.push("DB_HOST");
        }
        if self.port.is_none() {
            missing.push("DB_PORT");
        }
        if self.username.is_none() {
            missing.push("DB_USER");
        }
        if self.password.is_none() {
            missing.push("DB_PASS");
        }
        if self.name.is_none() {
            missing.push("DB_NAME");
        }
        missing
    }

    /// 连接 URL，优先使用 `url`，否则由组件拼接
    pub fn connection_url(&self) -> Result<Secret<String>, ConfigError> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }

        match (&self.host, self.port, &self.username, &self.password, &self.name) {
            (Some(host), Some(port), Some(username), Some(password), Some(name)) => {
                Ok(Secret::new(format!(
                    "postgres://{}:{}@{}:{}/{}",
                    urlencoding::encode(username),
                    urlencoding::encode(password.expose_secret()),
                    host,
                    port,
                    name
                )))
            }
            _ => Err(ConfigError::MissingDatabaseVariables(
                self.missing_variables(),
            )),
        }
    }
}

/// 存储后端
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Redis,
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Redis => "redis",
            Self::Memory => "memory",
        }
    }
}

/// 存储配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

/// Redis 配置
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Secret<String>,
}

/// 远端数据源配置
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 国家代码，作为请求路径的一部分
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

fn default_base_url() -> String {
    "https://api.zippopotam.us".to_string()
}

fn default_country() -> String {
    "RU".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_retry_initial_delay_ms() -> u64 {
    200
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            country: default_country(),
            request_timeout_secs: default_request_timeout_secs(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

/// 查找失败时的处理方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupFailureMode {
    /// 直接返回存储错误
    #[default]
    Fail,
    /// 记录告警后按未命中处理，继续请求远端
    FallThrough,
}

/// 查询配置
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub lookup_failure: LookupFailureMode,
    /// 单次查询超时
    #[serde(default = "default_resolve_timeout_secs")]
    pub resolve_timeout_secs: u64,
}

fn default_resolve_timeout_secs() -> u64 {
    30
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            lookup_failure: LookupFailureMode::default(),
            resolve_timeout_secs: default_resolve_timeout_secs(),
        }
    }
}

/// 遥测配置
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// 是否输出 JSON 日志（生产环境总是 JSON）
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json: false,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_app_env")]
    pub app_env: String,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_app_name() -> String {
    "postal-lookup".to_string()
}

fn default_app_env() -> String {
    "development".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            app_env: default_app_env(),
            database: DatabaseConfig::default(),
            storage: StorageConfig::default(),
            redis: None,
            remote: RemoteConfig::default(),
            resolver: ResolverConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

/// 旧版环境变量到配置键的映射
const LEGACY_DATABASE_VARS: &[(&str, &str)] = &[
    ("DB_HOST", "database.host"),
    ("DB_PORT", "database.port"),
    ("DB_USER", "database.username"),
    ("DB_PASS", "database.password"),
    ("DB_NAME", "database.name"),
];

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").ok();

        let mut figment = Figment::new()
            .merge(Toml::file(format!("{}/default.toml", config_dir)))
            .merge(Toml::file(format!(
                "{}/{}.toml",
                config_dir,
                env.as_deref().unwrap_or("development")
            )));

        figment = Self::merge_legacy_database_env(figment)?;
        figment = figment.merge(Env::prefixed("POSTAL_").split("__"));

        if let Some(env) = env {
            figment = figment.merge(Serialized::default("app_env", env));
        }

        Ok(figment.extract()?)
    }

    /// `DB_HOST` 等变量按字符串读取，避免数字密码被当作整数解析
    fn merge_legacy_database_env(mut figment: Figment) -> Result<Figment, ConfigError> {
        for (var, key) in LEGACY_DATABASE_VARS {
            let Ok(value) = std::env::var(var) else {
                continue;
            };

            if *var == "DB_PORT" {
                let port: u16 = value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::Invalid(format!("DB_PORT is not a port: {value}")))?;
                figment = figment.merge(Serialized::default(key, port));
            } else {
                figment = figment.merge(Serialized::default(key, value));
            }
        }
        Ok(figment)
    }

    /// 校验配置，由进程入口在使用前显式调用
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.storage.backend {
            StorageBackend::Postgres => {
                let missing = self.database.missing_variables();
                if !missing.is_empty() {
                    return Err(ConfigError::MissingDatabaseVariables(missing));
                }
            }
            StorageBackend::Redis => {
                if self.redis.is_none() {
                    return Err(ConfigError::Invalid(
                        "storage.backend is redis but redis.url is not set".to_string(),
                    ));
                }
            }
            StorageBackend::Memory => {}
        }

        if self.remote.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("remote.base_url must not be empty".to_string()));
        }
        if self.remote.country.trim().is_empty() {
            return Err(ConfigError::Invalid("remote.country must not be empty".to_string()));
        }
        if self.remote.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "remote.request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.resolver.resolve_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "resolver.resolve_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid(format!(
                "database.min_connections ({}) exceeds database.max_connections ({})",
                self.database.min_connections, self.database.max_connections
            )));
        }

        Ok(())
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }
}
