//! 统一配置中心
//!
//! 提供应用的全局配置管理，包括：
//! - 服务监听地址
//! - 数据库连接（可选，缺省时使用内存存储）
//! - JWT认证
//! - 消息正文上限
//! - 实时推送的队列容量
//!
//! 加载顺序：默认值 -> `APP_CONFIG_FILE` 指定的文件 -> `APP_*` 环境变量
//! （嵌套字段用 `__` 分隔，例如 `APP_SERVER__PORT`）。

use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// JWT 密钥的最小长度（256 位）
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// 全局应用配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub messaging: MessagingConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

/// 服务器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// 数据库配置，`url` 为空时使用内存存储
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// JWT配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// 消息正文上限（Unicode 码点）
    pub max_content_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// 每个会话的出站队列容量
    pub session_buffer: usize,
    /// 推送队列容量
    pub fanout_queue: usize,
    /// 去重时记住的最近消息数
    pub dedupe_window: usize,
}

/// 内存存储模式下预置的用户与商品，使用数据库时忽略
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeedConfig {
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub items: Vec<SeedItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedUser {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedItem {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            max_content_chars: 2000,
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            session_buffer: 64,
            fanout_queue: 1024,
            dedupe_window: 4096,
        }
    }
}

impl Default for AppConfig {
    /// 开发环境默认值，生产环境应通过文件或环境变量覆盖 JWT 密钥
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 8080,
            },
            database: DatabaseConfig::default(),
            jwt: JwtConfig {
                secret: "local-development-secret-change-before-deploying".into(),
                expiration_hours: 24,
            },
            messaging: MessagingConfig::default(),
            realtime: RealtimeConfig::default(),
            seed: SeedConfig::default(),
        }
    }
}

impl AppConfig {
    /// 按默认值、配置文件、环境变量的顺序合并并校验
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// 合并后的配置源，供调用方追加更高优先级的来源
    pub fn figment() -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Ok(path) = std::env::var("APP_CONFIG_FILE") {
            if path.ends_with(".yml") || path.ends_with(".yaml") {
                figment = figment.merge(Yaml::file(path));
            } else if path.ends_with(".json") {
                figment = figment.merge(Json::file(path));
            } else {
                figment = figment.merge(Toml::file(path));
            }
        }
        figment.merge(Env::prefixed("APP_").split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidServerPort(
                "port must be greater than 0".to_string(),
            ));
        }

        if self.jwt.secret.chars().count() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::InvalidJwtSecret(format!(
                "JWT secret must be at least {MIN_JWT_SECRET_LEN} characters long"
            )));
        }

        if self.jwt.expiration_hours <= 0 {
            return Err(ConfigError::InvalidJwtSecret(
                "JWT expiration must be positive".to_string(),
            ));
        }

        if let Some(url) = &self.database.url {
            if url.trim().is_empty() {
                return Err(ConfigError::InvalidDatabaseConfig(
                    "database url cannot be blank".to_string(),
                ));
            }
            if self.database.max_connections == 0 {
                return Err(ConfigError::InvalidDatabaseConfig(
                    "max connections must be greater than 0".to_string(),
                ));
            }
        }

        if self.messaging.max_content_chars == 0 {
            return Err(ConfigError::InvalidMessagingConfig(
                "max content chars must be greater than 0".to_string(),
            ));
        }

        let realtime = &self.realtime;
        if realtime.session_buffer == 0 || realtime.fanout_queue == 0 {
            return Err(ConfigError::InvalidRealtimeConfig(
                "queue capacities must be greater than 0".to_string(),
            ));
        }

        for item in &self.seed.items {
            if !self.seed.users.iter().any(|user| user.id == item.owner_id) {
                return Err(ConfigError::InvalidSeedConfig(format!(
                    "item {} is owned by unknown user {}",
                    item.id, item.owner_id
                )));
            }
        }

        Ok(())
    }

    /// 脱敏后的配置，用于日志
    pub fn sanitize(&self) -> String {
        let mut redacted = self.clone();
        redacted.jwt.secret = "[REDACTED]".into();
        if redacted.database.url.is_some() {
            redacted.database.url = Some("[REDACTED]".into());
        }
        format!("{redacted:?}")
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("Invalid JWT secret: {0}")]
    InvalidJwtSecret(String),
    #[error("Invalid server port: {0}")]
    InvalidServerPort(String),
    #[error("Invalid database configuration: {0}")]
    InvalidDatabaseConfig(String),
    #[error("Invalid messaging configuration: {0}")]
    InvalidMessagingConfig(String),
    #[error("Invalid realtime configuration: {0}")]
    InvalidRealtimeConfig(String),
    #[error("Invalid seed data: {0}")]
    InvalidSeedConfig(String),
}
