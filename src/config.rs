//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息

use config::{Config, ConfigError, Environment};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址，例如 "0.0.0.0:3000"
    pub addr: String,
    /// 优雅关闭超时时间（秒）
    pub graceful_shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库连接 URL（使用 Secret 包装，防止日志泄露）
    pub url: Secret<String>,
    /// 最大连接数
    pub max_connections: u32,
    /// 最小连接数
    pub min_connections: u32,
    /// 获取连接超时时间（秒）
    pub acquire_timeout_secs: u64,
    /// 空闲连接超时时间（秒）
    pub idle_timeout_secs: u64,
    /// 连接最大生命周期（秒）
    pub max_lifetime_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// 会话签名密钥（使用 Secret 包装，防止日志泄露）
    pub session_secret: Secret<String>,
    /// 会话有效期（秒）
    pub session_lifetime_secs: u64,
    /// 会话 Cookie 名称
    pub session_cookie_name: String,
    /// URL 权限缓存的滑动过期时间（秒）
    pub permission_cache_ttl_secs: u64,
}

impl SecurityConfig {
    pub fn permission_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.permission_cache_ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 抄表照片上传根目录
    pub upload_root: String,
    /// 静态资源目录（/dist、/plugins）
    pub static_root: String,
    /// 上传大小上限（字节）
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    /// 文字识别接口地址
    pub endpoint: String,
    /// 接口密钥，未设置时识别功能返回错误
    pub api_key: Option<Secret<String>>,
    /// 单次请求的图片数量
    pub batch_size: usize,
    /// 请求超时（秒）
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// SMTP 主机，未设置时禁用邮件发送
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<Secret<String>>,
    /// 发件人地址
    pub from: String,
    /// 抄送地址（逗号分隔）
    pub cc: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub storage: StorageConfig,
    pub ocr: OcrConfig,
    pub mail: MailConfig,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("server.addr", "0.0.0.0:3000")?
            .set_default("server.graceful_shutdown_timeout_secs", 30)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.idle_timeout_secs", 600)?
            .set_default("database.max_lifetime_secs", 1800)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("security.session_secret", "change-this-session-secret-min-32-chars!")?
            .set_default("security.session_lifetime_secs", 28800)?
            .set_default("security.session_cookie_name", "portal_session")?
            .set_default("security.permission_cache_ttl_secs", 1200)?
            .set_default("storage.upload_root", "./uploads")?
            .set_default("storage.static_root", "./wwwroot")?
            .set_default("storage.max_upload_bytes", 20 * 1024 * 1024)?
            .set_default("ocr.endpoint", "https://vision.googleapis.com/v1/images:annotate")?
            .set_default("ocr.batch_size", 16)?
            .set_default("ocr.timeout_secs", 60)?
            .set_default("mail.port", 587)?
            .set_default("mail.from", "meter@localhost")?;

        // 从环境变量加载配置（前缀为 PORTAL_）
        settings = settings.add_source(
            Environment::with_prefix("PORTAL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 验证端口范围
        if let Some(port_str) = self.server.addr.split(':').next_back() {
            if let Ok(port) = port_str.parse::<u16>() {
                if port != 0 && port < 1024 {
                    return Err(ConfigError::Message("Server port should be >= 1024".to_string()));
                }
            }
        }

        // 验证日志级别
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        // 验证日志格式
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        // 验证数据库连接池配置
        if self.database.max_connections < self.database.min_connections {
            return Err(ConfigError::Message(
                "max_connections must be >= min_connections".to_string(),
            ));
        }

        // 验证会话密钥长度（至少 32 字符）
        if self.security.session_secret.expose_secret().len() < 32 {
            return Err(ConfigError::Message(
                "Session secret must be at least 32 characters long".to_string(),
            ));
        }

        // 验证会话有效期
        if self.security.session_lifetime_secs < 300 || self.security.session_lifetime_secs > 86400
        {
            return Err(ConfigError::Message(
                "session_lifetime_secs must be between 300 and 86400 (5 minutes to 24 hours)"
                    .to_string(),
            ));
        }

        if self.security.session_cookie_name.trim().is_empty() {
            return Err(ConfigError::Message("session_cookie_name must not be empty".to_string()));
        }

        // 验证权限缓存过期时间
        if self.security.permission_cache_ttl_secs == 0
            || self.security.permission_cache_ttl_secs > 86400
        {
            return Err(ConfigError::Message(
                "permission_cache_ttl_secs must be between 1 and 86400".to_string(),
            ));
        }

        if self.ocr.batch_size == 0 {
            return Err(ConfigError::Message("ocr.batch_size must be > 0".to_string()));
        }

        Ok(())
    }
}
