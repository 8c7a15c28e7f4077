//! 配置系统
//! 从环境变量加载所有配置（前缀 PORTAL_），提供默认值并校验合法性

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// 凭证文件名（位于本地数据目录下）
const CREDENTIAL_FILE: &str = "credential.json";

/// 凭证的传输方式，每个部署只能启用一种
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// `Authorization: Bearer <token>` 请求头
    Bearer,
    /// 依赖 cookie jar（相当于 withCredentials），不发送 Authorization 头
    Cookie,
}

/// 登录请求体的编码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginEncoding {
    Json,
    Form,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// 后端 API 根地址，例如 "http://localhost:8000/api/v1"
    pub base_url: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
    /// 凭证传输方式: bearer, cookie
    pub auth_mode: AuthMode,
    /// 登录请求编码: json, form
    pub login_encoding: LoginEncoding,
    /// 当前用户接口路径: /auth/me 或 /users/me
    pub me_path: String,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 凭证持久化文件路径
    pub path: PathBuf,
}

impl StorageConfig {
    /// Cookie 模式下会话 cookie 的文件，与凭证文件同目录
    pub fn cookie_path(&self) -> PathBuf {
        self.path.with_extension("cookies.json")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty, compact
    pub format: String,
}

/// 客户端表单校验规则（提交前在本地拦截）
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    pub username_min_length: u64,
    pub username_max_length: u64,
    pub password_min_length: u64,
    pub password_max_length: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            username_min_length: 3,
            username_max_length: 50,
            password_min_length: 6,
            password_max_length: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub validation: ValidationConfig,
}

/// 默认凭证文件位置：平台本地数据目录，取不到时退回当前目录
pub fn default_credential_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("ops-portal"))
        .unwrap_or_else(|| PathBuf::from(".ops-portal"))
        .join(CREDENTIAL_FILE)
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = ValidationConfig::default();
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("api.base_url", "http://localhost:8000/api/v1")?
            .set_default("api.timeout_secs", 30)?
            .set_default("api.auth_mode", "bearer")?
            .set_default("api.login_encoding", "json")?
            .set_default("api.me_path", "/auth/me")?
            .set_default(
                "storage.path",
                default_credential_path().to_string_lossy().into_owned(),
            )?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .set_default("validation.username_min_length", defaults.username_min_length)?
            .set_default("validation.username_max_length", defaults.username_max_length)?
            .set_default("validation.password_min_length", defaults.password_min_length)?
            .set_default("validation.password_max_length", defaults.password_max_length)?;

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
        // 验证 API 地址
        let base = self.api.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::Message(format!(
                "Invalid api.base_url: {}. Must start with http:// or https://",
                self.api.base_url
            )));
        }

        if self.api.timeout_secs < 1 || self.api.timeout_secs > 300 {
            return Err(ConfigError::Message(
                "api.timeout_secs must be between 1 and 300".to_string(),
            ));
        }

        match self.api.me_path.as_str() {
            "/auth/me" | "/users/me" => {}
            other => {
                return Err(ConfigError::Message(format!(
                    "Invalid api.me_path: {}. Must be one of: /auth/me, /users/me",
                    other
                )))
            }
        }

        if self.storage.path.as_os_str().is_empty() {
            return Err(ConfigError::Message("storage.path must not be empty".to_string()));
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
            "json" | "pretty" | "compact" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty, compact",
                    self.logging.format
                )))
            }
        }

        // 验证表单校验规则
        let v = &self.validation;
        if v.username_min_length < 1 || v.username_min_length > v.username_max_length {
            return Err(ConfigError::Message(
                "username_min_length must be >= 1 and <= username_max_length".to_string(),
            ));
        }
        if v.password_min_length < 1 || v.password_min_length > v.password_max_length {
            return Err(ConfigError::Message(
                "password_min_length must be >= 1 and <= password_max_length".to_string(),
            ));
        }

        Ok(())
    }
}
