//! 统一错误模型
//! HTTP 层错误（ApiError）与认证层错误（AuthError）

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// 展示给用户的错误消息最大字符数
const MAX_MESSAGE_CHARS: usize = 200;

/// 后端返回的错误体
///
/// 兼容 `{"error": "...", "message": "..."}` 与 `{"detail": ...}` 两种格式，
/// `detail` 可能是字符串，也可能是校验错误列表。
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorPayload {
    /// 从响应体解析，非 JSON 的正文作为 message 保留
    pub fn from_body(body: &str) -> Option<Self> {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return None;
        }
        match serde_json::from_str::<ErrorPayload>(trimmed) {
            Ok(payload) => Some(payload),
            Err(_) => Some(ErrorPayload {
                message: Some(trimmed.to_string()),
                ..Default::default()
            }),
        }
    }

    /// 最适合展示的一条消息
    pub fn summary(&self) -> Option<String> {
        if let Some(message) = self.message.as_deref().filter(|m| !m.is_empty()) {
            return Some(message.to_string());
        }
        if let Some(detail) = &self.detail {
            match detail {
                serde_json::Value::String(s) => return Some(s.clone()),
                serde_json::Value::Array(items) => {
                    let msgs: Vec<String> = items
                        .iter()
                        .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                        .map(str::to_string)
                        .collect();
                    if !msgs.is_empty() {
                        return Some(msgs.join("; "));
                    }
                }
                _ => {}
            }
        }
        self.error.clone()
    }
}

/// HTTP 客户端错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 收到非 2xx 响应
    #[error("HTTP {status}: {}", describe(.payload))]
    Status {
        status: StatusCode,
        payload: Option<ErrorPayload>,
    },

    /// 未收到响应（连接失败、超时）
    #[error("Network error: {0}")]
    Network(String),

    /// 成功响应但无法解析
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// 请求本身无法构建
    #[error("Invalid request: {0}")]
    Build(String),
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn payload(&self) -> Option<&ErrorPayload> {
        match self {
            ApiError::Status { payload, .. } => payload.as_ref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            ApiError::Build(err.to_string())
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

fn describe(payload: &Option<ErrorPayload>) -> String {
    payload
        .as_ref()
        .and_then(ErrorPayload::summary)
        .unwrap_or_default()
}

/// 认证服务错误
#[derive(Debug, Error)]
pub enum AuthError {
    /// 输入不合法（本地校验失败，或 401/409 以外的 4xx）
    #[error("Validation failed: {0}")]
    Validation(String),

    /// 登录时用户名或密码错误（401）
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// 未登录或凭证被后端拒绝
    #[error("Not authenticated")]
    Unauthenticated,

    /// 身份已存在（409）
    #[error("Conflict: {0}")]
    Conflict(String),

    /// 未收到响应
    #[error("Network error: {0}")]
    Network(String),

    /// 5xx 或其他非预期状态
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// 响应格式不符合预期
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl AuthError {
    /// 获取用户友好的错误消息（不包含令牌等敏感信息）
    pub fn user_message(&self) -> String {
        let message = match self {
            AuthError::Validation(msg) => msg.clone(),
            AuthError::InvalidCredentials(msg) => msg.clone(),
            AuthError::Unauthenticated => "请先登录".to_string(),
            AuthError::Conflict(msg) => msg.clone(),
            AuthError::Network(_) => "无法连接服务器，请稍后重试".to_string(),
            AuthError::Server { .. } => "服务器内部错误".to_string(),
            AuthError::Decode(_) => "服务器响应格式错误".to_string(),
        };
        sanitize(&message)
    }

    /// 是否应触发导航回到登录页
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, AuthError::Unauthenticated)
    }
}

/// 去除首尾空白并截断过长消息
fn sanitize(message: &str) -> String {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        "请求失败".to_string()
    } else {
        trimmed.chars().take(MAX_MESSAGE_CHARS).collect()
    }
}
