//! 请求/响应钩子
//!
//! 钩子在每次请求前后同步执行，按注册顺序调用。响应钩子在成功和失败路径上都会执行，
//! 只能通过引用观察结果，原始结果总会返回给调用方。

use super::RequestParts;
use crate::error::ApiError;
use reqwest::header::{HeaderValue, ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use std::time::Duration;

/// 一次请求的结果（供响应钩子观察）
#[derive(Debug)]
pub enum Outcome<'a> {
    Success {
        status: StatusCode,
        elapsed: Duration,
    },
    Failure {
        error: &'a ApiError,
        elapsed: Duration,
    },
}

impl Outcome<'_> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Outcome::Success { status, .. } => Some(*status),
            Outcome::Failure { error, .. } => error.status(),
        }
    }
}

pub trait RequestHook: Send + Sync {
    fn on_request(&self, request: &mut RequestParts);
}

pub trait ResponseHook: Send + Sync {
    fn on_response(&self, request: &RequestParts, outcome: &Outcome<'_>);
}

/// 结构化请求日志
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHook;

impl RequestHook for TracingHook {
    fn on_request(&self, request: &mut RequestParts) {
        tracing::debug!(method = %request.method, path = %request.path, "Sending request");
    }
}

impl ResponseHook for TracingHook {
    fn on_response(&self, request: &RequestParts, outcome: &Outcome<'_>) {
        match outcome {
            Outcome::Success { status, elapsed } => tracing::info!(
                method = %request.method,
                path = %request.path,
                status = status.as_u16(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Request completed"
            ),
            Outcome::Failure { error, elapsed } => tracing::warn!(
                method = %request.method,
                path = %request.path,
                status = error.status().map(|s| s.as_u16()),
                elapsed_ms = elapsed.as_millis() as u64,
                error = %error,
                "Request failed"
            ),
        }
    }
}

/// 补齐 Accept 与 User-Agent 头
#[derive(Debug, Clone)]
pub struct DefaultHeadersHook {
    user_agent: HeaderValue,
}

impl Default for DefaultHeadersHook {
    fn default() -> Self {
        Self {
            user_agent: HeaderValue::from_static(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            )),
        }
    }
}

impl RequestHook for DefaultHeadersHook {
    fn on_request(&self, request: &mut RequestParts) {
        request
            .headers
            .entry(ACCEPT)
            .or_insert_with(|| HeaderValue::from_static("application/json"));
        request
            .headers
            .entry(USER_AGENT)
            .or_insert_with(|| self.user_agent.clone());
    }
}
