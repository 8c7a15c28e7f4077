//! 后端 HTTP 客户端

pub mod client;
pub mod cookies;
pub mod hooks;

use reqwest::header::HeaderMap;
use reqwest::Method;

pub use client::HttpClient;
pub use cookies::SessionCookies;
pub use hooks::{DefaultHeadersHook, Outcome, RequestHook, ResponseHook, TracingHook};

/// 发送前可被钩子调整的请求信息
#[derive(Debug, Clone)]
pub struct RequestParts {
    pub method: Method,
    /// 相对 API 根地址的路径，例如 "/auth/me"
    pub path: String,
    pub headers: HeaderMap,
}
