//! 带凭证的 HTTP 客户端
//!
//! Bearer 模式下，存储中有凭证时每个请求附带 `Authorization: Bearer <token>`，
//! 没有凭证时不发送该头。Cookie 模式使用 [`SessionCookies`] 作为 cookie jar，从不附带 Authorization。
//! 客户端只读取凭证，任何路径上都不修改凭证存储；cookie 会话只在 [`HttpClient::clear_session`] 时清除。

use super::cookies::SessionCookies;
use super::hooks::{Outcome, RequestHook, ResponseHook};
use super::RequestParts;
use crate::config::{ApiConfig, AuthMode};
use crate::error::{ApiError, ErrorPayload};
use crate::store::CredentialStore;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

enum Payload<'a, B: ?Sized> {
    Empty,
    Json(&'a B),
    Form(&'a B),
}

pub struct HttpClient {
    client: Client,
    base_url: String,
    auth_mode: AuthMode,
    store: Arc<dyn CredentialStore>,
    /// 仅 Cookie 模式下存在
    cookies: Option<SessionCookies>,
    request_hooks: Vec<Arc<dyn RequestHook>>,
    response_hooks: Vec<Arc<dyn ResponseHook>>,
}

impl HttpClient {
    /// 创建新的客户端，cookie 会话只保存在进程内
    pub fn new(api: &ApiConfig, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        Self::with_cookies(api, store, SessionCookies::in_memory())
    }

    /// 使用给定的 cookie jar；Bearer 模式下忽略
    pub fn with_cookies(
        api: &ApiConfig,
        store: Arc<dyn CredentialStore>,
        cookies: SessionCookies,
    ) -> Result<Self, ApiError> {
        let mut builder = Client::builder().timeout(api.timeout());
        let cookies = match api.auth_mode {
            AuthMode::Cookie => {
                builder = builder.cookie_provider(cookies.provider());
                Some(cookies)
            }
            AuthMode::Bearer => None,
        };
        let client = builder
            .build()
            .map_err(|e| ApiError::Build(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: api.base_url.trim().trim_end_matches('/').to_string(),
            auth_mode: api.auth_mode,
            store,
            cookies,
            request_hooks: Vec::new(),
            response_hooks: Vec::new(),
        })
    }

    pub fn with_request_hook(mut self, hook: Arc<dyn RequestHook>) -> Self {
        self.request_hooks.push(hook);
        self
    }

    pub fn with_response_hook(mut self, hook: Arc<dyn ResponseHook>) -> Self {
        self.response_hooks.push(hook);
        self
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.auth_mode
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// 清除 cookie 会话（Bearer 模式下无操作）
    pub fn clear_session(&self) {
        if let Some(cookies) = &self.cookies {
            cookies.clear();
            tracing::debug!("Session cookies cleared");
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim().trim_start_matches('/'))
    }

    /// GET 并解析 JSON 响应
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.dispatch::<(), T>(Method::GET, path, Payload::Empty).await
    }

    /// POST JSON 请求体并解析 JSON 响应
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.dispatch(Method::POST, path, Payload::Json(body)).await
    }

    /// POST `application/x-www-form-urlencoded` 请求体并解析 JSON 响应
    pub async fn post_form<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.dispatch(Method::POST, path, Payload::Form(body)).await
    }

    /// 空请求体的 POST
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.dispatch::<(), T>(Method::POST, path, Payload::Empty).await
    }

    async fn dispatch<B, T>(
        &self,
        method: Method,
        path: &str,
        payload: Payload<'_, B>,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut parts = RequestParts {
            method,
            path: path.to_string(),
            headers: Default::default(),
        };

        for hook in &self.request_hooks {
            hook.on_request(&mut parts);
        }

        // 凭证在钩子之后附加，钩子无法伪造或遗留 Authorization
        parts.headers.remove(AUTHORIZATION);
        if self.auth_mode == AuthMode::Bearer {
            if let Some(credential) = self.store.get() {
                let value = HeaderValue::from_str(&credential.authorization())
                    .map_err(|_| ApiError::Build("access token is not a valid header value".into()));
                match value {
                    Ok(mut value) => {
                        value.set_sensitive(true);
                        parts.headers.insert(AUTHORIZATION, value);
                    }
                    Err(e) => return self.finish(&parts, Instant::now(), Err(e)),
                }
            }
        }

        let started = Instant::now();
        let builder = self
            .client
            .request(parts.method.clone(), self.url(&parts.path))
            .headers(parts.headers.clone());
        let builder = match payload {
            Payload::Empty => builder,
            Payload::Json(body) => builder.json(body),
            Payload::Form(body) => builder.form(body),
        };

        let result = execute::<T>(builder).await;

        // 收到响应后保存 Set-Cookie 带来的变化
        if let Some(cookies) = &self.cookies {
            if !matches!(result, Err(ApiError::Network(_))) {
                cookies.save();
            }
        }

        self.finish(&parts, started, result)
    }

    /// 执行响应钩子（成功与失败路径都会执行），然后原样返回结果
    fn finish<T>(
        &self,
        parts: &RequestParts,
        started: Instant,
        result: Result<(reqwest::StatusCode, T), ApiError>,
    ) -> Result<T, ApiError> {
        let elapsed = started.elapsed();
        {
            let outcome = match &result {
                Ok((status, _)) => Outcome::Success {
                    status: *status,
                    elapsed,
                },
                Err(error) => Outcome::Failure { error, elapsed },
            };
            for hook in &self.response_hooks {
                hook.on_response(parts, &outcome);
            }
        }
        result.map(|(_, value)| value)
    }
}

async fn execute<T: DeserializeOwned>(
    builder: RequestBuilder,
) -> Result<(reqwest::StatusCode, T), ApiError> {
    let response = builder.send().await.map_err(ApiError::from)?;
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;

    if !status.is_success() {
        return Err(ApiError::Status {
            status,
            payload: ErrorPayload::from_body(&String::from_utf8_lossy(&bytes)),
        });
    }

    // 空响应体按 JSON null 处理，以便 T = () / Option<_>
    let body: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
    let value = serde_json::from_slice(body).map_err(|e| ApiError::Decode(e.to_string()))?;
    Ok((status, value))
}
