//! 认证服务：登录、注册、当前用户、令牌刷新、登出
//!
//! 每个操作只做一次请求/响应往返，不做自动重试。只有成功路径会修改凭证存储。

use crate::{
    config::{AppConfig, LoginEncoding},
    error::{ApiError, AuthError},
    guard::SessionState,
    http::HttpClient,
    models::{auth::*, user::User},
    services::validation::FormPolicy,
    store::CredentialStore,
};
use reqwest::StatusCode;
use std::sync::Arc;

const LOGIN_PATH: &str = "/auth/login";
const REGISTER_PATH: &str = "/auth/register";
const REFRESH_PATH: &str = "/auth/refresh";

/// 后端用 400 表示身份已存在时使用的错误码
const IDENTITY_TAKEN_CODES: [&str; 2] = ["Username taken", "Email taken"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Login,
    Register,
    CurrentUser,
    Refresh,
}

pub struct AuthService {
    http: Arc<HttpClient>,
    store: Arc<dyn CredentialStore>,
    policy: FormPolicy,
    login_encoding: LoginEncoding,
    me_path: String,
}

impl AuthService {
    /// 凭证存储取自 HTTP 客户端，两者共享同一实例
    pub fn new(http: Arc<HttpClient>, config: &AppConfig) -> Self {
        Self {
            store: http.store().clone(),
            http,
            policy: FormPolicy::new(config.validation.clone()),
            login_encoding: config.api.login_encoding,
            me_path: config.api.me_path.clone(),
        }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn session_state(&self) -> SessionState {
        SessionState::from_store(self.store.as_ref())
    }

    /// 用户登录，成功后保存凭证
    pub async fn login(&self, username: &str, password: &str) -> Result<Credential, AuthError> {
        let credential = self.authenticate(username, password).await?;
        self.accept(credential.clone());

        tracing::info!(%username, "Login succeeded");
        Ok(credential)
    }

    /// 保存 `authenticate` 得到的凭证
    pub fn accept(&self, credential: Credential) {
        self.store.set(credential);
        tracing::debug!("Credential stored");
    }

    /// 与 `login` 相同的请求，但不写入存储
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Credential, AuthError> {
        self.policy.check_login(username, password)?;

        let req = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };

        let result: Result<TokenResponse, ApiError> = match self.login_encoding {
            LoginEncoding::Json => self.http.post_json(LOGIN_PATH, &req).await,
            LoginEncoding::Form => self.http.post_form(LOGIN_PATH, &req).await,
        };

        let resp = result.map_err(|e| {
            tracing::warn!(%username, error = %e, "Login failed");
            map_error(e, Operation::Login)
        })?;

        if resp.access_token.is_empty() {
            return Err(AuthError::Decode("login response has empty access_token".into()));
        }

        Ok(Credential::from(resp))
    }

    /// 注册新用户，不修改存储
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<User, AuthError> {
        self.policy.check_register(username, password, email)?;

        let req = RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
            email: email.trim().to_string(),
        };

        let user: User = self
            .http
            .post_json(REGISTER_PATH, &req)
            .await
            .map_err(|e| map_error(e, Operation::Register))?;

        tracing::info!(user_id = user.id, username = %user.username, "User registered");
        Ok(user)
    }

    /// 获取当前用户；没有凭证时不发请求，也不尝试刷新
    pub async fn current_user(&self) -> Result<User, AuthError> {
        if self.store.get().is_none() {
            tracing::debug!("No credential present, skipping current user request");
            return Err(AuthError::Unauthenticated);
        }

        self.http
            .get_json(&self.me_path)
            .await
            .map_err(|e| map_error(e, Operation::CurrentUser))
    }

    /// 刷新令牌，成功后整体替换存储中的凭证
    pub async fn refresh_token(&self) -> Result<Credential, AuthError> {
        let current = self.store.get().ok_or(AuthError::Unauthenticated)?;

        let result: Result<TokenResponse, ApiError> = match current.refresh_token {
            Some(refresh_token) => {
                self.http
                    .post_json(REFRESH_PATH, &RefreshTokenRequest { refresh_token })
                    .await
            }
            None => self.http.post_empty(REFRESH_PATH).await,
        };

        let resp = result.map_err(|e| {
            tracing::warn!(error = %e, "Token refresh failed");
            map_error(e, Operation::Refresh)
        })?;

        if resp.access_token.is_empty() {
            return Err(AuthError::Decode("refresh response has empty access_token".into()));
        }

        let credential = Credential::from(resp);
        self.store.set(credential.clone());

        tracing::info!("Access token refreshed");
        Ok(credential)
    }

    /// 本地登出：清除凭证与 cookie 会话，不请求后端
    pub fn logout(&self) {
        self.store.clear();
        self.http.clear_session();
        tracing::info!("Logged out, credential cleared");
    }
}

/// 将 HTTP 失败映射为认证错误
fn map_error(err: ApiError, op: Operation) -> AuthError {
    let (status, payload) = match err {
        ApiError::Network(msg) => return AuthError::Network(msg),
        ApiError::Decode(msg) => return AuthError::Decode(msg),
        ApiError::Build(msg) => return AuthError::Validation(msg),
        ApiError::Status { status, payload } => (status, payload),
    };

    let summary = payload.as_ref().and_then(|p| p.summary());
    let code = payload.as_ref().and_then(|p| p.error.as_deref());

    match status {
        StatusCode::UNAUTHORIZED if op == Operation::Login => AuthError::InvalidCredentials(
            summary.unwrap_or_else(|| "用户名或密码不正确".to_string()),
        ),
        StatusCode::UNAUTHORIZED => AuthError::Unauthenticated,
        StatusCode::FORBIDDEN if matches!(op, Operation::CurrentUser | Operation::Refresh) => {
            AuthError::Unauthenticated
        }
        StatusCode::CONFLICT => {
            AuthError::Conflict(summary.unwrap_or_else(|| "用户名或邮箱已被注册".to_string()))
        }
        StatusCode::BAD_REQUEST
            if op == Operation::Register
                && code.is_some_and(|c| IDENTITY_TAKEN_CODES.contains(&c)) =>
        {
            AuthError::Conflict(summary.unwrap_or_else(|| "用户名或邮箱已被注册".to_string()))
        }
        s if s.is_client_error() => {
            AuthError::Validation(summary.unwrap_or_else(|| "请求参数不合法".to_string()))
        }
        s => AuthError::Server {
            status: s.as_u16(),
            message: summary.unwrap_or_else(|| s.to_string()),
        },
    }
}
