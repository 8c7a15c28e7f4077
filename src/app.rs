//! 组装根：启动时创建凭证存储、HTTP 客户端、认证服务与导航外壳

use crate::{
    config::AppConfig,
    error::ApiError,
    http::{DefaultHeadersHook, HttpClient, SessionCookies, TracingHook},
    services::AuthService,
    shell::Shell,
    store::{CredentialStore, FileCredentialStore},
};
use std::sync::Arc;

pub struct Portal {
    pub config: AppConfig,
    pub store: Arc<dyn CredentialStore>,
    pub http: Arc<HttpClient>,
    pub auth: Arc<AuthService>,
    pub shell: Shell,
}

impl Portal {
    /// 使用配置中的凭证文件与 cookie 文件
    pub fn from_config(config: AppConfig) -> Result<Self, ApiError> {
        let store: Arc<dyn CredentialStore> =
            Arc::new(FileCredentialStore::open(&config.storage.path));
        let cookies = SessionCookies::open(config.storage.cookie_path());
        Self::with_session(config, store, cookies)
    }

    /// 使用外部提供的存储（测试中注入内存存储），cookie 只保存在进程内
    pub fn with_store(config: AppConfig, store: Arc<dyn CredentialStore>) -> Result<Self, ApiError> {
        Self::with_session(config, store, SessionCookies::in_memory())
    }

    pub fn with_session(
        config: AppConfig,
        store: Arc<dyn CredentialStore>,
        cookies: SessionCookies,
    ) -> Result<Self, ApiError> {
        let tracing_hook = Arc::new(TracingHook);
        let http = Arc::new(
            HttpClient::with_cookies(&config.api, store.clone(), cookies)?
                .with_request_hook(Arc::new(DefaultHeadersHook::default()))
                .with_request_hook(tracing_hook.clone())
                .with_response_hook(tracing_hook),
        );
        let auth = Arc::new(AuthService::new(http.clone(), &config));
        let shell = Shell::new(auth.clone());

        tracing::debug!(
            base_url = %config.api.base_url,
            auth_mode = ?config.api.auth_mode,
            "Portal initialized"
        );

        Ok(Self {
            config,
            store,
            http,
            auth,
            shell,
        })
    }
}
