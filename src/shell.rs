//! 导航外壳
//!
//! 两个状态：未登录（初始）与已登录，均由凭证存储推导。
//! - 只有登录成功才会进入已登录状态；
//! - 显式登出，或受保护请求返回未认证时，清除凭证并回到登录页；
//! - 刷新失败与未认证访问同样处理，不对外暴露“刷新中”状态。
//!
//! 登录请求无法取消。每次提交领取一个 [`LoginTicket`]，期间发生的导航会使票据失效，
//! 过期票据对应的结果被丢弃，不会写入存储。

use crate::error::AuthError;
use crate::guard::{Navigation, Route, RouteGuard, SessionState};
use crate::models::user::User;
use crate::services::AuthService;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
struct NavState {
    current: Route,
    generation: u64,
}

/// 一次登录提交的凭据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginTicket {
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// 登录成功并完成跳转
    Navigated(Navigation),
    /// 结果到达时已离开登录页，结果被丢弃
    Discarded,
}

pub struct Shell {
    auth: Arc<AuthService>,
    guard: RouteGuard,
    nav: Mutex<NavState>,
}

impl Shell {
    pub fn new(auth: Arc<AuthService>) -> Self {
        let guard = RouteGuard::new(auth.store().clone());
        Self {
            auth,
            guard,
            nav: Mutex::new(NavState {
                current: Route::Root,
                generation: 0,
            }),
        }
    }

    fn nav(&self) -> MutexGuard<'_, NavState> {
        self.nav.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn auth(&self) -> &Arc<AuthService> {
        &self.auth
    }

    pub fn state(&self) -> SessionState {
        self.guard.state()
    }

    pub fn current_route(&self) -> Route {
        self.nav().current
    }

    /// 启动时根据已持久化的凭证恢复会话并进入首页
    pub fn restore(&self) -> Navigation {
        let state = self.state();
        tracing::info!(?state, "Session restored");
        self.navigate(Route::Root)
    }

    /// 导航到指定路由，同时使进行中的登录票据失效
    pub fn navigate(&self, route: Route) -> Navigation {
        let navigation = self.guard.resolve(route);
        let mut nav = self.nav();
        nav.generation += 1;
        nav.current = navigation.target();

        tracing::debug!(requested = %route, target = %nav.current, "Navigation");
        navigation
    }

    pub fn begin_login(&self) -> LoginTicket {
        LoginTicket {
            generation: self.nav().generation,
        }
    }

    fn is_current(&self, ticket: LoginTicket) -> bool {
        self.nav().generation == ticket.generation
    }

    /// 提交登录表单；失败时存储与状态保持不变，错误交给表单展示
    pub async fn submit_login(
        &self,
        ticket: LoginTicket,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome, AuthError> {
        let result = self.auth.authenticate(username, password).await;

        if !self.is_current(ticket) {
            tracing::debug!(%username, "Discarding late login result");
            return Ok(LoginOutcome::Discarded);
        }

        let credential = result?;
        self.auth.accept(credential);
        tracing::info!(%username, "Login succeeded");

        Ok(LoginOutcome::Navigated(self.navigate(Route::Dashboard)))
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let ticket = self.begin_login();
        self.submit_login(ticket, username, password).await
    }

    /// 登出并回到登录页，不会失败
    pub fn logout(&self) -> Navigation {
        self.auth.logout();
        self.navigate(Route::Login)
    }

    /// 受保护的当前用户请求
    pub async fn current_user(&self) -> Result<User, AuthError> {
        let result = self.auth.current_user().await;
        self.observe(result)
    }

    /// 刷新令牌；任何失败都按未认证处理
    pub async fn refresh(&self) -> Result<(), AuthError> {
        match self.auth.refresh_token().await {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "Refresh failed, ending session");
                self.observe::<()>(Err(AuthError::Unauthenticated))
            }
        }
    }

    /// 受保护请求返回未认证时结束会话
    pub fn observe<T>(&self, result: Result<T, AuthError>) -> Result<T, AuthError> {
        if let Err(e) = &result {
            if e.is_unauthenticated() {
                self.logout();
            }
        }
        result
    }
}
