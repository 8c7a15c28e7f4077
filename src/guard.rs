//! 路由守卫
//!
//! 会话状态完全由凭证存储推导：有凭证即已登录。守卫不关心用户信息。

use crate::store::CredentialStore;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    Authenticated,
}

impl SessionState {
    pub fn from_store(store: &dyn CredentialStore) -> Self {
        if store.get().is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        }
    }

    pub fn is_authenticated(self) -> bool {
        self == SessionState::Authenticated
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Root,
    Login,
    Dashboard,
    Profile,
    NotFound,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Root => "/",
            Route::Login => "/login",
            Route::Dashboard => "/dashboard",
            Route::Profile => "/profile",
            Route::NotFound => "/404",
        }
    }

    /// 需要登录才能访问
    pub fn is_protected(self) -> bool {
        matches!(self, Route::Dashboard | Route::Profile)
    }
}

impl FromStr for Route {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let path = s.trim();
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let path = path.trim_end_matches('/');
        Ok(match path {
            "" => Route::Root,
            "/login" => Route::Login,
            "/dashboard" => Route::Dashboard,
            "/profile" => Route::Profile,
            _ => Route::NotFound,
        })
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// 一次导航的决策
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Render(Route),
    Redirect(Route),
}

impl Navigation {
    /// 最终落到的路由
    pub fn target(self) -> Route {
        match self {
            Navigation::Render(route) | Navigation::Redirect(route) => route,
        }
    }
}

pub struct RouteGuard {
    store: Arc<dyn CredentialStore>,
}

impl RouteGuard {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_store(self.store.as_ref())
    }

    pub fn resolve(&self, route: Route) -> Navigation {
        decide(self.state(), route)
    }
}

/// 纯函数形式的导航决策
pub fn decide(state: SessionState, route: Route) -> Navigation {
    let authenticated = state.is_authenticated();
    match route {
        Route::Root if authenticated => Navigation::Redirect(Route::Dashboard),
        Route::Root => Navigation::Redirect(Route::Login),
        Route::Login if authenticated => Navigation::Redirect(Route::Dashboard),
        r if r.is_protected() && !authenticated => Navigation::Redirect(Route::Login),
        r => Navigation::Render(r),
    }
}
