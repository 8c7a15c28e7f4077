//! 测试公共模块
//! 提供进程内桩后端（axum）与测试配置

#![allow(dead_code)]

use axum::{
    extract::{FromRequest, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use ops_portal::config::{
    ApiConfig, AppConfig, AuthMode, LoggingConfig, LoginEncoding, StorageConfig, ValidationConfig,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SESSION_COOKIE: &str = "session";

/// Cookie 模式的测试配置
pub fn create_cookie_config(base_url: &str) -> AppConfig {
    let mut config = create_test_config(base_url);
    config.api.auth_mode = AuthMode::Cookie;
    config
}

/// 创建测试配置
pub fn create_test_config(base_url: &str) -> AppConfig {
    AppConfig {
        api: ApiConfig {
            base_url: base_url.to_string(),
            timeout_secs: 5,
            auth_mode: AuthMode::Bearer,
            login_encoding: LoginEncoding::Json,
            me_path: "/auth/me".to_string(),
        },
        storage: StorageConfig {
            path: PathBuf::from("unused-in-memory-tests.json"),
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "compact".to_string(),
        },
        validation: ValidationConfig::default(),
    }
}

/// 桩后端记录下的请求
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub cookie: Option<String>,
}

#[derive(Debug, Clone)]
struct StubUser {
    id: i64,
    username: String,
    email: String,
    password: String,
    is_superuser: bool,
}

impl StubUser {
    fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "username": self.username,
            "email": self.email,
            "is_active": true,
            "is_superuser": self.is_superuser,
            "created_at": "2024-03-01T08:30:00",
            "updated_at": null
        })
    }
}

#[derive(Default)]
pub struct StubState {
    users: Mutex<Vec<StubUser>>,
    /// access token -> username
    access_tokens: Mutex<HashMap<String, String>>,
    /// refresh token -> username
    refresh_tokens: Mutex<HashMap<String, String>>,
    seen: Mutex<Vec<SeenRequest>>,
    counter: AtomicU64,
    issue_refresh_tokens: AtomicBool,
    reject_refresh: AtomicBool,
    login_delay_ms: AtomicU64,
}

impl StubState {
    pub fn add_user(&self, username: &str, password: &str, email: &str) {
        let mut users = self.users.lock().unwrap();
        let id = users.len() as i64 + 1;
        users.push(StubUser {
            id,
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            is_superuser: false,
        });
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn seen_for(&self, path: &str) -> Vec<SeenRequest> {
        self.seen()
            .into_iter()
            .filter(|r| r.path.ends_with(path))
            .collect()
    }

    pub fn set_issue_refresh_tokens(&self, enabled: bool) {
        self.issue_refresh_tokens.store(enabled, Ordering::SeqCst);
    }

    pub fn set_reject_refresh(&self, reject: bool) {
        self.reject_refresh.store(reject, Ordering::SeqCst);
    }

    pub fn set_login_delay(&self, delay: Duration) {
        self.login_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// 吊销某个访问令牌（模拟后端侧过期）
    pub fn revoke(&self, access_token: &str) {
        self.access_tokens.lock().unwrap().remove(access_token);
    }

    fn issue(&self, username: &str) -> serde_json::Value {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let access = format!("T{n}");
        self.access_tokens
            .lock()
            .unwrap()
            .insert(access.clone(), username.to_string());

        if self.issue_refresh_tokens.load(Ordering::SeqCst) {
            let refresh = format!("R{n}");
            self.refresh_tokens
                .lock()
                .unwrap()
                .insert(refresh.clone(), username.to_string());
            json!({ "access_token": access, "refresh_token": refresh, "token_type": "bearer" })
        } else {
            json!({ "access_token": access, "token_type": "bearer" })
        }
    }

    /// 从 bearer 头或 session cookie 解析当前用户
    fn authenticated_user(&self, headers: &HeaderMap) -> Option<StubUser> {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string);
        let cookie = headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| {
                v.split(';')
                    .filter_map(|pair| pair.trim().split_once('='))
                    .find(|(name, _)| *name == SESSION_COOKIE)
                    .map(|(_, value)| value.to_string())
            });

        let token = bearer.or(cookie)?;
        let username = self.access_tokens.lock().unwrap().get(&token).cloned()?;
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.username == username)
            .cloned()
    }
}

pub struct StubBackend {
    pub base_url: String,
    pub state: Arc<StubState>,
}

/// 在随机端口启动桩后端
pub async fn spawn_backend() -> StubBackend {
    let state = Arc::new(StubState::default());
    state.set_issue_refresh_tokens(true);

    let app = Router::new()
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/me", get(me))
        .route("/api/v1/users/me", get(me))
        .route("/api/v1/auth/refresh", post(refresh))
        .layer(middleware::from_fn_with_state(state.clone(), record))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind stub backend");
    let addr = listener.local_addr().expect("Failed to read local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    StubBackend {
        base_url: format!("http://{addr}/api/v1"),
        state,
    }
}

async fn record(State(state): State<Arc<StubState>>, req: Request, next: Next) -> Response {
    // 对 req 的借用必须在 await 之前结束
    let seen = {
        let header_value = |name: header::HeaderName| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        SeenRequest {
            method: req.method().to_string(),
            path: req.uri().path().to_string(),
            authorization: header_value(header::AUTHORIZATION),
            content_type: header_value(header::CONTENT_TYPE),
            cookie: header_value(header::COOKIE),
        }
    };
    state.seen.lock().unwrap().push(seen);
    next.run(req).await
}

#[derive(Deserialize)]
struct LoginBody {
    username: String,
    password: String,
}

async fn login(State(state): State<Arc<StubState>>, req: Request) -> Response {
    let is_form = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"));

    let body = if is_form {
        match Form::<LoginBody>::from_request(req, &()).await {
            Ok(Form(body)) => body,
            Err(rejection) => return rejection.into_response(),
        }
    } else {
        match Json::<LoginBody>::from_request(req, &()).await {
            Ok(Json(body)) => body,
            Err(_) => {
                return (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({ "detail": [{ "loc": ["body"], "msg": "invalid body" }] })),
                )
                    .into_response()
            }
        }
    };

    let delay = state.login_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let matched = state
        .users
        .lock()
        .unwrap()
        .iter()
        .any(|u| (u.username == body.username || u.email == body.username) && u.password == body.password);

    if !matched {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid credentials", "message": "用户名/邮箱或密码不正确" })),
        )
            .into_response();
    }

    let tokens = state.issue(&body.username);
    let cookie = format!(
        "{SESSION_COOKIE}={}; Path=/; HttpOnly",
        tokens["access_token"].as_str().unwrap_or_default()
    );
    ([(header::SET_COOKIE, cookie)], Json(tokens)).into_response()
}

#[derive(Deserialize)]
struct RegisterBody {
    username: String,
    password: String,
    email: String,
}

async fn register(
    State(state): State<Arc<StubState>>,
    Json(body): Json<RegisterBody>,
) -> Response {
    {
        let users = state.users.lock().unwrap();
        if users.iter().any(|u| u.username == body.username) {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Username taken", "message": "用户名已被注册" })),
            )
                .into_response();
        }
        if users.iter().any(|u| u.email == body.email) {
            return (
                StatusCode::CONFLICT,
                Json(json!({ "detail": "邮箱已被注册" })),
            )
                .into_response();
        }
    }

    state.add_user(&body.username, &body.password, &body.email);
    let user = state
        .users
        .lock()
        .unwrap()
        .iter()
        .find(|u| u.username == body.username)
        .map(StubUser::to_json)
        .unwrap_or_default();
    (StatusCode::CREATED, Json(user)).into_response()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        Json(json!({ "detail": "Could not validate credentials" })),
    )
        .into_response()
}

async fn me(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    match state.authenticated_user(&headers) {
        Some(user) => Json(user.to_json()).into_response(),
        None => unauthorized(),
    }
}

#[derive(Deserialize, Default)]
struct RefreshBody {
    refresh_token: Option<String>,
}

async fn refresh(State(state): State<Arc<StubState>>, headers: HeaderMap, body: String) -> Response {
    if state.reject_refresh.load(Ordering::SeqCst) {
        return unauthorized();
    }

    let Some(user) = state.authenticated_user(&headers) else {
        return unauthorized();
    };

    let body: RefreshBody = serde_json::from_str(&body).unwrap_or_default();
    if let Some(token) = body.refresh_token {
        if state.refresh_tokens.lock().unwrap().remove(&token).is_none() {
            return unauthorized();
        }
    }

    // 旧的访问令牌随刷新一起失效
    if let Some(old) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        state.revoke(old);
    }

    Json(state.issue(&user.username)).into_response()
}
