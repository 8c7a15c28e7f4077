//! 运维门户客户端库
//! 提供凭证存储、带凭证的 HTTP 客户端、认证服务与路由守卫

pub mod app;
pub mod config;
pub mod error;
pub mod guard;
pub mod http;
pub mod models;
pub mod services;
pub mod shell;
pub mod store;
pub mod telemetry;
