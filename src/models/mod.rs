//! 数据模型模块
//! 与后端交换的认证与用户模型

pub mod auth;
pub mod user;
