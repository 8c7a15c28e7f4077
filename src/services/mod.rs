//! Business logic services layer

pub mod auth_service;
pub mod validation;

pub use auth_service::AuthService;
pub use validation::FormPolicy;
