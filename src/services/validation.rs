//! 表单本地校验：不合法的输入在发出请求前被拦截

use crate::config::ValidationConfig;
use crate::error::AuthError;
use validator::{ValidateEmail, ValidateLength};

#[derive(Debug, Clone, Default)]
pub struct FormPolicy {
    rules: ValidationConfig,
}

impl FormPolicy {
    pub fn new(rules: ValidationConfig) -> Self {
        Self { rules }
    }

    pub fn check_login(&self, username: &str, password: &str) -> Result<(), AuthError> {
        self.check_username(username)?;
        self.check_password(password)
    }

    pub fn check_register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<(), AuthError> {
        self.check_username(username)?;
        if email.trim().is_empty() {
            return Err(AuthError::Validation("请输入邮箱!".to_string()));
        }
        if !email.validate_email() {
            return Err(AuthError::Validation("邮箱格式不正确!".to_string()));
        }
        self.check_password(password)
    }

    fn check_username(&self, username: &str) -> Result<(), AuthError> {
        let (min, max) = (self.rules.username_min_length, self.rules.username_max_length);
        if username.trim().is_empty() {
            return Err(AuthError::Validation("请输入用户名!".to_string()));
        }
        if !username.validate_length(Some(min), Some(max), None) {
            return Err(AuthError::Validation(format!(
                "用户名长度需在 {min} 到 {max} 个字符之间!"
            )));
        }
        Ok(())
    }

    fn check_password(&self, password: &str) -> Result<(), AuthError> {
        let (min, max) = (self.rules.password_min_length, self.rules.password_max_length);
        if password.is_empty() {
            return Err(AuthError::Validation("请输入密码!".to_string()));
        }
        if !password.validate_length(Some(min), Some(max), None) {
            return Err(AuthError::Validation(format!(
                "密码长度需在 {min} 到 {max} 个字符之间!"
            )));
        }
        Ok(())
    }
}
