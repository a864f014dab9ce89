//! 认证服务：登录与会话签发

use std::sync::Arc;

use crate::{
    auth::{jwt::SessionSubject, JwtService, PasswordHasher},
    error::AppError,
    models::{
        auth::LoginForm,
        role::{EmployeeCode, Identity},
    },
    repository::employee_repo::EmployeeRepository,
};

/// 登录成功后签发的会话
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub token: String,
    pub identity: Identity,
    pub max_age_secs: u64,
}

pub struct AuthService {
    repo: EmployeeRepository,
    jwt_service: Arc<JwtService>,
    hasher: PasswordHasher,
}

impl AuthService {
    pub fn new(repo: EmployeeRepository, jwt_service: Arc<JwtService>) -> Self {
        Self {
            repo,
            jwt_service,
            hasher: PasswordHasher::new(),
        }
    }

    /// 用户登录
    pub async fn login(&self, form: &LoginForm) -> Result<LoginSession, AppError> {
        let username = form.username.trim();
        if username.is_empty() || form.password.is_empty() {
            return Err(AppError::BadRequest(
                "Please enter username and password.".to_string(),
            ));
        }

        let code = EmployeeCode::new(username);
        let Some(account) = self.repo.find_login(&code).await? else {
            tracing::info!(employee_code = %code, "Login failed: unknown or inactive employee");
            return Err(AppError::Unauthorized);
        };

        // 未设置密码的账户不能登录
        let Some(hash) = account.password_hash.as_deref().filter(|h| !h.is_empty()) else {
            tracing::info!(employee_code = %code, "Login failed: no password set");
            return Err(AppError::Unauthorized);
        };

        if self.hasher.verify(&form.password, hash).is_err() {
            tracing::info!(employee_code = %code, "Login failed: wrong password");
            return Err(AppError::Unauthorized);
        }

        let subject = SessionSubject {
            employee_code: &account.employee_code,
            full_name: &account.employee_name,
            role_id: account.role_id,
            is_admin_role: account.is_admin_role.unwrap_or(false),
        };
        let token = self.jwt_service.issue_session(&subject)?;
        let identity = self.jwt_service.validate_session(&token)?.identity();

        tracing::info!(
            employee_code = %identity.employee_code,
            role_id = identity.role_id,
            is_admin = identity.is_admin,
            "Login succeeded"
        );

        Ok(LoginSession {
            token,
            identity,
            max_age_secs: self.jwt_service.session_lifetime_secs(),
        })
    }
}
