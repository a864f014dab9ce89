//! Session token generation and validation
//! Sessions are HS256 JWTs carrying the login claims

use crate::{config::AppConfig, error::AppError, models::role::Identity};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const SESSION_TOKEN_TYPE: &str = "session";

/// Session claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (employee code)
    pub sub: String,

    /// Display name
    pub full_name: String,

    /// Role id as a string, "0" when the employee has no role
    pub role_id: String,

    /// "True" or "False"
    pub is_admin_role: String,

    /// Token type
    pub token_type: String,

    /// Issued at
    pub iat: i64,

    /// Expiration
    pub exp: i64,

    /// JWT ID (unique token identifier)
    pub jti: String,
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity::from_claim_values(
            &self.sub,
            &self.full_name,
            Some(&self.role_id),
            Some(&self.is_admin_role),
        )
    }
}

/// Data recorded in a new session
#[derive(Debug, Clone)]
pub struct SessionSubject<'a> {
    pub employee_code: &'a str,
    pub full_name: &'a str,
    pub role_id: Option<i32>,
    pub is_admin_role: bool,
}

/// Session token service
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_lifetime_secs: u64,
}

impl JwtService {
    /// Create the service from config
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let secret = config.security.session_secret.expose_secret();

        // HS256 wants at least 32 bytes of key material
        if secret.len() < 32 {
            return Err(AppError::Config("Session secret too short (min 32 chars)".to_string()));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            session_lifetime_secs: config.security.session_lifetime_secs,
        })
    }

    pub fn session_lifetime_secs(&self) -> u64 {
        self.session_lifetime_secs
    }

    /// Issue a session token
    pub fn issue_session(&self, subject: &SessionSubject<'_>) -> Result<String, AppError> {
        let now = Utc::now();
        let expiration = now + Duration::seconds(self.session_lifetime_secs as i64);

        let claims = Claims {
            sub: subject.employee_code.to_string(),
            full_name: subject.full_name.to_string(),
            role_id: subject.role_id.unwrap_or(0).to_string(),
            is_admin_role: if subject.is_admin_role { "True" } else { "False" }.to_string(),
            token_type: SESSION_TOKEN_TYPE.to_string(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode session token: {:?}", e);
            AppError::Internal(format!("Failed to encode session token: {}", e))
        })
    }

    /// Validate and decode a session token
    pub fn validate_session(&self, token: &str) -> Result<Claims, AppError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                tracing::debug!("Token validation failed: {:?}", e);
                AppError::Unauthorized
            })?
            .claims;

        if claims.token_type != SESSION_TOKEN_TYPE {
            tracing::debug!("Token type mismatch: expected 'session', got '{}'", claims.token_type);
            return Err(AppError::Unauthorized);
        }

        if claims.sub.trim().is_empty() {
            return Err(AppError::Unauthorized);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::*;
    use secrecy::Secret;

    pub(crate) fn test_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                addr: "127.0.0.1:3000".to_string(),
                graceful_shutdown_timeout_secs: 30,
            },
            database: DatabaseConfig {
                url: Secret::new("postgresql://localhost/test".to_string()),
                max_connections: 10,
                min_connections: 1,
                acquire_timeout_secs: 30,
                idle_timeout_secs: 600,
                max_lifetime_secs: 1800,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
            security: SecurityConfig {
                session_secret: Secret::new("test_secret_key_32_characters_long!".to_string()),
                session_lifetime_secs: 900,
                session_cookie_name: "portal_session".to_string(),
                permission_cache_ttl_secs: 1200,
            },
            storage: StorageConfig {
                upload_root: "./uploads".to_string(),
                static_root: "./wwwroot".to_string(),
                max_upload_bytes: 1024 * 1024,
            },
            ocr: OcrConfig {
                endpoint: "http://127.0.0.1:1/annotate".to_string(),
                api_key: None,
                batch_size: 16,
                timeout_secs: 5,
            },
            mail: MailConfig {
                host: None,
                port: 587,
                username: None,
                password: None,
                from: "meter@localhost".to_string(),
                cc: None,
            },
        }
    }

    fn subject(is_admin: bool, role_id: Option<i32>) -> SessionSubject<'static> {
        SessionSubject {
            employee_code: "EMP001",
            full_name: "Tran Thi B",
            role_id,
            is_admin_role: is_admin,
        }
    }

    #[test]
    fn test_issue_and_validate_session() {
        let service = JwtService::from_config(&test_config()).unwrap();
        let token = service.issue_session(&subject(false, Some(5))).unwrap();

        let claims = service.validate_session(&token).unwrap();
        assert_eq!(claims.sub, "EMP001");
        assert_eq!(claims.role_id, "5");
        assert_eq!(claims.is_admin_role, "False");

        let identity = claims.identity();
        assert_eq!(identity.role_id, 5);
        assert!(!identity.is_admin);
    }

    #[test]
    fn test_admin_and_missing_role_claims() {
        let service = JwtService::from_config(&test_config()).unwrap();
        let token = service.issue_session(&subject(true, None)).unwrap();

        let claims = service.validate_session(&token).unwrap();
        assert_eq!(claims.role_id, "0");
        assert_eq!(claims.is_admin_role, "True");
        assert!(claims.identity().is_admin);
    }

    #[test]
    fn test_invalid_token_fails() {
        let service = JwtService::from_config(&test_config()).unwrap();
        assert!(service.validate_session("invalid_token").is_err());
    }

    #[test]
    fn test_token_from_other_secret_fails() {
        let service = JwtService::from_config(&test_config()).unwrap();
        let mut other_config = test_config();
        other_config.security.session_secret =
            Secret::new("another_secret_key_32_characters_long".to_string());
        let other = JwtService::from_config(&other_config).unwrap();

        let token = other.issue_session(&subject(false, Some(5))).unwrap();
        assert!(service.validate_session(&token).is_err());
    }
}
