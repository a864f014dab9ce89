//! 密码哈希功能单元测试
//!
//! 测试 Argon2id 密码哈希和验证功能

use argon2::Params;
use residence_portal::{auth::password::PasswordHasher, error::AppError};

/// 低成本参数，避免测试过慢
fn hasher() -> PasswordHasher {
    PasswordHasher::with_params(Params::new(1024, 1, 1, None).unwrap())
}

#[test]
fn test_password_hash_and_verify() {
    let hasher = hasher();
    let hash = hasher.hash("Residence#2025").expect("Hashing should succeed");

    assert!(hash.starts_with("$argon2id$"));
    hasher
        .verify("Residence#2025", &hash)
        .expect("Verification should succeed");
}

#[test]
fn test_wrong_password_is_unauthorized() {
    let hasher = hasher();
    let hash = hasher.hash("correct-password").unwrap();

    let err = hasher.verify("wrong-password", &hash).unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));
}

#[test]
fn test_same_password_gets_distinct_salts() {
    let hasher = hasher();
    let first = hasher.hash("same").unwrap();
    let second = hasher.hash("same").unwrap();

    assert_ne!(first, second);
    assert!(hasher.verify("same", &first).is_ok());
    assert!(hasher.verify("same", &second).is_ok());
}

#[test]
fn test_legacy_plaintext_value_never_matches() {
    let hasher = hasher();

    // 旧系统遗留的明文或 MD5 值不是 PHC 字符串
    assert!(matches!(
        hasher.verify("secret", "secret"),
        Err(AppError::Unauthorized)
    ));
    assert!(matches!(
        hasher.verify("secret", "5ebe2294ecd0e0f08eab7690d2a6ee69"),
        Err(AppError::Unauthorized)
    ));
    assert!(hasher.verify("", "").is_err());
}
