//! 密码哈希工具模块
//!
//! 使用 Argon2id 算法对访问密码进行哈希和验证。
//! 验证过程由 argon2 crate 提供常数时间比较。

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::errors::LinkletError;

pub const MIN_PASSWORD_LENGTH: usize = 4;
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// 检查密码长度是否在允许范围（4-128，不做复杂度要求）
pub fn is_valid_password(password: &str) -> bool {
    let len = password.chars().count();
    (MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&len)
}

/// 对密码进行 Argon2id 哈希
pub fn hash_password(password: &str) -> Result<String, LinkletError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| LinkletError::internal(format!("Password hash error: {}", e)))
}

/// 验证密码是否匹配哈希
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let password = "hunter2";
        let hash = hash_password(password).expect("hash should succeed");

        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(password, &hash));
        assert!(!verify_password("wrong_password", &hash));
    }

    #[test]
    fn test_verify_garbage_hash() {
        assert!(!verify_password("whatever", "not-a-hash"));
        assert!(!verify_password("whatever", ""));
    }

    #[test]
    fn test_length_boundaries() {
        assert!(!is_valid_password("abc"));
        assert!(is_valid_password("abcd"));
        assert!(is_valid_password(&"x".repeat(128)));
        assert!(!is_valid_password(&"x".repeat(129)));
    }
}
