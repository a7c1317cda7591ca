//! 密码哈希模块
//!
//! 提供安全的密码哈希和验证功能。对本库而言密码哈希是一个黑盒：
//! 登录决策只关心"密码是否通过"这一布尔结果。
//!
//! ## 示例
//!
//! ```rust
//! use twofa::password::{hash_password, verify_password};
//!
//! // 哈希密码
//! let hash = hash_password("my_secure_password").unwrap();
//!
//! // 验证密码
//! let is_valid = verify_password("my_secure_password", &hash).unwrap();
//! assert!(is_valid);
//! ```

use crate::error::{PasswordHashError, Result};

/// bcrypt 的 cost 参数
pub const BCRYPT_COST: u32 = 12;

/// 哈希密码
///
/// 使用 bcrypt（cost 12）生成密码哈希。
pub fn hash_password(password: &str) -> Result<String> {
    let hash = bcrypt::hash(password, BCRYPT_COST)
        .map_err(|e| PasswordHashError::HashFailed(e.to_string()))?;
    Ok(hash)
}

/// 验证密码
///
/// 比较明文密码和已存储的哈希，返回是否匹配。
/// 哈希格式本身无效视为编程错误，返回 `Err` 而不是 `false`。
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let is_valid =
        bcrypt::verify(password, hash).map_err(|e| PasswordHashError::InvalidFormat(e.to_string()))?;
    Ok(is_valid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash).unwrap());
        assert!(!verify_password("Tr0ub4dor&3", &hash).unwrap());
    }

    #[test]
    fn test_hash_is_salted() {
        let a = hash_password("password").unwrap();
        let b = hash_password("password").unwrap();
        // 相同密码的两次哈希应该不同（随机盐）
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_invalid_hash_format() {
        let result = verify_password("password", "not-a-bcrypt-hash");
        assert!(result.is_err());
    }
}
