//! 安全随机数生成模块
//!
//! 提供密码学安全的随机数生成功能，用于生成共享密钥和会话关联令牌。
//! RNG 作为进程级能力惰性初始化，正常运行期间不重新播种。

use rand::{TryRngCore, rngs::OsRng};

use crate::error::{CryptoError, Error, Result};

/// 生成指定长度的随机字节数组
///
/// 使用操作系统提供的密码学安全随机数生成器 (CSPRNG)
///
/// # Arguments
///
/// * `length` - 要生成的字节数
///
/// # Example
///
/// ```rust
/// use twofa::random::generate_random_bytes;
///
/// let bytes = generate_random_bytes(20).unwrap();
/// assert_eq!(bytes.len(), 20);
/// ```
pub fn generate_random_bytes(length: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; length];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::Crypto(CryptoError::RngFailed(format!("{:?}", e))))?;
    Ok(bytes)
}

/// 生成指定长度的 Base64 URL 安全随机字符串
///
/// 使用 URL 安全的 Base64 编码（不含填充）
pub fn generate_random_base64_url(byte_length: usize) -> Result<String> {
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    let bytes = generate_random_bytes(byte_length)?;
    Ok(URL_SAFE_NO_PAD.encode(&bytes))
}

/// 生成会话关联令牌
///
/// 在多请求的绑定流程中标识同一个未确认候选密钥（例如二维码 URL 的
/// 唯一标识），每次 `request_attach` 都会生成新的令牌。
///
/// # Example
///
/// ```rust
/// use twofa::random::generate_correlation_token;
///
/// let token = generate_correlation_token().unwrap();
/// assert!(!token.is_empty());
/// ```
pub fn generate_correlation_token() -> Result<String> {
    generate_random_base64_url(16)
}

/// 常量时间比较两个字节切片
///
/// 用于防止时序攻击
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

/// 常量时间比较两个字符串
pub fn constant_time_compare_str(a: &str, b: &str) -> bool {
    constant_time_compare(a.as_bytes(), b.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_random_bytes() {
        let bytes = generate_random_bytes(20).unwrap();
        assert_eq!(bytes.len(), 20);

        // 确保生成的是随机的（两次生成不应相同）
        let bytes2 = generate_random_bytes(20).unwrap();
        assert_ne!(bytes, bytes2);
    }

    #[test]
    fn test_generate_random_base64_url() {
        let token = generate_random_base64_url(32).unwrap();

        // URL 安全的 base64 不应包含 + 或 /
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
        assert!(!token.contains('='));
    }

    #[test]
    fn test_generate_correlation_token_is_unique() {
        let a = generate_correlation_token().unwrap();
        let b = generate_correlation_token().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(b"755224", b"755224"));
        assert!(!constant_time_compare(b"755224", b"287082"));
        assert!(!constant_time_compare(b"755224", b"75522"));
    }

    #[test]
    fn test_constant_time_compare_str() {
        assert!(constant_time_compare_str("secret", "secret"));
        assert!(!constant_time_compare_str("secret", "Secret"));
    }
}
