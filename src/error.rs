//! 统一错误类型模块
//!
//! 提供 twofa 库中所有操作的错误类型定义。
//!
//! 错误分为两类：编程错误（非法参数、格式错误的密钥等）应该尽早失败；
//! 认证不匹配是预期内的可恢复情况，由 [`crate::factor::VerifyOutcome`]
//! 等结果类型表达，不走错误通道。

use std::fmt;

/// twofa 库的统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

/// twofa 库的错误类型
#[derive(Debug)]
pub enum Error {
    /// 非法参数（纯函数的输入超出允许范围，调用方错误）
    InvalidArgument(String),

    /// 格式错误（密钥文本长度或编码不符合要求）
    InvalidFormat(String),

    /// 状态冲突（在不允许的状态下执行 attach/detach 等操作）
    Conflict(String),

    /// 密码哈希错误
    PasswordHash(PasswordHashError),

    /// 加密错误
    Crypto(CryptoError),

    /// 存储错误
    Storage(StorageError),
}

impl Error {
    /// 创建一个非法参数错误
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// 创建一个格式错误
    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Error::InvalidFormat(msg.into())
    }

    /// 创建一个状态冲突错误
    pub fn conflict(msg: impl Into<String>) -> Self {
        Error::Conflict(msg.into())
    }
}

/// 密码哈希相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordHashError {
    /// 哈希生成失败
    HashFailed(String),
    /// 无效的哈希格式
    InvalidFormat(String),
}

/// 加密相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// 随机数生成失败
    RngFailed(String),
    /// 密钥无效
    InvalidKey(String),
}

/// 存储相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// 记录未找到
    NotFound(String),
    /// 记录已存在
    AlreadyExists(String),
    /// 乐观锁版本冲突（并发修改了同一账户记录）
    VersionConflict { expected: u64, actual: u64 },
    /// 操作失败
    OperationFailed(String),
}

// ============================================================================
// Display 实现
// ============================================================================

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::InvalidFormat(msg) => write!(f, "Invalid format: {}", msg),
            Error::Conflict(msg) => write!(f, "Conflict: {}", msg),
            Error::PasswordHash(e) => write!(f, "Password hash error: {}", e),
            Error::Crypto(e) => write!(f, "Crypto error: {}", e),
            Error::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl fmt::Display for PasswordHashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordHashError::HashFailed(msg) => write!(f, "hash generation failed: {}", msg),
            PasswordHashError::InvalidFormat(msg) => write!(f, "invalid hash format: {}", msg),
        }
    }
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::RngFailed(msg) => write!(f, "random number generation failed: {}", msg),
            CryptoError::InvalidKey(msg) => write!(f, "invalid key: {}", msg),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound(item) => write!(f, "not found: {}", item),
            StorageError::AlreadyExists(item) => write!(f, "already exists: {}", item),
            StorageError::VersionConflict { expected, actual } => write!(
                f,
                "version conflict: expected {}, stored {}",
                expected, actual
            ),
            StorageError::OperationFailed(msg) => write!(f, "storage operation failed: {}", msg),
        }
    }
}

// ============================================================================
// std::error::Error 实现
// ============================================================================

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl std::error::Error for PasswordHashError {}
impl std::error::Error for CryptoError {}
impl std::error::Error for StorageError {}

// ============================================================================
// From 实现 - 方便错误转换
// ============================================================================

impl From<PasswordHashError> for Error {
    fn from(err: PasswordHashError) -> Self {
        Error::PasswordHash(err)
    }
}

impl From<CryptoError> for Error {
    fn from(err: CryptoError) -> Self {
        Error::Crypto(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Error::Storage(err)
    }
}
