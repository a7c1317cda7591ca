//! OTP (一次性密码) 引擎模块
//!
//! 提供与 Google Authenticator 等认证器应用兼容的一次性密码算法：
//! 共享密钥的生成与编码、计数器码/时间码的计算与匹配、otpauth URI 构造。
//! 纯算法实现，无 I/O、无状态。
//!
//! ## 特性
//!
//! - 符合 RFC 4226 / RFC 6238 标准（HMAC-SHA1，6 位码，30 秒周期）
//! - 共享密钥 Base32 编码，支持人类友好的分组显示格式
//! - 时间码匹配允许有限的时钟偏移（精确三个窗口，不做连续区间搜索）
//! - 生成 otpauth:// URI 供二维码软件使用
//!
//! ## 示例
//!
//! ```rust
//! use twofa::otp::{OtpEngine, SecretStrength};
//!
//! let engine = OtpEngine::new();
//!
//! // 为用户生成 160 位共享密钥
//! let secret = engine.generate_secret(SecretStrength::Bits160).unwrap();
//!
//! // 生成当前时间码
//! let code = engine.time_code(&secret).unwrap();
//!
//! // 匹配用户输入的码，允许 5 秒时钟偏移
//! let is_valid = engine.match_time_code(&secret, &code, 5).unwrap();
//! assert!(is_valid);
//! ```

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use base32::{Alphabet, decode as base32_decode, encode as base32_encode};
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::error::{CryptoError, Error, Result};
use crate::random::{constant_time_compare_str, generate_random_bytes};

/// 时间步长（毫秒）
pub const TIME_STEP_MILLIS: u64 = 30_000;

/// 验证码位数
pub const CODE_DIGITS: usize = 6;

/// 允许的最大时钟偏移（秒）
pub const MAX_DRIFT_SECONDS: u64 = 29;

const CODE_MODULO: u32 = 1_000_000;

/// 共享密钥强度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecretStrength {
    /// 80 位（10 字节），RFC 4226 允许的最小值
    Bits80,
    /// 160 位（20 字节），推荐值
    #[default]
    Bits160,
}

impl SecretStrength {
    /// 密钥字节数
    pub fn byte_length(&self) -> usize {
        match self {
            SecretStrength::Bits80 => 10,
            SecretStrength::Bits160 => 20,
        }
    }
}

/// 共享密钥
///
/// 内部始终以原始字节参与运算，对外以 Base32 文本（大写、无填充）编码。
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret {
    /// 原始密钥字节
    pub raw: Vec<u8>,

    /// Base32 编码的密钥（用于显示和 URI）
    pub base32: String,
}

impl SharedSecret {
    /// 从原始字节创建
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let base32 = base32_encode(Alphabet::Rfc4648 { padding: false }, &bytes);
        Self { raw: bytes, base32 }
    }

    /// 从 Base32 字符串创建
    ///
    /// 不区分大小写，忽略内部的空格和连字符，因此分组显示格式
    /// （见 [`OtpEngine::prettify`]）也可以直接解码。
    pub fn from_base32(text: &str) -> Result<Self> {
        let clean = text.replace([' ', '-'], "").to_uppercase();
        let raw = base32_decode(Alphabet::Rfc4648 { padding: false }, &clean)
            .ok_or_else(|| Error::invalid_format("invalid base32 secret"))?;
        Ok(Self { raw, base32: clean })
    }
}

// 密钥不出现在日志里
impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSecret").finish_non_exhaustive()
    }
}

/// otpauth URI 的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpUriKind {
    /// 时间码（totp），不带 counter 参数
    Totp,
    /// 计数器码（hotp），带初始计数器
    Hotp { counter: u64 },
}

impl OtpUriKind {
    fn as_str(&self) -> &'static str {
        match self {
            OtpUriKind::Totp => "totp",
            OtpUriKind::Hotp { .. } => "hotp",
        }
    }
}

/// OTP 引擎
///
/// 纯算法组件，可以安全地共享或按需创建。
#[derive(Debug, Clone, Copy, Default)]
pub struct OtpEngine;

impl OtpEngine {
    /// 创建新的 OTP 引擎
    pub fn new() -> Self {
        Self
    }

    /// 生成新的共享密钥
    pub fn generate_secret(&self, strength: SecretStrength) -> Result<SharedSecret> {
        let bytes = generate_random_bytes(strength.byte_length())?;
        Ok(SharedSecret::from_bytes(bytes))
    }

    /// 把 Base32 密钥文本转成人类友好的分组格式
    ///
    /// 每 4 个字符一组，组间以单个空格分隔，整体小写，仅用于显示。
    /// 认证器应用对两种格式都兼容。
    ///
    /// # Errors
    ///
    /// 长度不是 4 的倍数时返回 `InvalidFormat`。
    pub fn prettify(&self, secret_text: &str) -> Result<String> {
        let length = secret_text.len();
        if length % 4 != 0 {
            return Err(Error::invalid_format("secret length must be divisible by 4"));
        }

        let mut buf = String::with_capacity((5 * (length / 4)).saturating_sub(1));
        for (index, chunk) in secret_text.as_bytes().chunks(4).enumerate() {
            if index != 0 {
                buf.push(' ');
            }
            // chunks(4) 只会切出合法的 ASCII 边界（Base32 文本）
            for b in chunk {
                buf.push(b.to_ascii_lowercase() as char);
            }
        }
        Ok(buf)
    }

    /// 计算计数器码
    ///
    /// HMAC-SHA1 + RFC 4226 动态截断，结果为 6 位十进制、左侧补零。
    /// 相同的 (密钥, 计数器) 输入恒产生相同的码。
    pub fn counter_code(&self, secret: &SharedSecret, counter: u64) -> Result<String> {
        let mut mac = Hmac::<Sha1>::new_from_slice(&secret.raw)
            .map_err(|_| Error::Crypto(CryptoError::InvalidKey("hmac-sha1 rejected key".into())))?;
        mac.update(&counter.to_be_bytes());
        let hash = mac.finalize().into_bytes();

        // 动态截断：最后一个字节的低 4 位作为偏移量，
        // 从偏移处读 4 个字节并清掉最高位，得到 31 位无符号整数
        let offset = (hash[hash.len() - 1] & 0x0f) as usize;
        let binary = ((hash[offset] & 0x7f) as u32) << 24
            | (hash[offset + 1] as u32) << 16
            | (hash[offset + 2] as u32) << 8
            | (hash[offset + 3] as u32);

        Ok(format!("{:06}", binary % CODE_MODULO))
    }

    /// 计算当前时间码
    pub fn time_code(&self, secret: &SharedSecret) -> Result<String> {
        self.time_code_at(secret, current_millis())
    }

    /// 计算指定时刻（Unix 毫秒）的时间码
    pub fn time_code_at(&self, secret: &SharedSecret, at_millis: u64) -> Result<String> {
        self.counter_code(secret, at_millis / TIME_STEP_MILLIS)
    }

    /// 匹配计数器码
    ///
    /// 常量时间比较，长度不符直接不匹配。
    pub fn match_counter_code(
        &self,
        secret: &SharedSecret,
        candidate_code: &str,
        counter: u64,
    ) -> Result<bool> {
        let expected = self.counter_code(secret, counter)?;
        Ok(constant_time_compare_str(&expected, candidate_code))
    }

    /// 匹配时间码，允许有限的时钟偏移
    ///
    /// 先按本机时间匹配；只有精确匹配失败且 `drift_seconds > 0` 时，
    /// 才分别尝试"对方时钟快 drift 秒"和"对方时钟慢 drift 秒"两个
    /// 独立计算的窗口。任一时刻最多只有 3 个码有效，这限制了重放窗口，
    /// 同时容忍现实中的时钟偏差。
    ///
    /// # Errors
    ///
    /// `drift_seconds` 超出 \[0, 29\] 时返回 `InvalidArgument`。
    pub fn match_time_code(
        &self,
        secret: &SharedSecret,
        candidate_code: &str,
        drift_seconds: u64,
    ) -> Result<bool> {
        self.match_time_code_at(secret, candidate_code, drift_seconds, current_millis())
    }

    /// 匹配指定时刻（Unix 毫秒）的时间码
    ///
    /// 与 [`match_time_code`](Self::match_time_code) 相同，但时钟由调用方提供。
    pub fn match_time_code_at(
        &self,
        secret: &SharedSecret,
        candidate_code: &str,
        drift_seconds: u64,
        now_millis: u64,
    ) -> Result<bool> {
        if drift_seconds > MAX_DRIFT_SECONDS {
            return Err(Error::invalid_argument(
                "drift_seconds must be between 0 and 29",
            ));
        }

        if self.match_counter_code(secret, candidate_code, now_millis / TIME_STEP_MILLIS)? {
            return Ok(true);
        }
        if drift_seconds == 0 {
            return Ok(false);
        }

        let drift_millis = drift_seconds * 1000;

        // 对方时钟比本机快
        let ahead = (now_millis + drift_millis) / TIME_STEP_MILLIS;
        if self.match_counter_code(secret, candidate_code, ahead)? {
            return Ok(true);
        }

        // 对方时钟比本机慢
        let behind = now_millis.saturating_sub(drift_millis) / TIME_STEP_MILLIS;
        self.match_counter_code(secret, candidate_code, behind)
    }

    /// 构造标准的 otpauth:// URI
    ///
    /// 供二维码软件生成认证器应用可扫描的二维码。格式：
    /// `otpauth://{totp|hotp}/{issuer}:{account}?secret=...&issuer=...[&counter=n]`，
    /// 其中 issuer 和 account 均做百分号编码。注意认证器应用会覆盖
    /// issuer+account 相同的既有条目，调用方应选择相对唯一的名称。
    ///
    /// # Errors
    ///
    /// issuer 或 account 含冒号时返回 `InvalidArgument`。
    pub fn make_otp_uri(
        &self,
        kind: OtpUriKind,
        issuer: &str,
        account: &str,
        secret: &SharedSecret,
    ) -> Result<String> {
        if issuer.contains(':') {
            return Err(Error::invalid_argument("issuer may not contain colon"));
        }
        if account.contains(':') {
            return Err(Error::invalid_argument("account may not contain colon"));
        }

        let mut uri = format!(
            "otpauth://{}/{}%3A{}?secret={}&issuer={}",
            kind.as_str(),
            urlencoding::encode(issuer),
            urlencoding::encode(account),
            urlencoding::encode(&secret.base32),
            urlencoding::encode(issuer),
        );

        if let OtpUriKind::Hotp { counter } = kind {
            uri.push_str(&format!("&counter={}", counter));
        }

        Ok(uri)
    }
}

/// 当前 Unix 时间戳（毫秒）
fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}
