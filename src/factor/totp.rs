//! TOTP 验证器
//!
//! 基于共享密钥的时间码验证，兼容 Google Authenticator。
//! 时钟偏移容忍固定为 5 秒，与登录和绑定流程保持一致。

use crate::error::Result;
use crate::factor::{SecondFactorKind, SecondFactorVerifier, VerifyOutcome};
use crate::otp::{CODE_DIGITS, OtpEngine, SharedSecret};

/// TOTP 验证允许的时钟偏移（秒）
pub const TOTP_DRIFT_SECONDS: u64 = 5;

/// TOTP 验证器
///
/// 持有一个已解码的共享密钥，验证逻辑委托给 [`OtpEngine`]。
#[derive(Debug, Clone)]
pub struct TotpVerifier {
    secret: SharedSecret,
    engine: OtpEngine,
}

impl TotpVerifier {
    /// 从共享密钥创建验证器
    pub fn new(secret: SharedSecret) -> Self {
        Self {
            secret,
            engine: OtpEngine::new(),
        }
    }

    /// 从 Base32 密钥文本创建验证器
    ///
    /// 密钥解码失败是编程错误（存储了坏数据），直接返回 `Err`。
    pub fn from_base32(secret_text: &str) -> Result<Self> {
        Ok(Self::new(SharedSecret::from_base32(secret_text)?))
    }

    /// 按调用方提供的时钟验证，语义同 [`SecondFactorVerifier::verify`]
    pub fn verify_at(&self, candidate_code: &str, now_millis: u64) -> Result<VerifyOutcome> {
        if !is_well_formed(candidate_code) {
            return Ok(VerifyOutcome::Malformed);
        }

        let matched = self.engine.match_time_code_at(
            &self.secret,
            candidate_code,
            TOTP_DRIFT_SECONDS,
            now_millis,
        )?;

        Ok(if matched {
            VerifyOutcome::Ok
        } else {
            VerifyOutcome::Mismatch
        })
    }
}

impl SecondFactorVerifier for TotpVerifier {
    fn kind(&self) -> SecondFactorKind {
        SecondFactorKind::GoogleAuth
    }

    fn verify(&self, candidate_code: &str) -> Result<VerifyOutcome> {
        if !is_well_formed(candidate_code) {
            return Ok(VerifyOutcome::Malformed);
        }

        let matched =
            self.engine
                .match_time_code(&self.secret, candidate_code, TOTP_DRIFT_SECONDS)?;

        Ok(if matched {
            VerifyOutcome::Ok
        } else {
            VerifyOutcome::Mismatch
        })
    }
}

/// 码必须是 6 位十进制数字
fn is_well_formed(code: &str) -> bool {
    code.len() == CODE_DIGITS && code.bytes().all(|b| b.is_ascii_digit())
}
