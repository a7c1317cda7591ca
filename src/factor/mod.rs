//! 二次认证因素模块
//!
//! 密码之外的第二重身份证明。每种因素回答同一个问题：
//! "这个一次性码能否证明用户持有已注册的凭据？"
//!
//! ## 支持的因素
//!
//! - **Google Authenticator** (TOTP)：基于共享密钥的时间码，本地验证
//! - **Yubikey**：硬件令牌生成的 OTP，委托远程校验服务验证
//!
//! ## 示例
//!
//! ```rust
//! use twofa::factor::{SecondFactorVerifier, VerifyOutcome};
//! use twofa::factor::totp::TotpVerifier;
//! use twofa::otp::{OtpEngine, SecretStrength};
//!
//! let engine = OtpEngine::new();
//! let secret = engine.generate_secret(SecretStrength::Bits160).unwrap();
//! let code = engine.time_code(&secret).unwrap();
//!
//! let verifier = TotpVerifier::new(secret);
//! assert_eq!(verifier.verify(&code).unwrap(), VerifyOutcome::Ok);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod totp;
pub mod yubikey;

pub use totp::{TOTP_DRIFT_SECONDS, TotpVerifier};
pub use yubikey::{RemoteVerifyStatus, Yubiauth, YubicoClient, YubikeyVerifier};

/// 二次认证因素的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecondFactorKind {
    /// Google Authenticator 兼容的 TOTP
    #[serde(rename = "googleAuth")]
    GoogleAuth,
    /// Yubikey 硬件令牌
    #[serde(rename = "yubiAuth")]
    Yubikey,
}

impl SecondFactorKind {
    /// 登录时的固定尝试顺序：TOTP 优先于远程令牌
    pub const PRIORITY: [SecondFactorKind; 2] =
        [SecondFactorKind::GoogleAuth, SecondFactorKind::Yubikey];

    /// 该因素验证失败时对外暴露的 reason 码
    pub fn failure_reason(&self) -> &'static str {
        match self {
            SecondFactorKind::GoogleAuth => "googleAuth.failed",
            SecondFactorKind::Yubikey => "yubiAuth.failed",
        }
    }

    /// 登录响应里标记该因素可用的键名
    pub fn available_flag(&self) -> &'static str {
        match self {
            SecondFactorKind::GoogleAuth => "googleAuthAvailable",
            SecondFactorKind::Yubikey => "yubiAuthAvailable",
        }
    }
}

/// 单次验证的结果
///
/// 不匹配是预期内的情况，不走错误通道；`ServiceError` 统一覆盖
/// 远程服务不可达和响应完整性可疑两种情况，调用方（以及攻击者）
/// 无法区分二者。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// 码有效，持有凭据得证
    Ok,
    /// 码与凭据不匹配
    Mismatch,
    /// 码结构不合法（用户可纠正，无需远程调用即可判定）
    Malformed,
    /// 远程校验服务出错，绝不视为通过
    ServiceError,
}

impl VerifyOutcome {
    /// 是否验证通过
    pub fn is_ok(&self) -> bool {
        matches!(self, VerifyOutcome::Ok)
    }
}

/// 二次认证验证器
///
/// 对两种因素多态；登录决策与绑定流程都通过这个 trait 验证一次性码。
pub trait SecondFactorVerifier {
    /// 验证器对应的因素种类
    fn kind(&self) -> SecondFactorKind;

    /// 验证提交的一次性码
    ///
    /// 加密或编码层面的内部错误通过 `Err` 传播（编程错误，应尽早失败）；
    /// 所有预期内的验证结论都在 [`VerifyOutcome`] 里。
    fn verify(&self, candidate_code: &str) -> Result<VerifyOutcome>;
}
