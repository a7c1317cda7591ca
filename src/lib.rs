//! # TwoFA
//!
//! 一个面向登录流程的双因素认证库。
//!
//! ## 功能特性
//!
//! - **一次性密码**: HOTP/TOTP 码的生成与校验（HMAC-SHA1、6 位、30 秒步长）
//! - **时钟漂移容忍**: 当前、超前、滞后三个时间探针
//! - **共享密钥**: 80/160 位密钥的生成、Base32 编解码与分组排版
//! - **Google Authenticator**: 本地验证的 TOTP 二次认证因素
//! - **Yubikey**: 委托远程服务校验的硬件令牌因素
//! - **登录判定**: 密码与二次认证的组合结论，内建防枚举
//! - **凭据绑定**: 先证明持有、后写入存储的两阶段绑定与解绑
//! - **会话状态**: 认证主体、二次认证结论与未确认候选的承载
//!
//! ## 一次性密码示例
//!
//! ```rust
//! use twofa::otp::{OtpEngine, SecretStrength};
//!
//! let engine = OtpEngine::new();
//!
//! // 生成共享密钥
//! let secret = engine.generate_secret(SecretStrength::Bits160).unwrap();
//!
//! // 生成并校验当前时间码
//! let code = engine.time_code(&secret).unwrap();
//! assert!(engine.match_time_code(&secret, &code, 5).unwrap());
//! ```
//!
//! ## 登录示例
//!
//! ```rust
//! use std::sync::Arc;
//! use twofa::account::InMemoryAccountStore;
//! use twofa::decision::{LoginOutcome, SubmittedCodes};
//! use twofa::factor::{RemoteVerifyStatus, Yubiauth, YubicoClient};
//! use twofa::login::LoginService;
//! use twofa::session::SessionData;
//!
//! struct OfflineClient;
//! impl YubicoClient for OfflineClient {
//!     fn verify(&self, _otp: &str) -> RemoteVerifyStatus {
//!         RemoteVerifyStatus::TransportError
//!     }
//! }
//!
//! let service = LoginService::new(
//!     Arc::new(InMemoryAccountStore::new()),
//!     Yubiauth::new(Arc::new(OfflineClient)),
//! );
//! let mut session = SessionData::new_session();
//!
//! service
//!     .create_account(&mut session, "alice", "Alice", "hunter2!")
//!     .unwrap();
//!
//! let outcome = service
//!     .login(&mut session, "alice", "hunter2!", &SubmittedCodes::default())
//!     .unwrap();
//! assert_eq!(outcome, LoginOutcome::Authenticated { used_factor: None });
//! ```

pub mod account;
pub mod attachment;
pub mod decision;
pub mod error;
pub mod factor;
pub mod login;
pub mod otp;
pub mod password;
pub mod random;
pub mod session;

pub use error::{Error, Result};

// ============================================================================
// 一次性密码相关导出
// ============================================================================

pub use otp::{OtpEngine, OtpUriKind, SecretStrength, SharedSecret};

// ============================================================================
// 二次认证因素相关导出
// ============================================================================

pub use factor::{
    RemoteVerifyStatus, SecondFactorKind, SecondFactorVerifier, TotpVerifier, VerifyOutcome,
    Yubiauth, YubicoClient, YubikeyVerifier,
};

// ============================================================================
// 账户与会话相关导出
// ============================================================================

pub use account::{Account, AccountStore, InMemoryAccountStore, SecondFactorCredential};
pub use session::{
    AttachmentCandidate, AttachmentState, Authorization, SessionData, SessionPrincipal,
};

// ============================================================================
// 登录与绑定流程相关导出
// ============================================================================

pub use attachment::{AttachChallenge, AttachOutcome, AttachmentFlow, DetachOutcome};
pub use decision::{LoginOutcome, SubmittedCodes};
pub use login::{ChangePasswordOutcome, LoginService};

// ============================================================================
// 随机数与密码相关导出
// ============================================================================

pub use password::{hash_password, verify_password};
pub use random::{
    constant_time_compare, constant_time_compare_str, generate_correlation_token,
    generate_random_base64_url, generate_random_bytes,
};
