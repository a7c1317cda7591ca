//! 凭据绑定流程模块
//!
//! 两阶段地为账户绑定或解绑二次认证凭据：先发放候选并要求用户
//! 提交一个样例码证明持有，证明成功后才写入存储。任何时刻存储里
//! 都不会出现用户无法使用的凭据。
//!
//! 候选是一次性的：确认失败即作废，重试必须重新发放（TOTP 场景下
//! 会得到一个全新的密钥）。解绑同样需要出示当前凭据生成的有效码。

use std::sync::Arc;

use tracing::debug;

use crate::account::{Account, AccountStore, SecondFactorCredential};
use crate::error::Error;
use crate::factor::{
    RemoteVerifyStatus, SecondFactorKind, SecondFactorVerifier, TotpVerifier, Yubiauth,
};
use crate::otp::{OtpEngine, OtpUriKind, SecretStrength};
use crate::random::generate_correlation_token;
use crate::session::{AttachmentCandidate, AttachmentState, SessionPrincipal};
use crate::Result;

/// 发放候选后返回给用户的绑定质询
///
/// TOTP 候选携带可读的分组密钥和可生成二维码的 otpauth URI；
/// Yubikey 候选只有关联令牌，用户下一步直接提交硬件令牌的 OTP。
#[derive(Debug, Clone)]
pub struct AttachChallenge {
    /// 待绑定的因素种类
    pub kind: SecondFactorKind,

    /// 分组排版的候选密钥（仅 TOTP）
    pub pretty_secret: Option<String>,

    /// 扫码录入用的 otpauth URI（仅 TOTP）
    pub otpauth_uri: Option<String>,

    /// 本次质询的关联令牌
    pub correlation: String,
}

/// 确认绑定的结果
#[derive(Debug, Clone)]
pub enum AttachOutcome {
    /// 凭据已写入存储，返回更新后的账户
    Attached(Account),
    /// 样例码未能证明持有，候选已作废
    Rejected {
        /// 机器可读的拒绝原因
        reason: &'static str,
    },
}

/// 解绑的结果
#[derive(Debug, Clone)]
pub enum DetachOutcome {
    /// 凭据已移除，返回更新后的账户
    Detached(Account),
    /// 出示的码无效，凭据保持不变
    Rejected {
        /// 机器可读的拒绝原因
        reason: &'static str,
    },
}

/// 凭据绑定流程
#[derive(Clone)]
pub struct AttachmentFlow {
    engine: OtpEngine,
    store: Arc<dyn AccountStore>,
    yubiauth: Yubiauth,
    issuer: String,
}

impl AttachmentFlow {
    /// 创建绑定流程
    ///
    /// `issuer` 会出现在 otpauth URI 里，通常是站点名称。
    pub fn new(
        store: Arc<dyn AccountStore>,
        yubiauth: Yubiauth,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            engine: OtpEngine::new(),
            store,
            yubiauth,
            issuer: issuer.into(),
        }
    }

    /// 请求绑定：发放候选凭据
    ///
    /// 该种类已有绑定、或已有其他候选在进行中时返回 `Conflict`。
    /// 每次调用都生成全新的候选，旧候选被覆盖后即失效。
    pub fn request_attach(
        &self,
        principal: &mut SessionPrincipal,
        kind: SecondFactorKind,
    ) -> Result<AttachChallenge> {
        if principal.account.has_credential(kind) {
            return Err(Error::conflict("credential already attached"));
        }
        if !matches!(principal.attachment(), AttachmentState::Idle) {
            return Err(Error::conflict("another attachment is in progress"));
        }

        let correlation = generate_correlation_token()?;
        let challenge = match kind {
            SecondFactorKind::GoogleAuth => {
                let secret = self.engine.generate_secret(SecretStrength::Bits160)?;
                let pretty = self.engine.prettify(&secret.base32)?;
                let uri = self.engine.make_otp_uri(
                    OtpUriKind::Totp,
                    &self.issuer,
                    &principal.account.user_name,
                    &secret,
                )?;
                principal.issue_candidate(AttachmentCandidate {
                    kind,
                    secret: Some(secret),
                    correlation: correlation.clone(),
                });
                AttachChallenge {
                    kind,
                    pretty_secret: Some(pretty),
                    otpauth_uri: Some(uri),
                    correlation,
                }
            }
            SecondFactorKind::Yubikey => {
                principal.issue_candidate(AttachmentCandidate {
                    kind,
                    secret: None,
                    correlation: correlation.clone(),
                });
                AttachChallenge {
                    kind,
                    pretty_secret: None,
                    otpauth_uri: None,
                    correlation,
                }
            }
        };

        debug!(user_name = %principal.account.user_name, ?kind, "attachment candidate issued");
        Ok(challenge)
    }

    /// 确认绑定：用样例码证明持有候选凭据
    ///
    /// 种类与候选不符时返回 `Conflict` 且候选保留；样例码校验失败
    /// 返回 `Rejected` 且候选作废。成功后从存储重读账户、写入凭据，
    /// 并把本次会话标记为已通过二次认证。
    pub fn confirm_attach(
        &self,
        principal: &mut SessionPrincipal,
        kind: SecondFactorKind,
        sample_code: &str,
    ) -> Result<AttachOutcome> {
        match principal.candidate() {
            None => return Err(Error::conflict("no attachment in progress")),
            Some(candidate) if candidate.kind != kind => {
                return Err(Error::conflict("attachment kind mismatch"));
            }
            Some(_) => {}
        }

        // 候选一次性使用：无论下面校验成败都不再回放
        let candidate = match principal.take_candidate() {
            Some(candidate) => candidate,
            None => return Err(Error::conflict("no attachment in progress")),
        };

        // 证明成功才会产出待写入的凭据
        let credential = match kind {
            SecondFactorKind::GoogleAuth => {
                let secret = match candidate.secret {
                    Some(secret) => secret,
                    None => return Err(Error::conflict("candidate has no secret")),
                };
                let verifier = TotpVerifier::new(secret.clone());
                if verifier.verify(sample_code)?.is_ok() {
                    Some(SecondFactorCredential::Totp(secret))
                } else {
                    None
                }
            }
            SecondFactorKind::Yubikey => match self.yubiauth.verify_otp(sample_code) {
                RemoteVerifyStatus::Ok { public_id } => {
                    Some(SecondFactorCredential::RemoteToken(public_id))
                }
                _ => None,
            },
        };

        let Some(credential) = credential else {
            debug!(user_name = %principal.account.user_name, ?kind, "attachment confirmation failed");
            return Ok(AttachOutcome::Rejected {
                reason: kind.failure_reason(),
            });
        };

        let mut account = self.store.load_fresh(principal.account.id)?;
        account.attach_credential(credential);
        let account = self.store.save(account)?;

        debug!(user_name = %account.user_name, ?kind, "credential attached");
        principal.account = account.clone();
        principal.passed_second_factor = true;
        Ok(AttachOutcome::Attached(account))
    }

    /// 放弃进行中的绑定，候选作废
    pub fn cancel_attach(&self, principal: &mut SessionPrincipal) {
        principal.take_candidate();
    }

    /// 解绑：出示当前凭据生成的有效码后移除凭据
    ///
    /// 该种类没有绑定时返回 `Conflict`；码无效时凭据保持不变。
    pub fn detach(
        &self,
        principal: &mut SessionPrincipal,
        kind: SecondFactorKind,
        sample_code: &str,
    ) -> Result<DetachOutcome> {
        let Some(credential) = principal.account.credential(kind) else {
            return Err(Error::conflict("no such credential attached"));
        };

        let proven = match credential {
            SecondFactorCredential::Totp(secret) => {
                TotpVerifier::new(secret).verify(sample_code)?.is_ok()
            }
            SecondFactorCredential::RemoteToken(public_id) => {
                self.yubiauth.verify_otp_for(sample_code, &public_id)
            }
        };

        if !proven {
            debug!(user_name = %principal.account.user_name, ?kind, "detach rejected");
            return Ok(DetachOutcome::Rejected {
                reason: kind.failure_reason(),
            });
        }

        let mut account = self.store.load_fresh(principal.account.id)?;
        account.detach_credential(kind);
        let account = self.store.save(account)?;

        debug!(user_name = %account.user_name, ?kind, "credential detached");
        principal.account = account.clone();
        Ok(DetachOutcome::Detached(account))
    }
}
