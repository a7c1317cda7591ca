//! 登录服务模块
//!
//! 编排完整的账户生命周期操作：登录、注册、改密码、登出。
//! 纯粹的判定逻辑在 [`crate::decision`]，这里负责把存储、密码
//! 校验、二次认证验证器和会话串起来。
//!
//! ## 示例
//!
//! ```rust
//! use std::sync::Arc;
//! use twofa::account::InMemoryAccountStore;
//! use twofa::decision::{LoginOutcome, SubmittedCodes};
//! use twofa::factor::{RemoteVerifyStatus, Yubiauth, YubicoClient};
//! use twofa::login::LoginService;
//! use twofa::session::SessionData;
//!
//! struct NoClient;
//! impl YubicoClient for NoClient {
//!     fn verify(&self, _otp: &str) -> RemoteVerifyStatus {
//!         RemoteVerifyStatus::TransportError
//!     }
//! }
//!
//! let service = LoginService::new(
//!     Arc::new(InMemoryAccountStore::new()),
//!     Yubiauth::new(Arc::new(NoClient)),
//! );
//! let mut session = SessionData::new_session();
//!
//! let outcome = service
//!     .create_account(&mut session, "alice", "Alice", "hunter2!")
//!     .unwrap();
//! assert_eq!(outcome, LoginOutcome::Authenticated { used_factor: None });
//!
//! let outcome = service
//!     .login(&mut session, "ALICE", "hunter2!", &SubmittedCodes::default())
//!     .unwrap();
//! assert_eq!(outcome, LoginOutcome::Authenticated { used_factor: None });
//! ```

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::account::{Account, AccountStore, SecondFactorCredential};
use crate::decision::{
    self, LoginOutcome, SubmittedCodes, ARGUMENTS_EMPTY, AUTHENTICATION_FAILED,
};
use crate::factor::{SecondFactorVerifier, TotpVerifier, Yubiauth, YubikeyVerifier};
use crate::password;
use crate::session::{Authorization, SessionData, SessionPrincipal};
use crate::Result;

/// 改密码的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangePasswordOutcome {
    /// 密码已更新
    Changed,
    /// 旧密码不对或会话未授权，统一拒绝
    Rejected {
        /// 机器可读的拒绝原因
        reason: &'static str,
    },
}

/// 登录服务
///
/// 持有账户存储和远程令牌校验客户端；自身无状态，可随意克隆共享。
#[derive(Clone)]
pub struct LoginService {
    store: Arc<dyn AccountStore>,
    yubiauth: Yubiauth,
}

impl LoginService {
    /// 创建登录服务
    pub fn new(store: Arc<dyn AccountStore>, yubiauth: Yubiauth) -> Self {
        Self { store, yubiauth }
    }

    /// 账户存储的共享句柄
    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    /// 登录
    ///
    /// 无论成败都先清空旧会话。用户名按小写规范化查找；用户不存在
    /// 与密码错误返回完全相同的泛化拒绝。
    pub fn login(
        &self,
        session: &mut SessionData,
        user_name: &str,
        password: &str,
        codes: &SubmittedCodes,
    ) -> Result<LoginOutcome> {
        session.reset();

        let normalized = user_name.trim().to_lowercase();
        let Some(account) = self.store.find_by_identity(&normalized)? else {
            debug!(user_name = %normalized, "user not found");
            return Ok(LoginOutcome::Rejected {
                reason: AUTHENTICATION_FAILED,
            });
        };

        let password_ok = password::verify_password(password, &account.hashed_password)?;

        let verifiers = self.build_verifiers(&account)?;
        let verifier_refs: Vec<&dyn SecondFactorVerifier> =
            verifiers.iter().map(|v| v.as_ref()).collect();

        let outcome = decision::decide(password_ok, &verifier_refs, codes)?;

        match &outcome {
            LoginOutcome::Authenticated { used_factor } => {
                let mut account = account;
                account.last_login_at = Some(Utc::now());
                let account = self.store.save(account)?;
                debug!(user_name = %account.user_name, ?used_factor, "login succeeded");
                session.sign_in(account, used_factor.is_some());
            }
            LoginOutcome::SecondFactorRequired { available } => {
                debug!(user_name = %account.user_name, ?available, "second factor required");
            }
            LoginOutcome::Rejected { reason } => {
                debug!(user_name = %account.user_name, reason, "login rejected");
            }
        }

        Ok(outcome)
    }

    /// 注册新账户并直接登录
    ///
    /// 任一参数为空白时拒绝；用户名小写存储。
    pub fn create_account(
        &self,
        session: &mut SessionData,
        user_name: &str,
        display_name: &str,
        password: &str,
    ) -> Result<LoginOutcome> {
        session.reset();

        if user_name.trim().is_empty() || display_name.trim().is_empty() || password.is_empty() {
            return Ok(LoginOutcome::Rejected {
                reason: ARGUMENTS_EMPTY,
            });
        }

        let normalized = user_name.trim().to_lowercase();
        let hashed = password::hash_password(password)?;
        let account = self
            .store
            .create(Account::new(normalized, display_name.trim(), hashed))?;

        debug!(user_name = %account.user_name, "account created");
        session.sign_in(account, false);
        Ok(LoginOutcome::Authenticated { used_factor: None })
    }

    /// 修改密码
    ///
    /// 会话必须已完整授权，且需出示当前密码。授权失败与旧密码错误
    /// 返回同样的拒绝。
    pub fn change_password(
        &self,
        session: &mut SessionData,
        old_password: &str,
        new_password: &str,
    ) -> Result<ChangePasswordOutcome> {
        let Authorization::Authorized(principal) = session.authorize() else {
            return Ok(ChangePasswordOutcome::Rejected {
                reason: AUTHENTICATION_FAILED,
            });
        };

        if new_password.is_empty() {
            return Ok(ChangePasswordOutcome::Rejected {
                reason: ARGUMENTS_EMPTY,
            });
        }

        if !password::verify_password(old_password, &principal.account.hashed_password)? {
            debug!(user_name = %principal.account.user_name, "password change rejected");
            return Ok(ChangePasswordOutcome::Rejected {
                reason: AUTHENTICATION_FAILED,
            });
        }

        let mut account = self.store.load_fresh(principal.account.id)?;
        account.hashed_password = password::hash_password(new_password)?;
        let account = self.store.save(account)?;

        debug!(user_name = %account.user_name, "password changed");
        principal.account = account;
        Ok(ChangePasswordOutcome::Changed)
    }

    /// 当前会话的主体（未登录时为 None）
    ///
    /// 供"我是谁"一类的探询接口使用，不做授权检查。
    pub fn current_principal<'a>(&self, session: &'a SessionData) -> Option<&'a SessionPrincipal> {
        session.principal()
    }

    /// 登出：销毁会话里的一切状态，包括未确认的候选密钥
    pub fn logout(&self, session: &mut SessionData) {
        session.reset();
    }

    /// 根据账户已绑定的凭据构造验证器，按固定优先级排列
    fn build_verifiers(&self, account: &Account) -> Result<Vec<Box<dyn SecondFactorVerifier>>> {
        let mut verifiers: Vec<Box<dyn SecondFactorVerifier>> = Vec::new();
        for kind in account.enabled_kinds() {
            match account.credential(kind) {
                Some(SecondFactorCredential::Totp(secret)) => {
                    verifiers.push(Box::new(TotpVerifier::new(secret)));
                }
                Some(SecondFactorCredential::RemoteToken(public_id)) => {
                    verifiers.push(Box::new(YubikeyVerifier::new(
                        self.yubiauth.clone(),
                        public_id,
                    )));
                }
                None => {}
            }
        }
        Ok(verifiers)
    }
}
