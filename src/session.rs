//! 会话状态模块
//!
//! 承载已认证的身份、本次登录的二次认证结论，以及绑定流程中
//! 未确认的候选密钥。候选密钥只存在于"请求绑定"和"确认绑定/放弃"
//! 之间，从不落入持久化存储；会话结束即销毁。
//!
//! 绑定进度不是隐式的可变字段，而是显式的
//! [`AttachmentState`] 标签，每次状态转换都有名字。

use crate::account::Account;
use crate::factor::SecondFactorKind;
use crate::otp::SharedSecret;

/// 未确认的候选凭据
///
/// 对 TOTP 是服务端新生成的共享密钥；对 Yubikey 候选就是用户将要
/// 提交的第一个 OTP 本身，所以没有预置密钥。关联令牌用于在多请求
/// 流程（例如二维码 URL）中识别同一个候选。
#[derive(Debug, Clone)]
pub struct AttachmentCandidate {
    /// 待绑定的因素种类
    pub kind: SecondFactorKind,

    /// 候选共享密钥（仅 TOTP）
    pub secret: Option<SharedSecret>,

    /// 会话内关联令牌，每次请求绑定都重新生成
    pub correlation: String,
}

/// 绑定流程的会话内状态
#[derive(Debug, Clone, Default)]
pub enum AttachmentState {
    /// 没有进行中的绑定
    #[default]
    Idle,

    /// 已发放候选凭据，等待用户提交样例码证明持有
    CandidateIssued(AttachmentCandidate),
}

/// 已通过密码认证的会话主体
#[derive(Debug, Clone)]
pub struct SessionPrincipal {
    /// 认证时的账户快照
    pub account: Account,

    /// 本次登录是否通过了二次认证
    pub passed_second_factor: bool,

    attachment: AttachmentState,
}

impl SessionPrincipal {
    /// 创建会话主体
    pub fn new(account: Account, passed_second_factor: bool) -> Self {
        Self {
            account,
            passed_second_factor,
            attachment: AttachmentState::Idle,
        }
    }

    /// 当前绑定状态
    pub fn attachment(&self) -> &AttachmentState {
        &self.attachment
    }

    /// 进行中的候选凭据
    pub fn candidate(&self) -> Option<&AttachmentCandidate> {
        match &self.attachment {
            AttachmentState::Idle => None,
            AttachmentState::CandidateIssued(candidate) => Some(candidate),
        }
    }

    /// 发放新候选，进入 `CandidateIssued`
    pub(crate) fn issue_candidate(&mut self, candidate: AttachmentCandidate) {
        self.attachment = AttachmentState::CandidateIssued(candidate);
    }

    /// 取走候选并回到 `Idle`
    ///
    /// 候选是一次性的：确认成功、确认失败、放弃都会走到这里。
    pub(crate) fn take_candidate(&mut self) -> Option<AttachmentCandidate> {
        match std::mem::take(&mut self.attachment) {
            AttachmentState::Idle => None,
            AttachmentState::CandidateIssued(candidate) => Some(candidate),
        }
    }
}

/// 授权检查的结果
///
/// 调用方必须显式处理两个分支，没有异常式的控制流。
#[derive(Debug)]
pub enum Authorization<'a> {
    /// 会话已完整认证，可以操作
    Authorized(&'a mut SessionPrincipal),
    /// 未登录，或启用了二次认证但本次登录未通过
    Unauthorized,
}

/// 单个会话的数据
///
/// 候选密钥为会话私有，不跨主体共享；登出或新建会话时整体销毁。
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    principal: Option<SessionPrincipal>,
}

impl SessionData {
    /// 创建空会话
    pub fn new_session() -> Self {
        Self::default()
    }

    /// 登录成功后写入会话主体，覆盖旧状态
    pub fn sign_in(&mut self, account: Account, passed_second_factor: bool) {
        self.principal = Some(SessionPrincipal::new(account, passed_second_factor));
    }

    /// 当前会话主体（未登录时为 None）
    pub fn principal(&self) -> Option<&SessionPrincipal> {
        self.principal.as_ref()
    }

    /// 授权守卫
    ///
    /// 账户启用了任一二次认证因素但本次登录没有通过时，
    /// 同样视为未授权。
    pub fn authorize(&mut self) -> Authorization<'_> {
        match &mut self.principal {
            Some(principal)
                if !principal.account.has_second_factor() || principal.passed_second_factor =>
            {
                Authorization::Authorized(principal)
            }
            _ => Authorization::Unauthorized,
        }
    }

    /// 登出：覆盖全部会话数据
    pub fn reset(&mut self) {
        self.principal = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::SecondFactorCredential;

    fn account() -> Account {
        Account::new("alice", "Alice", "$2b$12$fakehash")
    }

    #[test]
    fn test_authorize_without_login() {
        let mut session = SessionData::new_session();
        assert!(matches!(session.authorize(), Authorization::Unauthorized));
    }

    #[test]
    fn test_authorize_no_second_factor() {
        let mut session = SessionData::new_session();
        session.sign_in(account(), false);
        assert!(matches!(session.authorize(), Authorization::Authorized(_)));
    }

    #[test]
    fn test_authorize_requires_passed_second_factor() {
        let mut with_factor = account();
        with_factor.attach_credential(SecondFactorCredential::RemoteToken(
            "cccccckdvvul".to_string(),
        ));

        let mut session = SessionData::new_session();
        session.sign_in(with_factor.clone(), false);
        assert!(matches!(session.authorize(), Authorization::Unauthorized));

        session.sign_in(with_factor, true);
        assert!(matches!(session.authorize(), Authorization::Authorized(_)));
    }

    #[test]
    fn test_candidate_is_single_use() {
        let mut principal = SessionPrincipal::new(account(), false);
        assert!(principal.candidate().is_none());

        principal.issue_candidate(AttachmentCandidate {
            kind: SecondFactorKind::GoogleAuth,
            secret: None,
            correlation: "token".to_string(),
        });
        assert!(principal.candidate().is_some());

        let taken = principal.take_candidate();
        assert!(taken.is_some());
        assert!(principal.candidate().is_none());
        assert!(principal.take_candidate().is_none());
    }

    #[test]
    fn test_reset_destroys_candidate() {
        let mut session = SessionData::new_session();
        session.sign_in(account(), false);

        if let Authorization::Authorized(principal) = session.authorize() {
            principal.issue_candidate(AttachmentCandidate {
                kind: SecondFactorKind::GoogleAuth,
                secret: None,
                correlation: "token".to_string(),
            });
        }

        session.reset();
        assert!(session.principal().is_none());
    }
}
