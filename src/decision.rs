//! 登录判定模块
//!
//! 把"密码是否正确"与各二次认证因素的校验结果组合成一个登录结论。
//! 判定本身是纯函数，不触碰存储和会话，方便单独测试。
//!
//! ## 防枚举
//!
//! 密码错误时返回统一的泛化拒绝，不透露用户是否存在、是否启用了
//! 二次认证；只有密码正确之后才会暴露可用因素列表。

use std::collections::BTreeMap;

use crate::account::Account;
use crate::factor::{SecondFactorKind, SecondFactorVerifier};
use crate::Result;

// ============================================================================
// 拒绝原因常量
// ============================================================================

/// 泛化拒绝：用户不存在或密码错误
pub const AUTHENTICATION_FAILED: &str = "authentication.failed";

/// 密码正确但还需要二次认证码
pub const SECOND_FACTOR_REQUIRED: &str = "twofactor.required";

/// 必填参数为空
pub const ARGUMENTS_EMPTY: &str = "some.arguments.are.empty";

// ============================================================================
// 提交的认证码
// ============================================================================

/// 一次登录请求中随密码提交的二次认证码
///
/// 空白字符串视同未提交。
#[derive(Debug, Clone, Default)]
pub struct SubmittedCodes {
    google_otp: Option<String>,
    yubi_otp: Option<String>,
}

impl SubmittedCodes {
    /// 从可能为空白的原始输入构造
    pub fn new(google_otp: Option<&str>, yubi_otp: Option<&str>) -> Self {
        Self {
            google_otp: google_otp.and_then(non_blank),
            yubi_otp: yubi_otp.and_then(non_blank),
        }
    }

    /// 指定因素对应的认证码
    pub fn code_for(&self, kind: SecondFactorKind) -> Option<&str> {
        match kind {
            SecondFactorKind::GoogleAuth => self.google_otp.as_deref(),
            SecondFactorKind::Yubikey => self.yubi_otp.as_deref(),
        }
    }

    /// 是否提交了任一认证码
    pub fn is_empty(&self) -> bool {
        self.google_otp.is_none() && self.yubi_otp.is_none()
    }
}

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ============================================================================
// 登录结论
// ============================================================================

/// 登录判定的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// 认证完成，可以建立会话
    Authenticated {
        /// 本次使用的二次认证因素（未启用二次认证时为 None）
        used_factor: Option<SecondFactorKind>,
    },
    /// 密码正确，但需要补交二次认证码
    SecondFactorRequired {
        /// 该账户可用的因素，按固定优先级排序
        available: Vec<SecondFactorKind>,
    },
    /// 拒绝登录
    Rejected {
        /// 机器可读的拒绝原因
        reason: &'static str,
    },
}

/// 组合密码结果与二次认证结果
///
/// 按固定优先级只尝试第一个提交了认证码的已启用因素；该因素校验
/// 失败即拒绝，不会退回去尝试其他因素。
pub fn decide(
    password_ok: bool,
    verifiers: &[&dyn SecondFactorVerifier],
    codes: &SubmittedCodes,
) -> Result<LoginOutcome> {
    if !password_ok {
        return Ok(LoginOutcome::Rejected {
            reason: AUTHENTICATION_FAILED,
        });
    }

    if verifiers.is_empty() {
        return Ok(LoginOutcome::Authenticated { used_factor: None });
    }

    for kind in SecondFactorKind::PRIORITY {
        let Some(verifier) = verifiers.iter().find(|v| v.kind() == kind) else {
            continue;
        };
        let Some(code) = codes.code_for(kind) else {
            continue;
        };

        return if verifier.verify(code)?.is_ok() {
            Ok(LoginOutcome::Authenticated {
                used_factor: Some(kind),
            })
        } else {
            Ok(LoginOutcome::Rejected {
                reason: kind.failure_reason(),
            })
        };
    }

    Ok(LoginOutcome::SecondFactorRequired {
        available: verifiers.iter().map(|v| v.kind()).collect(),
    })
}

// ============================================================================
// 响应载荷
// ============================================================================

/// 登录成功的响应载荷
///
/// 已认证的用户可以看到自己每种因素的启用状态，供设置页展示。
pub fn authenticated_payload(account: &Account) -> BTreeMap<String, String> {
    let mut payload = BTreeMap::new();
    payload.insert("status".to_string(), "success".to_string());
    payload.insert("userName".to_string(), account.user_name.clone());
    payload.insert("displayName".to_string(), account.display_name.clone());
    payload.insert(
        "googleAuth".to_string(),
        account
            .has_credential(SecondFactorKind::GoogleAuth)
            .to_string(),
    );
    payload.insert(
        "yubiAuth".to_string(),
        account
            .has_credential(SecondFactorKind::Yubikey)
            .to_string(),
    );
    payload
}

/// 登录被拒绝的响应载荷
///
/// 只有 `twofactor.required` 会附带可用因素标志；泛化拒绝不携带
/// 任何账户信息。
pub fn rejected_payload(
    reason: &str,
    available: &[SecondFactorKind],
) -> BTreeMap<String, String> {
    let mut payload = BTreeMap::new();
    payload.insert("status".to_string(), "failure".to_string());
    payload.insert("reason".to_string(), reason.to_string());
    for kind in available {
        payload.insert(kind.available_flag().to_string(), "true".to_string());
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::factor::VerifyOutcome;

    struct FixedVerifier {
        kind: SecondFactorKind,
        outcome: VerifyOutcome,
    }

    impl SecondFactorVerifier for FixedVerifier {
        fn kind(&self) -> SecondFactorKind {
            self.kind
        }

        fn verify(&self, _candidate_code: &str) -> Result<VerifyOutcome> {
            Ok(self.outcome)
        }
    }

    struct FailingVerifier;

    impl SecondFactorVerifier for FailingVerifier {
        fn kind(&self) -> SecondFactorKind {
            SecondFactorKind::GoogleAuth
        }

        fn verify(&self, _candidate_code: &str) -> Result<VerifyOutcome> {
            Err(Error::invalid_argument("broken"))
        }
    }

    fn google(outcome: VerifyOutcome) -> FixedVerifier {
        FixedVerifier {
            kind: SecondFactorKind::GoogleAuth,
            outcome,
        }
    }

    fn yubi(outcome: VerifyOutcome) -> FixedVerifier {
        FixedVerifier {
            kind: SecondFactorKind::Yubikey,
            outcome,
        }
    }

    #[test]
    fn test_password_failure_is_generic() {
        let verifier = google(VerifyOutcome::Ok);
        let codes = SubmittedCodes::new(Some("123456"), None);
        let outcome = decide(false, &[&verifier], &codes).unwrap();
        assert_eq!(
            outcome,
            LoginOutcome::Rejected {
                reason: AUTHENTICATION_FAILED
            }
        );
    }

    #[test]
    fn test_no_second_factor_authenticates() {
        let outcome = decide(true, &[], &SubmittedCodes::default()).unwrap();
        assert_eq!(outcome, LoginOutcome::Authenticated { used_factor: None });
    }

    #[test]
    fn test_second_factor_required_lists_available() {
        let g = google(VerifyOutcome::Ok);
        let y = yubi(VerifyOutcome::Ok);
        let outcome = decide(true, &[&g, &y], &SubmittedCodes::default()).unwrap();
        assert_eq!(
            outcome,
            LoginOutcome::SecondFactorRequired {
                available: vec![SecondFactorKind::GoogleAuth, SecondFactorKind::Yubikey],
            }
        );
    }

    #[test]
    fn test_google_takes_priority_over_yubikey() {
        let g = google(VerifyOutcome::Ok);
        let y = yubi(VerifyOutcome::Mismatch);
        let codes = SubmittedCodes::new(Some("123456"), Some("cccccc"));
        let outcome = decide(true, &[&g, &y], &codes).unwrap();
        assert_eq!(
            outcome,
            LoginOutcome::Authenticated {
                used_factor: Some(SecondFactorKind::GoogleAuth),
            }
        );
    }

    #[test]
    fn test_failed_factor_does_not_fall_through() {
        // Google 码校验失败时不应再尝试 Yubikey 码
        let g = google(VerifyOutcome::Mismatch);
        let y = yubi(VerifyOutcome::Ok);
        let codes = SubmittedCodes::new(Some("000000"), Some("cccccc"));
        let outcome = decide(true, &[&g, &y], &codes).unwrap();
        assert_eq!(
            outcome,
            LoginOutcome::Rejected {
                reason: "googleAuth.failed"
            }
        );
    }

    #[test]
    fn test_yubikey_used_when_only_its_code_submitted() {
        let g = google(VerifyOutcome::Ok);
        let y = yubi(VerifyOutcome::Ok);
        let codes = SubmittedCodes::new(None, Some("cccccc"));
        let outcome = decide(true, &[&g, &y], &codes).unwrap();
        assert_eq!(
            outcome,
            LoginOutcome::Authenticated {
                used_factor: Some(SecondFactorKind::Yubikey),
            }
        );
    }

    #[test]
    fn test_blank_codes_are_ignored() {
        let codes = SubmittedCodes::new(Some("   "), Some(""));
        assert!(codes.is_empty());
    }

    #[test]
    fn test_verifier_error_propagates() {
        let verifier = FailingVerifier;
        let codes = SubmittedCodes::new(Some("123456"), None);
        assert!(decide(true, &[&verifier], &codes).is_err());
    }

    #[test]
    fn test_rejected_payload_flags() {
        let payload = rejected_payload(
            SECOND_FACTOR_REQUIRED,
            &[SecondFactorKind::GoogleAuth, SecondFactorKind::Yubikey],
        );
        assert_eq!(payload.get("status").map(String::as_str), Some("failure"));
        assert_eq!(
            payload.get("reason").map(String::as_str),
            Some("twofactor.required")
        );
        assert_eq!(
            payload.get("googleAuthAvailable").map(String::as_str),
            Some("true")
        );
        assert_eq!(
            payload.get("yubiAuthAvailable").map(String::as_str),
            Some("true")
        );
    }

    #[test]
    fn test_authenticated_payload_reports_factor_state() {
        use crate::account::{Account, SecondFactorCredential};

        let mut account = Account::new("alice", "Alice", "$2b$12$fakehash");
        let payload = authenticated_payload(&account);
        assert_eq!(payload.get("googleAuth").map(String::as_str), Some("false"));
        assert_eq!(payload.get("yubiAuth").map(String::as_str), Some("false"));

        account.attach_credential(SecondFactorCredential::RemoteToken(
            "cccccckdvvul".to_string(),
        ));
        let payload = authenticated_payload(&account);
        assert_eq!(payload.get("googleAuth").map(String::as_str), Some("false"));
        assert_eq!(payload.get("yubiAuth").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_generic_rejection_payload_has_no_flags() {
        let payload = rejected_payload(AUTHENTICATION_FAILED, &[]);
        assert_eq!(payload.len(), 2);
        assert!(!payload.contains_key("googleAuthAvailable"));
    }
}
