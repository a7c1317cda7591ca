//! Yubikey 验证器
//!
//! 包装远程校验服务客户端，先做本地格式校验（结构不合法的 OTP 不产生
//! 网络调用），再委托远程服务验证。远程服务的五种结果映射到统一的
//! [`VerifyOutcome`]：传输错误和完整性错误（可能被篡改的响应）对调用方
//! 不可区分，二者都绝不视为通过。

use std::sync::Arc;

use crate::error::Result;
use crate::factor::{SecondFactorKind, SecondFactorVerifier, VerifyOutcome};

/// Yubikey OTP 的最小长度
pub const OTP_MIN_LENGTH: usize = 32;

/// Yubikey OTP 的最大长度
pub const OTP_MAX_LENGTH: usize = 48;

/// modhex 字母表（Yubikey OTP 使用的键位无关编码）
const MODHEX_ALPHABET: &[u8] = b"cbdefghijklnrtuv";

/// 远程校验服务返回的状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteVerifyStatus {
    /// OTP 有效，附带令牌的公共 id
    Ok {
        /// 生成该 OTP 的令牌公共 id
        public_id: String,
    },
    /// OTP 未通过校验
    Failed,
    /// OTP 结构不合法
    BadOtp,
    /// 与远程服务通信失败
    TransportError,
    /// 远程响应未通过完整性校验（可能被中间人篡改）
    IntegrityError,
}

/// 远程校验服务客户端
///
/// 外部协作者的接口边界；真实实现走网络，测试用脚本化的假客户端。
pub trait YubicoClient: Send + Sync {
    /// 向远程服务校验一个 OTP
    fn verify(&self, otp: &str) -> RemoteVerifyStatus;
}

/// 检查 OTP 结构是否合法
///
/// 合法的 Yubikey OTP 是 32~48 个 modhex 字符。
pub fn is_valid_otp_format(otp: &str) -> bool {
    (OTP_MIN_LENGTH..=OTP_MAX_LENGTH).contains(&otp.len())
        && otp.bytes().all(|b| MODHEX_ALPHABET.contains(&b))
}

/// 从 OTP 中取出令牌的公共 id
///
/// OTP 的末 32 个字符是一次性部分，前缀是公共 id。
/// 结构不合法的 OTP 返回 `None`。
pub fn public_id_of(otp: &str) -> Option<&str> {
    if !is_valid_otp_format(otp) {
        return None;
    }
    Some(&otp[..otp.len() - 32])
}

/// 远程校验服务的薄包装
///
/// 在客户端之上做本地格式预检，给出统一的状态码。
#[derive(Clone)]
pub struct Yubiauth {
    client: Arc<dyn YubicoClient>,
}

impl Yubiauth {
    /// 创建包装
    pub fn new(client: Arc<dyn YubicoClient>) -> Self {
        Self { client }
    }

    /// 校验一个 OTP 是否有效并被远程服务识别
    ///
    /// 结构不合法的 OTP 直接返回 `BadOtp`，不产生网络调用。
    pub fn verify_otp(&self, otp: &str) -> RemoteVerifyStatus {
        if !is_valid_otp_format(otp) {
            return RemoteVerifyStatus::BadOtp;
        }
        self.client.verify(otp)
    }

    /// 校验 OTP 有效且与期望的公共 id 关联
    pub fn verify_otp_for(&self, otp: &str, expected_public_id: &str) -> bool {
        matches!(
            self.verify_otp(otp),
            RemoteVerifyStatus::Ok { public_id } if public_id == expected_public_id
        )
    }
}

/// Yubikey 验证器
///
/// 绑定到某个已注册的公共 id，实现登录用的统一验证接口。
#[derive(Clone)]
pub struct YubikeyVerifier {
    auth: Yubiauth,
    expected_public_id: String,
}

impl YubikeyVerifier {
    /// 创建验证器
    pub fn new(auth: Yubiauth, expected_public_id: impl Into<String>) -> Self {
        Self {
            auth,
            expected_public_id: expected_public_id.into(),
        }
    }
}

impl SecondFactorVerifier for YubikeyVerifier {
    fn kind(&self) -> SecondFactorKind {
        SecondFactorKind::Yubikey
    }

    fn verify(&self, candidate_code: &str) -> Result<VerifyOutcome> {
        let outcome = match self.auth.verify_otp(candidate_code) {
            RemoteVerifyStatus::Ok { public_id } => {
                if public_id == self.expected_public_id {
                    VerifyOutcome::Ok
                } else {
                    // 别人的合法令牌不能证明持有这一个
                    VerifyOutcome::Mismatch
                }
            }
            RemoteVerifyStatus::Failed => VerifyOutcome::Mismatch,
            RemoteVerifyStatus::BadOtp => VerifyOutcome::Malformed,
            RemoteVerifyStatus::TransportError | RemoteVerifyStatus::IntegrityError => {
                VerifyOutcome::ServiceError
            }
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 返回固定应答并记录调用次数的假客户端
    struct ScriptedClient {
        response: RemoteVerifyStatus,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(response: RemoteVerifyStatus) -> Arc<Self> {
            Arc::new(Self {
                response,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl YubicoClient for ScriptedClient {
        fn verify(&self, _otp: &str) -> RemoteVerifyStatus {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }
    }

    fn sample_otp() -> String {
        // 12 字符公共 id + 32 字符一次性部分，全部 modhex
        format!("cccccckdvvul{}", "c".repeat(32))
    }

    #[test]
    fn test_otp_format_validation() {
        assert!(is_valid_otp_format(&sample_otp()));
        assert!(is_valid_otp_format(&"c".repeat(32)));
        assert!(is_valid_otp_format(&"c".repeat(48)));

        assert!(!is_valid_otp_format(&"c".repeat(31)));
        assert!(!is_valid_otp_format(&"c".repeat(49)));
        // 'a' 不在 modhex 字母表里
        assert!(!is_valid_otp_format(&"a".repeat(44)));
        assert!(!is_valid_otp_format(""));
    }

    #[test]
    fn test_public_id_of() {
        assert_eq!(public_id_of(&sample_otp()), Some("cccccckdvvul"));
        assert_eq!(public_id_of(&"c".repeat(32)), Some(""));

        // 过短或非 modhex 的输入不会恐慌，返回 None
        assert_eq!(public_id_of("short"), None);
        assert_eq!(public_id_of(""), None);
        assert_eq!(public_id_of(&"a".repeat(44)), None);
    }

    #[test]
    fn test_bad_format_skips_network_call() {
        let client = ScriptedClient::new(RemoteVerifyStatus::Failed);
        let auth = Yubiauth::new(client.clone());

        assert_eq!(auth.verify_otp("not-an-otp"), RemoteVerifyStatus::BadOtp);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_verify_otp_for_matches_public_id() {
        let client = ScriptedClient::new(RemoteVerifyStatus::Ok {
            public_id: "cccccckdvvul".to_string(),
        });
        let auth = Yubiauth::new(client);

        assert!(auth.verify_otp_for(&sample_otp(), "cccccckdvvul"));
        assert!(!auth.verify_otp_for(&sample_otp(), "cccccctltbtb"));
    }

    #[test]
    fn test_verifier_outcome_mapping() {
        let cases = [
            (
                RemoteVerifyStatus::Ok {
                    public_id: "cccccckdvvul".to_string(),
                },
                VerifyOutcome::Ok,
            ),
            (
                RemoteVerifyStatus::Ok {
                    public_id: "cccccctltbtb".to_string(),
                },
                VerifyOutcome::Mismatch,
            ),
            (RemoteVerifyStatus::Failed, VerifyOutcome::Mismatch),
            (RemoteVerifyStatus::TransportError, VerifyOutcome::ServiceError),
            (RemoteVerifyStatus::IntegrityError, VerifyOutcome::ServiceError),
        ];

        for (response, expected) in cases {
            let auth = Yubiauth::new(ScriptedClient::new(response.clone()));
            let verifier = YubikeyVerifier::new(auth, "cccccckdvvul");
            assert_eq!(
                verifier.verify(&sample_otp()).unwrap(),
                expected,
                "mapping failed for {:?}",
                response
            );
        }
    }

    #[test]
    fn test_verifier_malformed_otp() {
        let auth = Yubiauth::new(ScriptedClient::new(RemoteVerifyStatus::Failed));
        let verifier = YubikeyVerifier::new(auth, "cccccckdvvul");
        assert_eq!(verifier.verify("short").unwrap(), VerifyOutcome::Malformed);
    }
}
