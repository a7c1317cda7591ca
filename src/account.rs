//! 账户记录与存储模块
//!
//! 定义账户记录、已绑定的二次认证凭据，以及持久化协作者的接口边界。
//! 真实部署由数据库实现 [`AccountStore`]；内存实现用于开发和测试。
//! 针对同一账户的并发修改由存储层的乐观锁负责串行化，版本不一致
//! 以 [`StorageError::VersionConflict`] 暴露给调用方。

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use crate::error::{Error, Result, StorageError};
use crate::factor::SecondFactorKind;
use crate::otp::SharedSecret;

/// 已绑定到账户的二次认证凭据
#[derive(Debug, Clone)]
pub enum SecondFactorCredential {
    /// TOTP 共享密钥
    Totp(SharedSecret),
    /// 远程令牌的公共 id
    RemoteToken(String),
}

impl SecondFactorCredential {
    /// 凭据对应的因素种类
    pub fn kind(&self) -> SecondFactorKind {
        match self {
            SecondFactorCredential::Totp(_) => SecondFactorKind::GoogleAuth,
            SecondFactorCredential::RemoteToken(_) => SecondFactorKind::Yubikey,
        }
    }
}

/// 账户记录
///
/// 每种因素同一时间最多绑定一个凭据；任一凭据存在即视为
/// 启用了二次认证。
#[derive(Clone)]
pub struct Account {
    /// 存储分配的 id
    pub id: u64,

    /// 登录名（存储前统一小写）
    pub user_name: String,

    /// 登录后展示用的名称
    pub display_name: String,

    /// 密码哈希
    pub hashed_password: String,

    /// TOTP 共享密钥（绑定后必须同时通过密码和时间码才能登录）
    pub google_secret: Option<SharedSecret>,

    /// Yubikey 公共 id（绑定后必须同时通过密码和令牌码才能登录）
    pub yubikey_public_id: Option<String>,

    /// 创建时间
    pub created_at: DateTime<Utc>,

    /// 最近一次登录时间
    pub last_login_at: Option<DateTime<Utc>>,

    /// 乐观锁版本号，应用代码不应手动修改
    pub version: u64,
}

impl Account {
    /// 创建新账户记录（id 由存储分配）
    pub fn new(
        user_name: impl Into<String>,
        display_name: impl Into<String>,
        hashed_password: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            user_name: user_name.into(),
            display_name: display_name.into(),
            hashed_password: hashed_password.into(),
            google_secret: None,
            yubikey_public_id: None,
            created_at: Utc::now(),
            last_login_at: None,
            version: 0,
        }
    }

    /// 是否绑定了指定种类的凭据
    pub fn has_credential(&self, kind: SecondFactorKind) -> bool {
        match kind {
            SecondFactorKind::GoogleAuth => self.google_secret.is_some(),
            SecondFactorKind::Yubikey => self.yubikey_public_id.is_some(),
        }
    }

    /// 是否启用了二次认证
    pub fn has_second_factor(&self) -> bool {
        self.google_secret.is_some() || self.yubikey_public_id.is_some()
    }

    /// 当前已启用的因素种类，按固定优先级排序
    pub fn enabled_kinds(&self) -> Vec<SecondFactorKind> {
        SecondFactorKind::PRIORITY
            .into_iter()
            .filter(|kind| self.has_credential(*kind))
            .collect()
    }

    /// 读取指定种类的凭据
    pub fn credential(&self, kind: SecondFactorKind) -> Option<SecondFactorCredential> {
        match kind {
            SecondFactorKind::GoogleAuth => self
                .google_secret
                .clone()
                .map(SecondFactorCredential::Totp),
            SecondFactorKind::Yubikey => self
                .yubikey_public_id
                .clone()
                .map(SecondFactorCredential::RemoteToken),
        }
    }

    /// 绑定凭据（覆盖同种类的旧凭据）
    pub fn attach_credential(&mut self, credential: SecondFactorCredential) {
        match credential {
            SecondFactorCredential::Totp(secret) => self.google_secret = Some(secret),
            SecondFactorCredential::RemoteToken(public_id) => {
                self.yubikey_public_id = Some(public_id)
            }
        }
    }

    /// 解绑指定种类的凭据
    pub fn detach_credential(&mut self, kind: SecondFactorKind) {
        match kind {
            SecondFactorKind::GoogleAuth => self.google_secret = None,
            SecondFactorKind::Yubikey => self.yubikey_public_id = None,
        }
    }
}

// 密码哈希和共享密钥不出现在日志里
impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("user_name", &self.user_name)
            .field("display_name", &self.display_name)
            .field("google_auth", &self.google_secret.is_some())
            .field("yubikey_public_id", &self.yubikey_public_id)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// 账户存储
///
/// 外部持久化协作者的接口边界。实现必须在并发保存同一记录时
/// 给出版本冲突信号，本库不在存储之上另行加锁。
pub trait AccountStore: Send + Sync {
    /// 创建账户，分配 id；登录名已存在时返回 `AlreadyExists`
    fn create(&self, account: Account) -> Result<Account>;

    /// 按登录名查找账户
    fn find_by_identity(&self, user_name: &str) -> Result<Option<Account>>;

    /// 按 id 重新加载最新的账户记录
    fn load_fresh(&self, id: u64) -> Result<Account>;

    /// 保存账户
    ///
    /// 版本号与存储中的不一致时返回 `VersionConflict`；
    /// 成功时返回版本号已递增的新记录。
    fn save(&self, account: Account) -> Result<Account>;
}

/// 内存账户存储
///
/// 用于开发和测试，生产环境应换成数据库实现。
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<u64, Account>>,
    next_id: AtomicU64,
}

impl InMemoryAccountStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl AccountStore for InMemoryAccountStore {
    fn create(&self, mut account: Account) -> Result<Account> {
        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| Error::Storage(StorageError::OperationFailed("lock poisoned".into())))?;

        if accounts
            .values()
            .any(|existing| existing.user_name == account.user_name)
        {
            return Err(Error::Storage(StorageError::AlreadyExists(format!(
                "user {}",
                account.user_name
            ))));
        }

        account.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        account.version = 1;
        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    fn find_by_identity(&self, user_name: &str) -> Result<Option<Account>> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| Error::Storage(StorageError::OperationFailed("lock poisoned".into())))?;
        Ok(accounts
            .values()
            .find(|account| account.user_name == user_name)
            .cloned())
    }

    fn load_fresh(&self, id: u64) -> Result<Account> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| Error::Storage(StorageError::OperationFailed("lock poisoned".into())))?;
        accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::Storage(StorageError::NotFound(format!("account {}", id))))
    }

    fn save(&self, mut account: Account) -> Result<Account> {
        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| Error::Storage(StorageError::OperationFailed("lock poisoned".into())))?;

        let stored = accounts.get(&account.id).ok_or_else(|| {
            Error::Storage(StorageError::NotFound(format!("account {}", account.id)))
        })?;

        if stored.version != account.version {
            return Err(Error::Storage(StorageError::VersionConflict {
                expected: account.version,
                actual: stored.version,
            }));
        }

        account.version += 1;
        accounts.insert(account.id, account.clone());
        Ok(account)
    }
}
