use crate::common::never;
use crate::portfolio::entity::AssetMap;
use crate::venue::entity::Credentials;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 以交易所键 (例如 `binance`) 为键的交易所子账户表。
pub type ExchangeMap = BTreeMap<String, ExchangeAccount>;

/// # Summary
/// 用户账户，系统持久化的最小单元。
///
/// # Invariants
/// - `username` 非空且不包含路径分隔符 `/`。
/// - `username` 不写入磁盘，加载时由存储层重新填入。
/// - `last_update` 只在聚合写入成功后前进。
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(skip)]
    pub username: String,
    #[serde(default)]
    pub exchanges: ExchangeMap,
    /// 口令校验值 (bcrypt)
    #[serde(rename = "hash", default)]
    pub password_verifier: String,
    #[serde(default = "never")]
    pub last_update: DateTime<Utc>,
}

impl Account {
    /// 创建一个尚未设置口令的新账户
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            exchanges: ExchangeMap::new(),
            password_verifier: String::new(),
            last_update: never(),
        }
    }

    /// # Summary
    /// 校验用户名是否可以作为账户标识。
    ///
    /// # Returns
    /// 合法返回 `Ok(())`，否则返回面向用户的错误描述。
    pub fn validate_username(username: &str) -> Result<(), String> {
        if username.is_empty() {
            return Err("username must not be empty".to_string());
        }
        if username.contains('/') {
            return Err("username must not contain '/'".to_string());
        }
        Ok(())
    }

    /// 各交易所资产表的只读视图，不含任何凭证。
    pub fn portfolio(&self) -> BTreeMap<String, AssetMap> {
        self.exchanges
            .iter()
            .map(|(key, ex)| (key.clone(), ex.assets.clone()))
            .collect()
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("username", &self.username)
            .field("exchanges", &self.exchanges)
            .field("last_update", &self.last_update)
            .finish_non_exhaustive()
    }
}

/// # Summary
/// 用户在某个交易所的子账户：API 凭证与该交易所的聚合状态。
///
/// # Invariants
/// - `assets` 只由持有账户写锁的聚合引擎修改。
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeAccount {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret: String,
    /// 部分交易所不需要口令短语，此时为空串
    #[serde(default)]
    pub phrase: String,
    #[serde(default)]
    pub assets: AssetMap,
}

impl ExchangeAccount {
    pub fn new(
        api_key: impl Into<String>,
        secret: impl Into<String>,
        phrase: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            secret: secret.into(),
            phrase: phrase.into(),
            assets: AssetMap::new(),
        }
    }

    /// 构造适配器所需的凭证
    pub fn credentials(&self) -> Credentials {
        Credentials {
            api_key: self.api_key.clone(),
            secret: self.secret.clone(),
            passphrase: self.phrase.clone(),
        }
    }

    /// 子账户是否仍绑定着这组凭证。解绑后重新绑定会得到不同的凭证。
    pub fn holds(&self, credentials: &Credentials) -> bool {
        self.api_key == credentials.api_key
            && self.secret == credentials.secret
            && self.phrase == credentials.passphrase
    }
}

impl fmt::Debug for ExchangeAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeAccount")
            .field("api_key", &"<redacted>")
            .field("assets", &self.assets)
            .finish_non_exhaustive()
    }
}
