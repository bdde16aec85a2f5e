use crate::error::ServiceError;
use crate::token::TokenAuthority;
use coinfold_core::account::entity::{Account, ExchangeAccount, ExchangeMap};
use coinfold_core::store::error::StoreError;
use coinfold_core::store::port::AccountStore;
use coinfold_core::venue::entity::VenueKind;
use coinfold_store::password::{hash_password, verify_password};
use std::sync::Arc;
use tracing::info;

/// # Summary
/// 已通过令牌校验的会话。只能由 `AccountService::authenticate` 构造。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    username: String,
}

impl Session {
    pub fn username(&self) -> &str {
        &self.username
    }
}

fn check_venue_key(venue_key: &str) -> Result<VenueKind, ServiceError> {
    venue_key
        .parse::<VenueKind>()
        .map_err(|_| ServiceError::BadInput(format!("unsupported venue '{}'", venue_key)))
}

/// # Summary
/// 账户服务：注册、登录、令牌解析与交易所绑定。
///
/// # Invariants
/// - 账户的读改写全部经过 `AccountStore::modify`，与后台合并写入互斥。
/// - 返回给调用方的错误只使用 `ServiceError` 的六种分类。
pub struct AccountService {
    store: Arc<dyn AccountStore>,
    tokens: Arc<TokenAuthority>,
    bcrypt_cost: u32,
}

impl AccountService {
    /// # Arguments
    /// * `store` - 账户存储。
    /// * `tokens` - 令牌签发与校验。
    /// * `bcrypt_cost` - 口令散列的工作因子。
    pub fn new(store: Arc<dyn AccountStore>, tokens: Arc<TokenAuthority>, bcrypt_cost: u32) -> Self {
        Self {
            store,
            tokens,
            bcrypt_cost,
        }
    }

    /// # Summary
    /// 注册新账户并返回访问令牌。
    ///
    /// # Logic
    /// 1. 校验用户名、口令与交易所标识。
    /// 2. 已存在同名账户时直接返回冲突，避免无谓的散列计算。
    /// 3. 散列口令，以不覆盖的方式写入账户文件。并发注册由存储层的冲突检测兜底。
    ///
    /// # Returns
    /// * `ServiceError::BadInput` - 用户名含 `/`、为空，口令为空，或交易所不受支持。
    /// * `ServiceError::Conflict` - 用户名已被占用。
    pub async fn signup(
        &self,
        username: &str,
        password: &str,
        exchanges: ExchangeMap,
    ) -> Result<String, ServiceError> {
        Account::validate_username(username).map_err(ServiceError::BadInput)?;
        if password.is_empty() {
            return Err(ServiceError::BadInput("password must not be empty".to_string()));
        }
        for venue_key in exchanges.keys() {
            check_venue_key(venue_key)?;
        }
        if self.store.exists(username).await? {
            return Err(ServiceError::Conflict(format!(
                "account already exists with username '{}'",
                username
            )));
        }

        let mut account = Account::new(username);
        account.exchanges = exchanges;
        account.password_verifier = hash_password(password, self.bcrypt_cost).await?;
        self.store.insert(&account).await?;

        info!(username = %username, exchanges = account.exchanges.len(), "account created");
        self.tokens.issue(username)
    }

    /// # Summary
    /// 校验口令并签发新令牌。
    ///
    /// # Returns
    /// * `ServiceError::NotFound` - 账户不存在。
    /// * `ServiceError::Unauthorized` - 口令错误。
    pub async fn login(&self, username: &str, password: &str) -> Result<String, ServiceError> {
        let account = match self.store.load(username).await {
            Ok(account) => account,
            Err(StoreError::NotFound) => {
                return Err(ServiceError::NotFound(format!(
                    "account with username '{}' does not exist",
                    username
                )));
            }
            Err(e) => return Err(e.into()),
        };
        if !verify_password(password, &account.password_verifier).await? {
            return Err(ServiceError::Unauthorized(format!(
                "invalid password for account '{}'",
                username
            )));
        }
        self.tokens.issue(username)
    }

    /// # Summary
    /// 将令牌解析为会话。令牌无效、过期或对应账户已不存在时返回 `Unauthorized`。
    pub async fn authenticate(&self, token: &str) -> Result<Session, ServiceError> {
        let username = self.tokens.verify(token)?;
        if !self.store.exists(&username).await? {
            return Err(ServiceError::Unauthorized(
                "token subject no longer exists".to_string(),
            ));
        }
        Ok(Session { username })
    }

    /// 读取会话对应的账户。校验后文件被删除时返回 `NotFound`。
    pub async fn load(&self, session: &Session) -> Result<Account, ServiceError> {
        Ok(self.store.load(&session.username).await?)
    }

    pub async fn delete(&self, session: &Session) -> Result<(), ServiceError> {
        self.store.delete(&session.username).await?;
        info!(username = %session.username, "account deleted");
        Ok(())
    }

    /// # Summary
    /// 绑定交易所凭证。已绑定同一交易所时整体替换，资产表随之清空。
    pub async fn link(
        &self,
        session: &Session,
        venue_key: &str,
        exchange: ExchangeAccount,
    ) -> Result<(), ServiceError> {
        let kind = check_venue_key(venue_key)?;
        let key = kind.key().to_string();
        self.store
            .modify(
                &session.username,
                Box::new(move |account| {
                    account.exchanges.insert(key, exchange);
                }),
            )
            .await?;
        info!(username = %session.username, venue = %kind, "exchange linked");
        Ok(())
    }

    /// 解绑交易所。未绑定时视为成功。
    pub async fn unlink(&self, session: &Session, venue_key: &str) -> Result<(), ServiceError> {
        let key = venue_key.to_string();
        self.store
            .modify(
                &session.username,
                Box::new(move |account| {
                    account.exchanges.remove(&key);
                }),
            )
            .await?;
        info!(username = %session.username, venue = %venue_key, "exchange unlinked");
        Ok(())
    }
}
