use super::error::StoreError;
use crate::account::entity::Account;
use async_trait::async_trait;

/// 在账户写锁内执行的修改闭包
pub type AccountMutation = Box<dyn FnOnce(&mut Account) + Send>;

/// # Summary
/// 账户存储接口，每个用户名对应一份持久化账户。
///
/// # Invariants
/// - 所有写入都是原子替换：读者要么看到旧内容，要么看到新内容。
/// - 同一用户名上的 `modify` 与 `delete` 互斥执行。
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// 账户是否存在
    async fn exists(&self, username: &str) -> Result<bool, StoreError>;

    /// # Summary
    /// 创建新账户。
    ///
    /// # Returns
    /// 账户已存在时返回 `StoreError::Conflict`。
    async fn insert(&self, account: &Account) -> Result<(), StoreError>;

    /// # Summary
    /// 加载账户，并把用户名重新填入内存对象。
    ///
    /// # Returns
    /// 文件不存在时返回 `StoreError::NotFound`。
    async fn load(&self, username: &str) -> Result<Account, StoreError>;

    /// 原样覆盖账户，不修改任何字段。
    async fn save(&self, account: &Account) -> Result<(), StoreError>;

    /// # Summary
    /// 在账户写锁内完成读取、修改、写回。
    ///
    /// # Logic
    /// 1. 获取该用户名的写锁。
    /// 2. 加载账户并执行 `mutation`。
    /// 3. 原子写回并返回修改后的账户。
    async fn modify(
        &self,
        username: &str,
        mutation: AccountMutation,
    ) -> Result<Account, StoreError>;

    /// 删除账户。文件不存在时返回 `StoreError::NotFound`。
    async fn delete(&self, username: &str) -> Result<(), StoreError>;
}
