use async_trait::async_trait;
use coinfold_core::account::entity::Account;
use coinfold_core::store::error::StoreError;
use coinfold_core::store::port::{AccountMutation, AccountStore};
use dashmap::DashMap;
use sha1::{Digest, Sha1};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// `AccountStore` 的文件系统实现。
///
/// # Summary
/// 每个账户一个 JSON 文件，文件名为 `sha1(username)` 的十六进制串，
/// 文件内容不含用户名。
///
/// # Invariants
/// * 写入先落到同目录下的临时文件，再原子重命名覆盖目标文件。
/// * 同一用户名的写操作经由 `locks` 中的异步互斥锁串行化。
pub struct FileAccountStore {
    dir: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl FileAccountStore {
    /// 创建存储实例，目录不存在时自动创建。
    ///
    /// # Arguments
    /// * `dir` - 账户文件所在目录。
    ///
    /// # Returns
    /// * `Result<Self, StoreError>` - 存储实例或目录创建失败。
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(Self {
            dir,
            locks: DashMap::new(),
        })
    }

    /// 用户名对应的文件名
    pub fn file_name(username: &str) -> String {
        hex::encode(Sha1::digest(username.as_bytes()))
    }

    fn path_for(&self, username: &str) -> PathBuf {
        self.dir.join(Self::file_name(username))
    }

    fn lock_for(&self, username: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(username.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// 没有其他持有者时移除用户名对应的锁。调用前必须已释放自己持有的守卫与 `Arc`。
    fn forget_lock(&self, username: &str) {
        self.locks
            .remove_if(username, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn read(&self, username: &str) -> Result<Account, StoreError> {
        let bytes = match tokio::fs::read(self.path_for(username)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound),
            Err(e) => return Err(StoreError::Io(e.to_string())),
        };
        let mut account: Account = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        account.username = username.to_string();
        Ok(account)
    }

    /// # Logic
    /// 1. 序列化账户 (用户名被 `serde(skip)` 排除)。
    /// 2. 在阻塞线程池中写入临时文件并 fsync。
    /// 3. `overwrite` 为假时使用不覆盖的重命名，目标已存在则返回 `Conflict`。
    async fn write(&self, account: &Account, overwrite: bool) -> Result<(), StoreError> {
        let payload =
            serde_json::to_vec(account).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let dir = self.dir.clone();
        let target = self.path_for(&account.username);
        let username = account.username.clone();

        tokio::task::spawn_blocking(move || {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)
                .map_err(|e| StoreError::Io(e.to_string()))?;
            tmp.write_all(&payload)
                .map_err(|e| StoreError::Io(e.to_string()))?;
            tmp.as_file()
                .sync_all()
                .map_err(|e| StoreError::Io(e.to_string()))?;

            let persisted = if overwrite {
                tmp.persist(&target)
            } else {
                tmp.persist_noclobber(&target)
            };
            match persisted {
                Ok(_) => Ok(()),
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                    Err(StoreError::Conflict(format!("account {username} already exists")))
                }
                Err(e) => Err(StoreError::Io(e.error.to_string())),
            }
        })
        .await
        .map_err(|e| StoreError::Io(e.to_string()))?
    }
}

#[async_trait]
impl AccountStore for FileAccountStore {
    async fn exists(&self, username: &str) -> Result<bool, StoreError> {
        tokio::fs::try_exists(self.path_for(username))
            .await
            .map_err(|e| StoreError::Io(e.to_string()))
    }

    async fn insert(&self, account: &Account) -> Result<(), StoreError> {
        let lock = self.lock_for(&account.username);
        let _guard = lock.lock().await;
        self.write(account, false).await?;
        debug!(username = %account.username, "account created");
        Ok(())
    }

    async fn load(&self, username: &str) -> Result<Account, StoreError> {
        self.read(username).await
    }

    async fn save(&self, account: &Account) -> Result<(), StoreError> {
        let lock = self.lock_for(&account.username);
        let _guard = lock.lock().await;
        self.write(account, true).await
    }

    async fn modify(
        &self,
        username: &str,
        mutation: AccountMutation,
    ) -> Result<Account, StoreError> {
        let lock = self.lock_for(username);
        let _guard = lock.lock().await;
        let mut account = self.read(username).await?;
        mutation(&mut account);
        // 闭包不允许改名，否则会写到另一个文件
        account.username = username.to_string();
        self.write(&account, true).await?;
        Ok(account)
    }

    async fn delete(&self, username: &str) -> Result<(), StoreError> {
        let lock = self.lock_for(username);
        let guard = lock.lock().await;
        let result = match tokio::fs::remove_file(self.path_for(username)).await {
            Ok(()) => {
                debug!(username = %username, "account deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound),
            Err(e) => {
                warn!(username = %username, "failed to delete account file: {}", e);
                Err(StoreError::Io(e.to_string()))
            }
        };
        drop(guard);
        drop(lock);
        self.forget_lock(username);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_is_sha1_hex() {
        assert_eq!(
            FileAccountStore::file_name("alice"),
            "522b276a356bdf39013dfabea2cd43e141ecc9e8"
        );
    }

    #[tokio::test]
    async fn test_delete_forgets_lock() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAccountStore::new(dir.path()).unwrap();
        for name in ["alice", "bob"] {
            store.insert(&Account::new(name)).await.unwrap();
        }
        assert_eq!(store.locks.len(), 2);

        store.delete("alice").await.unwrap();
        assert!(!store.locks.contains_key("alice"));
        assert!(store.locks.contains_key("bob"));

        assert!(matches!(store.delete("alice").await, Err(StoreError::NotFound)));
        assert!(!store.locks.contains_key("alice"));
    }

    #[tokio::test]
    async fn test_delete_keeps_lock_while_waited_on() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAccountStore::new(dir.path()).unwrap();
        store.insert(&Account::new("alice")).await.unwrap();

        let held = store.lock_for("alice");
        store.forget_lock("alice");
        assert!(store.locks.contains_key("alice"));

        drop(held);
        store.forget_lock("alice");
        assert!(store.locks.is_empty());
    }
}
