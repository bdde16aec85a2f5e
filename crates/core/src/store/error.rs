use thiserror::Error;

/// # Summary
/// 账户存储层错误枚举。
///
/// # Invariants
/// - 必须通过 `thiserror` 派生 `Error` trait。
#[derive(Error, Debug)]
pub enum StoreError {
    /// 账户文件不存在
    #[error("Not found")]
    NotFound,
    /// 账户已存在
    #[error("Conflict: {0}")]
    Conflict(String),
    /// 文件读写失败
    #[error("IO error: {0}")]
    Io(String),
    /// 账户内容无法序列化或反序列化
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// 口令散列失败
    #[error("Hash error: {0}")]
    Hash(String),
}
