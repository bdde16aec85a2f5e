//! # `coinfold-store` - 账户持久化
//!
//! 账户文件存储与口令校验值的生成/校验。

pub mod account;
pub mod password;

pub use account::FileAccountStore;
