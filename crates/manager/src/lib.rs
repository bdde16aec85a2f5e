//! # `coinfold-manager` - 应用服务层
//!
//! 账户注册与登录、访问令牌签发与校验、交易所绑定，以及更新协调。
//! HTTP 层只依赖本 crate 暴露的服务，不直接接触存储与引擎。

pub mod account;
pub mod error;
pub mod token;
pub mod update;

pub use account::{AccountService, Session};
pub use error::ServiceError;
pub use token::TokenAuthority;
pub use update::{UpdateCoordinator, UpdateTicket};
