//! # `coinfold-core` - 领域内核
//!
//! 定义账户、交易所子账户、资产与交易对聚合等实体，以及存储、交易所适配器、
//! 时钟等端口 (Port)。本 crate 不依赖任何具体基础设施，所有实现由上层注入。

pub mod common;
pub mod config;

pub mod account {
    pub mod entity;
}

pub mod portfolio {
    pub mod entity;
    pub mod fold;
}

pub mod store {
    pub mod error;
    pub mod port;
}

pub mod venue {
    pub mod entity;
    pub mod error;
    pub mod port;
}

#[cfg(feature = "test-utils")]
pub mod testing;
