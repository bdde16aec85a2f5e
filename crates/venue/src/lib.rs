//! # `coinfold-venue` - 交易所适配层
//!
//! 两类交易所的签名 REST 客户端与对应的 `ExchangeAdapter` 实现。
//! 客户端只负责报文收发，分页、水位与限频恢复都在适配器中完成。

pub mod factory;
pub mod retry;
pub mod signing;
pub mod wire;

pub mod binance {
    pub mod adapter;
    pub mod api;
    pub mod client;
}

pub mod kucoin {
    pub mod adapter;
    pub mod api;
    pub mod client;
}

pub use binance::adapter::BinanceAdapter;
pub use factory::HttpAdapterFactory;
pub use kucoin::adapter::KucoinAdapter;
