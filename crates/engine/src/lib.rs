//! # `coinfold-engine` - 聚合引擎
//!
//! 按账户并发驱动各交易所适配器，并由单一合并消费者负责写回。

pub mod aggregator;
pub mod error;
pub mod merge;

pub use aggregator::{Aggregator, SweepReport};
pub use error::EngineError;
