use coinfold_core::store::error::StoreError;
use thiserror::Error;

/// # Summary
/// 聚合引擎错误枚举。
///
/// # Invariants
/// - 单个交易所的失败不会出现在这里，只有整次刷新失败才会。
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    // 所有交易所的余额都没有取到
    #[error("No balances refreshed: {0}")]
    NoBalances(String),
}
