use super::entity::{Credentials, VenueKind};
use super::error::VenueError;
use crate::portfolio::entity::AssetMap;
use async_trait::async_trait;
use std::sync::Arc;

/// # Summary
/// 中间状态落盘接口。适配器在限频休眠前调用，保证休眠期间的重启或客户端刷新
/// 都能看到已经折叠的进度。
///
/// # Invariants
/// - `save` 返回时，传入的资产表已经写入账户文件 (或写入失败并已记录日志)。
#[async_trait]
pub trait Checkpoint: Send + Sync {
    async fn save(&self, assets: &AssetMap);
}

/// 不落盘的检查点，用于单独调用适配器的场景。
pub struct NoopCheckpoint;

#[async_trait]
impl Checkpoint for NoopCheckpoint {
    async fn save(&self, _assets: &AssetMap) {}
}

/// # Summary
/// 交易所适配器接口。每个实现封装一个交易所的签名、分页与限频细节，
/// 把交易所记录翻译成统一的资产/交易对模型。
///
/// # Invariants
/// - 输入的资产表按值传入，返回更新后的资产表；失败时调用方保留原值。
/// - 同一笔成交在多次调用之间最多被折叠一次 (水位协议)。
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// 适配器对应的交易所
    fn kind(&self) -> VenueKind;

    /// # Summary
    /// 刷新余额。
    ///
    /// # Logic
    /// 1. 只覆盖 `balance`，交易对聚合与分发字段原样保留。
    /// 2. 交易所不再报告的资产余额归零，历史保留。
    async fn fetch_balance(&self, assets: AssetMap) -> Result<AssetMap, VenueError>;

    /// # Summary
    /// 从上次水位开始增量抓取成交并折叠进交易对。
    ///
    /// # Arguments
    /// * `assets`: 当前聚合状态。
    /// * `checkpoint`: 限频休眠前用于落盘的回调。
    async fn fetch_trades(
        &self,
        assets: AssetMap,
        checkpoint: &dyn Checkpoint,
    ) -> Result<AssetMap, VenueError>;

    /// 增量抓取分发记录。不提供分发接口的交易所直接返回原值。
    async fn fetch_distributions(
        &self,
        assets: AssetMap,
        _checkpoint: &dyn Checkpoint,
    ) -> Result<AssetMap, VenueError> {
        Ok(assets)
    }
}

/// # Summary
/// 适配器工厂，按交易所种类与凭证构造适配器实例。
/// 测试中以脚本化实现替换，避免访问网络。
pub trait AdapterFactory: Send + Sync {
    fn build(
        &self,
        kind: VenueKind,
        credentials: &Credentials,
    ) -> Result<Arc<dyn ExchangeAdapter>, VenueError>;
}
