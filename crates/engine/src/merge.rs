use async_trait::async_trait;
use coinfold_core::portfolio::entity::AssetMap;
use coinfold_core::venue::entity::Credentials;
use coinfold_core::venue::port::Checkpoint;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// # Summary
/// 发往合并消费者的一次写入请求。
///
/// # Invariants
/// - `assets` 整体替换对应交易所子账户的资产表。
/// - 子账户的凭证已不等于 `credentials` (期间被重新绑定) 时，写入被丢弃。
/// - `ack` 非空时，消费者写入 (无论成功与否) 后必须回执。
pub struct Merge {
    pub venue_key: String,
    /// 抓取这批资产时使用的凭证
    pub credentials: Credentials,
    pub assets: AssetMap,
    pub ack: Option<oneshot::Sender<()>>,
}

/// # Summary
/// 通过合并通道落盘的检查点。`save` 在消费者完成写入后才返回。
pub struct ChannelCheckpoint {
    venue_key: String,
    credentials: Credentials,
    tx: mpsc::Sender<Merge>,
}

impl ChannelCheckpoint {
    pub fn new(
        venue_key: impl Into<String>,
        credentials: Credentials,
        tx: mpsc::Sender<Merge>,
    ) -> Self {
        Self {
            venue_key: venue_key.into(),
            credentials,
            tx,
        }
    }
}

#[async_trait]
impl Checkpoint for ChannelCheckpoint {
    async fn save(&self, assets: &AssetMap) {
        let (ack_tx, ack_rx) = oneshot::channel();
        let merge = Merge {
            venue_key: self.venue_key.clone(),
            credentials: self.credentials.clone(),
            assets: assets.clone(),
            ack: Some(ack_tx),
        };
        if self.tx.send(merge).await.is_err() {
            debug!(venue = %self.venue_key, "merge consumer gone, checkpoint dropped");
            return;
        }
        if ack_rx.await.is_err() {
            debug!(venue = %self.venue_key, "checkpoint ack dropped");
        }
    }
}
