use coinfold_core::portfolio::entity::AssetMap;
use coinfold_core::venue::entity::VenueKind;
use coinfold_core::venue::error::VenueError;
use coinfold_core::venue::port::Checkpoint;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// # Summary
/// 限频恢复策略：遇到 `RateLimited` 时先落盘当前进度，再休眠后从同一位置重试。
///
/// # Invariants
/// - 重试使用相同的请求参数，因此不会丢失或重复任何记录。
/// - `RateLimited` 永远不会从这里返回给调用方。
#[derive(Debug, Clone, Copy)]
pub struct RateLimitRetry {
    venue: VenueKind,
    backoff: Duration,
}

impl RateLimitRetry {
    pub fn new(venue: VenueKind, backoff: Duration) -> Self {
        Self { venue, backoff }
    }

    /// # Arguments
    /// * `what`: 日志中使用的请求描述 (例如交易对代码)。
    /// * `checkpoint`: 休眠前的落盘回调。
    /// * `progress`: 当前已折叠的资产表，休眠前写入检查点。
    /// * `call`: 每次重试都会重新调用的请求工厂。
    pub async fn run<T, F, Fut>(
        &self,
        what: &str,
        checkpoint: &dyn Checkpoint,
        progress: &AssetMap,
        mut call: F,
    ) -> Result<T, VenueError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, VenueError>>,
    {
        let mut waits: u32 = 0;
        loop {
            match call().await {
                Err(VenueError::RateLimited) => {
                    waits += 1;
                    warn!(
                        venue = %self.venue,
                        request = what,
                        waits,
                        "rate limited, sleeping {:?} before retry",
                        self.backoff
                    );
                    checkpoint.save(progress).await;
                    tokio::time::sleep(self.backoff).await;
                }
                other => return other,
            }
        }
    }
}
