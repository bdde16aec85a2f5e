use crate::error::EngineError;
use crate::merge::{ChannelCheckpoint, Merge};
use coinfold_core::account::entity::{Account, ExchangeAccount, ExchangeMap};
use coinfold_core::common::time::TimeProvider;
use coinfold_core::portfolio::entity::AssetMap;
use coinfold_core::portfolio::fold::{pair_count, prune_untraded};
use coinfold_core::store::error::StoreError;
use coinfold_core::store::port::AccountStore;
use coinfold_core::venue::entity::{Credentials, VenueKind};
use coinfold_core::venue::error::VenueError;
use coinfold_core::venue::port::{AdapterFactory, ExchangeAdapter};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// 合并通道容量。生产者在检查点处等待回执，容量只需覆盖并发任务数。
const MERGE_CHANNEL_CAPACITY: usize = 16;

/// 一次后台扫描的结果统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// 成功写回的交易所数
    pub merged: usize,
    /// 抓取失败或无法构造适配器的交易所数
    pub failed: usize,
    /// 写入失败次数
    pub write_errors: usize,
}

/// # Summary
/// 聚合引擎：对一个账户的所有交易所并发执行增量抓取，并把结果串行写回账户。
///
/// # Invariants
/// - 每个交易所一个任务，并发数受 `limit` 约束。
/// - 只有合并消费者写账户，且每次写入都经过 `AccountStore::modify`。
/// - 单个交易所的错误只记录日志，不影响其它交易所。
pub struct Aggregator {
    store: Arc<dyn AccountStore>,
    factory: Arc<dyn AdapterFactory>,
    clock: Arc<dyn TimeProvider>,
    limit: Arc<Semaphore>,
}

impl Aggregator {
    /// # Arguments
    /// * `store` - 账户存储。
    /// * `factory` - 适配器工厂。
    /// * `clock` - 写入 `last_update` 使用的时钟。
    /// * `max_parallel` - 单次更新中同时抓取的交易所上限。
    pub fn new(
        store: Arc<dyn AccountStore>,
        factory: Arc<dyn AdapterFactory>,
        clock: Arc<dyn TimeProvider>,
        max_parallel: usize,
    ) -> Self {
        Self {
            store,
            factory,
            clock,
            limit: Arc::new(Semaphore::new(max_parallel.max(1))),
        }
    }

    fn adapter_for(
        &self,
        venue_key: &str,
        exchange: &ExchangeAccount,
    ) -> Result<Arc<dyn ExchangeAdapter>, VenueError> {
        let kind: VenueKind = venue_key.parse()?;
        self.factory.build(kind, &exchange.credentials())
    }

    /// # Summary
    /// 同步刷新账户下所有交易所的余额并写回。
    ///
    /// # Logic
    /// 1. 加载账户，每个交易所一个任务并发调用 `fetch_balance`。
    /// 2. 失败的交易所保留原资产表并记录日志。
    /// 3. 所有交易所都失败时不写入，返回 `NoBalances`。
    /// 4. 否则在账户写锁内替换成功刷新的资产表 (凭证未变的才替换)，并推进 `last_update`。
    ///
    /// # Returns
    /// 写回后的账户快照。
    pub async fn refresh_balances(&self, username: &str) -> Result<Account, EngineError> {
        let account = self.store.load(username).await?;

        let mut tasks = JoinSet::new();
        let mut last_error = None;
        for (venue_key, exchange) in &account.exchanges {
            let adapter = match self.adapter_for(venue_key, exchange) {
                Ok(adapter) => adapter,
                Err(e) => {
                    warn!(username = %username, venue = %venue_key, "cannot build adapter: {}", e);
                    last_error = Some(format!("{}: {}", venue_key, e));
                    continue;
                }
            };
            let limit = self.limit.clone();
            let venue_key = venue_key.clone();
            let credentials = exchange.credentials();
            let assets = exchange.assets.clone();
            tasks.spawn(async move {
                let _permit = limit.acquire_owned().await;
                let result = adapter.fetch_balance(assets).await;
                (venue_key, credentials, result)
            });
        }

        let mut refreshed: BTreeMap<String, (Credentials, AssetMap)> = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((venue_key, credentials, Ok(assets))) => {
                    debug!(username = %username, venue = %venue_key, assets = assets.len(), "balance refreshed");
                    refreshed.insert(venue_key, (credentials, assets));
                }
                Ok((venue_key, _, Err(e))) => {
                    warn!(username = %username, venue = %venue_key, "balance fetch failed: {}", e);
                    last_error = Some(format!("{}: {}", venue_key, e));
                }
                Err(e) => {
                    error!(username = %username, "balance task failed: {}", e);
                    last_error = Some(e.to_string());
                }
            }
        }

        if let Some(reason) = last_error.filter(|_| refreshed.is_empty()) {
            return Err(EngineError::NoBalances(reason));
        }

        let now = self.clock.now();
        let account = self
            .store
            .modify(
                username,
                Box::new(move |account| {
                    for (venue_key, (credentials, assets)) in refreshed {
                        if let Some(exchange) = account
                            .exchanges
                            .get_mut(&venue_key)
                            .filter(|exchange| exchange.holds(&credentials))
                        {
                            exchange.assets = assets;
                        }
                    }
                    account.last_update = now;
                }),
            )
            .await?;
        Ok(account)
    }

    /// # Summary
    /// 后台扫描：抓取成交与分发，逐步写回账户。
    ///
    /// # Logic
    /// 1. 每个交易所派生一个任务：`fetch_trades` → 剔除未成交资产 → `fetch_distributions`。
    /// 2. 任务通过通道把中间检查点与最终结果交给合并消费者。
    /// 3. 当前任务充当合并消费者，逐条写回账户，直到所有生产者结束。
    ///
    /// # Arguments
    /// * `username` - 账户用户名。
    /// * `exchanges` - 扫描起点 (通常为余额刷新后的快照)。
    pub async fn sweep(&self, username: &str, exchanges: ExchangeMap) -> SweepReport {
        let mut report = SweepReport::default();
        let (tx, mut rx) = mpsc::channel::<Merge>(MERGE_CHANNEL_CAPACITY);
        let mut tasks = JoinSet::new();

        for (venue_key, exchange) in exchanges {
            let adapter = match self.adapter_for(&venue_key, &exchange) {
                Ok(adapter) => adapter,
                Err(e) => {
                    warn!(username = %username, venue = %venue_key, "cannot build adapter: {}", e);
                    report.failed += 1;
                    continue;
                }
            };
            let limit = self.limit.clone();
            let tx = tx.clone();
            let username = username.to_string();
            tasks.spawn(async move {
                let _permit = limit.acquire_owned().await;
                sweep_exchange(&username, venue_key, adapter, exchange, tx).await
            });
        }
        // 消费者在所有生产者退出后结束
        drop(tx);

        while let Some(merge) = rx.recv().await {
            let is_final = merge.ack.is_none();
            match self.commit(username, merge).await {
                Ok(()) if is_final => report.merged += 1,
                Ok(()) => {}
                Err(e) => {
                    error!(username = %username, "merge write failed: {}", e);
                    report.write_errors += 1;
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(true) => {}
                Ok(false) => report.failed += 1,
                Err(e) => {
                    error!(username = %username, "sweep task failed: {}", e);
                    report.failed += 1;
                }
            }
        }

        info!(
            username = %username,
            merged = report.merged,
            failed = report.failed,
            "sweep finished"
        );
        report
    }

    /// 在写锁内替换一个交易所的资产表。交易所已被解绑或换了凭证时丢弃。
    async fn commit(&self, username: &str, merge: Merge) -> Result<(), StoreError> {
        let Merge {
            venue_key,
            credentials,
            assets,
            ack,
        } = merge;
        let now = self.clock.now();
        let owner = username.to_string();
        let result = self
            .store
            .modify(
                username,
                Box::new(move |account| match account.exchanges.get_mut(&venue_key) {
                    Some(exchange) if exchange.holds(&credentials) => {
                        exchange.assets = assets;
                        account.last_update = now;
                    }
                    _ => debug!(username = %owner, venue = %venue_key, "merge dropped, exchange unlinked or relinked"),
                }),
            )
            .await
            .map(|_| ());
        if let Some(ack) = ack {
            if ack.send(()).is_err() {
                debug!(username = %username, "checkpoint producer gone before ack");
            }
        }
        result
    }
}

/// 单个交易所的扫描任务，成功时返回 `true`
async fn sweep_exchange(
    username: &str,
    venue_key: String,
    adapter: Arc<dyn ExchangeAdapter>,
    exchange: ExchangeAccount,
    tx: mpsc::Sender<Merge>,
) -> bool {
    let credentials = exchange.credentials();
    let checkpoint = ChannelCheckpoint::new(venue_key.clone(), credentials.clone(), tx.clone());

    let mut assets = match adapter.fetch_trades(exchange.assets, &checkpoint).await {
        Ok(assets) => assets,
        Err(e) => {
            warn!(username = %username, venue = %venue_key, "trade fetch failed: {}", e);
            return false;
        }
    };

    let removed = prune_untraded(&mut assets);
    if !removed.is_empty() {
        info!(username = %username, venue = %venue_key, removed = ?removed, "removed untraded assets");
    }

    let assets = match adapter.fetch_distributions(assets.clone(), &checkpoint).await {
        Ok(with_distributions) => with_distributions,
        Err(e) => {
            warn!(username = %username, venue = %venue_key, "distribution fetch failed: {}", e);
            assets
        }
    };

    debug!(username = %username, venue = %venue_key, pairs = pair_count(&assets), "exchange swept");
    let merge = Merge {
        venue_key,
        credentials,
        assets,
        ack: None,
    };
    if tx.send(merge).await.is_err() {
        error!(username = %username, "merge consumer gone, result dropped");
        return false;
    }
    true
}
