//! 测试替身：脚本化的交易所适配器、适配器工厂与检查点记录器。
//! 仅在 `test-utils` 特性下编译，供各 crate 的集成测试复用。

use crate::portfolio::entity::{AssetMap, Trade};
use crate::portfolio::fold::fold_trade;
use crate::venue::entity::{Credentials, VenueKind};
use crate::venue::error::VenueError;
use crate::venue::port::{AdapterFactory, Checkpoint, ExchangeAdapter};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// # Summary
/// 按脚本返回数据的适配器。
///
/// # Logic
/// - `fetch_balance` 用脚本中的余额覆盖对应资产。
/// - `fetch_trades` 把待投递的成交全部折叠一次后清空队列，模拟水位推进。
/// - 设置了闸门时，`fetch_trades` 会等待 `release` 后才继续。
pub struct ScriptedAdapter {
    kind: VenueKind,
    balances: Mutex<BTreeMap<String, f64>>,
    pending_trades: Mutex<Vec<(String, String, Trade)>>,
    pending_distributions: Mutex<Vec<(String, f64, i64)>>,
    balance_error: Mutex<Option<VenueError>>,
    trade_error: Mutex<Option<VenueError>>,
    gate: Option<Arc<Notify>>,
    trade_calls: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn new(kind: VenueKind) -> Self {
        Self {
            kind,
            balances: Mutex::new(BTreeMap::new()),
            pending_trades: Mutex::new(Vec::new()),
            pending_distributions: Mutex::new(Vec::new()),
            balance_error: Mutex::new(None),
            trade_error: Mutex::new(None),
            gate: None,
            trade_calls: AtomicUsize::new(0),
        }
    }

    /// 让成交抓取阻塞在闸门上，直到调用 `release`
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Notify::new()));
        self
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn set_balance(&self, symbol: &str, balance: f64) {
        lock(&self.balances).insert(symbol.to_string(), balance);
    }

    pub fn push_trade(&self, base: &str, quote: &str, trade: Trade) {
        lock(&self.pending_trades).push((base.to_string(), quote.to_string(), trade));
    }

    pub fn push_distribution(&self, asset: &str, amount: f64, time_ms: i64) {
        lock(&self.pending_distributions).push((asset.to_string(), amount, time_ms));
    }

    pub fn fail_balance(&self, err: VenueError) {
        *lock(&self.balance_error) = Some(err);
    }

    pub fn fail_trades(&self, err: VenueError) {
        *lock(&self.trade_error) = Some(err);
    }

    pub fn trade_calls(&self) -> usize {
        self.trade_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeAdapter for ScriptedAdapter {
    fn kind(&self) -> VenueKind {
        self.kind
    }

    async fn fetch_balance(&self, mut assets: AssetMap) -> Result<AssetMap, VenueError> {
        if let Some(err) = lock(&self.balance_error).clone() {
            return Err(err);
        }
        for (symbol, balance) in lock(&self.balances).iter() {
            assets.entry(symbol.clone()).or_default().balance = *balance;
        }
        Ok(assets)
    }

    async fn fetch_trades(
        &self,
        mut assets: AssetMap,
        checkpoint: &dyn Checkpoint,
    ) -> Result<AssetMap, VenueError> {
        self.trade_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(err) = lock(&self.trade_error).clone() {
            return Err(err);
        }
        let trades: Vec<_> = lock(&self.pending_trades).drain(..).collect();
        for (base, quote, trade) in &trades {
            fold_trade(&mut assets, base, quote, trade);
        }
        if !trades.is_empty() {
            checkpoint.save(&assets).await;
        }
        Ok(assets)
    }

    async fn fetch_distributions(
        &self,
        mut assets: AssetMap,
        _checkpoint: &dyn Checkpoint,
    ) -> Result<AssetMap, VenueError> {
        let rows: Vec<_> = lock(&self.pending_distributions).drain(..).collect();
        for (symbol, amount, time_ms) in rows {
            if let Some(asset) = assets.get_mut(&symbol) {
                asset.distribution_total += amount;
                asset.latest_distribution_time = asset.latest_distribution_time.max(time_ms);
            }
        }
        Ok(assets)
    }
}

/// 按交易所种类返回预先注册的脚本化适配器
#[derive(Default)]
pub struct ScriptedFactory {
    adapters: HashMap<VenueKind, Arc<ScriptedAdapter>>,
    built: Mutex<Vec<(VenueKind, String)>>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, adapter: Arc<ScriptedAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    /// 已构造过的 (交易所, api_key) 记录
    pub fn built(&self) -> Vec<(VenueKind, String)> {
        lock(&self.built).clone()
    }
}

impl AdapterFactory for ScriptedFactory {
    fn build(
        &self,
        kind: VenueKind,
        credentials: &Credentials,
    ) -> Result<Arc<dyn ExchangeAdapter>, VenueError> {
        let adapter = self
            .adapters
            .get(&kind)
            .cloned()
            .ok_or_else(|| VenueError::Unsupported(kind.to_string()))?;
        lock(&self.built).push((kind, credentials.api_key.clone()));
        Ok(adapter)
    }
}

/// 记录每一次检查点内容的实现
#[derive(Default)]
pub struct RecordingCheckpoint {
    saved: Mutex<Vec<AssetMap>>,
}

impl RecordingCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Vec<AssetMap> {
        lock(&self.saved).clone()
    }
}

#[async_trait]
impl Checkpoint for RecordingCheckpoint {
    async fn save(&self, assets: &AssetMap) {
        lock(&self.saved).push(assets.clone());
    }
}
