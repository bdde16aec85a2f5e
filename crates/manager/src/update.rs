use crate::account::Session;
use crate::error::ServiceError;
use chrono::{DateTime, Utc};
use coinfold_core::account::entity::Account;
use coinfold_core::common::time::TimeProvider;
use coinfold_core::store::port::AccountStore;
use coinfold_engine::{Aggregator, SweepReport};
use dashmap::DashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// # Summary
/// 一次更新的结果：已写回的余额快照，以及仍在后台运行的扫描任务。
pub struct UpdateTicket {
    pub snapshot: Account,
    /// 调用方通常直接丢弃，测试可以等待它结束
    pub sweep: JoinHandle<SweepReport>,
}

/// 后台扫描占位，离开作用域时释放
struct InFlight {
    running: Arc<DashSet<String>>,
    username: String,
}

impl InFlight {
    fn acquire(running: &Arc<DashSet<String>>, username: &str) -> Option<Self> {
        if !running.insert(username.to_string()) {
            return None;
        }
        Some(Self {
            running: running.clone(),
            username: username.to_string(),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.running.remove(&self.username);
    }
}

/// # Summary
/// 更新协调器：限频，同步刷新余额，然后把成交扫描交给后台。
///
/// # Invariants
/// - 距上次写入不足 `min_interval` 的更新直接拒绝，不产生任何写入。
/// - 同一账户同时最多一个更新 (含其后台扫描)，间隔检查在占位之后进行。
/// - 余额全部刷新失败时不写入也不派生扫描。
/// - 后台扫描与发起请求解耦，请求被取消不影响扫描。
pub struct UpdateCoordinator {
    store: Arc<dyn AccountStore>,
    aggregator: Arc<Aggregator>,
    clock: Arc<dyn TimeProvider>,
    min_interval: chrono::Duration,
    running: Arc<DashSet<String>>,
}

impl UpdateCoordinator {
    pub fn new(
        store: Arc<dyn AccountStore>,
        aggregator: Arc<Aggregator>,
        clock: Arc<dyn TimeProvider>,
        min_interval: chrono::Duration,
    ) -> Self {
        Self {
            store,
            aggregator,
            clock,
            min_interval,
            running: Arc::new(DashSet::new()),
        }
    }

    /// # Summary
    /// 发起一次更新。
    ///
    /// # Logic
    /// 1. 占住该账户的更新位，已被占用返回 `TooManyRequests`。
    /// 2. 占位之后才读取账户并检查最小间隔，不满足返回 `TooManyRequests`。
    /// 3. 刷新所有交易所余额并写回，得到快照。
    /// 4. 派生后台任务，以快照为起点抓取成交与分发，任务结束时释放占位。
    ///
    /// # Returns
    /// 余额快照与后台任务句柄。
    pub async fn update(&self, session: &Session) -> Result<UpdateTicket, ServiceError> {
        let username = session.username();
        let Some(guard) = InFlight::acquire(&self.running, username) else {
            debug!(username = %username, "update rejected, another one still running");
            return Err(ServiceError::TooManyRequests(
                "an update is already in progress".to_string(),
            ));
        };

        let account = self.store.load(username).await?;
        let next_available = account
            .last_update
            .checked_add_signed(self.min_interval)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        if self.clock.now() < next_available {
            debug!(username = %username, "update rejected, last one too recent");
            return Err(ServiceError::TooManyRequests(format!(
                "updated recently, try again at {}",
                next_available.format("%H:%M:%S UTC")
            )));
        }

        let snapshot = self.aggregator.refresh_balances(username).await?;
        info!(username = %username, exchanges = snapshot.exchanges.len(), "balances refreshed");

        let aggregator = self.aggregator.clone();
        let owner = username.to_string();
        let exchanges = snapshot.exchanges.clone();
        let sweep = tokio::spawn(async move {
            let _guard = guard;
            aggregator.sweep(&owner, exchanges).await
        });

        Ok(UpdateTicket { snapshot, sweep })
    }

    /// 当前是否有该账户的后台扫描
    pub fn is_running(&self, username: &str) -> bool {
        self.running.contains(username)
    }
}
