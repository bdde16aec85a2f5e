use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use coinfold_core::common::time::FakeClockProvider;
use coinfold_core::portfolio::entity::{Asset, AssetMap};
use coinfold_core::testing::RecordingCheckpoint;
use coinfold_core::venue::error::VenueError;
use coinfold_core::venue::port::{ExchangeAdapter, NoopCheckpoint};
use coinfold_venue::KucoinAdapter;
use coinfold_venue::kucoin::api::{AccountBalance, KucoinApi, Order, OrderPage, OrderWindow};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const BACKOFF: Duration = Duration::from_secs(60);

/// 按脚本应答的库币接口替身。
/// `span` 模拟交易所对单个查询窗口的回溯上限。
struct ScriptedKucoin {
    accounts: Vec<AccountBalance>,
    orders: Mutex<Vec<Order>>,
    span: i64,
    rate_limits_left: AtomicUsize,
    windows: Mutex<Vec<(OrderWindow, i64)>>,
}

impl ScriptedKucoin {
    fn new(span: i64) -> Self {
        Self {
            accounts: Vec::new(),
            orders: Mutex::new(Vec::new()),
            span,
            rate_limits_left: AtomicUsize::new(0),
            windows: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, order: Order) {
        self.orders.lock().unwrap().push(order);
    }

    fn windows(&self) -> Vec<(OrderWindow, i64)> {
        self.windows.lock().unwrap().clone()
    }
}

fn filled(id: &str, symbol: &str, side: &str, price: &str, funds: &str, size: &str, at: i64) -> Order {
    Order {
        id: id.to_string(),
        symbol: symbol.to_string(),
        side: side.to_string(),
        price: price.to_string(),
        deal_funds: funds.to_string(),
        deal_size: size.to_string(),
        fee: "0.1".to_string(),
        fee_currency: "USDT".to_string(),
        is_active: false,
        cancel_exist: false,
        created_at: at,
    }
}

#[async_trait]
impl KucoinApi for ScriptedKucoin {
    async fn accounts(&self) -> Result<Vec<AccountBalance>, VenueError> {
        Ok(self.accounts.clone())
    }

    async fn done_orders(
        &self,
        window: OrderWindow,
        page: i64,
        page_size: u32,
    ) -> Result<OrderPage, VenueError> {
        self.windows.lock().unwrap().push((window, page));
        if self
            .rate_limits_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(VenueError::RateLimited);
        }

        let lower = window
            .start_at
            .unwrap_or(i64::MIN)
            .max(window.end_at - self.span + 1);
        let mut matching: Vec<Order> = self
            .orders
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.created_at >= lower && o.created_at <= window.end_at)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let size = page_size as usize;
        let total_page = matching.len().div_ceil(size) as i64;
        let skip = (page - 1) as usize * size;
        Ok(OrderPage {
            total_page,
            items: matching.into_iter().skip(skip).take(size).collect(),
        })
    }
}

fn adapter(api: Arc<ScriptedKucoin>, now_ms: i64) -> (KucoinAdapter, Arc<FakeClockProvider>) {
    let clock = Arc::new(FakeClockProvider::new(
        Utc.timestamp_millis_opt(now_ms).unwrap(),
    ));
    (KucoinAdapter::new(api, clock.clone(), BACKOFF), clock)
}

#[tokio::test]
async fn test_market_order_folds_with_derived_price() {
    let api = Arc::new(ScriptedKucoin::new(i64::MAX / 4));
    api.push(filled("o1", "ETH-USDT", "buy", "0", "100", "2", 1000));
    let (adapter, _) = adapter(api.clone(), 10_000);

    let assets = adapter
        .fetch_trades(AssetMap::new(), &NoopCheckpoint)
        .await
        .unwrap();

    let pair = &assets["ETH"].pairs["USDT"];
    assert_eq!(pair.cost, 100.0);
    assert_eq!(pair.buy_qty, 2.0);
    assert_eq!(pair.fees.get("USDT"), Some(&0.1));
}

#[tokio::test]
async fn test_active_order_is_skipped() {
    let api = Arc::new(ScriptedKucoin::new(i64::MAX / 4));
    let mut open = filled("o1", "ETH-USDT", "buy", "0", "100", "2", 1000);
    open.is_active = true;
    api.push(open);
    let (adapter, _) = adapter(api.clone(), 10_000);

    let mut before = AssetMap::new();
    before.insert(
        "ETH".to_string(),
        Asset {
            balance: 1.0,
            ..Default::default()
        },
    );
    let after = adapter
        .fetch_trades(before.clone(), &NoopCheckpoint)
        .await
        .unwrap();

    assert_eq!(after, before);
}

#[tokio::test]
async fn test_backfill_walks_older_windows() {
    let api = Arc::new(ScriptedKucoin::new(5_000));
    api.push(filled("a", "BTC-USDT", "buy", "10", "10", "1", 1_000));
    api.push(filled("b", "BTC-USDT", "buy", "20", "20", "1", 5_000));
    api.push(filled("c", "BTC-USDT", "sell", "30", "30", "1", 9_000));
    let (adapter, _) = adapter(api.clone(), 10_000);

    let assets = adapter
        .fetch_trades(AssetMap::new(), &NoopCheckpoint)
        .await
        .unwrap();

    let pair = &assets["BTC"].pairs["USDT"];
    assert_eq!(pair.buy_qty, 2.0);
    assert_eq!(pair.cost, 30.0);
    assert_eq!(pair.revenue, 30.0);
    assert_eq!(pair.earliest_trade.as_ref().unwrap().id, "a");
    assert_eq!(pair.latest_trade.as_ref().unwrap().id, "c");

    let ends: Vec<i64> = api.windows().iter().map(|(w, _)| w.end_at).collect();
    assert_eq!(ends, vec![10_000, 8_999, 4_999, 999]);
}

#[tokio::test]
async fn test_incremental_window_starts_after_latest() {
    let api = Arc::new(ScriptedKucoin::new(i64::MAX / 4));
    api.push(filled("a", "BTC-USDT", "buy", "10", "10", "1", 1_000));
    let (adapter, clock) = adapter(api.clone(), 10_000);
    let first = adapter
        .fetch_trades(AssetMap::new(), &NoopCheckpoint)
        .await
        .unwrap();

    api.push(filled("b", "BTC-USDT", "buy", "20", "20", "1", 11_000));
    clock.set_time(Utc.timestamp_millis_opt(12_000).unwrap());
    api.windows.lock().unwrap().clear();
    let second = adapter.fetch_trades(first, &NoopCheckpoint).await.unwrap();

    let windows = api.windows();
    assert_eq!(
        windows[0].0,
        OrderWindow {
            start_at: Some(1_001),
            end_at: 12_000
        }
    );
    // 回填窗口在已知最早成交之前
    assert_eq!(windows[1].0.end_at, 999);
    let pair = &second["BTC"].pairs["USDT"];
    assert_eq!(pair.buy_qty, 2.0);
    assert_eq!(pair.cost, 30.0);
}

#[tokio::test]
async fn test_all_pages_of_window_are_read() {
    let api = Arc::new(ScriptedKucoin::new(i64::MAX / 4));
    for i in 0..1_200 {
        api.push(filled(&format!("o{i}"), "ETH-USDT", "buy", "1", "1", "1", 100 + i));
    }
    let (adapter, _) = adapter(api.clone(), 10_000);

    let assets = adapter
        .fetch_trades(AssetMap::new(), &NoopCheckpoint)
        .await
        .unwrap();

    assert_eq!(assets["ETH"].pairs["USDT"].buy_qty, 1_200.0);
    let pages: Vec<i64> = api
        .windows()
        .iter()
        .filter(|(w, _)| w.end_at == 10_000)
        .map(|(_, p)| *p)
        .collect();
    assert_eq!(pages, vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_checkpoints_then_retries() {
    let api = Arc::new(ScriptedKucoin::new(i64::MAX / 4));
    api.push(filled("o1", "ETH-USDT", "buy", "0", "100", "2", 1000));
    api.rate_limits_left.store(2, Ordering::SeqCst);
    let (adapter, _) = adapter(api.clone(), 10_000);
    let checkpoint = RecordingCheckpoint::new();
    let start = tokio::time::Instant::now();

    let assets = adapter
        .fetch_trades(AssetMap::new(), &checkpoint)
        .await
        .unwrap();

    assert!(start.elapsed() >= Duration::from_secs(2 * 60));
    assert_eq!(checkpoint.saved().len(), 2);
    assert_eq!(assets["ETH"].pairs["USDT"].cost, 100.0);
}

#[tokio::test]
async fn test_balance_sums_sub_accounts() {
    let mut scripted = ScriptedKucoin::new(1);
    scripted.accounts = vec![
        AccountBalance {
            currency: "USDT".to_string(),
            account_type: "main".to_string(),
            balance: "10.5".to_string(),
        },
        AccountBalance {
            currency: "USDT".to_string(),
            account_type: "trade".to_string(),
            balance: "4.5".to_string(),
        },
    ];
    let (adapter, _) = adapter(Arc::new(scripted), 0);

    let mut before = AssetMap::new();
    before.insert(
        "KCS".to_string(),
        Asset {
            balance: 3.0,
            ..Default::default()
        },
    );
    let after = adapter.fetch_balance(before).await.unwrap();

    assert_eq!(after["USDT"].balance, 15.0);
    assert_eq!(after["KCS"].balance, 0.0);
}
