use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use coinfold_core::account::entity::{Account, ExchangeAccount};
use coinfold_core::common::{millis_to_utc, never};
use coinfold_core::common::time::{FakeClockProvider, TimeProvider};
use coinfold_core::portfolio::entity::{AssetMap, Trade};
use coinfold_core::portfolio::fold::fold_trade;
use coinfold_core::store::port::AccountStore;
use coinfold_core::testing::{ScriptedAdapter, ScriptedFactory};
use coinfold_core::venue::entity::{Credentials, VenueKind};
use coinfold_core::venue::error::VenueError;
use coinfold_core::venue::port::{AdapterFactory, Checkpoint, ExchangeAdapter};
use coinfold_engine::{Aggregator, EngineError, SweepReport};
use coinfold_store::FileAccountStore;
use std::sync::Arc;
use tokio::sync::Notify;

fn trade(id: &str, price: f64, qty: f64, is_buyer: bool, time_ms: i64) -> Trade {
    Trade {
        id: id.to_string(),
        price,
        qty,
        commission: 0.0,
        commission_asset: "BNB".to_string(),
        time: millis_to_utc(time_ms),
        is_buyer,
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    store: Arc<FileAccountStore>,
    clock: Arc<FakeClockProvider>,
}

async fn fixture(venues: &[&str]) -> anyhow::Result<Fixture> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(FileAccountStore::new(dir.path())?);
    let mut account = Account::new("alice");
    for venue in venues {
        account
            .exchanges
            .insert(venue.to_string(), ExchangeAccount::new("k", "s", ""));
    }
    store.insert(&account).await?;
    let clock = Arc::new(FakeClockProvider::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    ));
    Ok(Fixture {
        _dir: dir,
        store,
        clock,
    })
}

fn aggregator(fx: &Fixture, factory: Arc<dyn AdapterFactory>) -> Aggregator {
    Aggregator::new(fx.store.clone(), factory, fx.clock.clone(), 4)
}

#[tokio::test]
async fn test_refresh_balances_writes_snapshot() -> anyhow::Result<()> {
    let fx = fixture(&["binance", "kucoin"]).await?;
    let binance = Arc::new(ScriptedAdapter::new(VenueKind::Binance));
    binance.set_balance("BTC", 1.5);
    let kucoin = Arc::new(ScriptedAdapter::new(VenueKind::Kucoin));
    kucoin.set_balance("ETH", 3.0);
    let factory = Arc::new(ScriptedFactory::new().with(binance).with(kucoin));
    let agg = aggregator(&fx, factory.clone());

    let snapshot = agg.refresh_balances("alice").await?;

    assert_eq!(snapshot.exchanges["binance"].assets["BTC"].balance, 1.5);
    assert_eq!(snapshot.exchanges["kucoin"].assets["ETH"].balance, 3.0);
    assert_eq!(snapshot.last_update, fx.clock.now());
    let stored = fx.store.load("alice").await?;
    assert_eq!(stored.exchanges["binance"].assets["BTC"].balance, 1.5);
    assert_eq!(factory.built().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_failed_balance_keeps_prior_assets() -> anyhow::Result<()> {
    let fx = fixture(&["binance", "kucoin"]).await?;
    fx.store
        .modify(
            "alice",
            Box::new(|account| {
                if let Some(ex) = account.exchanges.get_mut("kucoin") {
                    ex.assets.insert("KCS".to_string(), Default::default());
                }
            }),
        )
        .await?;
    let binance = Arc::new(ScriptedAdapter::new(VenueKind::Binance));
    binance.set_balance("BTC", 2.0);
    let kucoin = Arc::new(ScriptedAdapter::new(VenueKind::Kucoin));
    kucoin.fail_balance(VenueError::Transient("timeout".to_string()));
    let agg = aggregator(&fx, Arc::new(ScriptedFactory::new().with(binance).with(kucoin)));

    let snapshot = agg.refresh_balances("alice").await?;

    assert_eq!(snapshot.exchanges["binance"].assets["BTC"].balance, 2.0);
    assert!(snapshot.exchanges["kucoin"].assets.contains_key("KCS"));
    Ok(())
}

#[tokio::test]
async fn test_sweep_merges_every_exchange() -> anyhow::Result<()> {
    let fx = fixture(&["binance", "kucoin"]).await?;
    let binance = Arc::new(ScriptedAdapter::new(VenueKind::Binance));
    binance.set_balance("BTC", 3.0);
    binance.set_balance("DUST", 0.001);
    binance.push_trade("BTC", "USDT", trade("1", 10.0, 2.0, true, 100));
    binance.push_trade("BTC", "USDT", trade("2", 20.0, 1.0, true, 200));
    binance.push_distribution("BTC", 0.5, 300);
    let kucoin = Arc::new(ScriptedAdapter::new(VenueKind::Kucoin));
    kucoin.push_trade("ETH", "USDT", trade("k1", 50.0, 2.0, true, 1000));
    let agg = aggregator(&fx, Arc::new(ScriptedFactory::new().with(binance).with(kucoin)));

    let snapshot = agg.refresh_balances("alice").await?;
    fx.clock.advance(chrono::Duration::seconds(5));
    let report = agg.sweep("alice", snapshot.exchanges).await;

    assert_eq!(
        report,
        SweepReport {
            merged: 2,
            failed: 0,
            write_errors: 0
        }
    );
    let account = fx.store.load("alice").await?;
    let btc = &account.exchanges["binance"].assets["BTC"];
    assert_eq!(btc.balance, 3.0);
    assert_eq!(btc.pairs["USDT"].cost, 40.0);
    assert_eq!(btc.distribution_total, 0.5);
    assert!(!account.exchanges["binance"].assets.contains_key("DUST"));
    assert_eq!(account.exchanges["kucoin"].assets["ETH"].pairs["USDT"].cost, 100.0);
    assert_eq!(account.last_update, fx.clock.now());
    Ok(())
}

#[tokio::test]
async fn test_failing_exchange_does_not_abort_peers() -> anyhow::Result<()> {
    let fx = fixture(&["binance", "kucoin"]).await?;
    let binance = Arc::new(ScriptedAdapter::new(VenueKind::Binance));
    binance.push_trade("BTC", "USDT", trade("1", 10.0, 1.0, true, 100));
    let kucoin = Arc::new(ScriptedAdapter::new(VenueKind::Kucoin));
    kucoin.fail_trades(VenueError::Unauthorized("bad key".to_string()));
    let agg = aggregator(&fx, Arc::new(ScriptedFactory::new().with(binance).with(kucoin)));

    let exchanges = fx.store.load("alice").await?.exchanges;
    let report = agg.sweep("alice", exchanges).await;

    assert_eq!(report.merged, 1);
    assert_eq!(report.failed, 1);
    let account = fx.store.load("alice").await?;
    assert_eq!(account.exchanges["binance"].assets["BTC"].pairs["USDT"].cost, 10.0);
    assert!(account.exchanges["kucoin"].assets.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unknown_venue_is_reported_not_fatal() -> anyhow::Result<()> {
    let fx = fixture(&["binance", "ftx"]).await?;
    let binance = Arc::new(ScriptedAdapter::new(VenueKind::Binance));
    let agg = aggregator(&fx, Arc::new(ScriptedFactory::new().with(binance)));

    let exchanges = fx.store.load("alice").await?.exchanges;
    let report = agg.sweep("alice", exchanges).await;

    assert_eq!(report.merged, 1);
    assert_eq!(report.failed, 1);
    Ok(())
}

#[tokio::test]
async fn test_merge_after_unlink_is_dropped() -> anyhow::Result<()> {
    let fx = fixture(&["binance"]).await?;
    let binance = Arc::new(ScriptedAdapter::new(VenueKind::Binance).gated());
    binance.push_trade("BTC", "USDT", trade("1", 10.0, 1.0, true, 100));
    let agg = Arc::new(aggregator(&fx, Arc::new(ScriptedFactory::new().with(binance.clone()))));

    let exchanges = fx.store.load("alice").await?.exchanges;
    let sweep = {
        let agg = agg.clone();
        tokio::spawn(async move { agg.sweep("alice", exchanges).await })
    };

    fx.store
        .modify(
            "alice",
            Box::new(|account| {
                account.exchanges.remove("binance");
            }),
        )
        .await?;
    binance.release();
    sweep.await?;

    let account = fx.store.load("alice").await?;
    assert!(!account.exchanges.contains_key("binance"));
    Ok(())
}

#[tokio::test]
async fn test_merge_after_relink_is_dropped() -> anyhow::Result<()> {
    let fx = fixture(&["binance"]).await?;
    let binance = Arc::new(ScriptedAdapter::new(VenueKind::Binance).gated());
    binance.push_trade("BTC", "USDT", trade("900", 10.0, 1.0, true, 100));
    let agg = Arc::new(aggregator(&fx, Arc::new(ScriptedFactory::new().with(binance.clone()))));

    let exchanges = fx.store.load("alice").await?.exchanges;
    let sweep = {
        let agg = agg.clone();
        tokio::spawn(async move { agg.sweep("alice", exchanges).await })
    };

    // 扫描途中解绑并用另一把密钥重新绑定
    fx.store
        .modify(
            "alice",
            Box::new(|account| {
                account
                    .exchanges
                    .insert("binance".to_string(), ExchangeAccount::new("NEWKEY", "s2", ""));
            }),
        )
        .await?;
    binance.release();
    sweep.await?;

    let account = fx.store.load("alice").await?;
    let relinked = &account.exchanges["binance"];
    assert_eq!(relinked.api_key, "NEWKEY");
    assert!(relinked.assets.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_all_balances_failing_leaves_account_untouched() -> anyhow::Result<()> {
    let fx = fixture(&["binance"]).await?;
    let binance = Arc::new(ScriptedAdapter::new(VenueKind::Binance));
    binance.fail_balance(VenueError::Unauthorized("bad key".to_string()));
    let agg = aggregator(&fx, Arc::new(ScriptedFactory::new().with(binance)));
    let before = fx.store.load("alice").await?;

    let result = agg.refresh_balances("alice").await;

    assert!(matches!(result, Err(EngineError::NoBalances(_))));
    let after = fx.store.load("alice").await?;
    assert_eq!(after, before);
    assert_eq!(after.last_update, never());
    Ok(())
}

/// 折叠一笔成交后落盘，然后停在闸门上，模拟限频休眠
struct PausingAdapter {
    resume: Notify,
}

#[async_trait]
impl ExchangeAdapter for PausingAdapter {
    fn kind(&self) -> VenueKind {
        VenueKind::Binance
    }

    async fn fetch_balance(&self, assets: AssetMap) -> Result<AssetMap, VenueError> {
        Ok(assets)
    }

    async fn fetch_trades(
        &self,
        mut assets: AssetMap,
        checkpoint: &dyn Checkpoint,
    ) -> Result<AssetMap, VenueError> {
        fold_trade(&mut assets, "BTC", "USDT", &trade("1", 10.0, 1.0, true, 100));
        checkpoint.save(&assets).await;
        self.resume.notified().await;
        fold_trade(&mut assets, "BTC", "USDT", &trade("2", 10.0, 1.0, true, 200));
        Ok(assets)
    }
}

struct PausingFactory(Arc<PausingAdapter>);

impl AdapterFactory for PausingFactory {
    fn build(
        &self,
        _kind: VenueKind,
        _credentials: &Credentials,
    ) -> Result<Arc<dyn ExchangeAdapter>, VenueError> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn test_checkpoint_is_visible_during_sleep() -> anyhow::Result<()> {
    let fx = fixture(&["binance"]).await?;
    let adapter = Arc::new(PausingAdapter {
        resume: Notify::new(),
    });
    let agg = Arc::new(aggregator(&fx, Arc::new(PausingFactory(adapter.clone()))));

    let exchanges = fx.store.load("alice").await?.exchanges;
    let sweep = {
        let agg = agg.clone();
        tokio::spawn(async move { agg.sweep("alice", exchanges).await })
    };

    // 等待检查点写入
    let mut seen = None;
    for _ in 0..200 {
        let account = fx.store.load("alice").await?;
        if let Some(asset) = account.exchanges["binance"].assets.get("BTC") {
            seen = Some(asset.pairs["USDT"].buy_qty);
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert_eq!(seen, Some(1.0));

    adapter.resume.notify_one();
    let report = sweep.await?;
    assert_eq!(report.merged, 1);

    let account = fx.store.load("alice").await?;
    assert_eq!(account.exchanges["binance"].assets["BTC"].pairs["USDT"].buy_qty, 2.0);
    Ok(())
}
