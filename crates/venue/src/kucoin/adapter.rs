use super::api::{KucoinApi, ORDERS_PAGE_SIZE, Order, OrderWindow};
use crate::retry::RateLimitRetry;
use crate::wire::parse_decimal;
use async_trait::async_trait;
use coinfold_core::common::millis_to_utc;
use coinfold_core::common::time::TimeProvider;
use coinfold_core::portfolio::entity::{AssetMap, Trade};
use coinfold_core::portfolio::fold::{earliest_trade_time, fold_trade, latest_trade_time};
use coinfold_core::venue::entity::VenueKind;
use coinfold_core::venue::error::VenueError;
use coinfold_core::venue::port::{Checkpoint, ExchangeAdapter, NoopCheckpoint};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// # Summary
/// 库币风格交易所适配器。
///
/// # Invariants
/// - 增量窗口从所有交易对最新成交时间 + 1 开始，到当前时间结束。
/// - 回填窗口的上界严格小于所有已折叠成交的时间，因此不会重复折叠。
pub struct KucoinAdapter {
    api: Arc<dyn KucoinApi>,
    clock: Arc<dyn TimeProvider>,
    retry: RateLimitRetry,
}

/// 单个时间窗口的扫描结果
struct WindowSweep {
    /// 窗口内返回的订单数 (含被过滤的订单)
    seen: usize,
    folded: usize,
    /// 窗口内最早的订单创建时间
    earliest_seen: Option<i64>,
}

impl KucoinAdapter {
    pub fn new(api: Arc<dyn KucoinApi>, clock: Arc<dyn TimeProvider>, backoff: Duration) -> Self {
        Self {
            api,
            clock,
            retry: RateLimitRetry::new(VenueKind::Kucoin, backoff),
        }
    }

    /// 逐页扫描一个时间窗口，页码从 1 到 `totalPage`
    async fn sweep_window(
        &self,
        assets: &mut AssetMap,
        window: OrderWindow,
        checkpoint: &dyn Checkpoint,
    ) -> Result<WindowSweep, VenueError> {
        let mut sweep = WindowSweep {
            seen: 0,
            folded: 0,
            earliest_seen: None,
        };
        let mut page = 1;

        loop {
            let api = self.api.clone();
            let resp = self
                .retry
                .run("orders", checkpoint, assets, move || {
                    let api = api.clone();
                    async move { api.done_orders(window, page, ORDERS_PAGE_SIZE).await }
                })
                .await?;

            for order in &resp.items {
                sweep.seen += 1;
                sweep.earliest_seen = Some(
                    sweep
                        .earliest_seen
                        .map_or(order.created_at, |t| t.min(order.created_at)),
                );
                match order_to_trade(order) {
                    Ok(Some((base, quote, trade))) => {
                        fold_trade(assets, &base, &quote, &trade);
                        sweep.folded += 1;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(venue = "kucoin", order = %order.id, "skipping order: {}", e)
                    }
                }
            }

            if page >= resp.total_page {
                break;
            }
            page += 1;
        }
        Ok(sweep)
    }
}

/// # Summary
/// 把已完成订单翻译为成交。
///
/// # Logic
/// 1. 仍活跃、存在撤单或成交量为零的订单不计入。
/// 2. 市价单 `price == "0"` 时以 `dealFunds / dealSize` 作为成交均价。
/// 3. 价格为零的订单不计入。
///
/// # Returns
/// `Some((base, quote, trade))`，或被过滤时返回 `None`。
pub fn order_to_trade(order: &Order) -> Result<Option<(String, String, Trade)>, VenueError> {
    if order.is_active || order.cancel_exist {
        return Ok(None);
    }
    let qty = parse_decimal("dealSize", &order.deal_size)?;
    if qty <= 0.0 {
        return Ok(None);
    }
    let price = if order.price.trim() == "0" {
        parse_decimal("dealFunds", &order.deal_funds)? / qty
    } else {
        parse_decimal("price", &order.price)?
    };
    if price == 0.0 {
        return Ok(None);
    }
    let (base, quote) = order
        .symbol
        .split_once('-')
        .ok_or_else(|| VenueError::Parse(format!("symbol without '-': {}", order.symbol)))?;

    let trade = Trade {
        id: order.id.clone(),
        price,
        qty,
        commission: parse_decimal("fee", &order.fee)?,
        commission_asset: order.fee_currency.clone(),
        time: millis_to_utc(order.created_at),
        is_buyer: order.side == "buy",
    };
    Ok(Some((base.to_string(), quote.to_string(), trade)))
}

#[async_trait]
impl ExchangeAdapter for KucoinAdapter {
    fn kind(&self) -> VenueKind {
        VenueKind::Kucoin
    }

    /// # Logic
    /// 同一币种在各子账户中的余额相加；已有但未被报告的资产余额归零。
    async fn fetch_balance(&self, mut assets: AssetMap) -> Result<AssetMap, VenueError> {
        let api = self.api.clone();
        let accounts = self
            .retry
            .run("accounts", &NoopCheckpoint, &assets, move || {
                let api = api.clone();
                async move { api.accounts().await }
            })
            .await?;

        let mut totals: BTreeMap<String, f64> = BTreeMap::new();
        for account in &accounts {
            *totals.entry(account.currency.clone()).or_insert(0.0) +=
                parse_decimal("balance", &account.balance)?;
        }

        for asset in assets.values_mut() {
            asset.balance = 0.0;
        }
        for (symbol, total) in totals {
            assets.entry(symbol).or_default().balance = total;
        }
        Ok(assets)
    }

    /// # Summary
    /// 增量窗口扫描加向前回填。
    ///
    /// # Logic
    /// 1. 首个窗口为 `[max(latest_trade.time) + 1, now]`，无历史时不设下界。
    /// 2. 窗口返回过订单时，以 `min(窗口最早订单, 已知最早成交) - 1` 为新上界、
    ///    不设下界继续回填，直到某个窗口没有任何订单。
    /// 3. 上界不再前进时停止，防止交易所返回异常数据造成死循环。
    async fn fetch_trades(
        &self,
        mut assets: AssetMap,
        checkpoint: &dyn Checkpoint,
    ) -> Result<AssetMap, VenueError> {
        let mut window = OrderWindow {
            start_at: latest_trade_time(&assets).map(|t| t.timestamp_millis() + 1),
            end_at: self.clock.now().timestamp_millis(),
        };
        let mut folded = 0;

        loop {
            let sweep = self.sweep_window(&mut assets, window, checkpoint).await?;
            folded += sweep.folded;
            debug!(
                venue = "kucoin",
                start = ?window.start_at,
                end = window.end_at,
                seen = sweep.seen,
                folded = sweep.folded,
                "window swept"
            );
            if sweep.seen == 0 {
                break;
            }

            let known = earliest_trade_time(&assets).map(|t| t.timestamp_millis());
            let earliest = match (sweep.earliest_seen, known) {
                (Some(a), Some(b)) => a.min(b),
                (Some(a), None) => a,
                (None, Some(b)) => b,
                (None, None) => break,
            };
            let next_end = earliest - 1;
            if next_end >= window.end_at {
                warn!(venue = "kucoin", end = window.end_at, "back-fill window did not move, stopping");
                break;
            }
            window = OrderWindow {
                start_at: None,
                end_at: next_end,
            };
        }

        info!(venue = "kucoin", folded, "trade sweep finished");
        Ok(assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(price: &str, deal_funds: &str, deal_size: &str) -> Order {
        Order {
            id: "o1".to_string(),
            symbol: "ETH-USDT".to_string(),
            side: "buy".to_string(),
            price: price.to_string(),
            deal_funds: deal_funds.to_string(),
            deal_size: deal_size.to_string(),
            fee: "0.1".to_string(),
            fee_currency: "USDT".to_string(),
            is_active: false,
            cancel_exist: false,
            created_at: 1000,
        }
    }

    #[test]
    fn test_market_order_price_from_funds() {
        let (base, quote, trade) = order_to_trade(&order("0", "100", "2")).unwrap().unwrap();
        assert_eq!(base, "ETH");
        assert_eq!(quote, "USDT");
        assert_eq!(trade.price, 50.0);
        assert_eq!(trade.qty, 2.0);
        assert_eq!(trade.commission, 0.1);
        assert!(trade.is_buyer);
    }

    #[test]
    fn test_limit_order_uses_price() {
        let (_, _, trade) = order_to_trade(&order("25", "100", "2")).unwrap().unwrap();
        assert_eq!(trade.price, 25.0);
    }

    #[test]
    fn test_unfilled_orders_skipped() {
        let mut active = order("0", "100", "2");
        active.is_active = true;
        assert!(order_to_trade(&active).unwrap().is_none());

        let mut cancelled = order("0", "100", "2");
        cancelled.cancel_exist = true;
        assert!(order_to_trade(&cancelled).unwrap().is_none());

        assert!(order_to_trade(&order("10", "0", "0")).unwrap().is_none());
        assert!(order_to_trade(&order("0", "0", "2")).unwrap().is_none());
    }

    #[test]
    fn test_bad_symbol_is_parse_error() {
        let mut bad = order("10", "20", "2");
        bad.symbol = "ETHUSDT".to_string();
        assert!(matches!(order_to_trade(&bad), Err(VenueError::Parse(_))));
    }
}
