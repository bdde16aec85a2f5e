//! # 成交折叠规则
//!
//! 将单笔成交合并进交易对聚合的纯函数，以及围绕资产表的增量水位计算。
//! 折叠不是幂等的：调用方必须保证每笔成交最多被送入一次。

use super::entity::{Asset, AssetMap, Pair, Trade};
use chrono::{DateTime, Utc};

impl Pair {
    /// # Summary
    /// 将一笔成交折叠进当前交易对。
    ///
    /// # Logic
    /// 1. 按手续费币种累加手续费。
    /// 2. 买单累加买入数量与成本，卖单累加卖出数量与收入。
    /// 3. 以 `(time, id)` 为序更新最早与最新成交。
    pub fn fold(&mut self, trade: &Trade) {
        *self
            .fees
            .entry(trade.commission_asset.clone())
            .or_insert(0.0) += trade.commission;

        if trade.is_buyer {
            self.buy_qty += trade.qty;
            self.cost += trade.value();
        } else {
            self.sell_qty += trade.qty;
            self.revenue += trade.value();
        }

        let replace_earliest = self
            .earliest_trade
            .as_ref()
            .is_none_or(|e| trade.ordering_key() < e.ordering_key());
        if replace_earliest {
            self.earliest_trade = Some(trade.clone());
        }

        let replace_latest = self
            .latest_trade
            .as_ref()
            .is_none_or(|l| trade.ordering_key() > l.ordering_key());
        if replace_latest {
            self.latest_trade = Some(trade.clone());
        }
    }

    /// 依次折叠一页成交
    pub fn fold_all<'a>(&mut self, trades: impl IntoIterator<Item = &'a Trade>) {
        for trade in trades {
            self.fold(trade);
        }
    }
}

/// # Summary
/// 把一笔 `base/quote` 成交折叠进资产表，缺失的资产或交易对按默认值创建。
///
/// # Arguments
/// * `assets`: 交易所子账户的资产表。
/// * `base`: 基础资产代码。
/// * `quote`: 计价资产代码。
/// * `trade`: 待折叠的成交。
pub fn fold_trade(assets: &mut AssetMap, base: &str, quote: &str, trade: &Trade) {
    assets
        .entry(base.to_string())
        .or_default()
        .pairs
        .entry(quote.to_string())
        .or_default()
        .fold(trade);
}

/// # Summary
/// 移除从未成交过的资产，返回被移除的资产代码。
pub fn prune_untraded(assets: &mut AssetMap) -> Vec<String> {
    let untraded: Vec<String> = assets
        .iter()
        .filter(|(_, asset)| !asset.is_traded())
        .map(|(symbol, _)| symbol.clone())
        .collect();
    for symbol in &untraded {
        assets.remove(symbol);
    }
    untraded
}

/// 所有交易对中最新成交的时间，用于按时间分页的交易所恢复增量抓取。
pub fn latest_trade_time(assets: &AssetMap) -> Option<DateTime<Utc>> {
    pairs(assets)
        .filter_map(|p| p.latest_trade.as_ref().map(|t| t.time))
        .max()
}

/// 所有交易对中最早成交的时间。
pub fn earliest_trade_time(assets: &AssetMap) -> Option<DateTime<Utc>> {
    pairs(assets)
        .filter_map(|p| p.earliest_trade.as_ref().map(|t| t.time))
        .min()
}

/// 某交易对最新成交的整数 ID，用于按 ID 分页的交易所。
pub fn latest_trade_id(asset: Option<&Asset>, quote: &str) -> Option<i64> {
    asset?
        .pairs
        .get(quote)?
        .latest_trade
        .as_ref()?
        .numeric_id()
}

/// 资产表中的交易对个数，用于日志。
pub fn pair_count(assets: &AssetMap) -> usize {
    assets.values().map(|a| a.pairs.len()).sum()
}

fn pairs(assets: &AssetMap) -> impl Iterator<Item = &Pair> {
    assets.values().flat_map(|a| a.pairs.values())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::millis_to_utc;

    fn trade(id: &str, price: f64, qty: f64, is_buyer: bool, time_ms: i64) -> Trade {
        Trade {
            id: id.to_string(),
            price,
            qty,
            commission: 0.5,
            commission_asset: "BNB".to_string(),
            time: millis_to_utc(time_ms),
            is_buyer,
        }
    }

    #[test]
    fn test_fold_buys_accumulate_cost() {
        let mut pair = Pair::default();
        pair.fold(&trade("1", 10.0, 2.0, true, 100));
        pair.fold(&trade("2", 20.0, 1.0, true, 200));

        assert_eq!(pair.buy_qty, 3.0);
        assert_eq!(pair.cost, 40.0);
        assert_eq!(pair.sell_qty, 0.0);
        assert_eq!(pair.revenue, 0.0);
        assert_eq!(pair.fees.get("BNB"), Some(&1.0));
        assert_eq!(pair.earliest_trade.as_ref().map(|t| t.id.as_str()), Some("1"));
        assert_eq!(pair.latest_trade.as_ref().map(|t| t.id.as_str()), Some("2"));
    }

    #[test]
    fn test_fold_sell_extends_latest() {
        let mut pair = Pair::default();
        pair.fold_all(&[
            trade("1", 10.0, 2.0, true, 100),
            trade("2", 20.0, 1.0, true, 200),
        ]);
        pair.fold(&trade("3", 15.0, 1.0, false, 300));

        assert_eq!(pair.buy_qty, 3.0);
        assert_eq!(pair.cost, 40.0);
        assert_eq!(pair.sell_qty, 1.0);
        assert_eq!(pair.revenue, 15.0);
        assert_eq!(pair.latest_trade.as_ref().map(|t| t.id.as_str()), Some("3"));
        assert_eq!(pair.earliest_trade.as_ref().map(|t| t.id.as_str()), Some("1"));
    }

    #[test]
    fn test_fold_is_order_independent() {
        let trades = vec![
            trade("1", 10.0, 2.0, true, 100),
            trade("2", 20.0, 1.0, false, 300),
            trade("3", 12.5, 4.0, true, 200),
            trade("4", 8.0, 0.5, false, 200),
        ];

        let mut forward = Pair::default();
        forward.fold_all(&trades);

        let mut reversed = Pair::default();
        reversed.fold_all(trades.iter().rev());

        let mut shuffled = Pair::default();
        for i in [2, 0, 3, 1] {
            shuffled.fold(&trades[i]);
        }

        assert_eq!(forward, reversed);
        assert_eq!(forward, shuffled);
    }

    #[test]
    fn test_fold_empty_page_makes_no_progress() {
        let trades = vec![trade("1", 10.0, 2.0, true, 100)];
        let mut once = Pair::default();
        once.fold_all(&trades);

        let mut with_empty = once.clone();
        with_empty.fold_all(&[]);

        assert_eq!(once, with_empty);
    }

    #[test]
    fn test_fold_trade_creates_asset_and_pair() {
        let mut assets = AssetMap::new();
        fold_trade(&mut assets, "BTC", "USDT", &trade("7", 10.0, 1.0, true, 100));

        let pair = &assets["BTC"].pairs["USDT"];
        assert_eq!(pair.cost, 10.0);
        assert_eq!(latest_trade_id(assets.get("BTC"), "USDT"), Some(7));
        assert_eq!(latest_trade_id(assets.get("BTC"), "BUSD"), None);
    }

    #[test]
    fn test_prune_untraded_keeps_traded_assets() {
        let mut assets = AssetMap::new();
        assets.insert(
            "DUST".to_string(),
            Asset {
                balance: 0.0001,
                ..Default::default()
            },
        );
        fold_trade(&mut assets, "BTC", "USDT", &trade("1", 10.0, 1.0, true, 100));

        let removed = prune_untraded(&mut assets);
        assert_eq!(removed, vec!["DUST".to_string()]);
        assert!(assets.contains_key("BTC"));
        assert_eq!(pair_count(&assets), 1);
    }

    #[test]
    fn test_watermark_times_span_all_pairs() {
        let mut assets = AssetMap::new();
        fold_trade(&mut assets, "BTC", "USDT", &trade("a", 1.0, 1.0, true, 500));
        fold_trade(&mut assets, "ETH", "BTC", &trade("b", 1.0, 1.0, true, 100));
        fold_trade(&mut assets, "ETH", "USDT", &trade("c", 1.0, 1.0, false, 900));

        assert_eq!(latest_trade_time(&assets), Some(millis_to_utc(900)));
        assert_eq!(earliest_trade_time(&assets), Some(millis_to_utc(100)));
        assert_eq!(latest_trade_time(&AssetMap::new()), None);
    }
}
