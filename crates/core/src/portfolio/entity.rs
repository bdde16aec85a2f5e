use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// 以基础资产代码 (例如 `BTC`) 为键的资产表。
pub type AssetMap = BTreeMap<String, Asset>;

/// # Summary
/// 交易所返回的一笔成交记录，经适配器翻译为统一模型。
///
/// # Invariants
/// - `id` 在同一交易所内唯一。币安风格交易所为递增整数的十进制字符串。
/// - 一旦被 `Pair` 保存即不可变。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Trade {
    /// 交易所内唯一的成交标识
    #[schema(example = "28457")]
    pub id: String,
    /// 成交价格 (计价资产单位)
    pub price: f64,
    /// 成交数量 (基础资产单位)
    pub qty: f64,
    /// 手续费数额
    pub commission: f64,
    /// 手续费币种
    #[schema(example = "BNB")]
    pub commission_asset: String,
    /// 成交时间
    pub time: DateTime<Utc>,
    /// 是否为买方
    pub is_buyer: bool,
}

impl Trade {
    /// 成交额 (计价资产单位)
    pub fn value(&self) -> f64 {
        self.price * self.qty
    }

    /// 解析为整数的成交 ID，仅对按 ID 分页的交易所有意义。
    pub fn numeric_id(&self) -> Option<i64> {
        self.id.parse().ok()
    }

    /// 用于比较先后的排序键。时间相同的成交以 ID 区分，保证折叠结果与输入顺序无关。
    pub(crate) fn ordering_key(&self) -> (DateTime<Utc>, &str) {
        (self.time, self.id.as_str())
    }
}

/// # Summary
/// 某一基础资产/计价资产组合下所有成交的累计聚合。
///
/// # Invariants
/// - `buy_qty`, `cost`, `sell_qty`, `revenue` 均非负。
/// - 至少折叠过一笔成交后，`earliest_trade` 与 `latest_trade` 均非空，
///   且 `earliest_trade.time <= latest_trade.time`。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Pair {
    /// 累计买入数量
    pub buy_qty: f64,
    /// 累计买入成本 (计价资产单位)
    pub cost: f64,
    /// 累计卖出数量
    pub sell_qty: f64,
    /// 累计卖出收入 (计价资产单位)
    pub revenue: f64,
    /// 按手续费币种累计的手续费
    #[serde(default)]
    pub fees: BTreeMap<String, f64>,
    /// 时间最早的成交
    #[serde(default)]
    pub earliest_trade: Option<Trade>,
    /// 时间最新的成交
    #[serde(default)]
    pub latest_trade: Option<Trade>,
}

/// # Summary
/// 用户在某个交易所持有的一种基础资产。
///
/// # Invariants
/// - `pairs` 为空的资产在下一次成交扫描后会被移除。
/// - `latest_distribution_time` 单调不减，为 0 表示从未收到过分发。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Asset {
    /// 当前持仓 (可用 + 冻结)
    pub balance: f64,
    /// 以计价资产代码为键的交易对聚合
    #[serde(default)]
    pub pairs: BTreeMap<String, Pair>,
    /// 累计收到的分发数量 (基础资产单位)
    #[serde(default)]
    pub distribution_total: f64,
    /// 分发增量抓取的高水位 (毫秒时间戳)
    #[serde(default)]
    pub latest_distribution_time: i64,
}

impl Asset {
    /// 是否有过任何成交
    pub fn is_traded(&self) -> bool {
        !self.pairs.is_empty()
    }
}
