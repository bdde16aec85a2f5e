//! 币安风格交易所的报文模型与接口抽象。
//! 数值字段保持交易所下发的字符串形式，由适配器统一解析。

use async_trait::async_trait;
use coinfold_core::venue::error::VenueError;
use serde::Deserialize;

/// 成交分页上限
pub const TRADES_PAGE_LIMIT: u32 = 1000;
/// 分发记录单次查询上限
pub const DIVIDEND_PAGE_LIMIT: u32 = 500;

/// 账户余额条目
#[derive(Debug, Clone, Deserialize)]
pub struct Balance {
    pub asset: String,
    pub free: String,
    pub locked: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountInfo {
    pub balances: Vec<Balance>,
}

/// 交易所产品列表中的一个交易对
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

/// 我的成交记录
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MyTrade {
    pub id: i64,
    pub price: String,
    pub qty: String,
    pub commission: String,
    pub commission_asset: String,
    pub time: i64,
    pub is_buyer: bool,
}

/// 资产分发记录
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dividend {
    pub asset: String,
    pub amount: String,
    pub div_time: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DividendPage {
    #[serde(default)]
    pub rows: Vec<Dividend>,
}

/// 错误响应体 `{code, msg}`
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
}

/// # Summary
/// 币安风格交易所的 REST 接口。生产实现为 `BinanceClient`，测试中以脚本替身实现。
#[async_trait]
pub trait BinanceApi: Send + Sync {
    /// 账户全部余额
    async fn account_balances(&self) -> Result<Vec<Balance>, VenueError>;

    /// 交易所支持的交易对列表
    async fn exchange_pairs(&self) -> Result<Vec<SymbolInfo>, VenueError>;

    /// # Summary
    /// 查询某交易对的成交。
    ///
    /// # Arguments
    /// * `from_id`: 起始成交 ID (包含)。
    /// * `limit`: 单页上限。
    async fn my_trades(
        &self,
        symbol: &str,
        from_id: i64,
        limit: u32,
    ) -> Result<Vec<MyTrade>, VenueError>;

    /// 查询某资产的分发记录，`start_time` 为毫秒时间戳 (包含)
    async fn asset_dividends(
        &self,
        asset: &str,
        start_time: Option<i64>,
        limit: u32,
    ) -> Result<Vec<Dividend>, VenueError>;
}
