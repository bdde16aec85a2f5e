//! 库币风格交易所的报文模型与接口抽象。

use async_trait::async_trait;
use coinfold_core::venue::error::VenueError;
use serde::Deserialize;

/// 订单分页大小
pub const ORDERS_PAGE_SIZE: u32 = 500;

/// 子账户余额条目。同一币种可能出现在多个子账户 (main/trade) 中。
#[derive(Debug, Clone, Deserialize)]
pub struct AccountBalance {
    pub currency: String,
    #[serde(rename = "type", default)]
    pub account_type: String,
    pub balance: String,
}

/// 历史订单
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub symbol: String,
    pub side: String,
    pub price: String,
    pub deal_funds: String,
    pub deal_size: String,
    pub fee: String,
    pub fee_currency: String,
    pub is_active: bool,
    pub cancel_exist: bool,
    pub created_at: i64,
}

/// 订单分页
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPage {
    pub total_page: i64,
    #[serde(default)]
    pub items: Vec<Order>,
}

/// 订单查询的时间窗口，毫秒时间戳，两端包含
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderWindow {
    /// 为空表示不设下界
    pub start_at: Option<i64>,
    pub end_at: i64,
}

/// 统一响应信封 `{code, data, msg}`
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub code: String,
    pub data: Option<T>,
    #[serde(default)]
    pub msg: String,
}

/// # Summary
/// 库币风格交易所的 REST 接口。生产实现为 `KucoinClient`。
#[async_trait]
pub trait KucoinApi: Send + Sync {
    /// 全部子账户余额
    async fn accounts(&self) -> Result<Vec<AccountBalance>, VenueError>;

    /// # Summary
    /// 查询已完成订单的一页。
    ///
    /// # Arguments
    /// * `window`: 时间窗口。
    /// * `page`: 页码，从 1 开始。
    /// * `page_size`: 单页大小。
    async fn done_orders(
        &self,
        window: OrderWindow,
        page: i64,
        page_size: u32,
    ) -> Result<OrderPage, VenueError>;
}
