//! # DTO (Data Transfer Object) 层
//!
//! 所有 DTO 必须派生 `utoipa::ToSchema` 以自动进入 Swagger 文档。

use chrono::{DateTime, Utc};
use coinfold_core::account::entity::{Account, ExchangeAccount};
use coinfold_core::portfolio::entity::Asset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

// ============================================================
//  鉴权 DTO
// ============================================================

/// 交易所 API 凭证
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExchangeCredentials {
    #[schema(example = "vmPUZE6mv9SD5VNHk4HlWFsOr6aKE2zvsw0MuIgwCIPy6utIco14y7Ju91duEh8A")]
    pub api_key: String,
    pub secret: String,
    /// 仅库币需要
    #[serde(default)]
    pub phrase: String,
}

impl From<ExchangeCredentials> for ExchangeAccount {
    fn from(c: ExchangeCredentials) -> Self {
        ExchangeAccount::new(c.api_key, c.secret, c.phrase)
    }
}

/// 注册请求
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignupRequest {
    #[schema(example = "alice")]
    pub username: String,
    pub password: String,
    /// 注册时一并绑定的交易所，键为交易所标识
    #[serde(default)]
    pub exchanges: BTreeMap<String, ExchangeCredentials>,
}

/// 登录请求
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "alice")]
    pub username: String,
    pub password: String,
}

/// 登录或注册成功后返回的令牌
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

// ============================================================
//  账户 DTO
// ============================================================

/// 绑定交易所请求
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LinkRequest {
    #[schema(example = "binance")]
    pub venue_key: String,
    pub api_key: String,
    pub secret: String,
    #[serde(default)]
    pub phrase: String,
}

/// 解绑交易所请求
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnlinkRequest {
    #[schema(example = "kucoin")]
    pub venue_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeletedResponse {
    pub deleted: bool,
}

/// 无内容的成功响应，序列化为 `{}`
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct EmptyResponse {}

// ============================================================
//  组合 DTO
// ============================================================

/// 账户组合视图，不含任何凭证与口令校验值
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PortfolioResponse {
    /// 交易所标识 → 资产代码 → 资产
    pub exchanges: BTreeMap<String, BTreeMap<String, Asset>>,
    pub last_update: DateTime<Utc>,
}

impl From<&Account> for PortfolioResponse {
    fn from(account: &Account) -> Self {
        Self {
            exchanges: account.portfolio(),
            last_update: account.last_update,
        }
    }
}

// ============================================================
//  错误 DTO
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 错误描述信息
    pub error: String,
}

impl ApiErrorResponse {
    pub fn from_msg(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}
