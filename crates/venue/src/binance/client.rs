use super::api::{
    AccountInfo, Balance, BinanceApi, Dividend, DividendPage, ErrorBody, ExchangeInfo, MyTrade,
    SymbolInfo,
};
use crate::signing::sign_hex;
use crate::wire::{read_body, transport_error};
use async_trait::async_trait;
use chrono::Utc;
use coinfold_core::venue::entity::Credentials;
use coinfold_core::venue::error::VenueError;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

const RATE_LIMIT_CODE: i64 = -1003;
const INVALID_KEY_CODES: [i64; 2] = [-2014, -2015];

/// # Summary
/// 币安风格交易所的签名 REST 客户端。
///
/// # Invariants
/// - 私有接口的查询串均附带 `recvWindow` 与 `timestamp`，并以 HMAC-SHA256 签名。
pub struct BinanceClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
    recv_window_ms: u64,
}

impl BinanceClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        credentials: Credentials,
        recv_window_ms: u64,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            recv_window_ms,
        }
    }

    async fn public_get<T: DeserializeOwned>(&self, path: &str) -> Result<T, VenueError> {
        let resp = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .map_err(transport_error)?;
        decode(resp).await
    }

    async fn signed_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, VenueError> {
        let mut query: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        query.push(format!("recvWindow={}", self.recv_window_ms));
        query.push(format!("timestamp={}", Utc::now().timestamp_millis()));
        let query = query.join("&");
        let signature = sign_hex(&self.credentials.secret, &query)?;

        let resp = self
            .client
            .get(format!(
                "{}{}?{}&signature={}",
                self.base_url, path, query, signature
            ))
            .header("X-MBX-APIKEY", &self.credentials.api_key)
            .send()
            .await
            .map_err(transport_error)?;
        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, VenueError> {
    let (status, body) = read_body(resp).await?;
    if status.is_success() {
        serde_json::from_str(&body).map_err(|e| VenueError::Parse(e.to_string()))
    } else {
        Err(classify_error(status, &body))
    }
}

/// # Summary
/// 把非 2xx 响应翻译为 `VenueError`。
///
/// # Logic
/// 1. `-1003`、HTTP 429 与 418 (封禁) 视为限频。
/// 2. `-2014`/`-2015` 与 HTTP 401 视为凭证无效。
/// 3. 5xx 视为临时错误，其余保留交易所错误码。
pub(crate) fn classify_error(status: StatusCode, body: &str) -> VenueError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let code = parsed.as_ref().map(|b| b.code);

    if code == Some(RATE_LIMIT_CODE)
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.as_u16() == 418
    {
        return VenueError::RateLimited;
    }
    if code.is_some_and(|c| INVALID_KEY_CODES.contains(&c)) || status == StatusCode::UNAUTHORIZED
    {
        let msg = parsed.map(|b| b.msg).unwrap_or_else(|| status.to_string());
        return VenueError::Unauthorized(msg);
    }
    if status.is_server_error() {
        return VenueError::Transient(format!("HTTP {status}"));
    }
    match parsed {
        Some(b) => VenueError::Api {
            code: b.code,
            message: b.msg,
        },
        None => VenueError::Api {
            code: i64::from(status.as_u16()),
            message: body.chars().take(200).collect(),
        },
    }
}

#[async_trait]
impl BinanceApi for BinanceClient {
    async fn account_balances(&self) -> Result<Vec<Balance>, VenueError> {
        let info: AccountInfo = self.signed_get("/api/v3/account", &[]).await?;
        Ok(info.balances)
    }

    async fn exchange_pairs(&self) -> Result<Vec<SymbolInfo>, VenueError> {
        let info: ExchangeInfo = self.public_get("/api/v3/exchangeInfo").await?;
        Ok(info.symbols)
    }

    async fn my_trades(
        &self,
        symbol: &str,
        from_id: i64,
        limit: u32,
    ) -> Result<Vec<MyTrade>, VenueError> {
        self.signed_get(
            "/api/v3/myTrades",
            &[
                ("symbol", symbol.to_string()),
                ("fromId", from_id.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn asset_dividends(
        &self,
        asset: &str,
        start_time: Option<i64>,
        limit: u32,
    ) -> Result<Vec<Dividend>, VenueError> {
        let mut params = vec![("asset", asset.to_string()), ("limit", limit.to_string())];
        if let Some(start) = start_time {
            params.push(("startTime", start.to_string()));
        }
        let page: DividendPage = self
            .signed_get("/sapi/v1/asset/assetDividend", &params)
            .await?;
        Ok(page.rows)
    }
}
