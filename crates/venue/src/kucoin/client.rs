use super::api::{AccountBalance, Envelope, KucoinApi, OrderPage, OrderWindow};
use crate::signing::sign_base64;
use crate::wire::{read_body, transport_error};
use async_trait::async_trait;
use chrono::Utc;
use coinfold_core::venue::entity::Credentials;
use coinfold_core::venue::error::VenueError;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

const SUCCESS_CODE: &str = "200000";
const RATE_LIMIT_CODE: &str = "429000";
const AUTH_ERROR_CODES: [&str; 5] = ["400001", "400002", "400003", "400004", "400005"];
const API_KEY_VERSION: &str = "2";

/// # Summary
/// 库币风格交易所的签名 REST 客户端 (API key version 2)。
///
/// # Invariants
/// - 签名原文为 `timestamp + method + path(含查询串)`，base64 编码。
/// - 口令短语以同一密钥签名后发送。
pub struct KucoinClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

impl KucoinClient {
    pub fn new(client: Client, base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    async fn signed_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, VenueError> {
        let query: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let endpoint = if query.is_empty() {
            path.to_string()
        } else {
            format!("{path}?{}", query.join("&"))
        };
        let timestamp = Utc::now().timestamp_millis().to_string();
        let signature = sign_base64(
            &self.credentials.secret,
            &format!("{timestamp}GET{endpoint}"),
        )?;
        let passphrase = sign_base64(&self.credentials.secret, &self.credentials.passphrase)?;

        let resp = self
            .client
            .get(format!("{}{}", self.base_url, endpoint))
            .header("KC-API-KEY", &self.credentials.api_key)
            .header("KC-API-SIGN", signature)
            .header("KC-API-TIMESTAMP", timestamp)
            .header("KC-API-PASSPHRASE", passphrase)
            .header("KC-API-KEY-VERSION", API_KEY_VERSION)
            .send()
            .await
            .map_err(transport_error)?;

        let (status, body) = read_body(resp).await?;
        unwrap_envelope(status, &body)
    }
}

/// # Summary
/// 解析响应信封。
///
/// # Logic
/// 1. `429000` 或 HTTP 429 视为限频。
/// 2. `40000x` 或 HTTP 401 视为凭证无效。
/// 3. 5xx 视为临时错误；`200000` 以外的业务码保留为 `Api`。
pub(crate) fn unwrap_envelope<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
) -> Result<T, VenueError> {
    let envelope: Option<Envelope<T>> = serde_json::from_str(body).ok();
    let code = envelope.as_ref().map(|e| e.code.as_str());

    if code == Some(RATE_LIMIT_CODE) || status == StatusCode::TOO_MANY_REQUESTS {
        return Err(VenueError::RateLimited);
    }
    if code.is_some_and(|c| AUTH_ERROR_CODES.contains(&c)) || status == StatusCode::UNAUTHORIZED {
        let msg = envelope.map(|e| e.msg).unwrap_or_else(|| status.to_string());
        return Err(VenueError::Unauthorized(msg));
    }
    if status.is_server_error() {
        return Err(VenueError::Transient(format!("HTTP {status}")));
    }

    match envelope {
        Some(e) if e.code == SUCCESS_CODE => e
            .data
            .ok_or_else(|| VenueError::Parse("response has no data".to_string())),
        Some(e) => Err(VenueError::Api {
            code: e.code.parse().unwrap_or(-1),
            message: e.msg,
        }),
        None => Err(VenueError::Parse(format!(
            "unexpected response (HTTP {status}): {}",
            body.chars().take(200).collect::<String>()
        ))),
    }
}

#[async_trait]
impl KucoinApi for KucoinClient {
    async fn accounts(&self) -> Result<Vec<AccountBalance>, VenueError> {
        self.signed_get("/api/v1/accounts", &[]).await
    }

    async fn done_orders(
        &self,
        window: OrderWindow,
        page: i64,
        page_size: u32,
    ) -> Result<OrderPage, VenueError> {
        let mut params = vec![("status", "done".to_string())];
        if let Some(start) = window.start_at {
            params.push(("startAt", start.to_string()));
        }
        params.push(("endAt", window.end_at.to_string()));
        params.push(("currentPage", page.to_string()));
        params.push(("pageSize", page_size.to_string()));
        self.signed_get("/api/v1/orders", &params).await
    }
}
