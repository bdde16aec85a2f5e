//! # 注册与登录

use axum::Json;
use axum::extract::State;
use coinfold_core::account::entity::{ExchangeAccount, ExchangeMap};

use crate::error::ApiError;
use crate::server::AppState;
use crate::types::{ApiErrorResponse, LoginRequest, SignupRequest, TokenResponse};

/// 注册账户
///
/// 创建账户并返回访问令牌，可同时绑定若干交易所。
#[utoipa::path(
    post,
    path = "/signup",
    tag = "鉴权 (Auth)",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "注册成功", body = TokenResponse),
        (status = 400, description = "用户名非法或交易所不受支持", body = ApiErrorResponse),
        (status = 409, description = "用户名已存在", body = ApiErrorResponse)
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let exchanges: ExchangeMap = req
        .exchanges
        .into_iter()
        .map(|(venue_key, creds)| (venue_key, ExchangeAccount::from(creds)))
        .collect();
    let token = state
        .accounts
        .signup(&req.username, &req.password, exchanges)
        .await?;
    Ok(Json(TokenResponse { token }))
}

/// 用户登录
///
/// 验证用户名和口令，颁发 JWT。
#[utoipa::path(
    post,
    path = "/login",
    tag = "鉴权 (Auth)",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "登录成功", body = TokenResponse),
        (status = 401, description = "口令错误", body = ApiErrorResponse),
        (status = 404, description = "账户不存在", body = ApiErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = state.accounts.login(&req.username, &req.password).await?;
    Ok(Json(TokenResponse { token }))
}
