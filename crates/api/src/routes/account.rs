//! # 账户与交易所绑定

use axum::Json;
use axum::extract::State;
use coinfold_core::account::entity::ExchangeAccount;

use crate::error::ApiError;
use crate::middleware::auth::CurrentSession;
use crate::server::AppState;
use crate::types::{ApiErrorResponse, DeletedResponse, EmptyResponse, LinkRequest, UnlinkRequest};

/// 删除当前账户
#[utoipa::path(
    delete,
    path = "/account",
    tag = "账户 (Account)",
    security(("bearer_jwt" = [])),
    responses(
        (status = 200, description = "账户已删除", body = DeletedResponse),
        (status = 401, description = "未认证", body = ApiErrorResponse),
        (status = 404, description = "账户不存在", body = ApiErrorResponse)
    )
)]
pub async fn delete_account(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<DeletedResponse>, ApiError> {
    state.accounts.delete(&session).await?;
    Ok(Json(DeletedResponse { deleted: true }))
}

/// 绑定交易所
///
/// 同一交易所重复绑定时替换凭证，并清空该交易所已聚合的资产。
#[utoipa::path(
    post,
    path = "/link",
    tag = "账户 (Account)",
    security(("bearer_jwt" = [])),
    request_body = LinkRequest,
    responses(
        (status = 200, description = "绑定成功", body = EmptyResponse),
        (status = 400, description = "交易所不受支持", body = ApiErrorResponse),
        (status = 401, description = "未认证", body = ApiErrorResponse)
    )
)]
pub async fn link(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(req): Json<LinkRequest>,
) -> Result<Json<EmptyResponse>, ApiError> {
    let exchange = ExchangeAccount::new(req.api_key, req.secret, req.phrase);
    state.accounts.link(&session, &req.venue_key, exchange).await?;
    Ok(Json(EmptyResponse::default()))
}

/// 解绑交易所
#[utoipa::path(
    post,
    path = "/unlink",
    tag = "账户 (Account)",
    security(("bearer_jwt" = [])),
    request_body = UnlinkRequest,
    responses(
        (status = 200, description = "解绑成功", body = EmptyResponse),
        (status = 401, description = "未认证", body = ApiErrorResponse)
    )
)]
pub async fn unlink(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(req): Json<UnlinkRequest>,
) -> Result<Json<EmptyResponse>, ApiError> {
    state.accounts.unlink(&session, &req.venue_key).await?;
    Ok(Json(EmptyResponse::default()))
}
