//! # 资产组合查询与更新

use axum::Json;
use axum::extract::State;

use crate::error::ApiError;
use crate::middleware::auth::CurrentSession;
use crate::server::AppState;
use crate::types::{ApiErrorResponse, PortfolioResponse};

/// 读取最近一次聚合结果
#[utoipa::path(
    get,
    path = "/latest",
    tag = "组合 (Portfolio)",
    security(("bearer_jwt" = [])),
    responses(
        (status = 200, description = "当前组合", body = PortfolioResponse),
        (status = 401, description = "未认证", body = ApiErrorResponse),
        (status = 404, description = "账户不存在", body = ApiErrorResponse)
    )
)]
pub async fn latest(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<PortfolioResponse>, ApiError> {
    let account = state.accounts.load(&session).await?;
    Ok(Json(PortfolioResponse::from(&account)))
}

/// 发起更新
///
/// 同步刷新余额并返回快照，成交与分发在后台继续抓取。
/// 距上次更新不足一分钟，或上一次后台抓取尚未结束时返回 429。
#[utoipa::path(
    post,
    path = "/update",
    tag = "组合 (Portfolio)",
    security(("bearer_jwt" = [])),
    responses(
        (status = 200, description = "余额已刷新", body = PortfolioResponse),
        (status = 401, description = "未认证", body = ApiErrorResponse),
        (status = 429, description = "更新过于频繁", body = ApiErrorResponse)
    )
)]
pub async fn update(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Json<PortfolioResponse>, ApiError> {
    let ticket = state.updates.update(&session).await?;
    tracing::debug!(username = %session.username(), "background sweep detached");
    Ok(Json(PortfolioResponse::from(&ticket.snapshot)))
}
