//! # 鉴权中间件
//!
//! 校验 `Authorization: Bearer <token>`，并把解析出的会话注入请求上下文。

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use coinfold_manager::Session;

use crate::error::ApiError;
use crate::server::AppState;

/// 提取并验证 Authorization: Bearer <token>
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = {
        let header = req
            .headers()
            .get(axum::http::header::AUTHORIZATION)
            .ok_or_else(|| {
                tracing::warn!("Missing Authorization header");
                ApiError::Unauthorized("Missing Authorization header".into())
            })?;
        let value = header
            .to_str()
            .map_err(|_| ApiError::Unauthorized("Invalid auth header".into()))?;
        value
            .strip_prefix("Bearer ")
            .ok_or_else(|| {
                tracing::warn!("Invalid Bearer format");
                ApiError::Unauthorized("Invalid Bearer format".into())
            })?
            .trim()
            .to_string()
    };

    let session = state.accounts.authenticate(&token).await.map_err(|e| {
        tracing::warn!("token verification failed: {}", e);
        ApiError::from(e)
    })?;

    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

/// 在处理函数中获取当前会话的快捷方式
pub struct CurrentSession(pub Session);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Missing session context".into()))?;
        Ok(CurrentSession(session))
    }
}
