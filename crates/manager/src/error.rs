use coinfold_core::store::error::StoreError;
use coinfold_engine::EngineError;
use thiserror::Error;

/// # Summary
/// 服务层的统一错误类型，与 HTTP 状态码一一对应。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Bad input: {0}")]
    BadInput(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Too many requests: {0}")]
    TooManyRequests(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ServiceError::NotFound("account does not exist".to_string()),
            StoreError::Conflict(msg) => ServiceError::Conflict(msg),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<EngineError> for ServiceError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Store(e) => e.into(),
            EngineError::NoBalances(msg) => {
                ServiceError::Internal(format!("no exchange balance could be refreshed: {}", msg))
            }
        }
    }
}
