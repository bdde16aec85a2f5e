use thiserror::Error;

/// # Summary
/// 交易所适配器错误枚举。
///
/// # Invariants
/// - `RateLimited` 只在适配器内部使用，由重试逻辑就地恢复，不向上层暴露。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VenueError {
    /// 触发交易所限频
    #[error("Rate limited by venue")]
    RateLimited,
    /// 凭证无效或权限不足
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// 网络错误或交易所 5xx
    #[error("Transient error: {0}")]
    Transient(String),
    /// 交易所返回的业务错误
    #[error("Venue error {code}: {message}")]
    Api { code: i64, message: String },
    /// 响应无法解析
    #[error("Parse error: {0}")]
    Parse(String),
    /// 不支持的交易所
    #[error("Unsupported venue: {0}")]
    Unsupported(String),
}

impl VenueError {
    /// 是否为可以在下次更新时自然恢复的临时错误
    pub fn is_transient(&self) -> bool {
        matches!(self, VenueError::Transient(_) | VenueError::RateLimited)
    }
}
