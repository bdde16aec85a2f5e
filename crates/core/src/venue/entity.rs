use super::error::VenueError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// # Summary
/// 支持的交易所种类。新增交易所需要同时提供适配器实现。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VenueKind {
    /// 以递增成交 ID 分页的交易所
    Binance,
    /// 以时间窗口加页码分页的交易所
    Kucoin,
}

impl VenueKind {
    pub const ALL: [VenueKind; 2] = [VenueKind::Binance, VenueKind::Kucoin];

    /// 账户文件中使用的交易所键
    pub fn key(self) -> &'static str {
        match self {
            VenueKind::Binance => "binance",
            VenueKind::Kucoin => "kucoin",
        }
    }
}

impl fmt::Display for VenueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for VenueKind {
    type Err = VenueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VenueKind::ALL
            .into_iter()
            .find(|kind| kind.key() == s)
            .ok_or_else(|| VenueError::Unsupported(s.to_string()))
    }
}

/// 调用交易所私有接口所需的凭证
#[derive(Clone, Default)]
pub struct Credentials {
    pub api_key: String,
    pub secret: String,
    pub passphrase: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}
