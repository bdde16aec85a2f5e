pub mod time;

use chrono::{DateTime, TimeZone, Utc};

/// # Summary
/// 将毫秒级 Unix 时间戳转换为 UTC 时间。
///
/// # Logic
/// 超出 chrono 可表示范围的时间戳回落到 Unix 纪元，避免交易所脏数据导致整批解析失败。
pub fn millis_to_utc(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// # Summary
/// 安装进程级 TLS 加密后端 (ring)。HTTP 客户端构造前必须调用，重复调用无副作用。
pub fn install_crypto_provider() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("TLS crypto provider already installed");
    }
}

/// 从未更新过的账户使用的时间哨兵值。
pub fn never() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}
