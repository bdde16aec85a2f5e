use serde::{Deserialize, Serialize};
use thiserror::Error;

/// bcrypt 允许的最低工作因子
pub const MIN_BCRYPT_COST: u32 = 14;

/// 全局应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
    pub update: UpdateConfig,
    pub venues: VenuesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// 账户文件所在目录
    pub dir: String,
}

/// 令牌与口令相关配置。签名密钥不在此处，每次进程启动时随机生成。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub issuer: String,
    pub audience: String,
    pub token_ttl_secs: u64,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// 两次更新之间的最小间隔
    pub min_interval_secs: u64,
    /// 触发限频后的休眠时长
    pub rate_limit_backoff_secs: u64,
    /// 单次更新中并发抓取的交易所上限
    pub max_parallel_exchanges: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VenuesConfig {
    pub binance_base_url: String,
    pub kucoin_base_url: String,
    pub request_timeout_secs: u64,
    pub recv_window_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: ".".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "coinfold".to_string(),
            audience: "coinfold-api".to_string(),
            token_ttl_secs: 3600,
            bcrypt_cost: MIN_BCRYPT_COST,
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: 60,
            rate_limit_backoff_secs: 60,
            max_parallel_exchanges: 4,
        }
    }
}

impl Default for VenuesConfig {
    fn default() -> Self {
        Self {
            binance_base_url: "https://api.binance.com".to_string(),
            kucoin_base_url: "https://api.kucoin.com".to_string(),
            request_timeout_secs: 30,
            recv_window_ms: 60_000,
        }
    }
}

/// 配置校验错误
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl AppConfig {
    /// # Summary
    /// 校验合并后的配置。
    ///
    /// # Logic
    /// 拒绝低于下限的 bcrypt 工作因子、为零的并发上限与为零的令牌有效期。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.bcrypt_cost < MIN_BCRYPT_COST {
            return Err(ConfigError::Invalid(format!(
                "auth.bcrypt_cost must be at least {MIN_BCRYPT_COST}, got {}",
                self.auth.bcrypt_cost
            )));
        }
        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "auth.token_ttl_secs must be positive".to_string(),
            ));
        }
        if self.update.max_parallel_exchanges == 0 {
            return Err(ConfigError::Invalid(
                "update.max_parallel_exchanges must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.store.dir, ".");
        assert_eq!(config.auth.token_ttl_secs, 3600);
        assert_eq!(config.update.min_interval_secs, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_weak_bcrypt_cost_rejected() {
        let mut config = AppConfig::default();
        config.auth.bcrypt_cost = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"server":{"port":9000}}"#).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.venues.recv_window_ms, 60_000);
    }
}
