use crate::binance::adapter::BinanceAdapter;
use crate::binance::client::BinanceClient;
use crate::kucoin::adapter::KucoinAdapter;
use crate::kucoin::client::KucoinClient;
use coinfold_core::common::time::TimeProvider;
use coinfold_core::config::VenuesConfig;
use coinfold_core::venue::entity::{Credentials, VenueKind};
use coinfold_core::venue::error::VenueError;
use coinfold_core::venue::port::{AdapterFactory, ExchangeAdapter};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// # Summary
/// 生产环境的适配器工厂，所有适配器共享同一个 HTTP 连接池。
pub struct HttpAdapterFactory {
    client: Client,
    config: VenuesConfig,
    backoff: Duration,
    clock: Arc<dyn TimeProvider>,
}

impl HttpAdapterFactory {
    /// # Summary
    /// 创建工厂并初始化 HTTP 客户端。
    ///
    /// # Arguments
    /// * `config`: 交易所地址与超时配置。
    /// * `backoff`: 限频休眠时长。
    /// * `clock`: 时间窗口使用的时钟。
    pub fn new(
        config: VenuesConfig,
        backoff: Duration,
        clock: Arc<dyn TimeProvider>,
    ) -> Result<Self, VenueError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("coinfold/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| VenueError::Transient(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            backoff,
            clock,
        })
    }
}

impl AdapterFactory for HttpAdapterFactory {
    fn build(
        &self,
        kind: VenueKind,
        credentials: &Credentials,
    ) -> Result<Arc<dyn ExchangeAdapter>, VenueError> {
        let adapter: Arc<dyn ExchangeAdapter> = match kind {
            VenueKind::Binance => {
                let api = BinanceClient::new(
                    self.client.clone(),
                    &self.config.binance_base_url,
                    credentials.clone(),
                    self.config.recv_window_ms,
                );
                Arc::new(BinanceAdapter::new(Arc::new(api), self.backoff))
            }
            VenueKind::Kucoin => {
                let api = KucoinClient::new(
                    self.client.clone(),
                    &self.config.kucoin_base_url,
                    credentials.clone(),
                );
                Arc::new(KucoinAdapter::new(
                    Arc::new(api),
                    self.clock.clone(),
                    self.backoff,
                ))
            }
        };
        Ok(adapter)
    }
}
