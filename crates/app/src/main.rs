mod settings;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use coinfold_api::server::{AppState, start_server};
use coinfold_core::common::install_crypto_provider;
use coinfold_core::common::time::{RealTimeProvider, TimeProvider};
use coinfold_engine::Aggregator;
use coinfold_manager::{AccountService, TokenAuthority, UpdateCoordinator};
use coinfold_store::FileAccountStore;
use coinfold_venue::HttpAdapterFactory;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// 初始化全局日志。返回的守卫必须存活到进程退出，否则缓冲中的日志会丢失。
fn init_logging(verbose: bool) -> WorkerGuard {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .init();
    guard
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received. Exiting...");
}

/// # Summary
/// 应用启动入口，纯粹的 DI 容器。
///
/// # Logic
/// 1. 解析命令行并合并配置，初始化日志。
/// 2. 实例化基础设施层 (账户存储、交易所适配器工厂)。
/// 3. 构造聚合引擎与应用服务层。
/// 4. 启动 HTTP 服务，收到 Ctrl-C 后优雅退出。
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = settings::Args::parse();
    let _log_guard = init_logging(args.verbose);
    let cfg = settings::load(&args)?;
    info!(store = %cfg.store.dir, "coinfold starting...");

    install_crypto_provider();

    // 基础设施层
    let store = Arc::new(FileAccountStore::new(&cfg.store.dir)?);
    let clock: Arc<dyn TimeProvider> = Arc::new(RealTimeProvider);
    let factory = Arc::new(HttpAdapterFactory::new(
        cfg.venues.clone(),
        Duration::from_secs(cfg.update.rate_limit_backoff_secs),
        clock.clone(),
    )?);

    // 领域与应用服务层
    let aggregator = Arc::new(Aggregator::new(
        store.clone(),
        factory,
        clock.clone(),
        cfg.update.max_parallel_exchanges,
    ));
    let tokens = Arc::new(TokenAuthority::new(&cfg.auth));
    let accounts = Arc::new(AccountService::new(
        store.clone(),
        tokens,
        cfg.auth.bcrypt_cost,
    ));
    let min_interval = i64::try_from(cfg.update.min_interval_secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX);
    let updates = Arc::new(UpdateCoordinator::new(store, aggregator, clock, min_interval));

    let bind_addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    start_server(AppState { accounts, updates }, &bind_addr, shutdown_signal()).await?;

    info!("coinfold stopped");
    Ok(())
}
