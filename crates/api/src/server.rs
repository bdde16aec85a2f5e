//! # API 服务启动器
//!
//! 组装 axum 路由、挂载 Swagger UI、配置 CORS 与请求追踪，并绑定 TCP 端口对外提供服务。
//! 本模块不直接启动 `main()`，而是由 `crates/app` 组装依赖后调用。

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use coinfold_manager::{AccountService, UpdateCoordinator};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use utoipa_swagger_ui::SwaggerUi;

use crate::routes::{account, auth, health, portfolio};

// ============================================================
//  共享应用状态
// ============================================================

/// 全局应用状态，通过 axum 的 `State` 提取器注入到每个 Handler 中。
#[derive(Clone)]
pub struct AppState {
    /// 注册、登录、令牌解析与交易所绑定
    pub accounts: Arc<AccountService>,
    /// 限频与后台聚合
    pub updates: Arc<UpdateCoordinator>,
}

// ============================================================
//  OpenAPI 文档定义
// ============================================================

#[derive(OpenApi)]
#[openapi(
    info(
        title = "coinfold API",
        version = "0.1.0",
        description = "个人加密资产组合聚合服务。汇总多个交易所的余额、成交成本与分发收益。"
    ),
    tags(
        (name = "鉴权 (Auth)", description = "注册与登录"),
        (name = "账户 (Account)", description = "账户删除与交易所绑定"),
        (name = "组合 (Portfolio)", description = "组合查询与更新"),
        (name = "系统 (System)", description = "存活探测")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// 为 OpenAPI 文档注入全局 Bearer JWT 鉴权方案
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_jwt",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .description(Some("注册或登录接口返回的令牌 (无需 'Bearer ' 前缀)"))
                    .build(),
            ),
        );
    }
}

// ============================================================
//  服务构建与启动
// ============================================================

/// # Summary
/// 构建完整的 axum 应用路由树。
///
/// # Logic
/// 1. 公开路由：注册、登录、存活探测。
/// 2. 受保护路由：挂载鉴权中间件。
/// 3. 合并 OpenAPI 文档与 Swagger UI，套上 CORS 与请求追踪。
pub fn app_router(state: AppState) -> Router {
    let public_router = OpenApiRouter::new()
        .routes(routes!(auth::signup))
        .routes(routes!(auth::login))
        .routes(routes!(health::ping));

    let protected_router = OpenApiRouter::new()
        .routes(routes!(account::delete_account))
        .routes(routes!(account::link))
        .routes(routes!(account::unlink))
        .routes(routes!(portfolio::latest))
        .routes(routes!(portfolio::update))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::auth::auth_middleware,
        ));

    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .merge(public_router)
        .merge(protected_router)
        .with_state(state)
        .split_for_parts();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// # Summary
/// 在已绑定的监听器上提供服务，直到 `shutdown` 完成。
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = app_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// # Summary
/// 绑定地址并启动服务。
///
/// # Arguments
/// * `state` - 共享状态。
/// * `bind_addr` - 监听地址，如 `"0.0.0.0:8080"`。
/// * `shutdown` - 完成时开始优雅停机。
pub async fn start_server(
    state: AppState,
    bind_addr: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("coinfold API listening on {}", bind_addr);
    tracing::info!("Swagger UI: http://{}/swagger-ui/", bind_addr);
    serve(listener, state, shutdown).await
}
