//! # `coinfold-api` - HTTP API 网关
//!
//! 使用 `axum` 构建路由与控制器，通过 `utoipa` 自动生成 OpenAPI 3.0 Swagger 文档。
//!
//! ## 架构职责
//! - 解析 Bearer 令牌，把会话注入请求上下文
//! - 调用 `coinfold-manager` 的账户服务与更新协调器
//! - 将服务层错误映射为 HTTP 状态码

pub mod error;
pub mod server;
pub mod types;

pub mod middleware {
    pub mod auth;
}

pub mod routes {
    pub mod account;
    pub mod auth;
    pub mod health;
    pub mod portfolio;
}
