use axum::Json;

/// 存活探测
#[utoipa::path(
    get,
    path = "/ping",
    tag = "系统 (System)",
    responses((status = 200, description = "服务存活", body = String))
)]
pub async fn ping() -> Json<&'static str> {
    Json("pong")
}
