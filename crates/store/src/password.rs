use coinfold_core::store::error::StoreError;

/// # Summary
/// 生成口令校验值。
///
/// # Logic
/// bcrypt 自带随机盐，计算量随 `cost` 指数增长，因此放到阻塞线程池中执行。
///
/// # Arguments
/// * `password` - 明文口令。
/// * `cost` - bcrypt 工作因子。
pub async fn hash_password(password: &str, cost: u32) -> Result<String, StoreError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| StoreError::Hash(e.to_string()))?
        .map_err(|e| StoreError::Hash(e.to_string()))
}

/// 校验口令。校验值损坏时返回错误而不是 `false`。
pub async fn verify_password(password: &str, verifier: &str) -> Result<bool, StoreError> {
    let password = password.to_string();
    let verifier = verifier.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &verifier))
        .await
        .map_err(|e| StoreError::Hash(e.to_string()))?
        .map_err(|e| StoreError::Hash(e.to_string()))
}
