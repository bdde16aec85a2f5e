use crate::error::ServiceError;
use coinfold_core::config::AuthConfig;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// JWT 载荷
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
    pub iss: String,
    pub aud: String,
}

/// # Summary
/// 访问令牌的签发与校验。
///
/// # Invariants
/// - 只接受 HS256 签名，其它算法一律拒绝。
/// - 签名密钥只存在于内存，进程重启后旧令牌全部失效。
/// - 过期判断没有宽限期。
pub struct TokenAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl_secs: u64,
}

impl TokenAuthority {
    /// 使用 32 字节随机密钥创建
    pub fn new(auth: &AuthConfig) -> Self {
        let key: [u8; 32] = rand::random();
        Self::from_secret(&key, auth)
    }

    /// 使用固定密钥创建，便于测试构造跨实例的令牌
    pub fn from_secret(secret: &[u8], auth: &AuthConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: auth.issuer.clone(),
            audience: auth.audience.clone(),
            ttl_secs: auth.token_ttl_secs,
        }
    }

    /// 为用户签发令牌
    pub fn issue(&self, username: &str) -> Result<String, ServiceError> {
        self.issue_at(username, jsonwebtoken::get_current_timestamp())
    }

    fn issue_at(&self, username: &str, iat: u64) -> Result<String, ServiceError> {
        let claims = Claims {
            sub: username.to_string(),
            iat,
            exp: iat.saturating_add(self.ttl_secs),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ServiceError::Internal(format!("failed to sign token: {}", e)))
    }

    /// # Summary
    /// 校验令牌签名、算法、签发方、受众与有效期。
    ///
    /// # Returns
    /// 令牌中的用户名。任何校验失败都返回 `ServiceError::Unauthorized`。
    pub fn verify(&self, token: &str) -> Result<String, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!("token rejected: {}", e);
            ServiceError::Unauthorized("invalid or expired token".to_string())
        })?;
        Ok(data.claims.sub)
    }
}
