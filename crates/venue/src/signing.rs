use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use coinfold_core::venue::error::VenueError;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn mac(secret: &str, payload: &str) -> Result<HmacSha256, VenueError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| VenueError::Unauthorized(format!("invalid HMAC secret: {e}")))?;
    mac.update(payload.as_bytes());
    Ok(mac)
}

/// HMAC-SHA256 签名，十六进制编码 (币安风格)
pub fn sign_hex(secret: &str, payload: &str) -> Result<String, VenueError> {
    Ok(hex::encode(mac(secret, payload)?.finalize().into_bytes()))
}

/// HMAC-SHA256 签名，base64 编码 (库币风格)
pub fn sign_base64(secret: &str, payload: &str) -> Result<String, VenueError> {
    Ok(STANDARD.encode(mac(secret, payload)?.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_hex_matches_published_vector() {
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            sign_hex(secret, query).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_sign_base64() {
        assert_eq!(
            sign_base64("secret", "1547015186532GET/api/v1/accounts").unwrap(),
            "NuBPof27U8jJqmz3/wPjAVghVEDFCErtJMhInkN1no4="
        );
        assert_eq!(
            sign_base64("secret", "phrase").unwrap(),
            "+n/mrTSNU7CrscsmDK22syRThdivpLcovw6amkVEEug="
        );
    }
}
