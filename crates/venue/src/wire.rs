use coinfold_core::venue::error::VenueError;
use reqwest::{Response, StatusCode};

/// 交易所以字符串下发的数值字段
pub fn parse_decimal(field: &str, value: &str) -> Result<f64, VenueError> {
    let parsed: f64 = value
        .trim()
        .parse()
        .map_err(|_| VenueError::Parse(format!("{field}: invalid number {value:?}")))?;
    if !parsed.is_finite() {
        return Err(VenueError::Parse(format!("{field}: non-finite number {value:?}")));
    }
    Ok(parsed)
}

/// 网络层错误一律视为临时错误
pub fn transport_error(err: reqwest::Error) -> VenueError {
    if err.is_timeout() {
        VenueError::Transient(format!("request timed out: {err}"))
    } else {
        VenueError::Transient(err.to_string())
    }
}

/// 读取响应的状态码与正文
pub async fn read_body(resp: Response) -> Result<(StatusCode, String), VenueError> {
    let status = resp.status();
    let body = resp.text().await.map_err(transport_error)?;
    Ok((status, body))
}
