/// Caller context extraction
///
/// Builds the `CallerContext` policy checks run against: peer address from
/// the connection, raw API key from `Authorization`, and `Referer` for the
/// audit trail.
use crate::{error::LarkmError, policy::CallerContext};
use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use std::net::SocketAddr;

/// API key from the `Authorization` header, with any `Bearer ` prefix removed
pub fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(|value| value.strip_prefix("Bearer ").unwrap_or(value).trim())
        .filter(|key| !key.is_empty())
        .map(str::to_string)
}

fn extract_referer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::REFERER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = LarkmError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Also honours a `MockConnectInfo` layer
        let ConnectInfo(addr) = ConnectInfo::<SocketAddr>::from_request_parts(parts, state)
            .await
            .map_err(|_| LarkmError::Internal("Peer address unavailable".to_string()))?;

        Ok(CallerContext {
            ip: addr.ip(),
            api_key: extract_api_key(&parts.headers),
            referer: extract_referer(&parts.headers),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::connect_info::MockConnectInfo, http::HeaderValue};

    #[test]
    fn test_extract_api_key() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_api_key(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("myapikey"));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("myapikey"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer myapikey"));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("myapikey"));
    }

    #[tokio::test]
    async fn test_caller_from_parts() {
        let request = axum::http::Request::builder()
            .uri("/larkm")
            .header(header::AUTHORIZATION, "myapikey")
            .header(header::REFERER, "https://library.example.com/")
            .extension(ConnectInfo(SocketAddr::from(([10, 0, 0, 5], 4711))))
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let caller = CallerContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(caller.ip.to_string(), "10.0.0.5");
        assert_eq!(caller.api_key.as_deref(), Some("myapikey"));
        assert_eq!(caller.referer.as_deref(), Some("https://library.example.com/"));
    }

    #[tokio::test]
    async fn test_caller_from_mock_connect_info() {
        let request = axum::http::Request::builder()
            .uri("/larkm")
            .extension(MockConnectInfo(SocketAddr::from(([192, 168, 1, 20], 45678))))
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let caller = CallerContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(caller.ip.to_string(), "192.168.1.20");
        assert_eq!(caller.api_key, None);
    }

    #[tokio::test]
    async fn test_missing_peer_address_rejected() {
        let request = axum::http::Request::builder().uri("/").body(()).unwrap();
        let (mut parts, _) = request.into_parts();

        let err = CallerContext::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert!(matches!(err, LarkmError::Internal(_)));
    }
}
