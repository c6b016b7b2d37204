use super::http_errors::missing_token;
use super::http_types::ErrorBody;
use axum::http::{header, header::HeaderMap};

pub(super) fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
}

/// Resolve the caller's user id from the `Authorization` header.
pub(super) fn authenticate<F>(headers: &HeaderMap, validate: F) -> Result<String, ErrorBody>
where
    F: FnOnce(&str) -> Option<String>,
{
    extract_bearer_token(headers)
        .and_then(validate)
        .ok_or_else(missing_token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::http_types::ErrorCode;
    use axum::http::HeaderValue;

    #[test]
    fn extract_bearer_token_happy_path() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_bearer_token(&headers), Some("abc123"));
    }

    #[test]
    fn extract_bearer_token_rejects_missing_or_empty() {
        let headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        let mut headers2 = HeaderMap::new();
        headers2.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers2), None);
    }

    #[test]
    fn extract_bearer_token_rejects_wrong_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn authenticate_returns_validated_subject() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer good"));

        let user_id = authenticate(&headers, |t| (t == "good").then(|| "u1".to_string()));
        assert_eq!(user_id.unwrap(), "u1");
    }

    #[test]
    fn authenticate_rejects_invalid_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer forged"));

        let err = authenticate(&headers, |_| None).unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);
    }
}
