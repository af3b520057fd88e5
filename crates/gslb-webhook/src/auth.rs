use crate::state::WebhookState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

/// Header carrying the shared secret
pub const SECRET_HEADER: &str = "X-Gslb-Secret";

pub async fn require_secret(
    State(state): State<WebhookState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let provided = extract_secret(&request).ok_or(StatusCode::UNAUTHORIZED)?;
    if !secrets_match(provided.as_bytes(), state.secret.as_bytes()) {
        tracing::warn!(path = %request.uri().path(), "rejected request with invalid secret");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(request).await)
}

fn extract_secret(request: &Request) -> Option<String> {
    request
        .headers()
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

pub fn secrets_match(provided: &[u8], expected: &[u8]) -> bool {
    !expected.is_empty() && bool::from(provided.ct_eq(expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match(b"secret-123", b"secret-123"));
        assert!(!secrets_match(b"secret-124", b"secret-123"));
        assert!(!secrets_match(b"secret", b"secret-123"));
        assert!(!secrets_match(b"", b""));
    }
}
