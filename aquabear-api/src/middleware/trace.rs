use axum::http::{Request, Uri};
use tracing::Span;

/// Query parameters that carry credentials and must never reach the logs.
const SECRET_PARAMS: &[&str] = &["access_token"];

/// Request span for `TraceLayer`, with credential query values redacted.
pub fn request_span<B>(req: &Request<B>) -> Span {
    tracing::debug_span!(
        "request",
        method = %req.method(),
        uri = %redacted_uri(req.uri()),
        version = ?req.version(),
    )
}

fn redacted_uri(uri: &Uri) -> String {
    let Some(query) = uri.query() else {
        return uri.path().to_string();
    };

    let pairs: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if SECRET_PARAMS.contains(&key) => format!("{key}=[redacted]"),
            _ => pair.to_string(),
        })
        .collect();
    format!("{}?{}", uri.path(), pairs.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_tokens_are_redacted() {
        let uri: Uri = "/v1/admin/stream?access_token=eyJhbGciOi.payload.sig"
            .parse()
            .unwrap();
        let logged = redacted_uri(&uri);
        assert_eq!(logged, "/v1/admin/stream?access_token=[redacted]");
        assert!(!logged.contains("eyJ"));
    }

    #[test]
    fn other_query_parameters_are_kept() {
        let uri: Uri = "/v1/admin/calendar?year=2026&month=10".parse().unwrap();
        assert_eq!(redacted_uri(&uri), "/v1/admin/calendar?year=2026&month=10");

        let uri: Uri = "/v1/admin/reservations".parse().unwrap();
        assert_eq!(redacted_uri(&uri), "/v1/admin/reservations");
    }
}
