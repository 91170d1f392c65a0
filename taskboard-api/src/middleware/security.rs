/// Security headers middleware
///
/// Stamps a fixed set of response headers on everything the router returns,
/// HTML dashboard and JSON alike:
///
/// - `X-Content-Type-Options: nosniff`
/// - `X-Frame-Options: DENY`
/// - `Referrer-Policy: strict-origin-when-cross-origin`
/// - `Content-Security-Policy`: same-origin only; inline styles are allowed
///   because the dashboard carries its stylesheet inline, and forms may only
///   post back to this origin
/// - `Strict-Transport-Security` (production only)
///
/// # Example
///
/// ```no_run
/// use axum::{middleware::from_fn_with_state, Router};
/// use taskboard_api::middleware::security::{security_headers, SecurityHeaders};
///
/// let app: Router = Router::new()
///     .layer(from_fn_with_state(SecurityHeaders::new(true), security_headers));
/// ```

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; style-src 'self' 'unsafe-inline'; \
     img-src 'self' data:; form-action 'self'; frame-ancestors 'none'; base-uri 'self'";

/// Headers applied to every response
const BASE_HEADERS: [(&str, &str); 4] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("content-security-policy", CONTENT_SECURITY_POLICY),
];

const HSTS: &str = "max-age=31536000; includeSubDomains";

/// Header policy; HSTS only when served behind HTTPS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityHeaders {
    hsts: bool,
}

impl SecurityHeaders {
    pub fn new(production: bool) -> Self {
        Self { hsts: production }
    }

    /// Writes the policy into `headers`, replacing existing values
    pub fn apply(&self, headers: &mut HeaderMap) {
        for (name, value) in BASE_HEADERS {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
        if self.hsts {
            headers.insert(
                header::STRICT_TRANSPORT_SECURITY,
                HeaderValue::from_static(HSTS),
            );
        }
    }
}

/// Middleware function for `axum::middleware::from_fn_with_state`
pub async fn security_headers(
    State(policy): State<SecurityHeaders>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    policy.apply(response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware::from_fn_with_state, routing::get, Router};
    use tower::Service as _;

    #[test]
    fn test_policy_headers() {
        let mut headers = HeaderMap::new();
        SecurityHeaders::new(false).apply(&mut headers);

        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
        assert_eq!(
            headers.get("referrer-policy").unwrap(),
            "strict-origin-when-cross-origin"
        );
        assert!(!headers.contains_key("strict-transport-security"));

        let csp = headers
            .get("content-security-policy")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(csp.contains("form-action 'self'"));
        assert!(csp.contains("style-src 'self' 'unsafe-inline'"));
    }

    #[test]
    fn test_hsts_in_production() {
        let mut headers = HeaderMap::new();
        SecurityHeaders::new(true).apply(&mut headers);
        assert!(headers.contains_key("strict-transport-security"));
    }

    #[tokio::test]
    async fn test_middleware_covers_unmatched_routes() {
        let mut app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn_with_state(SecurityHeaders::new(false), security_headers));

        let response = app
            .call(Request::builder().uri("/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), 404);
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
    }
}
