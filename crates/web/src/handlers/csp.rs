use axum::{
    extract::Request,
    http::{HeaderValue, header::CONTENT_TYPE},
    middleware::Next,
    response::Response,
};

/// Static security headers. The pages ship no scripts, so the policy locks
/// script execution out entirely; styles and images come from this origin.
pub async fn csp_middleware(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if content_type.starts_with("text/html") {
        let response_headers = response.headers_mut();
        response_headers.insert(
            "Content-Security-Policy",
            HeaderValue::from_static(
                "default-src 'none';base-uri 'none';style-src 'self';img-src 'self' data:;form-action 'self'",
            ),
        );
        response_headers
            .insert("Referrer-Policy", HeaderValue::from_static("strict-origin-when-cross-origin"));
        response_headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    }
    let response_headers = response.headers_mut();
    response_headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    response
}
