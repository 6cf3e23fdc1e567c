use std::{convert::Infallible, time::Instant};

use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, header, request::Parts},
    response::{IntoResponseParts, ResponseParts},
};
use maud::{Markup, html};

/// Per-request template state. Every page renders live API state, so pages
/// returned with the context are marked `Cache-Control: no-store`.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext {
    start: Instant,
}

impl<S> FromRequestParts<S> for TemplateContext
where S: Send + Sync
{
    type Rejection = Infallible;

    async fn from_request_parts(_parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self { start: Instant::now() })
    }
}

impl IntoResponseParts for TemplateContext {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        res.headers_mut().insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        Ok(res)
    }
}

impl TemplateContext {
    pub fn header(&self) -> Markup {
        html! {
            meta name="viewport" content="width=device-width, initial-scale=1.0";
            meta name="color-scheme" content="dark light";
            link rel="stylesheet" href="/static/style.css";
        }
    }

    pub fn footer(&self) -> Markup {
        let elapsed = self.start.elapsed();
        html! {
            footer {
                small class="muted" { "Generated in " (elapsed.as_millis()) "ms" }
            }
        }
    }
}
