//! Response helpers shared by every handler.

use std::backtrace::Backtrace;

use axum::{
    http::{header::X_CONTENT_TYPE_OPTIONS, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    context::{self, RequestContext},
    error::Error,
    flash::{pop_string, FLASH_KEY},
    form::{self, FormError},
    request::RequestMeta,
    template_data::{current_year, TemplateData},
    templates::{TemplateCache, BASE_TEMPLATE},
    web::RequestScope,
};

/// Application-wide dependencies of the handlers.
///
/// Built once at startup and shared as `Arc<Application>`; nothing in it
/// changes after construction.
#[derive(Debug)]
pub struct Application {
    debug: bool,
    template_cache: TemplateCache,
}

impl Application {
    /// Creates the application state.
    ///
    /// In debug mode, server error responses include the error text and a
    /// stack trace.
    pub fn new(debug: bool, template_cache: TemplateCache) -> Self {
        Self {
            debug,
            template_cache,
        }
    }

    /// Logs `err` with the request method, URI and a stack trace, then
    /// answers 500 Internal Server Error.
    ///
    /// The body is the generic status text unless debug mode is on, in which
    /// case it is the error followed by the trace.
    pub fn server_error(&self, meta: &RequestMeta, err: &dyn std::error::Error) -> Response {
        let trace = Backtrace::force_capture();
        meta.log().error_with_trace(err, &trace);

        let status = StatusCode::INTERNAL_SERVER_ERROR;
        if self.debug {
            return plain_error(status, &format!("{err}\n{trace}"));
        }

        plain_error(status, status_text(status))
    }

    /// Answers `status` with its standard text as body.
    pub fn client_error(&self, status: StatusCode) -> Response {
        plain_error(status, status_text(status))
    }

    /// Answers 404 Not Found.
    pub fn not_found(&self) -> Response {
        self.client_error(StatusCode::NOT_FOUND)
    }

    /// Renders `page` with `data` and answers `status`.
    ///
    /// The page's `base` entry point is rendered into a buffer first; only a
    /// fully rendered page is written. A missing page or a rendering failure
    /// goes to [`server_error`](Self::server_error) instead.
    pub fn render<D: Serialize>(
        &self,
        meta: &RequestMeta,
        status: StatusCode,
        page: &str,
        data: &D,
    ) -> Response {
        let Some(registry) = self.template_cache.get(page) else {
            return self.server_error(meta, &Error::TemplateNotFound(page.to_string()));
        };

        match registry.render(BASE_TEMPLATE, data) {
            Ok(buf) => (status, Html(buf)).into_response(),
            Err(err) => self.server_error(meta, &Error::TemplateRender(err)),
        }
    }

    /// Builds the view-model for the current request.
    ///
    /// The flash message is popped from the session, so a later call in the
    /// same request sees it cleared.
    pub async fn new_template_data(&self, scope: &RequestScope) -> TemplateData {
        TemplateData {
            current_year: current_year(),
            flash: pop_string(&scope.session, FLASH_KEY).await,
            is_authenticated: self.is_authenticated(&scope.context),
            csrf_token: scope
                .csrf_token
                .as_ref()
                .map(|token| token.as_str().to_string())
                .unwrap_or_default(),
            form: serde_json::Value::Null,
        }
    }

    /// Parses the POST form in `body` and decodes it into `T`.
    ///
    /// Parse and decode errors are returned unchanged.
    ///
    /// # Panics
    ///
    /// Panics if `T` cannot receive form fields at all (it is not a struct or
    /// map). That is a bug in the calling handler, not bad input.
    pub fn decode_post_form<T: DeserializeOwned>(
        &self,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<T, FormError> {
        let values = form::parse_post_form(headers, body)?;

        match values.decode::<T>() {
            Err(FormError::InvalidDecoder(err)) => panic!("{err}"),
            result => result,
        }
    }

    /// Returns `true` if the request context marks the user as authenticated.
    pub fn is_authenticated(&self, ctx: &RequestContext) -> bool {
        context::is_authenticated(ctx)
    }
}

/// Standard reason phrase for `status`, empty for unknown codes.
pub fn status_text(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("")
}

/// Plain-text error response: `body` plus a newline, not sniffable.
pub fn plain_error(status: StatusCode, body: &str) -> Response {
    (
        status,
        [(X_CONTENT_TYPE_OPTIONS, "nosniff")],
        format!("{body}\n"),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::{body::to_bytes, http::header::CONTENT_TYPE};

    use super::*;

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn status_text_uses_canonical_reason() {
        assert_eq!(status_text(StatusCode::NOT_FOUND), "Not Found");
        assert_eq!(status_text(StatusCode::BAD_REQUEST), "Bad Request");
        assert_eq!(status_text(StatusCode::from_u16(499).unwrap()), "");
    }

    #[tokio::test]
    async fn plain_error_sets_headers_and_trailing_newline() {
        let response = plain_error(StatusCode::FORBIDDEN, "Forbidden");

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(response.headers()[X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(body_string(response).await, "Forbidden\n");
    }
}
