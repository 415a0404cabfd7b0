//! Cross-site request forgery protection.
//!
//! Each session holds one random token. [`csrf_protect`] makes sure the token
//! exists, exposes it to handlers as a [`CsrfToken`] request extension, and on
//! unsafe methods compares it in constant time against the token submitted in
//! the `X-CSRF-Token` header or the `csrf_token` form field.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use subtle::ConstantTimeEq;
use tower_sessions::Session;

use crate::{
    form::{self, FormError, MAX_FORM_SIZE},
    request::RequestMeta,
    Application,
};

/// Session key holding the token.
pub const CSRF_SESSION_KEY: &str = "csrf_token";

/// Form field carrying the submitted token.
pub const CSRF_FORM_FIELD: &str = "csrf_token";

/// Header carrying the submitted token.
pub const CSRF_HEADER: &str = "x-csrf-token";

const TOKEN_BYTES: usize = 32;

/// The current session's token, inserted into request extensions by
/// [`csrf_protect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken(String);

impl CsrfToken {
    /// Wraps an existing token value.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token for embedding in forms.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Generates a fresh random token, URL-safe base64 without padding.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compares two tokens in constant time.
pub fn tokens_match(expected: &str, submitted: &str) -> bool {
    expected.as_bytes().ct_eq(submitted.as_bytes()).into()
}

/// Returns `true` for methods that must carry a valid token.
pub fn requires_token(method: &Method) -> bool {
    !matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

/// Middleware enforcing the token check.
///
/// Failed checks answer 400 Bad Request. Session failures answer 500.
pub async fn csrf_protect(
    State(app): State<Arc<Application>>,
    session: Session,
    request: Request,
    next: Next,
) -> Response {
    let meta = RequestMeta::new(request.method().clone(), request.uri());

    let token = match session_token(&session).await {
        Ok(token) => token,
        Err(err) => return app.server_error(&meta, &err),
    };

    let mut request = if requires_token(request.method()) {
        let (parts, body) = request.into_parts();
        let bytes = match to_bytes(body, MAX_FORM_SIZE).await {
            Ok(bytes) => bytes,
            Err(err) => {
                meta.log()
                    .warn(format_args!("{}", FormError::Body(err.to_string())));
                return app.client_error(StatusCode::BAD_REQUEST);
            }
        };

        let submitted = submitted_token(&parts.headers, &bytes);
        if !submitted.is_some_and(|submitted| tokens_match(&token, &submitted)) {
            meta.log().warn(format_args!("CSRF token missing or invalid"));
            return app.client_error(StatusCode::BAD_REQUEST);
        }

        Request::from_parts(parts, Body::from(bytes))
    } else {
        request
    };

    request.extensions_mut().insert(CsrfToken(token));
    next.run(request).await
}

async fn session_token(session: &Session) -> Result<String, tower_sessions::session::Error> {
    if let Some(token) = session.get::<String>(CSRF_SESSION_KEY).await? {
        return Ok(token);
    }

    let token = generate_token();
    session.insert(CSRF_SESSION_KEY, &token).await?;
    Ok(token)
}

fn submitted_token(headers: &HeaderMap, body: &[u8]) -> Option<String> {
    if let Some(value) = headers.get(CSRF_HEADER) {
        return value.to_str().ok().map(str::to_string);
    }

    form::parse_post_form(headers, body)
        .ok()?
        .get(CSRF_FORM_FIELD)
        .map(str::to_string)
}
