//! Middleware shared by every route.
//!
//! Layer order, outermost first:
//!
//! ```text
//! recover panic -> trace -> common headers -> session -> CSRF -> authenticate -> handler
//! ```

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use axum::{
    extract::{Request, State},
    http::{
        header::{
            CONNECTION, CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS, X_XSS_PROTECTION,
        },
        HeaderValue,
    },
    middleware::Next,
    response::Response,
};
use futures::FutureExt;
use tower_sessions::Session;
use tracing::warn;

use crate::{
    context::{RequestContext, IS_AUTHENTICATED},
    error::Error,
    request::RequestMeta,
    Application,
};

/// Session key holding the signed-in user's id.
pub const AUTHENTICATED_USER_ID: &str = "authenticated_user_id";

/// Marks the request context authenticated when the session holds a user id.
///
/// A session read failure is logged and treated as unauthenticated.
pub async fn authenticate(session: Session, mut request: Request, next: Next) -> Response {
    let user_id = match session.get::<i64>(AUTHENTICATED_USER_ID).await {
        Ok(user_id) => user_id,
        Err(err) => {
            warn!(error = %err, "failed to read authenticated user from session");
            None
        }
    };

    if user_id.is_some() {
        let context = request
            .extensions()
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default()
            .with_value(IS_AUTHENTICATED, true);
        request.extensions_mut().insert(context);
    }

    next.run(request).await
}

/// Adds the security headers sent with every response.
pub async fn common_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; style-src 'self' fonts.googleapis.com; font-src fonts.gstatic.com",
        ),
    );
    headers.insert(
        REFERRER_POLICY,
        HeaderValue::from_static("origin-when-cross-origin"),
    );
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("deny"));
    headers.insert(X_XSS_PROTECTION, HeaderValue::from_static("0"));

    response
}

/// Answers a panicking handler with a server error.
///
/// The panic message goes through [`Application::server_error`], so it is
/// logged with the request method, URI and a stack trace, and the debug body
/// carries the trace. The connection is closed after the response.
pub async fn recover_panic(
    State(app): State<Arc<Application>>,
    request: Request,
    next: Next,
) -> Response {
    let meta = RequestMeta::new(request.method().clone(), request.uri());

    let panic = match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => return response,
        Err(panic) => panic,
    };

    let err = Error::Panic(panic_message(&*panic));
    let mut response = app.server_error(&meta, &err);
    response
        .headers_mut()
        .insert(CONNECTION, HeaderValue::from_static("close"));

    response
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
