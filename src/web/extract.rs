//! Request-scoped state handed to handlers.

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use crate::{context::RequestContext, csrf::CsrfToken, request::RequestMeta};

/// Everything a handler needs from the ambient request state.
///
/// Extracted from the request parts:
/// - `meta` from the request line
/// - `session` from the session layer (required)
/// - `context` from request extensions, empty if no middleware set one
/// - `csrf_token` from the CSRF layer, if installed
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use axum::{extract::State, http::StatusCode, response::Response};
/// use snippetbox::{web::RequestScope, Application};
///
/// async fn about(State(app): State<Arc<Application>>, scope: RequestScope) -> Response {
///     let data = app.new_template_data(&scope).await;
///     app.render(&scope.meta, StatusCode::OK, "about.tmpl", &data)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequestScope {
    /// Method and URI of the request
    pub meta: RequestMeta,
    /// Session attached by the session layer
    pub session: Session,
    /// Values recorded by middleware
    pub context: RequestContext,
    /// Token set by the CSRF layer
    pub csrf_token: Option<CsrfToken>,
}

impl<S> FromRequestParts<S> for RequestScope
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        Ok(Self {
            meta: RequestMeta::from(&*parts),
            session,
            context: parts
                .extensions
                .get::<RequestContext>()
                .cloned()
                .unwrap_or_default(),
            csrf_token: parts.extensions.get::<CsrfToken>().cloned(),
        })
    }
}
