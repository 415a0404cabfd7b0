//! Demonstration handlers.
//!
//! These routes exercise the helper layer end to end: rendering, flash
//! messages, CSRF tokens, form decoding and validation. Snippets are not
//! stored; a valid submission only sets a flash message and redirects.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};

use crate::{
    flash::put_flash,
    validator::{max_chars, not_blank, permitted_value, Validator},
    Application,
};

use super::{middleware::AUTHENTICATED_USER_ID, RequestScope};

/// Expiry choices offered by the create form, in days.
pub const EXPIRY_DAYS: [i64; 3] = [1, 7, 365];

/// Fields of the snippet creation form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnippetCreateForm {
    /// Snippet title
    pub title: String,
    /// Snippet body
    pub content: String,
    /// Days until expiry
    pub expires: i64,
    /// Validation results, never read from the request
    #[serde(skip_deserializing)]
    pub validator: Validator,
}

impl Default for SnippetCreateForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            content: String::new(),
            expires: 365,
            validator: Validator::default(),
        }
    }
}

impl SnippetCreateForm {
    /// Runs the field checks, recording failures in `validator`.
    pub fn validate(&mut self) {
        self.validator.check_field(
            not_blank(&self.title),
            "title",
            "This field cannot be blank",
        );
        self.validator.check_field(
            max_chars(&self.title, 100),
            "title",
            "This field cannot be more than 100 characters long",
        );
        self.validator.check_field(
            not_blank(&self.content),
            "content",
            "This field cannot be blank",
        );
        self.validator.check_field(
            permitted_value(&self.expires, &EXPIRY_DAYS),
            "expires",
            "This field must equal 1, 7 or 365",
        );
    }
}

/// `GET /`
pub async fn home(State(app): State<Arc<Application>>, scope: RequestScope) -> Response {
    let data = app.new_template_data(&scope).await;
    app.render(&scope.meta, StatusCode::OK, "home.tmpl", &data)
}

/// `GET /ping`
pub async fn ping() -> &'static str {
    "OK"
}

/// `GET /snippet/create`
pub async fn snippet_create(State(app): State<Arc<Application>>, scope: RequestScope) -> Response {
    let mut data = app.new_template_data(&scope).await;
    if let Err(err) = data.set_form(&SnippetCreateForm::default()) {
        return app.server_error(&scope.meta, &err);
    }

    app.render(&scope.meta, StatusCode::OK, "create.tmpl", &data)
}

/// `POST /snippet/create`
///
/// Undecodable bodies answer 400. Invalid values re-render the form with 422.
pub async fn snippet_create_post(
    State(app): State<Arc<Application>>,
    scope: RequestScope,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut form: SnippetCreateForm = match app.decode_post_form(&headers, &body) {
        Ok(form) => form,
        Err(err) => {
            scope.meta.log().info(format_args!("rejected form: {err}"));
            return app.client_error(StatusCode::BAD_REQUEST);
        }
    };

    form.validate();
    if !form.validator.valid() {
        let mut data = app.new_template_data(&scope).await;
        if let Err(err) = data.set_form(&form) {
            return app.server_error(&scope.meta, &err);
        }
        return app.render(
            &scope.meta,
            StatusCode::UNPROCESSABLE_ENTITY,
            "create.tmpl",
            &data,
        );
    }

    if let Err(err) = put_flash(&scope.session, "Snippet successfully created!").await {
        return app.server_error(&scope.meta, &err);
    }

    Redirect::to("/").into_response()
}

/// `POST /user/logout`
pub async fn user_logout_post(State(app): State<Arc<Application>>, scope: RequestScope) -> Response {
    let session = &scope.session;

    if let Err(err) = session.cycle_id().await {
        return app.server_error(&scope.meta, &err);
    }
    if let Err(err) = session.remove::<i64>(AUTHENTICATED_USER_ID).await {
        return app.server_error(&scope.meta, &err);
    }
    if let Err(err) = put_flash(session, "You've been logged out successfully!").await {
        return app.server_error(&scope.meta, &err);
    }

    Redirect::to("/").into_response()
}

/// Fallback for unmatched routes.
pub async fn not_found(State(app): State<Arc<Application>>) -> Response {
    app.not_found()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(title: &str, content: &str, expires: i64) -> SnippetCreateForm {
        SnippetCreateForm {
            title: title.to_string(),
            content: content.to_string(),
            expires,
            validator: Validator::default(),
        }
    }

    #[test]
    fn valid_form_has_no_errors() {
        let mut f = form("O snail", "Climb Mount Fuji", 7);
        f.validate();

        assert!(f.validator.valid());
    }

    #[test]
    fn blank_fields_are_reported() {
        let mut f = form("  ", "", 7);
        f.validate();

        assert_eq!(f.validator.field_errors["title"], "This field cannot be blank");
        assert_eq!(f.validator.field_errors["content"], "This field cannot be blank");
        assert!(!f.validator.field_errors.contains_key("expires"));
    }

    #[test]
    fn long_title_and_bad_expiry_are_reported() {
        let mut f = form(&"x".repeat(101), "body", 30);
        f.validate();

        assert_eq!(
            f.validator.field_errors["title"],
            "This field cannot be more than 100 characters long"
        );
        assert_eq!(
            f.validator.field_errors["expires"],
            "This field must equal 1, 7 or 365"
        );
    }

    #[test]
    fn default_form_expires_in_a_year() {
        assert_eq!(SnippetCreateForm::default().expires, 365);
    }
}
