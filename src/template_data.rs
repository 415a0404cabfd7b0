use chrono::{Datelike, Local};
use serde::Serialize;

use crate::error::Error;

/// Per-request view-model handed to every template.
///
/// Built by [`Application::new_template_data`](crate::Application::new_template_data);
/// pages that show a form attach it with [`TemplateData::set_form`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TemplateData {
    /// Year shown in the footer
    pub current_year: i32,
    /// One-time message popped from the session, empty if none
    pub flash: String,
    /// Whether the request comes from a signed-in user
    pub is_authenticated: bool,
    /// Anti-forgery token to embed in forms
    pub csrf_token: String,
    /// Submitted or default form values, `null` when the page has no form
    pub form: serde_json::Value,
}

impl TemplateData {
    /// Attaches a form to the view-model.
    pub fn set_form<F: Serialize>(&mut self, form: &F) -> Result<(), Error> {
        self.form = serde_json::to_value(form)?;
        Ok(())
    }
}

pub(crate) fn current_year() -> i32 {
    Local::now().year()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Serialize)]
    struct LoginForm {
        email: String,
    }

    #[test]
    fn serializes_with_snake_case_fields() {
        let data = TemplateData {
            current_year: 2024,
            flash: "Saved".to_string(),
            is_authenticated: true,
            csrf_token: "tok".to_string(),
            form: serde_json::Value::Null,
        };

        assert_eq!(
            serde_json::to_value(&data).unwrap(),
            json!({
                "current_year": 2024,
                "flash": "Saved",
                "is_authenticated": true,
                "csrf_token": "tok",
                "form": null,
            })
        );
    }

    #[test]
    fn set_form_embeds_values() {
        let mut data = TemplateData::default();
        data.set_form(&LoginForm {
            email: "alice@example.com".to_string(),
        })
        .unwrap();

        assert_eq!(data.form["email"], "alice@example.com");
    }

    #[test]
    fn current_year_is_plausible() {
        assert!(current_year() >= 2024);
    }
}
