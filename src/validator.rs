//! Form validation.
//!
//! A [`Validator`] collects error messages keyed by form field. It is usually
//! embedded in a form struct (skipped during decoding) so that the messages are
//! serialized into template data alongside the submitted values.

use std::collections::BTreeMap;

use serde::Serialize;

/// Collected validation errors.
///
/// # Examples
///
/// ```
/// use snippetbox::validator::{max_chars, not_blank, Validator};
///
/// let mut v = Validator::default();
/// v.check_field(not_blank("  "), "title", "This field cannot be blank");
/// v.check_field(max_chars("ok", 100), "title", "too long");
///
/// assert!(!v.valid());
/// assert_eq!(v.field_errors["title"], "This field cannot be blank");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Validator {
    /// First error per field
    pub field_errors: BTreeMap<String, String>,
    /// Errors not tied to a single field
    pub non_field_errors: Vec<String>,
}

impl Validator {
    /// Returns `true` if no error has been recorded.
    pub fn valid(&self) -> bool {
        self.field_errors.is_empty() && self.non_field_errors.is_empty()
    }

    /// Records `message` for `key` unless the field already has an error.
    pub fn add_field_error(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.field_errors
            .entry(key.into())
            .or_insert_with(|| message.into());
    }

    /// Records an error not tied to a field.
    pub fn add_non_field_error(&mut self, message: impl Into<String>) {
        self.non_field_errors.push(message.into());
    }

    /// Records `message` for `key` if `ok` is false.
    pub fn check_field(&mut self, ok: bool, key: &str, message: &str) {
        if !ok {
            self.add_field_error(key, message);
        }
    }
}

/// Returns `true` if `value` has any non-whitespace character.
pub fn not_blank(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Returns `true` if `value` has at most `n` characters.
pub fn max_chars(value: &str, n: usize) -> bool {
    value.chars().count() <= n
}

/// Returns `true` if `value` is one of `permitted`.
pub fn permitted_value<T: PartialEq>(value: &T, permitted: &[T]) -> bool {
    permitted.contains(value)
}
