//! POST form parsing and decoding.
//!
//! Parsing follows the usual browser-form rules: only
//! `application/x-www-form-urlencoded` bodies are read, other content types
//! produce an empty set of values. Bodies over [`MAX_FORM_SIZE`] are rejected,
//! as are `;` separators and malformed percent escapes.
//!
//! Decoding goes through `serde_urlencoded`, one value per key: when a key is
//! repeated, only its first value is decoded. Before decoding, the destination
//! type is probed: only types that deserialize from a map (structs, maps, and
//! self-describing values such as `serde_json::Value`) can receive form
//! fields. Anything else is reported as [`FormError::InvalidDecoder`], a
//! programmer error rather than bad input.
//!
//! Fields missing from the body are a decode error unless the destination
//! marks them `#[serde(default)]`.

use std::{collections::HashSet, fmt};

use axum::http::{header::CONTENT_TYPE, HeaderMap};
use serde::{
    de::{DeserializeOwned, Expected, Visitor},
    Deserializer,
};
use thiserror::Error;

/// Largest accepted form body, in bytes.
pub const MAX_FORM_SIZE: usize = 10 << 20;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Errors from parsing or decoding a form.
#[derive(Debug, Error)]
pub enum FormError {
    /// The body is larger than [`MAX_FORM_SIZE`].
    #[error("form body too large: {size} bytes exceeds the 10 MiB limit")]
    TooLarge {
        /// Size of the rejected body
        size: usize,
    },

    /// The request body could not be read.
    #[error("failed to read form body: {0}")]
    Body(String),

    /// The body uses `;` as a field separator.
    #[error("invalid semicolon separator in form body")]
    InvalidSemicolon,

    /// A `%` is not followed by two hex digits.
    #[error("invalid URL escape {0:?}")]
    InvalidEscape(String),

    /// The body could not be split into key/value pairs.
    #[error("malformed form body: {0}")]
    Malformed(#[source] serde_urlencoded::de::Error),

    /// Parsed values could not be re-encoded for decoding.
    #[error("failed to encode form values: {0}")]
    Encode(#[source] serde_urlencoded::ser::Error),

    /// The values did not fit the destination type.
    #[error(transparent)]
    Decode(#[from] serde_urlencoded::de::Error),

    /// The destination type cannot receive form fields at all.
    #[error(transparent)]
    InvalidDecoder(#[from] InvalidDecoderError),
}

/// The destination passed to a form decode is not a struct or map.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("form: invalid decode destination, expected a struct or map but found {found}")]
pub struct InvalidDecoderError {
    found: String,
}

impl InvalidDecoderError {
    /// Describes the rejected destination type.
    pub fn found(&self) -> &str {
        &self.found
    }
}

/// Parsed form fields, in body order. Repeated keys keep every value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormValues {
    pairs: Vec<(String, String)>,
}

impl FormValues {
    /// Returns the first value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns every value for `key`, in body order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the number of fields, counting repeats.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns `true` if there are no fields.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Returns all pairs in body order.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Returns the first value of every key, in body order.
    fn first_values(&self) -> Vec<(&str, &str)> {
        let mut seen = HashSet::new();
        self.pairs
            .iter()
            .filter(|(k, _)| seen.insert(k.as_str()))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    /// Decodes the values into `T`.
    ///
    /// A key repeated in the body decodes from its first value.
    ///
    /// # Errors
    ///
    /// - [`FormError::InvalidDecoder`] if `T` is not a struct or map
    /// - [`FormError::Decode`] with the `serde_urlencoded` error otherwise
    ///
    /// # Examples
    ///
    /// ```
    /// use serde::Deserialize;
    /// use snippetbox::form::{parse_form, FormError};
    ///
    /// #[derive(Deserialize)]
    /// struct Login {
    ///     email: String,
    /// }
    ///
    /// let values = parse_form(b"email=alice%40example.com").unwrap();
    /// let login: Login = values.decode().unwrap();
    /// assert_eq!(login.email, "alice@example.com");
    ///
    /// assert!(matches!(values.decode::<u32>(), Err(FormError::InvalidDecoder(_))));
    /// ```
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, FormError> {
        check_destination::<T>()?;

        let encoded =
            serde_urlencoded::to_string(self.first_values()).map_err(FormError::Encode)?;
        Ok(serde_urlencoded::from_str(&encoded)?)
    }
}

impl From<Vec<(String, String)>> for FormValues {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }
}

/// Parses a POST body according to its `Content-Type`.
///
/// Bodies of any type other than `application/x-www-form-urlencoded`
/// (including a missing type) yield empty values.
pub fn parse_post_form(headers: &HeaderMap, body: &[u8]) -> Result<FormValues, FormError> {
    if !is_urlencoded(headers) {
        return Ok(FormValues::default());
    }

    parse_form(body)
}

/// Parses an urlencoded body.
pub fn parse_form(body: &[u8]) -> Result<FormValues, FormError> {
    if body.len() > MAX_FORM_SIZE {
        return Err(FormError::TooLarge { size: body.len() });
    }

    validate_encoding(body)?;

    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_bytes(body).map_err(FormError::Malformed)?;

    Ok(FormValues::from(pairs))
}

/// Returns `true` if the request declares an urlencoded form body.
pub fn is_urlencoded(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_URLENCODED))
}

fn validate_encoding(body: &[u8]) -> Result<(), FormError> {
    for field in body.split(|&b| b == b'&') {
        if field.contains(&b';') {
            return Err(FormError::InvalidSemicolon);
        }

        let mut i = 0;
        while i < field.len() {
            if field[i] == b'%' {
                let escape = field.get(i + 1..i + 3);
                if !escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
                    let end = (i + 3).min(field.len());
                    return Err(FormError::InvalidEscape(
                        String::from_utf8_lossy(&field[i..end]).into_owned(),
                    ));
                }
                i += 3;
            } else {
                i += 1;
            }
        }
    }

    Ok(())
}

/// Checks that `T` deserializes from a map of fields.
pub fn check_destination<T: DeserializeOwned>() -> Result<(), InvalidDecoderError> {
    match T::deserialize(ShapeProbe) {
        Err(Probe::Accepted) => Ok(()),
        Err(Probe::Rejected(found)) => Err(InvalidDecoderError { found }),
        Ok(_) => Err(InvalidDecoderError {
            found: std::any::type_name::<T>().to_string(),
        }),
    }
}

// Deserializer that never yields data. It stops at the first request the
// destination makes and reports whether that request was for a map.
struct ShapeProbe;

#[derive(Debug)]
enum Probe {
    Accepted,
    Rejected(String),
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Probe::Accepted => f.write_str("destination accepts form fields"),
            Probe::Rejected(found) => f.write_str(found),
        }
    }
}

impl std::error::Error for Probe {}

impl serde::de::Error for Probe {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Probe::Rejected(msg.to_string())
    }
}

fn rejected(visitor: &dyn Expected) -> Probe {
    Probe::Rejected(visitor.to_string())
}

macro_rules! reject_shapes {
    ($($method:ident)*) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
                Err(rejected(&visitor))
            }
        )*
    };
}

impl<'de> Deserializer<'de> for ShapeProbe {
    type Error = Probe;

    // Self-describing destinations ask for "anything"; the form decoder
    // answers those with a map.
    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        Err(Probe::Accepted)
    }

    fn deserialize_map<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        Err(Probe::Accepted)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        Err(Probe::Accepted)
    }

    reject_shapes! {
        deserialize_bool deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64
        deserialize_i128 deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64
        deserialize_u128 deserialize_f32 deserialize_f64 deserialize_char deserialize_str
        deserialize_string deserialize_bytes deserialize_byte_buf deserialize_option
        deserialize_unit deserialize_seq deserialize_identifier deserialize_ignored_any
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        Err(rejected(&visitor))
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        Err(rejected(&visitor))
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        Err(rejected(&visitor))
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        Err(rejected(&visitor))
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        Err(rejected(&visitor))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::http::HeaderValue;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Snippet {
        title: String,
        expires: i64,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Wrapper(Snippet);

    fn urlencoded() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded; charset=utf-8"),
        );
        headers
    }

    #[test]
    fn parses_urlencoded_body() {
        let values = parse_post_form(&urlencoded(), b"title=O+snail&expires=7").unwrap();

        assert_eq!(values.get("title"), Some("O snail"));
        assert_eq!(values.get("expires"), Some("7"));
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn keeps_repeated_keys() {
        let values = parse_form(b"tag=a&tag=b&other=c").unwrap();

        assert_eq!(values.get_all("tag").collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(values.get("tag"), Some("a"));
    }

    #[test]
    fn other_content_types_yield_no_values() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let values = parse_post_form(&headers, br#"{"title":"x"}"#).unwrap();
        assert!(values.is_empty());

        let values = parse_post_form(&HeaderMap::new(), b"title=x").unwrap();
        assert!(values.is_empty());
    }

    #[test]
    fn rejects_semicolon_separator() {
        let err = parse_form(b"a=1;b=2").unwrap_err();
        assert!(matches!(err, FormError::InvalidSemicolon));
    }

    #[test]
    fn rejects_bad_escapes() {
        let err = parse_form(b"title=%zz").unwrap_err();
        assert!(matches!(err, FormError::InvalidEscape(ref e) if e == "%zz"));

        let err = parse_form(b"title=100%").unwrap_err();
        assert!(matches!(err, FormError::InvalidEscape(ref e) if e == "%"));
    }

    #[test]
    fn rejects_oversized_body() {
        let body = vec![b'a'; MAX_FORM_SIZE + 1];
        let err = parse_form(&body).unwrap_err();

        assert!(matches!(err, FormError::TooLarge { size } if size == MAX_FORM_SIZE + 1));
    }

    #[test]
    fn decodes_into_struct() {
        let values = parse_form(b"title=Hello&expires=365").unwrap();
        let snippet: Snippet = values.decode().unwrap();

        assert_eq!(
            snippet,
            Snippet {
                title: "Hello".to_string(),
                expires: 365
            }
        );
    }

    #[test]
    fn decodes_into_map() {
        let values = parse_form(b"title=Hello&expires=1").unwrap();

        let map: HashMap<String, String> = values.decode().unwrap();
        assert_eq!(map.get("expires").map(String::as_str), Some("1"));
    }

    #[test]
    fn decode_error_is_the_library_error() {
        let values = parse_form(b"title=Hello&expires=soon").unwrap();
        let expected = serde_urlencoded::from_str::<Snippet>("title=Hello&expires=soon")
            .unwrap_err()
            .to_string();

        let err = values.decode::<Snippet>().unwrap_err();
        assert!(matches!(err, FormError::Decode(_)));
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn scalar_and_sequence_destinations_are_invalid() {
        assert!(check_destination::<u32>().is_err());
        assert!(check_destination::<String>().is_err());
        assert!(check_destination::<Vec<String>>().is_err());
        assert!(check_destination::<Option<Snippet>>().is_err());
        assert!(check_destination::<()>().is_err());
        assert!(check_destination::<Wrapper>().is_err());
    }

    #[test]
    fn struct_and_map_destinations_are_valid() {
        assert!(check_destination::<Snippet>().is_ok());
        assert!(check_destination::<HashMap<String, String>>().is_ok());
        assert!(check_destination::<serde_json::Value>().is_ok());
    }

    #[test]
    fn decodes_into_self_describing_value() {
        let values = parse_form(b"title=Hello&expires=7").unwrap();

        let value: serde_json::Value = values.decode().unwrap();
        assert_eq!(value["title"], "Hello");
        assert_eq!(value["expires"], "7");
    }

    #[test]
    fn repeated_key_decodes_from_first_value() {
        let values = parse_form(b"title=first&expires=7&title=second").unwrap();

        let snippet: Snippet = values.decode().unwrap();
        assert_eq!(snippet.title, "first");
        assert_eq!(snippet.expires, 7);
        assert_eq!(values.get_all("title").count(), 2);
    }

    #[test]
    fn invalid_decoder_describes_destination() {
        let err = check_destination::<u32>().unwrap_err();
        assert!(err.found().contains("u32"));
        assert!(err.to_string().starts_with("form: invalid decode destination"));
    }
}
