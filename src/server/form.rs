//! Form body decoding for `application/x-www-form-urlencoded` and
//! `multipart/form-data` payloads.

use std::io;

use bytes::Bytes;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::HttpError;

pub const CONTENT_TYPE_FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const CONTENT_TYPE_MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// Media types accepted by [`FormData`] parsing.
pub const FORM_CONTENT_TYPES: [&str; 2] =
    [CONTENT_TYPE_MULTIPART_FORM_DATA, CONTENT_TYPE_FORM_URLENCODED];

/// RFC 2046 caps boundaries at 70 characters.
const MAX_BOUNDARY_LENGTH: usize = 70;

/// A single submitted form value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File {
        filename: String,
        content_type: Option<String>,
        data: Vec<u8>,
    },
}

impl FormValue {
    /// Text view; files yield their filename.
    #[must_use]
    pub fn as_text(&self) -> &str {
        match self {
            FormValue::Text(t) => t,
            FormValue::File { filename, .. } => filename,
        }
    }
}

/// Decoded form fields in submission order. Names may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    fields: Vec<(String, FormValue)>,
}

impl FormData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: FormValue) {
        self.fields.push((name.into(), value));
    }

    /// Distinct field names in first-seen order.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::with_capacity(self.fields.len());
        for (name, _) in &self.fields {
            if !keys.contains(&name.as_str()) {
                keys.push(name);
            }
        }
        keys
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// First value of `name` as text.
    #[must_use]
    pub fn get_first(&self, name: &str) -> Option<&str> {
        self.get(name).map(FormValue::as_text)
    }

    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&FormValue> {
        self.fields
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// JSON object of `name -> first value`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for name in self.keys() {
            if let Some(value) = self.get_first(name) {
                map.insert(name.to_string(), Value::String(value.to_string()));
            }
        }
        Value::Object(map)
    }
}

/// Parse `a=1&b=2` strictly: every field must be non-empty and contain `=`.
///
/// # Errors
///
/// `400 Bad Request` for malformed fields.
pub fn parse_urlencoded_strict(input: &str) -> Result<Vec<(String, String)>, HttpError> {
    if input.is_empty() {
        return Ok(Vec::new());
    }
    let mut pairs = Vec::new();
    for field in input.split('&') {
        if field.is_empty() || !field.contains('=') {
            return Err(HttpError::bad_request_because(format!(
                "bad query field: {field:?}"
            )));
        }
        pairs.extend(
            url::form_urlencoded::parse(field.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned())),
        );
    }
    Ok(pairs)
}

/// Decode an URL-encoded form body.
///
/// # Errors
///
/// `400 Bad Request` for non UTF-8 bodies or malformed fields.
pub fn parse_urlencoded_form(body: &[u8]) -> Result<FormData, HttpError> {
    let text = std::str::from_utf8(body)
        .map_err(|_| HttpError::bad_request_because("form body is not valid UTF-8"))?;
    let mut form = FormData::new();
    for (name, value) in parse_urlencoded_strict(text)? {
        form.push(name, FormValue::Text(value));
    }
    Ok(form)
}

/// Extract and validate the `boundary` parameter of a multipart content type.
///
/// # Errors
///
/// `400 Bad Request` if the parameter is missing or contains characters outside
/// the RFC 2046 boundary alphabet.
pub fn multipart_boundary(content_type_header: &str) -> Result<String, HttpError> {
    let boundary = content_type_header
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .ok_or_else(|| HttpError::bad_request_because("missing multipart boundary"))?;

    let valid = !boundary.is_empty()
        && boundary.len() <= MAX_BOUNDARY_LENGTH
        && !boundary.ends_with(' ')
        && boundary.chars().all(|c| {
            c.is_ascii_alphanumeric() || "'()+_,-./:=? ".contains(c)
        });
    if !valid {
        return Err(HttpError::bad_request_because(format!(
            "invalid multipart boundary {boundary:?}"
        )));
    }
    Ok(boundary)
}

/// Decode a `multipart/form-data` body.
///
/// The body is already fully buffered, so the stream handed to `multer` yields a
/// single chunk and the future is driven to completion on the current thread.
///
/// # Errors
///
/// `400 Bad Request` for a bad boundary or malformed multipart framing.
pub fn parse_multipart_form(body: Vec<u8>, content_type_header: &str) -> Result<FormData, HttpError> {
    let boundary = multipart_boundary(content_type_header)?;
    let stream =
        futures_util::stream::once(async move { Ok::<Bytes, io::Error>(Bytes::from(body)) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    futures::executor::block_on(async move {
        let mut form = FormData::new();
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            let filename = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(ToString::to_string);
            let data = field.bytes().await.map_err(multipart_error)?;
            let value = match filename {
                Some(filename) => FormValue::File {
                    filename,
                    content_type,
                    data: data.to_vec(),
                },
                None => FormValue::Text(String::from_utf8_lossy(&data).into_owned()),
            };
            form.push(name, value);
        }
        debug!(field_count = form.len(), "Multipart form parsed");
        Ok::<FormData, HttpError>(form)
    })
}

fn multipart_error(err: multer::Error) -> HttpError {
    HttpError::bad_request_because(format!("multipart parse error: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_urlencoded() {
        let pairs = parse_urlencoded_strict("abc=def&x=%20y").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("abc".to_string(), "def".to_string()),
                ("x".to_string(), " y".to_string())
            ]
        );
        assert!(parse_urlencoded_strict("abc").is_err());
        assert!(parse_urlencoded_strict("a=1&&b=2").is_err());
        assert!(parse_urlencoded_strict("").unwrap().is_empty());
    }

    #[test]
    fn test_boundary_validation() {
        assert_eq!(
            multipart_boundary("multipart/form-data; boundary=abc123").unwrap(),
            "abc123"
        );
        assert_eq!(
            multipart_boundary("multipart/form-data; boundary=\"a b\"").unwrap(),
            "a b"
        );
        assert!(multipart_boundary("multipart/form-data").is_err());
        assert!(multipart_boundary("multipart/form-data; boundary=abc\u{c4}").is_err());
    }

    #[test]
    fn test_multipart_single_field() {
        let body = b"--XyZ\r\nContent-Disposition: form-data; name=\"field\"\r\n\r\nFieldValue\r\n--XyZ--\r\n";
        let form =
            parse_multipart_form(body.to_vec(), "multipart/form-data; boundary=XyZ").unwrap();
        assert_eq!(form.keys(), vec!["field"]);
        assert_eq!(form.get_first("field"), Some("FieldValue"));
    }

    #[test]
    fn test_multipart_file_field() {
        let body = b"--b\r\nContent-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\nContent-Type: text/plain\r\n\r\nhello\r\n--b--\r\n";
        let form = parse_multipart_form(body.to_vec(), "multipart/form-data; boundary=b").unwrap();
        match form.get("upload") {
            Some(FormValue::File {
                filename,
                content_type,
                data,
            }) => {
                assert_eq!(filename, "a.txt");
                assert_eq!(content_type.as_deref(), Some("text/plain"));
                assert_eq!(data, b"hello");
            }
            other => panic!("unexpected field {other:?}"),
        }
    }

    #[test]
    fn test_form_to_json_keeps_first_value() {
        let form = parse_urlencoded_form(b"a=1&a=2&b=3").unwrap();
        assert_eq!(form.get_all("a").len(), 2);
        assert_eq!(form.to_json(), serde_json::json!({"a": "1", "b": "3"}));
    }
}
