use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;

use http::Method;
use once_cell::unsync::OnceCell;
use tracing::debug;

use super::environ::{Environ, InputStream};
use super::form::{
    parse_multipart_form, parse_urlencoded_form, parse_urlencoded_strict, FormData,
    CONTENT_TYPE_MULTIPART_FORM_DATA, FORM_CONTENT_TYPES,
};
use super::response::CONTENT_TYPE_APPLICATION_JSON;
use crate::config::AppConfig;
use crate::error::HttpError;
use crate::ids::RequestId;
use serde_json::Value;

/// Cookies sent with the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: HashMap<String, String>,
}

impl CookieJar {
    /// Parse a `Cookie` header; malformed pairs are skipped, the first value of a
    /// repeated name wins.
    #[must_use]
    pub fn parse(header: &str) -> Self {
        let mut cookies = HashMap::new();
        for pair in header.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let name = parts.next().unwrap_or_default().trim();
            let Some(value) = parts.next() else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            cookies
                .entry(name.to_string())
                .or_insert_with(|| value.to_string());
        }
        Self { cookies }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cookies.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Media type portion of a `Content-Type` value, lowercased.
pub(crate) fn media_type(header: &str) -> String {
    header
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Request facade over an [`Environ`].
///
/// Every derived value (length, content type, cookies, body, JSON, form, query) is
/// computed on first access and cached for the lifetime of the request, errors
/// included. The body stream is read at most once.
pub struct Request<'a> {
    config: &'a AppConfig,
    environ: &'a Environ,
    request_id: RequestId,
    input: RefCell<Option<InputStream>>,
    content_length: OnceCell<Result<i64, HttpError>>,
    content_type: OnceCell<Option<String>>,
    cookies: OnceCell<CookieJar>,
    body: OnceCell<Result<Vec<u8>, HttpError>>,
    json: OnceCell<Result<Value, HttpError>>,
    form: OnceCell<Result<FormData, HttpError>>,
    query: OnceCell<Result<BTreeMap<String, String>, HttpError>>,
}

impl<'a> Request<'a> {
    #[must_use]
    pub fn new(
        config: &'a AppConfig,
        environ: &'a Environ,
        input: Option<InputStream>,
        request_id: RequestId,
    ) -> Self {
        Self {
            config,
            environ,
            request_id,
            input: RefCell::new(input),
            content_length: OnceCell::new(),
            content_type: OnceCell::new(),
            cookies: OnceCell::new(),
            body: OnceCell::new(),
            json: OnceCell::new(),
            form: OnceCell::new(),
            query: OnceCell::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn environ(&self) -> &'a Environ {
        self.environ
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &'a AppConfig {
        self.config
    }

    #[inline]
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// HTTP method token as sent by the client.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &'a str {
        self.environ.method()
    }

    /// The method parsed as [`http::Method`]; `None` for invalid tokens.
    #[must_use]
    pub fn http_method(&self) -> Option<Method> {
        Method::from_bytes(self.environ.method().as_bytes()).ok()
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.environ.header(name)
    }

    /// Declared body length; `0` without a `Content-Length` header.
    ///
    /// Negative values are returned unchanged and rejected by [`Request::body`].
    ///
    /// # Errors
    ///
    /// `400 Bad Request` when the header is not an integer.
    pub fn content_length(&self) -> Result<i64, HttpError> {
        self.content_length
            .get_or_init(|| match self.environ.header("content-length") {
                None if !self.environ.has_header("content-length") => Ok(0),
                None => Err(HttpError::bad_request_because("invalid content length")),
                Some(value) => value
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| HttpError::bad_request_because("invalid content length")),
            })
            .clone()
    }

    /// Media type of the body without parameters, lowercased.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type
            .get_or_init(|| self.environ.header("content-type").map(media_type))
            .as_deref()
    }

    #[must_use]
    pub fn cookies(&self) -> &CookieJar {
        self.cookies.get_or_init(|| {
            self.environ
                .header("cookie")
                .map(CookieJar::parse)
                .unwrap_or_default()
        })
    }

    /// Raw request body.
    ///
    /// # Errors
    ///
    /// - `411 Length Required` without a `Content-Length` header
    /// - `400 Bad Request` for an invalid or negative length
    /// - `413 Payload Too Large` above the configured maximum
    pub fn body(&self) -> Result<&[u8], HttpError> {
        self.body
            .get_or_init(|| self.read_body())
            .as_deref()
            .map_err(Clone::clone)
    }

    fn read_body(&self) -> Result<Vec<u8>, HttpError> {
        if !self.environ.has_header("content-length") {
            return Err(HttpError::length_required());
        }
        let length = self.content_length()?;
        let length = u64::try_from(length)
            .map_err(|_| HttpError::bad_request_because("negative content length"))?;
        if length == 0 {
            return Ok(Vec::new());
        }
        if self.config.max_content_length.is_some_and(|max| length > max) {
            return Err(HttpError::payload_too_large());
        }

        let Some(input) = self.input.borrow_mut().take() else {
            return Err(HttpError::bad_request_because("missing request body"));
        };
        let mut body = Vec::with_capacity(usize::try_from(length).unwrap_or_default().min(1 << 20));
        input
            .take(length)
            .read_to_end(&mut body)
            .map_err(|err| HttpError::bad_request_because(format!("body read failed: {err}")))?;
        debug!(
            request_id = %self.request_id,
            declared = length,
            read = body.len(),
            "Request body read"
        );
        Ok(body)
    }

    /// Body decoded as JSON.
    ///
    /// # Errors
    ///
    /// `415 Unsupported Media Type` unless the content type is `application/json`,
    /// `400 Bad Request` for malformed JSON, plus any [`Request::body`] error.
    pub fn json(&self) -> Result<&Value, HttpError> {
        self.json
            .get_or_init(|| {
                if self.content_type() != Some(CONTENT_TYPE_APPLICATION_JSON) {
                    return Err(HttpError::unsupported_media_type());
                }
                let body = self.body()?;
                self.config
                    .json_codec
                    .decode(body)
                    .map_err(|err| HttpError::bad_request_because(format!("invalid JSON: {err}")))
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Body decoded as an URL-encoded or multipart form.
    ///
    /// # Errors
    ///
    /// `415 Unsupported Media Type` for other content types, `400 Bad Request` for
    /// missing framing headers or malformed bodies, plus any [`Request::body`] error.
    pub fn form(&self) -> Result<&FormData, HttpError> {
        self.form
            .get_or_init(|| {
                let content_type = self.content_type();
                if !content_type.is_some_and(|ct| FORM_CONTENT_TYPES.contains(&ct)) {
                    return Err(HttpError::unsupported_media_type());
                }
                let (Some(_), Some(raw_content_type)) = (
                    self.environ.header("content-length"),
                    self.environ.header("content-type"),
                ) else {
                    return Err(HttpError::bad_request_because("missing form framing headers"));
                };
                let body = self.body()?;
                if content_type == Some(CONTENT_TYPE_MULTIPART_FORM_DATA) {
                    parse_multipart_form(body.to_vec(), raw_content_type)
                } else {
                    parse_urlencoded_form(body)
                }
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Query string as a flat map; the first value of a repeated name wins.
    ///
    /// # Errors
    ///
    /// `400 Bad Request` for malformed fields.
    pub fn query_parameters(&self) -> Result<&BTreeMap<String, String>, HttpError> {
        self.query
            .get_or_init(|| {
                let mut params = BTreeMap::new();
                for (name, value) in parse_urlencoded_strict(self.environ.query_string().unwrap_or_default())? {
                    params.entry(name).or_insert(value);
                }
                Ok(params)
            })
            .as_ref()
            .map_err(Clone::clone)
    }
}

impl std::fmt::Debug for Request<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("request_id", &self.request_id)
            .field("method", &self.environ.method())
            .field("path_info", &self.environ.path_info())
            .finish_non_exhaustive()
    }
}
