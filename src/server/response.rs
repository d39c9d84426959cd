use std::any::{self, Any};
use std::fmt;
use std::sync::Arc;

use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::config::AppConfig;
use crate::error::{is_no_content_status, ConfigError, HttpError};

pub const CONTENT_TYPE_APPLICATION_JSON: &str = "application/json";

/// Lazily produced response body chunks.
pub type BodyStream = Box<dyn Iterator<Item = Vec<u8>> + Send>;

/// Value returned by a handler.
///
/// [`Reply::Status`] is the `(status, body?, headers?)` shorthand; its body may not
/// itself be a `Status`.
pub enum Reply {
    /// No value; converts to an empty body
    None,
    Json(Value),
    Text(String),
    /// Raw bytes; a `Content-Type` header must be supplied via [`Reply::Status`]
    Bytes(Vec<u8>),
    /// Streamed chunks with unknown total length
    Stream(BodyStream),
    Status {
        status: StatusCode,
        body: Option<Box<Reply>>,
        headers: HeaderMap,
    },
    /// Application value handled by result converters or record serialization
    Object(ResultObject),
}

impl Reply {
    /// JSON reply from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns the serde error when the value cannot be represented as JSON.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Reply::Json)
    }

    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text(text.into())
    }

    #[must_use]
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Reply::Bytes(data.into())
    }

    #[must_use]
    pub fn stream<I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
        I::IntoIter: Send + 'static,
    {
        Reply::Stream(Box::new(chunks.into_iter()))
    }

    /// Bare status with the default (empty) body.
    #[must_use]
    pub fn status(status: StatusCode) -> Self {
        Reply::Status {
            status,
            body: None,
            headers: HeaderMap::new(),
        }
    }

    #[must_use]
    pub fn with_status(status: StatusCode, body: Reply) -> Self {
        Reply::Status {
            status,
            body: Some(Box::new(body)),
            headers: HeaderMap::new(),
        }
    }

    #[must_use]
    pub fn with_headers(status: StatusCode, body: Option<Reply>, headers: HeaderMap) -> Self {
        Reply::Status {
            status,
            body: body.map(Box::new),
            headers,
        }
    }

    /// Opaque application value; converted by a registered [`ResultConverter`].
    #[must_use]
    pub fn object<T: Any + Send>(value: T) -> Self {
        Reply::Object(ResultObject::new(value))
    }

    /// Serializable record; falls back to JSON when no converter claims it.
    #[must_use]
    pub fn record<T: Serialize + Any + Send>(value: T) -> Self {
        Reply::Object(ResultObject::record(value))
    }

    fn kind(&self) -> &'static str {
        match self {
            Reply::None => "none",
            Reply::Json(_) => "json",
            Reply::Text(_) => "text",
            Reply::Bytes(_) => "bytes",
            Reply::Stream(_) => "stream",
            Reply::Status { .. } => "status",
            Reply::Object(obj) => obj.type_name(),
        }
    }
}

impl From<HttpError> for Reply {
    fn from(err: HttpError) -> Self {
        let (status, payload, headers) = err.into_parts();
        let body = payload.map(|payload| match payload {
            Value::String(text) => Reply::Text(text),
            other => Reply::Json(other),
        });
        Reply::with_headers(status, body, headers)
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Json(value)
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Reply::Text(text)
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Reply::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Reply {
    fn from(data: Vec<u8>) -> Self {
        Reply::Bytes(data)
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Json(v) => f.debug_tuple("Json").field(v).finish(),
            Reply::Text(t) => f.debug_tuple("Text").field(t).finish(),
            Reply::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Reply::Status {
                status,
                body,
                headers,
            } => f
                .debug_struct("Status")
                .field("status", status)
                .field("body", body)
                .field("headers", headers)
                .finish(),
            other => f.write_str(other.kind()),
        }
    }
}

type RecordFn = fn(&dyn Any) -> Option<Result<Value, serde_json::Error>>;

/// Type-erased application value returned by a handler.
pub struct ResultObject {
    value: Box<dyn Any + Send>,
    type_name: &'static str,
    record: Option<RecordFn>,
}

impl ResultObject {
    #[must_use]
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: any::type_name::<T>(),
            record: None,
        }
    }

    #[must_use]
    pub fn record<T: Serialize + Any + Send>(value: T) -> Self {
        let record: RecordFn = |value| value.downcast_ref::<T>().map(serde_json::to_value);
        Self {
            value: Box::new(value),
            type_name: any::type_name::<T>(),
            record: Some(record),
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Take the value out, or give the object back on a type mismatch.
    ///
    /// # Errors
    ///
    /// Returns `self` unchanged when the value is not a `T`.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        let Self {
            value,
            type_name,
            record,
        } = self;
        value.downcast::<T>().map(|value| *value).map_err(|value| Self {
            value,
            type_name,
            record,
        })
    }

    fn to_record(&self) -> Option<Result<Value, serde_json::Error>> {
        self.record.and_then(|record| record(self.value.as_ref()))
    }
}

impl fmt::Debug for ResultObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultObject")
            .field("type_name", &self.type_name)
            .field("record", &self.record.is_some())
            .finish()
    }
}

type ConvertPredicate = dyn Fn(&ResultObject) -> bool + Send + Sync;
type ConvertFn = dyn Fn(ResultObject, &mut HeaderMap) -> Result<Body, ConfigError> + Send + Sync;

/// `(predicate, converter)` pair consulted for [`Reply::Object`] values.
#[derive(Clone)]
pub struct ResultConverter {
    predicate: Arc<ConvertPredicate>,
    convert: Arc<ConvertFn>,
}

impl ResultConverter {
    pub fn new<P, C>(predicate: P, convert: C) -> Self
    where
        P: Fn(&ResultObject) -> bool + Send + Sync + 'static,
        C: Fn(ResultObject, &mut HeaderMap) -> Result<Body, ConfigError> + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            convert: Arc::new(convert),
        }
    }

    /// Converter applied to every value of type `T`.
    pub fn for_type<T, C>(convert: C) -> Self
    where
        T: Any,
        C: Fn(T, &mut HeaderMap) -> Result<Body, ConfigError> + Send + Sync + 'static,
    {
        Self::new(ResultObject::is::<T>, move |obj, headers| {
            match obj.downcast::<T>() {
                Ok(value) => convert(value, headers),
                Err(obj) => Err(ConfigError::UnknownResultType {
                    type_name: obj.type_name().to_string(),
                }),
            }
        })
    }

    fn applies(&self, obj: &ResultObject) -> bool {
        (self.predicate)(obj)
    }
}

impl fmt::Debug for ResultConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResultConverter")
    }
}

/// Response body handed to the transport.
pub enum Body {
    Empty,
    Full(Vec<u8>),
    Stream(BodyStream),
}

impl Body {
    /// Length when the body is fully buffered.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match self {
            Body::Empty => Some(0),
            Body::Full(data) => Some(data.len()),
            Body::Stream(_) => None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Body::Empty => Some(&[]),
            Body::Full(data) => Some(data),
            Body::Stream(_) => None,
        }
    }

    /// Drain every chunk into one buffer.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Body::Empty => Vec::new(),
            Body::Full(data) => data,
            Body::Stream(chunks) => chunks.flatten().collect(),
        }
    }
}

impl Iterator for Body {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        match std::mem::replace(self, Body::Empty) {
            Body::Empty => None,
            Body::Full(data) => Some(data),
            Body::Stream(mut chunks) => {
                let chunk = chunks.next();
                if chunk.is_some() {
                    *self = Body::Stream(chunks);
                }
                chunk
            }
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Full(data) => f.debug_tuple("Full").field(&data.len()).finish(),
            Body::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// Converted response: status, body and headers.
#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub body: Body,
    pub headers: HeaderMap,
}

impl Response {
    /// Bare 500 used when conversion itself fails.
    #[must_use]
    pub fn internal_error() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: Body::Empty,
            headers: HeaderMap::new(),
        }
    }

    /// `NNN Reason` status line.
    #[must_use]
    pub fn status_line(&self) -> String {
        status_line(self.status)
    }

    /// Headers as ordered `(name, value)` pairs; non-text values are skipped.
    #[must_use]
    pub fn header_list(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect()
    }
}

#[must_use]
pub fn status_line(status: StatusCode) -> String {
    format!(
        "{} {}",
        status.as_str(),
        status.canonical_reason().unwrap_or("Unknown")
    )
}

pub(crate) fn set_content_length(headers: &mut HeaderMap, length: usize) {
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
}

fn set_default(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if !headers.contains_key(&name) {
        if let Ok(value) = HeaderValue::from_str(value) {
            headers.insert(name, value);
        }
    }
}

/// Convert a handler result into a [`Response`].
///
/// # Errors
///
/// [`ConfigError`] when the result is not representable: a nested status reply, a
/// body for a no-content status, bytes without a content type, an unconvertible
/// object or a JSON encoding failure.
pub fn convert_reply(config: &AppConfig, reply: Reply) -> Result<Response, ConfigError> {
    let (status, reply, mut headers) = match reply {
        Reply::Status {
            status,
            body,
            headers,
        } => match body.map(|body| *body) {
            Some(Reply::Status { .. }) => return Err(ConfigError::InvalidResultTuple),
            Some(body) => (status, body, headers),
            None => (status, Reply::None, headers),
        },
        other => (StatusCode::OK, other, HeaderMap::new()),
    };

    if is_no_content_status(status) {
        if !matches!(reply, Reply::None) {
            return Err(ConfigError::UnexpectedResultForStatus {
                status: status.as_u16(),
            });
        }
        return Ok(Response {
            status,
            body: Body::Empty,
            headers,
        });
    }

    let body = convert_body(config, reply, &mut headers)?;
    Ok(Response {
        status,
        body,
        headers,
    })
}

fn convert_body(config: &AppConfig, reply: Reply, headers: &mut HeaderMap) -> Result<Body, ConfigError> {
    match reply {
        Reply::None => {
            set_content_length(headers, 0);
            Ok(Body::Empty)
        }
        Reply::Json(value) => json_body(config, &value, headers),
        Reply::Bytes(data) => {
            if !headers.contains_key(CONTENT_TYPE) {
                return Err(ConfigError::UnknownBinaryContentType);
            }
            set_content_length(headers, data.len());
            Ok(Body::Full(data))
        }
        Reply::Text(text) => {
            set_default(headers, CONTENT_TYPE, &config.default_str_content_type);
            set_content_length(headers, text.len());
            Ok(Body::Full(text.into_bytes()))
        }
        Reply::Stream(chunks) => Ok(Body::Stream(chunks)),
        Reply::Status { .. } => Err(ConfigError::InvalidResultTuple),
        Reply::Object(obj) => {
            if let Some(converter) = config
                .result_converters
                .iter()
                .find(|converter| converter.applies(&obj))
            {
                return (converter.convert)(obj, headers);
            }
            match obj.to_record() {
                Some(Ok(value)) => json_body(config, &value, headers),
                Some(Err(err)) => Err(ConfigError::Serialization {
                    message: err.to_string(),
                }),
                None => Err(ConfigError::UnknownResultType {
                    type_name: obj.type_name().to_string(),
                }),
            }
        }
    }
}

fn json_body(config: &AppConfig, value: &Value, headers: &mut HeaderMap) -> Result<Body, ConfigError> {
    let data = config
        .json_codec
        .encode(value)
        .map_err(|err| ConfigError::Serialization {
            message: err.to_string(),
        })?;
    set_default(headers, CONTENT_TYPE, CONTENT_TYPE_APPLICATION_JSON);
    set_content_length(headers, data.len());
    Ok(Body::Full(data))
}
