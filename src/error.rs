//! # Error Module
//!
//! Two families of errors flow through the router:
//!
//! - [`HttpError`] - client-facing failures (404, 405, 415, ...). They carry a status
//!   code, an optional JSON payload and extra response headers, and are converted into
//!   a response exactly once at the application boundary.
//! - [`ConfigError`] - programming errors in route declarations or handler results.
//!   Registration-time variants are returned synchronously from `add_route` /
//!   `add_subrouter` and are meant to abort startup.

use std::fmt;

use http::header::{HeaderValue, ALLOW};
use http::{HeaderMap, Method, StatusCode};
use serde_json::Value;

/// Statuses whose responses never carry a body (1xx, 204, 304).
#[inline]
#[must_use]
pub fn is_no_content_status(status: StatusCode) -> bool {
    status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
}

/// Extra information attached to some client errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorDetail {
    /// Plain status error
    None,
    /// No route matched; carries the requested path for diagnostics
    NotFound {
        /// The path that failed to resolve (`None` when the request had no path)
        path: Option<String>,
    },
    /// The path matched but the method did not
    MethodNotAllowed {
        /// Methods registered on the matched path, in declaration order
        allowed: Vec<Method>,
    },
}

/// Client-facing HTTP error.
///
/// # Example
///
/// ```rust
/// use pathrouter::error::HttpError;
/// use http::StatusCode;
///
/// let err = HttpError::new(StatusCode::NOT_FOUND);
/// assert_eq!(err.status(), StatusCode::NOT_FOUND);
/// assert_eq!(err.payload().and_then(|p| p.as_str()), Some("Not Found"));
///
/// let err = HttpError::new(StatusCode::NO_CONTENT);
/// assert!(err.payload().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct HttpError {
    status: StatusCode,
    payload: Option<Value>,
    headers: HeaderMap,
    detail: ErrorDetail,
}

impl HttpError {
    /// Create an error for `status`.
    ///
    /// The payload defaults to the canonical reason phrase unless the status
    /// forbids a body.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        let payload = if is_no_content_status(status) {
            None
        } else {
            status
                .canonical_reason()
                .map(|reason| Value::String(reason.to_string()))
        };
        Self {
            status,
            payload,
            headers: HeaderMap::new(),
            detail: ErrorDetail::None,
        }
    }

    /// Create an error with an explicit payload.
    #[must_use]
    pub fn with_payload(status: StatusCode, payload: impl Into<Value>) -> Self {
        Self {
            payload: Some(payload.into()),
            ..Self::new(status)
        }
    }

    /// Add a response header to the error.
    #[must_use]
    pub fn with_header(mut self, name: http::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// 404 carrying the requested path.
    #[must_use]
    pub fn not_found(path: Option<&str>) -> Self {
        Self {
            detail: ErrorDetail::NotFound {
                path: path.map(str::to_string),
            },
            ..Self::new(StatusCode::NOT_FOUND)
        }
    }

    /// 405 with an `Allow` header listing the registered methods.
    #[must_use]
    pub fn method_not_allowed(allowed: Vec<Method>) -> Self {
        let mut err = Self::new(StatusCode::METHOD_NOT_ALLOWED);
        let joined = allowed
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if let Ok(value) = HeaderValue::from_str(&joined) {
            err.headers.insert(ALLOW, value);
        }
        err.detail = ErrorDetail::MethodNotAllowed { allowed };
        err
    }

    /// 400 with the default payload.
    #[must_use]
    pub fn bad_request() -> Self {
        Self::new(StatusCode::BAD_REQUEST)
    }

    /// 400 with an explanatory message.
    #[must_use]
    pub fn bad_request_because(message: impl Into<String>) -> Self {
        Self::with_payload(StatusCode::BAD_REQUEST, message.into())
    }

    #[must_use]
    pub fn unsupported_media_type() -> Self {
        Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE)
    }

    #[must_use]
    pub fn not_acceptable() -> Self {
        Self::new(StatusCode::NOT_ACCEPTABLE)
    }

    #[must_use]
    pub fn length_required() -> Self {
        Self::new(StatusCode::LENGTH_REQUIRED)
    }

    #[must_use]
    pub fn payload_too_large() -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE)
    }

    /// 422 carrying validation details.
    #[must_use]
    pub fn unprocessable_entity(details: impl Into<Value>) -> Self {
        Self::with_payload(StatusCode::UNPROCESSABLE_ENTITY, details)
    }

    /// 500 without any detail; used for unhandled faults.
    #[must_use]
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR)
    }

    #[inline]
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[inline]
    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[inline]
    #[must_use]
    pub fn detail(&self) -> &ErrorDetail {
        &self.detail
    }

    /// Path carried by a 404 raised during resolution.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match &self.detail {
            ErrorDetail::NotFound { path } => path.as_deref(),
            _ => None,
        }
    }

    /// Allowed methods carried by a 405.
    #[must_use]
    pub fn allowed_methods(&self) -> Option<&[Method]> {
        match &self.detail {
            ErrorDetail::MethodNotAllowed { allowed } => Some(allowed),
            _ => None,
        }
    }

    /// Split into the parts used to build a response.
    #[must_use]
    pub fn into_parts(self) -> (StatusCode, Option<Value>, HeaderMap) {
        (self.status, self.payload, self.headers)
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            ErrorDetail::NotFound { path: Some(path) } => write!(f, "{}: {path}", self.status),
            _ => write!(f, "{}", self.status),
        }
    }
}

impl std::error::Error for HttpError {}

/// Route declaration or result conversion error.
///
/// Every registration variant carries the route template it was raised for, so the
/// message points straight at the offending declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A route was declared without any HTTP method
    NoMethods { route: String },
    /// A route was declared without a handler function
    MissingHandler { route: String },
    /// Empty segment inside a template (`//x`, `x/`)
    MissingPathSegment { route: String },
    /// Parameter delimiters without a usable name (`{`, `{abc`, `{}`)
    InvalidParameterDefinition { route: String, segment: String },
    /// `{name}` does not correspond to a handler parameter
    ParameterNotDefined { route: String, name: String },
    /// `{name}` refers to a variadic handler parameter
    ParameterNotKeyword { route: String, name: String },
    /// Neither the handler nor the template declares a type for `{name}`
    MissingTypeAnnotation { route: String, name: String },
    /// The parameter type is not in the matcher registry
    UnknownParameterType {
        route: String,
        name: String,
        type_name: String,
    },
    /// Another parameter with a different name or type already lives at this position
    IncompatibleParameter { route: String, name: String },
    /// The same name appears twice in one template
    DuplicateParameter { route: String, name: String },
    /// The name is reserved for the injected request context
    ReservedParameter { route: String, name: String },
    /// A method already has a handler on this path
    Redefinition { route: String, methods: Vec<Method> },
    /// A handler parameter would never receive a value
    ParameterNotInitialized { route: String, names: Vec<String> },
    /// More than one parameter bound to the same special binding
    TooManyBindings { route: String, binding: &'static str },
    /// A special binding declared on a variadic parameter
    IncompatibleBinding { route: String, name: String },
    /// `defaults` names parameters that cannot receive keyword values
    IllegalDefaults { route: String, names: Vec<String> },
    /// Sub-router prefix resolves to the root node
    MissingSubrouterPrefix { route: String },
    /// Sub-router or prefix-router path contains parameters
    ParametersNotAllowed { route: String },
    /// A sub-router is already mounted at this node
    DuplicateSubrouter { route: String },
    /// Tuple-shorthand result nested inside another tuple-shorthand result
    InvalidResultTuple,
    /// A body was returned alongside a status that forbids one
    UnexpectedResultForStatus { status: u16 },
    /// Raw bytes returned without a `Content-Type` header
    UnknownBinaryContentType,
    /// No converter applies to the returned value
    UnknownResultType { type_name: String },
    /// Serializing a structured result failed
    Serialization { message: String },
    /// A payload schema did not compile
    InvalidSchema { name: String, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoMethods { route } => write!(f, "{route}: no methods defined"),
            ConfigError::MissingHandler { route } => write!(f, "{route}: missing handler"),
            ConfigError::MissingPathSegment { route } => {
                write!(f, "{route}: missing path segment")
            }
            ConfigError::InvalidParameterDefinition { route, segment } => {
                write!(f, "{route}: invalid path parameter definition {segment}")
            }
            ConfigError::ParameterNotDefined { route, name } => {
                write!(f, "{route}: path parameter {name} not defined in handler")
            }
            ConfigError::ParameterNotKeyword { route, name } => write!(
                f,
                "{route}: path parameter {name} value passing by keyword not supported"
            ),
            ConfigError::MissingTypeAnnotation { route, name } => {
                write!(f, "{route}: path parameter {name} missing type annotation")
            }
            ConfigError::UnknownParameterType {
                route,
                name,
                type_name,
            } => write!(
                f,
                "{route}: unknown path parameter {name} type {type_name}"
            ),
            ConfigError::IncompatibleParameter { route, name } => {
                write!(f, "{route}: incompatible path parameter {name}")
            }
            ConfigError::DuplicateParameter { route, name } => {
                write!(f, "{route}: duplicate path parameter {name}")
            }
            ConfigError::ReservedParameter { route, name } => {
                write!(f, "{route}: reserved path parameter name {name}")
            }
            ConfigError::Redefinition { route, methods } => write!(
                f,
                "{route}: redefinition of handler for method(s) {}",
                join_methods(methods)
            ),
            ConfigError::ParameterNotInitialized { route, names } => write!(
                f,
                "{route}: parameters {} are not initialized",
                names.join(", ")
            ),
            ConfigError::TooManyBindings { route, binding } => {
                write!(f, "{route}: too many {binding} annotated parameters")
            }
            ConfigError::IncompatibleBinding { route, name } => {
                write!(f, "{route}: incompatible binding parameter {name}")
            }
            ConfigError::IllegalDefaults { route, names } => write!(
                f,
                "{route}: defaults {} cannot be used as parameters",
                names.join(", ")
            ),
            ConfigError::MissingSubrouterPrefix { route } => {
                write!(f, "{route}: missing path prefix for subrouter")
            }
            ConfigError::ParametersNotAllowed { route } => {
                write!(f, "{route}: parameters are not allowed")
            }
            ConfigError::DuplicateSubrouter { route } => {
                write!(f, "{route}: duplicate subrouter")
            }
            ConfigError::InvalidResultTuple => write!(
                f,
                "invalid result tuple: supported status[, result[, headers]]"
            ),
            ConfigError::UnexpectedResultForStatus { status } => {
                write!(f, "unexpected result for status {status}")
            }
            ConfigError::UnknownBinaryContentType => {
                write!(f, "unknown content type for binary result")
            }
            ConfigError::UnknownResultType { type_name } => {
                write!(f, "unknown result type {type_name}")
            }
            ConfigError::Serialization { message } => {
                write!(f, "result serialization failed: {message}")
            }
            ConfigError::InvalidSchema { name, message } => {
                write!(f, "invalid schema {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

fn join_methods(methods: &[Method]) -> String {
    methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_payload_is_reason_phrase() {
        let err = HttpError::new(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            err.payload(),
            Some(&Value::String("Unprocessable Entity".to_string()))
        );
        assert!(err.headers().is_empty());
    }

    #[test]
    fn test_no_content_statuses_have_no_payload() {
        assert!(HttpError::new(StatusCode::NO_CONTENT).payload().is_none());
        assert!(HttpError::new(StatusCode::NOT_MODIFIED).payload().is_none());
        assert!(HttpError::new(StatusCode::CONTINUE).payload().is_none());
    }

    #[test]
    fn test_method_not_allowed_sets_allow_header() {
        let err = HttpError::method_not_allowed(vec![Method::GET, Method::POST]);
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(err.headers().get(ALLOW).unwrap(), "GET, POST");
        assert_eq!(
            err.allowed_methods(),
            Some(&[Method::GET, Method::POST][..])
        );
    }

    #[test]
    fn test_not_found_carries_path() {
        let err = HttpError::not_found(Some("/missing"));
        assert_eq!(err.path(), Some("/missing"));
        assert_eq!(err.to_string(), "404 Not Found: /missing");
    }

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::ParameterNotDefined {
            route: "/{abc}".to_string(),
            name: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "/{abc}: path parameter abc not defined in handler");

        let err = ConfigError::Redefinition {
            route: "/x".to_string(),
            methods: vec![Method::GET],
        };
        assert!(err.to_string().contains("redefinition of handler"));
    }
}
