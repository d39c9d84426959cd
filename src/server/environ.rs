use std::fmt;
use std::io::{Cursor, Read};

use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH};
use http::HeaderMap;
use serde_json::Value;

use crate::endpoint::RoutingArgs;

/// Readable request body stream supplied by the transport.
pub type InputStream = Box<dyn Read + Send>;

/// Routing metadata written by the resolver for downstream consumers such as
/// authorization hooks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteInfo {
    /// Options payload attached to the matched route
    pub options: Value,
    /// Template the route was registered with (relative to the router that owns it)
    pub path: String,
    /// Default and path-extracted arguments
    pub args: RoutingArgs,
}

/// Per-request gateway environment.
///
/// Mirrors what the transport hands over for every request: method, the path split
/// into `script_name` (already consumed by prefix dispatch) and `path_info` (still
/// to be routed), the raw query string, the request headers and a body stream.
///
/// # Example
///
/// ```rust
/// use pathrouter::server::Environ;
///
/// let environ = Environ::new("POST", "/items")
///     .with_query("verbose=1")
///     .with_header("content-type", "application/json")
///     .with_body(br#"{"a":1}"#.to_vec());
///
/// assert_eq!(environ.method(), "POST");
/// assert_eq!(environ.header("content-length"), Some("7"));
/// ```
pub struct Environ {
    method: String,
    script_name: String,
    path_info: Option<String>,
    query_string: Option<String>,
    headers: HeaderMap,
    input: Option<InputStream>,
    route: Option<RouteInfo>,
}

impl Environ {
    #[must_use]
    pub fn new(method: impl Into<String>, path_info: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            script_name: String::new(),
            path_info: Some(path_info.into()),
            query_string: None,
            headers: HeaderMap::new(),
            input: None,
            route: None,
        }
    }

    /// An environment without any path information.
    #[must_use]
    pub fn without_path(method: impl Into<String>) -> Self {
        Self {
            path_info: None,
            ..Self::new(method, "")
        }
    }

    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query_string = Some(query.into());
        self
    }

    /// Add a request header. Invalid names or values are ignored.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Attach a buffered body and the matching `Content-Length` header.
    #[must_use]
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.headers
            .insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        self.input = Some(Box::new(Cursor::new(body)));
        self
    }

    /// Attach a raw body stream without touching the headers.
    #[must_use]
    pub fn with_input(mut self, input: InputStream) -> Self {
        self.input = Some(input);
        self
    }

    #[must_use]
    pub fn with_script_name(mut self, script_name: impl Into<String>) -> Self {
        self.script_name = script_name.into();
        self
    }

    /// Build an environment from an `http` request with a buffered body.
    ///
    /// `Content-Length` is taken from the request headers only; a body without that
    /// header is readable only if the caller adds it.
    #[must_use]
    pub fn from_http(request: http::Request<Vec<u8>>) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            method: parts.method.as_str().to_string(),
            script_name: String::new(),
            path_info: Some(parts.uri.path().to_string()),
            query_string: parts.uri.query().map(str::to_string),
            headers: parts.headers,
            input: Some(Box::new(Cursor::new(body))),
            route: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[inline]
    #[must_use]
    pub fn path_info(&self) -> Option<&str> {
        self.path_info.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    pub(crate) fn set_path_info(&mut self, path_info: String) {
        self.path_info = Some(path_info);
    }

    pub(crate) fn set_script_name(&mut self, script_name: String) {
        self.script_name = script_name;
    }

    #[inline]
    #[must_use]
    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as text; non-visible-ASCII values read as absent.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    /// Take the body stream; subsequent calls return `None`.
    pub fn take_input(&mut self) -> Option<InputStream> {
        self.input.take()
    }

    pub(crate) fn set_route(&mut self, route: RouteInfo) {
        self.route = Some(route);
    }

    /// Routing metadata of the resolved endpoint.
    #[must_use]
    pub fn route(&self) -> Option<&RouteInfo> {
        self.route.as_ref()
    }

    #[must_use]
    pub fn route_options(&self) -> Option<&Value> {
        self.route.as_ref().map(|r| &r.options)
    }

    #[must_use]
    pub fn route_path(&self) -> Option<&str> {
        self.route.as_ref().map(|r| r.path.as_str())
    }

    #[must_use]
    pub fn routing_args(&self) -> Option<&RoutingArgs> {
        self.route.as_ref().map(|r| &r.args)
    }
}

impl fmt::Debug for Environ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environ")
            .field("method", &self.method)
            .field("script_name", &self.script_name)
            .field("path_info", &self.path_info)
            .field("query_string", &self.query_string)
            .field("headers", &self.headers)
            .field("has_input", &self.input.is_some())
            .field("route", &self.route)
            .finish()
    }
}
