//! # Server Module
//!
//! The gateway-facing half of the crate: the per-request [`Environ`], the lazily
//! memoized [`Request`] facade, handler [`Reply`] values and their conversion into
//! a [`Response`], and the [`App`] boundary tying resolution, hooks, handlers and
//! conversion together.
//!
//! ## Request Flow
//!
//! ```text
//! Environ -> Resolve -> Request -> before_request -> Endpoint::call
//!         -> error handler -> convert_reply -> gzip -> after_request -> Body
//! ```

mod compress;
mod environ;
mod form;
mod request;
mod response;
mod service;

#[cfg(test)]
mod tests;

pub use compress::{accepts_gzip, compress_response, CompressionConfig};
pub use environ::{Environ, InputStream, RouteInfo};
pub use form::{
    parse_multipart_form, parse_urlencoded_form, FormData, FormValue,
    CONTENT_TYPE_FORM_URLENCODED, CONTENT_TYPE_MULTIPART_FORM_DATA, FORM_CONTENT_TYPES,
};
pub(crate) use request::media_type;
pub use request::{CookieJar, Request};
pub use response::{
    convert_reply, status_line, Body, BodyStream, Reply, Response, ResultConverter, ResultObject,
    CONTENT_TYPE_APPLICATION_JSON,
};
pub use service::App;
