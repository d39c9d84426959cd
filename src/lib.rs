//! # pathrouter
//!
//! **pathrouter** is a segment-trie HTTP request router with typed path parameters,
//! method and content negotiation, and declarative argument binding. It sits on top
//! of a gateway-style transport boundary: the transport hands over an [`Environ`]
//! per request plus a `start_response` callback, and gets a body iterator back.
//!
//! ## Architecture
//!
//! - **[`router`]** - the routing trie, typed parameter matchers, sub-routers and
//!   the prefix-dispatching router
//! - **[`endpoint`]** - route signatures, registration-time analysis, payload
//!   binders and the endpoint call that assembles handler arguments
//! - **[`server`]** - the request environment, the memoized request facade,
//!   reply conversion, gzip compression and the [`App`] boundary
//! - **[`config`]** - explicit per-application configuration
//! - **[`error`]** - client-facing [`HttpError`] and registration-time [`ConfigError`]
//! - **[`telemetry`]** - `tracing` subscriber setup
//!
//! ## Request Lifecycle
//!
//! 1. [`App::call`] opens a `request` span with a ULID request id
//! 2. the [`Resolve`] implementation walks the trie, negotiates the method,
//!    request media type and `Accept` header, and records [`RouteInfo`] in the
//!    environment
//! 3. a [`Request`] facade is created; `before_request` runs
//! 4. the endpoint binds query, body and request parameters and calls the handler
//! 5. any error goes through the error handler; the [`Reply`] is converted
//! 6. the body is gzip-compressed when enabled and accepted, `after_request` runs, HEAD bodies
//!    are dropped, and `start_response` receives the status line and headers
//!
//! ## Example
//!
//! ```rust
//! use http::Method;
//! use pathrouter::config::AppConfig;
//! use pathrouter::router::{ParamType, PathRouter, Route};
//! use pathrouter::server::{App, Environ, Reply};
//! use serde_json::json;
//!
//! let mut router = PathRouter::new();
//! router
//!     .add_route(
//!         Route::new("/items/{id}", [Method::GET])
//!             .param("id", ParamType::INT)
//!             .handler(|args| Ok(Reply::Json(json!({ "id": args.int("id") })))),
//!     )
//!     .unwrap();
//!
//! let app = App::new(router, AppConfig::default());
//! let mut status = String::new();
//! let body = app.call(Environ::new("GET", "/items/42"), |line, _headers| {
//!     status = line.to_string();
//! });
//!
//! assert_eq!(status, "200 OK");
//! assert_eq!(body.into_bytes(), br#"{"id":42}"#.to_vec());
//! ```
//!
//! [`Environ`]: server::Environ
//! [`App`]: server::App
//! [`App::call`]: server::App::call
//! [`Request`]: server::Request
//! [`Reply`]: server::Reply
//! [`RouteInfo`]: server::RouteInfo
//! [`Resolve`]: router::Resolve
//! [`HttpError`]: error::HttpError
//! [`ConfigError`]: error::ConfigError

pub mod config;
pub mod endpoint;
pub mod error;
pub mod ids;
pub mod router;
pub mod server;
pub mod telemetry;

pub use config::{AppConfig, AppSettings};
pub use endpoint::{Arg, Args, Endpoint, PayloadType};
pub use error::{ConfigError, HttpError};
pub use router::{ParamType, PathRouter, PrefixRouter, Resolve, Route};
pub use server::{App, Environ, Reply, Request, Response};
