//! # Router Module
//!
//! Segment-trie routing with typed path parameters.
//!
//! ## Overview
//!
//! A [`PathRouter`] stores routes in a prefix tree keyed by `/`-separated path
//! segments. Each node has literal children, at most one typed parameter child
//! and a method table; a node may also mount another `PathRouter` as a
//! sub-router. Resolution walks the tree once, without backtracking:
//!
//! 1. exact literal child
//! 2. the parameter child, when its [`PathMatcher`] accepts the segment
//! 3. the mounted sub-router's root
//!
//! After the walk, the method, request media type (`consumes`) and `Accept`
//! header (`produces`) are negotiated against the terminal node.
//!
//! A trailing slash is a distinct path: `/items/` never resolves to `/items`.
//!
//! [`PrefixRouter`] sits in front of whole routers and dispatches on a literal
//! prefix, rewriting `script_name` and `path_info`.
//!
//! ## Example
//!
//! ```rust
//! use http::Method;
//! use pathrouter::router::{ParamType, PathRouter, Route};
//! use pathrouter::server::Reply;
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
//! let (endpoint, kwargs) = router
//!     .resolve_route("GET", Some("/items/42"), None, None)
//!     .unwrap();
//! assert_eq!(endpoint.route_path(), "/items/{id}");
//! assert_eq!(kwargs["id"].as_int(), Some(42));
//! ```

mod core;
mod params;
mod prefix;
mod route;
mod tree;


pub use self::core::{PathRouter, Resolve, RouteDefinition, RouteSegment};
pub use params::{
    BoolMatcher, IntMatcher, ParamType, ParamTypes, PathMatcher, StrMatcher, UuidMatcher,
};
pub use prefix::PrefixRouter;
pub use route::Route;
