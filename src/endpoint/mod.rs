//! # Endpoint Module
//!
//! Registration records and argument binding.
//!
//! An [`Endpoint`] is created by [`PathRouter::add_route`](crate::router::PathRouter::add_route)
//! after [`analyze`] has validated the declared [`Signature`] against the route
//! template and defaults. At request time [`Endpoint::call`] layers the query,
//! body and request bindings on top of the routing arguments and invokes the
//! handler with [`Args`].

mod args;
mod binder;
mod core;
mod signature;


pub use self::core::{Endpoint, RawHandler};
pub use args::{Arg, Args, Kwargs, RoutingArgs};
pub use binder::{Binder, Payload, PayloadType, SchemaBinder, TypeCheckBinder};
pub use signature::{
    analyze, collect_defaults, Annotation, Binding, Bindings, ParamKind, ParamSpec, Signature,
    RESERVED_CONTEXT_NAME,
};
