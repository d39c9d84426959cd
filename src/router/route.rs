use std::sync::Arc;

use http::Method;
use serde_json::Value;

use super::params::ParamType;
use crate::endpoint::{
    Annotation, Arg, Args, Kwargs, ParamKind, ParamSpec, PayloadType, RawHandler, Signature,
};
use crate::server::Reply;

/// Route declaration passed to [`PathRouter::add_route`](super::PathRouter::add_route).
///
/// The handler's parameters are declared next to the template so registration can
/// cross-check them:
///
/// ```rust
/// use http::Method;
/// use pathrouter::router::{ParamType, PathRouter, Route};
/// use pathrouter::server::Reply;
/// use serde_json::json;
///
/// let mut router = PathRouter::new();
/// router
///     .add_route(
///         Route::new("/items/{id}", [Method::GET])
///             .param("id", ParamType::INT)
///             .handler(|args| Ok(Reply::Json(json!({ "id": args.int("id") })))),
///     )
///     .unwrap();
/// ```
pub struct Route {
    pub(crate) path: String,
    pub(crate) methods: Vec<Method>,
    pub(crate) signature: Signature,
    pub(crate) handler: Option<RawHandler>,
    pub(crate) defaults: Kwargs,
    pub(crate) options: Option<Value>,
    pub(crate) consumes: Vec<String>,
    pub(crate) produces: Vec<String>,
}

impl Route {
    #[must_use]
    pub fn new<I>(path: impl Into<String>, methods: I) -> Self
    where
        I: IntoIterator<Item = Method>,
    {
        let mut unique: Vec<Method> = Vec::new();
        for method in methods {
            if !unique.contains(&method) {
                unique.push(method);
            }
        }
        Self {
            path: path.into(),
            methods: unique,
            signature: Signature::new(),
            handler: None,
            defaults: Kwargs::new(),
            options: None,
            consumes: Vec::new(),
            produces: Vec::new(),
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(path, [Method::GET])
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(path, [Method::POST])
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(path, [Method::PUT])
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(path, [Method::DELETE])
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Add a fully specified parameter.
    #[must_use]
    pub fn arg(mut self, param: ParamSpec) -> Self {
        self.signature.push(param);
        self
    }

    /// Replace the declared parameters.
    #[must_use]
    pub fn signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    /// Keyword parameter with a path-convertible type.
    #[must_use]
    pub fn param(self, name: impl Into<String>, param_type: ParamType) -> Self {
        self.arg(ParamSpec::new(name).annotation(Annotation::Type(param_type)))
    }

    /// Typed keyword parameter with its own default.
    #[must_use]
    pub fn param_default(
        self,
        name: impl Into<String>,
        param_type: ParamType,
        default: impl Into<Arg>,
    ) -> Self {
        self.arg(
            ParamSpec::new(name)
                .annotation(Annotation::Type(param_type))
                .default_value(default),
        )
    }

    /// Keyword parameter without a declared type.
    #[must_use]
    pub fn untyped(self, name: impl Into<String>) -> Self {
        self.arg(ParamSpec::new(name))
    }

    /// Parameter receiving the query parameters.
    #[must_use]
    pub fn query(self, name: impl Into<String>, payload: PayloadType) -> Self {
        self.arg(ParamSpec::new(name).annotation(Annotation::Query(payload)))
    }

    /// Parameter receiving the decoded body.
    #[must_use]
    pub fn body(self, name: impl Into<String>, payload: PayloadType) -> Self {
        self.arg(ParamSpec::new(name).annotation(Annotation::Body(payload)))
    }

    /// Parameter receiving the request facade.
    #[must_use]
    pub fn request(self, name: impl Into<String>) -> Self {
        self.arg(ParamSpec::new(name).annotation(Annotation::Request))
    }

    #[must_use]
    pub fn var_positional(self, name: impl Into<String>) -> Self {
        self.arg(ParamSpec::new(name).kind(ParamKind::VarPositional))
    }

    #[must_use]
    pub fn var_keyword(self, name: impl Into<String>) -> Self {
        self.arg(ParamSpec::new(name).kind(ParamKind::VarKeyword))
    }

    /// Route-level default; applied before path arguments.
    #[must_use]
    pub fn default(mut self, name: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    /// Opaque options exposed to hooks after resolution.
    #[must_use]
    pub fn options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }

    /// Accepted request media type; may be called repeatedly.
    #[must_use]
    pub fn consumes(mut self, media_type: impl Into<String>) -> Self {
        self.consumes.push(media_type.into());
        self
    }

    /// Produced response media type; may be called repeatedly.
    #[must_use]
    pub fn produces(mut self, media_type: impl Into<String>) -> Self {
        self.produces.push(media_type.into());
        self
    }

    #[must_use]
    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: for<'r> Fn(Args<'r>) -> anyhow::Result<Reply> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Share one handler between several routes.
    #[must_use]
    pub fn shared_handler(mut self, handler: RawHandler) -> Self {
        self.handler = Some(handler);
        self
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("methods", &self.methods)
            .field("signature", &self.signature)
            .field("has_handler", &self.handler.is_some())
            .field("defaults", &self.defaults)
            .field("options", &self.options)
            .field("consumes", &self.consumes)
            .field("produces", &self.produces)
            .finish()
    }
}
