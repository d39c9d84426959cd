use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::args::{Arg, Args, Kwargs};
use super::binder::{Binder, Payload, PayloadType};
use super::signature::Bindings;
use crate::error::HttpError;
use crate::server::{Reply, Request, CONTENT_TYPE_APPLICATION_JSON, FORM_CONTENT_TYPES};

/// User handler: receives the assembled arguments.
pub type RawHandler = Arc<dyn for<'r> Fn(Args<'r>) -> anyhow::Result<Reply> + Send + Sync>;

/// Immutable registration record for one route and method set.
///
/// Calling an endpoint binds the declared query, body and request parameters on
/// top of the routing keyword arguments and invokes the raw handler.
pub struct Endpoint {
    handler: RawHandler,
    defaults: Kwargs,
    options: Value,
    route_path: String,
    consumes: Vec<String>,
    produces: Vec<String>,
    bindings: Bindings,
}

impl Endpoint {
    pub(crate) fn new(
        handler: RawHandler,
        defaults: Kwargs,
        options: Value,
        route_path: String,
        consumes: Vec<String>,
        produces: Vec<String>,
        bindings: Bindings,
    ) -> Self {
        Self {
            handler,
            defaults,
            options,
            route_path,
            consumes: consumes.iter().map(|m| m.to_ascii_lowercase()).collect(),
            produces: produces.iter().map(|m| m.to_ascii_lowercase()).collect(),
            bindings,
        }
    }

    /// Defaults applied before path arguments.
    #[inline]
    #[must_use]
    pub fn defaults(&self) -> &Kwargs {
        &self.defaults
    }

    #[inline]
    #[must_use]
    pub fn options(&self) -> &Value {
        &self.options
    }

    /// Template the route was declared with.
    #[inline]
    #[must_use]
    pub fn route_path(&self) -> &str {
        &self.route_path
    }

    #[inline]
    #[must_use]
    pub fn consumes(&self) -> &[String] {
        &self.consumes
    }

    #[inline]
    #[must_use]
    pub fn produces(&self) -> &[String] {
        &self.produces
    }

    #[inline]
    #[must_use]
    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Whether a request with this media type is accepted.
    #[must_use]
    pub fn accepts_media_type(&self, content_type: Option<&str>) -> bool {
        self.consumes.is_empty()
            || content_type.is_some_and(|ct| self.consumes.iter().any(|c| c == ct))
    }

    /// Whether a response can satisfy this `Accept` header. A blank header counts as absent.
    #[must_use]
    pub fn satisfies_accept(&self, accept: Option<&str>) -> bool {
        let Some(accept) = accept.filter(|a| !a.trim().is_empty()) else {
            return true;
        };
        if self.produces.is_empty() {
            return true;
        }
        accept
            .split(',')
            .map(|range| {
                range
                    .split(';')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_ascii_lowercase()
            })
            .any(|range| range == "*/*" || self.produces.iter().any(|p| *p == range))
    }

    /// Bind the special parameters and call the handler.
    ///
    /// # Errors
    ///
    /// Binding failures as [`HttpError`]s, or whatever the handler returns.
    pub fn call<'r>(&self, request: &'r Request<'r>, kwargs: Kwargs) -> anyhow::Result<Reply> {
        let binder = request.config().binder.as_ref();
        let mut args = Args::new(kwargs);

        if let Some(query) = &self.bindings.query {
            let value = bind_query(binder, request, &query.payload)?;
            args.insert(&query.name, value);
        }
        if let Some(body) = &self.bindings.body {
            let payload = match request.content_type() {
                Some(CONTENT_TYPE_APPLICATION_JSON) => Payload::Json(request.json()?.clone()),
                Some(ct) if FORM_CONTENT_TYPES.contains(&ct) => Payload::Form(request.form()?.clone()),
                _ => return Err(HttpError::unsupported_media_type().into()),
            };
            args.insert(&body.name, binder.bind(payload, &body.payload)?);
        }
        if let Some(name) = &self.bindings.request {
            args.bind_request(name, request);
        }

        (self.handler)(args)
    }
}

fn bind_query(
    binder: &dyn Binder,
    request: &Request<'_>,
    payload: &PayloadType,
) -> Result<Arg, HttpError> {
    let params = request.query_parameters()?;
    let object: Map<String, Value> = params
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    binder.bind(Payload::Json(Value::Object(object)), payload)
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("route_path", &self.route_path)
            .field("defaults", &self.defaults)
            .field("options", &self.options)
            .field("consumes", &self.consumes)
            .field("produces", &self.produces)
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}
