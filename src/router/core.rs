//! Path router: route registration, sub-router mounting and resolution.

use std::collections::BTreeSet;
use std::sync::Arc;

use http::Method;
use serde_json::Value;
use tracing::{debug, info};

use super::params::{ParamType, ParamTypes, PathMatcher};
use super::route::Route;
use super::tree::{ParameterEntry, PathEntry, Step};
use crate::endpoint::{
    analyze, collect_defaults, Annotation, Endpoint, Kwargs, RoutingArgs, Signature,
    RESERVED_CONTEXT_NAME,
};
use crate::error::{ConfigError, HttpError};
use crate::server::{media_type, Environ, RouteInfo};

/// Maps a request environment to an endpoint.
///
/// Implementations write the routing metadata ([`RouteInfo`]) into the
/// environment on success.
pub trait Resolve: Send + Sync {
    /// # Errors
    ///
    /// `404`, `405`, `415` or `406` as [`HttpError`].
    fn resolve(&self, environ: &mut Environ) -> Result<Arc<Endpoint>, HttpError>;
}

/// One registered route, as reported by [`PathRouter::routes`].
#[derive(Debug, Clone)]
pub struct RouteDefinition {
    pub segments: Vec<RouteSegment>,
    pub method: Method,
    pub endpoint: Arc<Endpoint>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteSegment {
    Literal(String),
    Parameter { name: String, param_type: ParamType },
}

impl RouteDefinition {
    /// Canonical `/a/{b:int}` form of the route.
    #[must_use]
    pub fn template(&self) -> String {
        if self.segments.is_empty() {
            return "/".to_string();
        }
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            match segment {
                RouteSegment::Literal(s) => out.push_str(s),
                RouteSegment::Parameter { name, param_type } => {
                    out.push('{');
                    out.push_str(name);
                    out.push(':');
                    out.push_str(param_type.name());
                    out.push('}');
                }
            }
        }
        out
    }
}

/// Segment trie router.
///
/// Built single-threaded at startup, then shared read-only; resolution takes `&self`.
pub struct PathRouter {
    root: PathEntry,
    param_types: ParamTypes,
    parameter_start: String,
    parameter_end: String,
    default_options: Value,
}

impl Default for PathRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl PathRouter {
    /// Router with `{name}` parameter syntax and the built-in parameter types.
    #[must_use]
    pub fn new() -> Self {
        Self::with_delimiters("{", "}")
    }

    /// Router with custom parameter delimiters; `end` may be empty, in which case
    /// the parameter name runs to the end of the segment.
    #[must_use]
    pub fn with_delimiters(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            root: PathEntry::default(),
            param_types: ParamTypes::default(),
            parameter_start: start.into(),
            parameter_end: end.into(),
            default_options: Value::Null,
        }
    }

    /// Options attached to routes that do not declare their own.
    #[must_use]
    pub fn default_options(mut self, options: Value) -> Self {
        self.default_options = options;
        self
    }

    /// Register a matcher for a custom parameter type.
    pub fn register_param_type<M: PathMatcher + 'static>(&mut self, param_type: ParamType, matcher: M) {
        self.param_types.register(param_type, matcher);
    }

    pub(crate) fn root(&self) -> &PathEntry {
        &self.root
    }

    /// Register a route.
    ///
    /// # Errors
    ///
    /// A [`ConfigError`] describing the first problem with the declaration. The
    /// router must not be used for serving after a failed registration.
    pub fn add_route(&mut self, route: Route) -> Result<(), ConfigError> {
        let Route {
            path,
            methods,
            signature,
            handler,
            defaults,
            options,
            consumes,
            produces,
        } = route;

        if methods.is_empty() {
            return Err(ConfigError::NoMethods { route: path });
        }
        let Some(handler) = handler else {
            return Err(ConfigError::MissingHandler { route: path });
        };
        let options = options.unwrap_or_else(|| self.default_options.clone());

        let (entry, path_names) = self.parse_route_path(&path, Some(&signature))?;
        let bindings = analyze(&path, &signature, &path_names, &defaults)?;

        let redefined: Vec<Method> = methods
            .iter()
            .filter(|m| entry.endpoint(m.as_str()).is_some())
            .cloned()
            .collect();
        if !redefined.is_empty() {
            return Err(ConfigError::Redefinition {
                route: path,
                methods: redefined,
            });
        }

        let defaults = collect_defaults(&signature, defaults);
        let endpoint = Arc::new(Endpoint::new(
            handler,
            defaults,
            options,
            path.clone(),
            consumes,
            produces,
            bindings,
        ));
        entry.add_endpoint(&methods, &endpoint);

        info!(
            route_path = %path,
            methods = ?methods.iter().map(Method::as_str).collect::<Vec<_>>(),
            "Route registered"
        );
        Ok(())
    }

    /// Mount `router` under a literal `prefix`.
    ///
    /// The sub-router is shared, not copied, and is frozen from here on: finish
    /// registering its routes before mounting it.
    ///
    /// # Errors
    ///
    /// Root prefix, parameters in the prefix, or a second sub-router on the same node.
    pub fn add_subrouter(&mut self, prefix: &str, router: Arc<PathRouter>) -> Result<(), ConfigError> {
        if prefix == "/" {
            return Err(ConfigError::MissingSubrouterPrefix {
                route: prefix.to_string(),
            });
        }
        let (entry, _) = self.parse_route_path(prefix, None)?;
        if entry.subrouter.is_some() {
            return Err(ConfigError::DuplicateSubrouter {
                route: prefix.to_string(),
            });
        }
        entry.subrouter = Some(router);
        info!(prefix = %prefix, "Subrouter attached");
        Ok(())
    }

    /// Walk (creating as needed) the nodes of `route` and return the terminal node
    /// and the parameter names it binds. Without a signature every parameter
    /// segment is rejected.
    fn parse_route_path(
        &mut self,
        route: &str,
        signature: Option<&Signature>,
    ) -> Result<(&mut PathEntry, BTreeSet<String>), ConfigError> {
        let mut names = BTreeSet::new();
        let param_types = &self.param_types;
        let (start, end) = (self.parameter_start.as_str(), self.parameter_end.as_str());
        let mut entry = &mut self.root;

        if route == "/" {
            return Ok((entry, names));
        }

        for segment in split_path(route) {
            if segment.is_empty() {
                return Err(ConfigError::MissingPathSegment {
                    route: route.to_string(),
                });
            }
            if !segment.starts_with(start) {
                entry = entry.literals.entry(segment.to_string()).or_default();
                continue;
            }

            let Some(signature) = signature else {
                return Err(ConfigError::ParametersNotAllowed {
                    route: route.to_string(),
                });
            };
            let (name, param_type, matcher) =
                parse_parameter(route, segment, start, end, signature, param_types)?;

            if name == RESERVED_CONTEXT_NAME {
                return Err(ConfigError::ReservedParameter {
                    route: route.to_string(),
                    name,
                });
            }
            if names.contains(&name) {
                return Err(ConfigError::DuplicateParameter {
                    route: route.to_string(),
                    name,
                });
            }
            if let Some(existing) = entry.parameter.as_deref() {
                if existing.name != name || existing.param_type != param_type {
                    return Err(ConfigError::IncompatibleParameter {
                        route: route.to_string(),
                        name,
                    });
                }
            }

            names.insert(name.clone());
            entry = &mut entry
                .parameter
                .get_or_insert_with(|| Box::new(ParameterEntry::new(name, param_type, matcher)))
                .entry;
        }
        Ok((entry, names))
    }

    /// Walk the trie for `path` and collect converted path arguments.
    ///
    /// `None`, `""` and `"/"` address the root.
    ///
    /// # Errors
    ///
    /// `404` when a segment has no child or the terminal node has no methods.
    pub(crate) fn lookup(&self, path: Option<&str>) -> Result<(&PathEntry, Kwargs), HttpError> {
        let not_found = || HttpError::not_found(path);
        let mut entry = &self.root;
        let mut args = Kwargs::new();

        if let Some(path) = path.filter(|p| !p.is_empty() && *p != "/") {
            for segment in split_path(path) {
                entry = match entry.step(segment).ok_or_else(not_found)? {
                    Step::Literal(next) => next,
                    Step::Parameter(param) => {
                        let value = param.matcher.convert(segment).ok_or_else(not_found)?;
                        args.insert(param.name.clone(), value);
                        &param.entry
                    }
                };
            }
        }

        if !entry.has_methods() {
            return Err(not_found());
        }
        Ok((entry, args))
    }

    /// Resolve a request without touching an environment.
    ///
    /// Returns the endpoint and the routing keyword arguments (defaults overlaid
    /// with path arguments).
    ///
    /// # Errors
    ///
    /// `404`, `405`, `415` or `406`.
    pub fn resolve_route(
        &self,
        method: &str,
        path: Option<&str>,
        content_type: Option<&str>,
        accept: Option<&str>,
    ) -> Result<(Arc<Endpoint>, Kwargs), HttpError> {
        let (entry, path_args) = self.lookup(path).inspect_err(|_| {
            debug!(method = %method, path = ?path, "No route matched");
        })?;

        let Some(endpoint) = entry.endpoint(method) else {
            let allowed = entry.allowed_methods();
            debug!(method = %method, path = ?path, allowed = ?allowed, "Method not allowed");
            return Err(HttpError::method_not_allowed(allowed));
        };

        let content_type = content_type.map(media_type);
        if !endpoint.accepts_media_type(content_type.as_deref()) {
            return Err(HttpError::unsupported_media_type());
        }
        if !endpoint.satisfies_accept(accept) {
            return Err(HttpError::not_acceptable());
        }

        let mut kwargs = endpoint.defaults().clone();
        kwargs.extend(path_args);
        debug!(
            method = %method,
            path = ?path,
            route_path = %endpoint.route_path(),
            "Route matched"
        );
        Ok((Arc::clone(endpoint), kwargs))
    }

    /// Every registered route, sub-routers included.
    #[must_use]
    pub fn routes(&self) -> Vec<RouteDefinition> {
        let mut out = Vec::new();
        collect_routes(&self.root, &mut Vec::new(), &mut out);
        out
    }

    /// Log the route table at `info`.
    pub fn dump_routes(&self) {
        for route in self.routes() {
            info!(
                method = %route.method,
                template = %route.template(),
                route_path = %route.endpoint.route_path(),
                "Route"
            );
        }
    }
}

impl Resolve for PathRouter {
    fn resolve(&self, environ: &mut Environ) -> Result<Arc<Endpoint>, HttpError> {
        let (endpoint, named) = self.resolve_route(
            environ.method(),
            environ.path_info(),
            environ.header("content-type"),
            environ.header("accept"),
        )?;
        environ.set_route(RouteInfo {
            options: endpoint.options().clone(),
            path: endpoint.route_path().to_string(),
            args: RoutingArgs {
                positional: Vec::new(),
                named,
            },
        });
        Ok(endpoint)
    }
}

impl std::fmt::Debug for PathRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathRouter")
            .field("parameter_start", &self.parameter_start)
            .field("parameter_end", &self.parameter_end)
            .field("param_types", &self.param_types)
            .field("routes", &self.routes().len())
            .finish()
    }
}

/// Segments of a path with the leading `/` removed.
pub(crate) fn split_path(path: &str) -> std::str::Split<'_, char> {
    path.strip_prefix('/').unwrap_or(path).split('/')
}

fn parse_parameter(
    route: &str,
    segment: &str,
    start: &str,
    end: &str,
    signature: &Signature,
    param_types: &ParamTypes,
) -> Result<(String, ParamType, Arc<dyn PathMatcher>), ConfigError> {
    let invalid = || ConfigError::InvalidParameterDefinition {
        route: route.to_string(),
        segment: segment.to_string(),
    };
    let inner = segment.strip_prefix(start).ok_or_else(invalid)?;
    let inner = if end.is_empty() {
        inner
    } else {
        inner.strip_suffix(end).ok_or_else(invalid)?
    };
    let (name, hint) = match inner.split_once(':') {
        Some((_, "")) => return Err(invalid()),
        Some((name, hint)) => (name, Some(hint)),
        None => (inner, None),
    };
    if name.is_empty() {
        return Err(invalid());
    }

    let Some(spec) = signature.get(name) else {
        return Err(ConfigError::ParameterNotDefined {
            route: route.to_string(),
            name: name.to_string(),
        });
    };
    if !spec.is_keyword() {
        return Err(ConfigError::ParameterNotKeyword {
            route: route.to_string(),
            name: name.to_string(),
        });
    }
    let param_type = match (hint, &spec.annotation) {
        (Some(hint), _) => ParamType::new(hint.to_string()),
        (None, Annotation::Type(declared)) => declared.clone(),
        (None, _) => {
            return Err(ConfigError::MissingTypeAnnotation {
                route: route.to_string(),
                name: name.to_string(),
            })
        }
    };
    let Some(matcher) = param_types.get(&param_type) else {
        return Err(ConfigError::UnknownParameterType {
            route: route.to_string(),
            name: name.to_string(),
            type_name: param_type.name().to_string(),
        });
    };
    Ok((name.to_string(), param_type, matcher))
}

fn collect_routes(entry: &PathEntry, prefix: &mut Vec<RouteSegment>, out: &mut Vec<RouteDefinition>) {
    for (method, endpoint) in &entry.methods {
        out.push(RouteDefinition {
            segments: prefix.clone(),
            method: method.clone(),
            endpoint: Arc::clone(endpoint),
        });
    }

    let mut literals: Vec<(&String, &PathEntry)> = entry.literals.iter().collect();
    literals.sort_by(|a, b| a.0.cmp(b.0));
    for (segment, child) in literals {
        prefix.push(RouteSegment::Literal(segment.clone()));
        collect_routes(child, prefix, out);
        prefix.pop();
    }

    if let Some(param) = entry.parameter.as_deref() {
        prefix.push(RouteSegment::Parameter {
            name: param.name.clone(),
            param_type: param.param_type.clone(),
        });
        collect_routes(&param.entry, prefix, out);
        prefix.pop();
    }

    if let Some(router) = entry.subrouter.as_deref() {
        collect_routes(router.root(), prefix, out);
    }
}
