//! Declared handler parameters and their registration-time analysis.
//!
//! Handlers are plain closures, so the parameter list a route exposes is declared
//! explicitly: every [`ParamSpec`] has a name, a kind (keyword or variadic), an
//! optional [`Annotation`] and an optional default. [`analyze`] cross-checks that
//! list against the path template and the route defaults and classifies the
//! special query, body and request bindings.

use std::collections::BTreeSet;

use super::args::{Arg, Kwargs};
use super::binder::PayloadType;
use crate::error::ConfigError;
use crate::router::ParamType;

/// Name reserved for the request context; never a path parameter.
pub const RESERVED_CONTEXT_NAME: &str = "__request";

/// How a parameter receives its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Passed by name
    Keyword,
    /// Collects extra positional values
    VarPositional,
    /// Collects extra keyword values
    VarKeyword,
}

/// Declared type or binding role of a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    None,
    /// Path-convertible type
    Type(ParamType),
    /// Aggregated query parameters
    Query(PayloadType),
    /// Decoded request body
    Body(PayloadType),
    /// The live request facade
    Request,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub annotation: Annotation,
    pub default: Option<Arg>,
}

impl ParamSpec {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Keyword,
            annotation: Annotation::None,
            default: None,
        }
    }

    #[must_use]
    pub fn kind(mut self, kind: ParamKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn annotation(mut self, annotation: Annotation) -> Self {
        self.annotation = annotation;
        self
    }

    #[must_use]
    pub fn default_value(mut self, default: impl Into<Arg>) -> Self {
        self.default = Some(default.into());
        self
    }

    #[must_use]
    pub fn is_keyword(&self) -> bool {
        self.kind == ParamKind::Keyword
    }
}

/// Ordered parameter list of a handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    params: Vec<ParamSpec>,
}

impl Signature {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, param: ParamSpec) {
        self.params.push(param);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Target of a query or body binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub payload: PayloadType,
}

/// Special bindings found on a signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    pub query: Option<Binding>,
    pub body: Option<Binding>,
    /// Parameter receiving the request context
    pub request: Option<String>,
}

/// Validate a signature against its route and collect the special bindings.
///
/// `path_names` holds the parameters the template already provides. Checks, in
/// order: one binding of each kind, bindings only on keyword parameters, defaults
/// only for keyword parameters not covered by the path, and every remaining
/// keyword parameter without its own default covered by a binding or a route
/// default.
///
/// # Errors
///
/// The first [`ConfigError`] found.
pub fn analyze(
    route: &str,
    signature: &Signature,
    path_names: &BTreeSet<String>,
    defaults: &Kwargs,
) -> Result<Bindings, ConfigError> {
    let query = binding_parameter(route, signature, "Query", |a| matches!(a, Annotation::Query(_)))?;
    let body = binding_parameter(route, signature, "Body", |a| matches!(a, Annotation::Body(_)))?;
    let request = binding_parameter(route, signature, "Request", |a| matches!(a, Annotation::Request))?;

    let mut bindings = Bindings::default();
    let mut bound: BTreeSet<&str> = BTreeSet::new();
    for param in [query, body, request].into_iter().flatten() {
        match &param.annotation {
            Annotation::Query(payload) => {
                bindings.query = Some(Binding {
                    name: param.name.clone(),
                    payload: payload.clone(),
                });
            }
            Annotation::Body(payload) => {
                bindings.body = Some(Binding {
                    name: param.name.clone(),
                    payload: payload.clone(),
                });
            }
            Annotation::Request => bindings.request = Some(param.name.clone()),
            Annotation::None | Annotation::Type(_) => continue,
        }
        bound.insert(&param.name);
    }

    let illegal: Vec<String> = defaults
        .keys()
        .filter(|name| {
            path_names.contains(*name)
                || !signature.get(name).is_some_and(ParamSpec::is_keyword)
        })
        .cloned()
        .collect();
    if !illegal.is_empty() {
        return Err(ConfigError::IllegalDefaults {
            route: route.to_string(),
            names: illegal,
        });
    }

    let missing: Vec<String> = signature
        .iter()
        .filter(|p| p.is_keyword() && p.default.is_none())
        .map(|p| p.name.as_str())
        .filter(|name| {
            !path_names.contains(*name) && !bound.contains(name) && !defaults.contains_key(*name)
        })
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(ConfigError::ParameterNotInitialized {
            route: route.to_string(),
            names: missing,
        });
    }

    Ok(bindings)
}

/// The single parameter carrying a binding kind, if any.
fn binding_parameter<'s>(
    route: &str,
    signature: &'s Signature,
    binding: &'static str,
    is_kind: impl Fn(&Annotation) -> bool,
) -> Result<Option<&'s ParamSpec>, ConfigError> {
    let mut found = signature.iter().filter(|p| is_kind(&p.annotation));
    let first = found.next();
    if found.next().is_some() {
        return Err(ConfigError::TooManyBindings {
            route: route.to_string(),
            binding,
        });
    }
    match first {
        Some(param) if !param.is_keyword() => Err(ConfigError::IncompatibleBinding {
            route: route.to_string(),
            name: param.name.clone(),
        }),
        other => Ok(other),
    }
}

/// Signature defaults merged with route defaults; route defaults win.
#[must_use]
pub fn collect_defaults(signature: &Signature, defaults: Kwargs) -> Kwargs {
    let mut merged: Kwargs = signature
        .iter()
        .filter(|p| p.is_keyword())
        .filter_map(|p| p.default.clone().map(|d| (p.name.clone(), d)))
        .collect();
    merged.extend(defaults);
    merged
}
