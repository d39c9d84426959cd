//! Trie nodes.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use smallvec::SmallVec;

use super::core::PathRouter;
use super::params::{ParamType, PathMatcher};
use crate::endpoint::Endpoint;

/// Methods of a node in declaration order; most nodes carry one to four.
pub(crate) type MethodTable = SmallVec<[(Method, Arc<Endpoint>); 4]>;

/// One trie node.
///
/// A node is a route terminus iff its method table is non-empty.
#[derive(Default)]
pub(crate) struct PathEntry {
    pub(crate) literals: HashMap<String, PathEntry>,
    pub(crate) parameter: Option<Box<ParameterEntry>>,
    pub(crate) methods: MethodTable,
    pub(crate) subrouter: Option<Arc<PathRouter>>,
}

/// Typed parameter child of a node.
pub(crate) struct ParameterEntry {
    pub(crate) name: String,
    pub(crate) param_type: ParamType,
    pub(crate) matcher: Arc<dyn PathMatcher>,
    pub(crate) entry: PathEntry,
}

impl ParameterEntry {
    pub(crate) fn new(name: String, param_type: ParamType, matcher: Arc<dyn PathMatcher>) -> Self {
        Self {
            name,
            param_type,
            matcher,
            entry: PathEntry::default(),
        }
    }
}

/// Result of a single-segment step.
pub(crate) enum Step<'a> {
    Literal(&'a PathEntry),
    Parameter(&'a ParameterEntry),
}

impl PathEntry {
    /// Child for `segment`: literal first, then the parameter if it matches, then
    /// the mounted sub-router's root. The first hit is final.
    pub(crate) fn step(&self, segment: &str) -> Option<Step<'_>> {
        if let Some(entry) = self.literals.get(segment) {
            return Some(Step::Literal(entry));
        }
        if let Some(param) = self.parameter.as_deref() {
            if param.matcher.matches(segment) {
                return Some(Step::Parameter(param));
            }
        }
        self.subrouter
            .as_deref()
            .and_then(|router| router.root().step(segment))
    }

    #[inline]
    pub(crate) fn has_methods(&self) -> bool {
        !self.methods.is_empty()
    }

    pub(crate) fn endpoint(&self, method: &str) -> Option<&Arc<Endpoint>> {
        self.methods
            .iter()
            .find(|(m, _)| m.as_str() == method)
            .map(|(_, endpoint)| endpoint)
    }

    pub(crate) fn allowed_methods(&self) -> Vec<Method> {
        self.methods.iter().map(|(m, _)| m.clone()).collect()
    }

    pub(crate) fn add_endpoint(&mut self, methods: &[Method], endpoint: &Arc<Endpoint>) {
        for method in methods {
            self.methods.push((method.clone(), Arc::clone(endpoint)));
        }
    }
}
