use std::sync::Arc;

use tracing::debug;

use super::core::Resolve;
use crate::endpoint::Endpoint;
use crate::error::{ConfigError, HttpError};
use crate::server::Environ;

/// Dispatches on a literal path prefix to independent resolvers.
///
/// The longest prefix matching on whole segments wins. The matched prefix is
/// moved from `path_info` to the end of `script_name` before delegating, so the
/// delegate sees only the remainder of the path.
#[derive(Default)]
pub struct PrefixRouter {
    // longest prefix first
    routes: Vec<(String, Arc<dyn Resolve>)>,
}

impl PrefixRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount `resolver` under `prefix` (e.g. `/api`).
    ///
    /// # Errors
    ///
    /// Root or malformed prefixes, parameter syntax, or a duplicate prefix.
    pub fn add<R: Resolve + 'static>(&mut self, prefix: &str, resolver: R) -> Result<(), ConfigError> {
        self.add_shared(prefix, Arc::new(resolver))
    }

    /// Mount a shared resolver under `prefix`.
    ///
    /// # Errors
    ///
    /// Same as [`PrefixRouter::add`].
    pub fn add_shared(&mut self, prefix: &str, resolver: Arc<dyn Resolve>) -> Result<(), ConfigError> {
        let route = prefix.to_string();
        if prefix.is_empty() || prefix == "/" {
            return Err(ConfigError::MissingSubrouterPrefix { route });
        }
        if !prefix.starts_with('/') || prefix.ends_with('/') || prefix.contains("//") {
            return Err(ConfigError::MissingPathSegment { route });
        }
        if prefix.contains('{') || prefix.contains('}') {
            return Err(ConfigError::ParametersNotAllowed { route });
        }
        if self.routes.iter().any(|(existing, _)| existing == prefix) {
            return Err(ConfigError::DuplicateSubrouter { route });
        }
        self.routes.push((route, resolver));
        self.routes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Ok(())
    }

    #[must_use]
    pub fn prefixes(&self) -> Vec<&str> {
        self.routes.iter().map(|(prefix, _)| prefix.as_str()).collect()
    }
}

impl Resolve for PrefixRouter {
    fn resolve(&self, environ: &mut Environ) -> Result<Arc<Endpoint>, HttpError> {
        let path = environ.path_info().unwrap_or_default();
        let matched = self.routes.iter().find_map(|(prefix, resolver)| {
            let rest = path.strip_prefix(prefix.as_str())?;
            (rest.is_empty() || rest.starts_with('/')).then(|| (prefix, rest.to_string(), resolver))
        });
        let Some((prefix, rest, resolver)) = matched else {
            debug!(path = %path, "No prefix matched");
            return Err(HttpError::not_found(environ.path_info()));
        };

        let script_name = format!("{}{prefix}", environ.script_name());
        environ.set_script_name(script_name);
        environ.set_path_info(rest);
        resolver.resolve(environ)
    }
}

impl std::fmt::Debug for PrefixRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefixRouter")
            .field("prefixes", &self.prefixes())
            .finish()
    }
}
