use std::sync::Arc;

use http::Method;
use tracing::{debug, error, info_span};

use super::compress::compress_response;
use super::environ::Environ;
use super::request::Request;
use super::response::{convert_reply, Body, Reply, Response};
use crate::config::AppConfig;
use crate::ids::RequestId;
use crate::router::Resolve;

/// Request-handling boundary between the transport and the router.
///
/// Every failure on the way (resolution, hooks, binding, the handler itself) is
/// funnelled through the configured error handler, so the transport always gets
/// a response.
pub struct App {
    resolver: Arc<dyn Resolve>,
    config: AppConfig,
}

impl App {
    #[must_use]
    pub fn new<R: Resolve + 'static>(resolver: R, config: AppConfig) -> Self {
        Self::shared(Arc::new(resolver), config)
    }

    #[must_use]
    pub fn shared(resolver: Arc<dyn Resolve>, config: AppConfig) -> Self {
        Self { resolver, config }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Handle one request and return the converted response.
    pub fn handle(&self, environ: &mut Environ) -> Response {
        let request_id = RequestId::from_header_or_new(environ.header("x-request-id"));
        let span = info_span!(
            "request",
            request_id = %request_id,
            method = %environ.method(),
            path = ?environ.path_info(),
        );
        let _guard = span.enter();

        let reply = match self.dispatch(environ, request_id) {
            Ok(reply) => reply,
            Err(err) => (self.config.error_handler)(environ, err),
        };

        let mut response = match convert_reply(&self.config, reply) {
            Ok(response) => response,
            Err(err) => {
                error!(error = %err, route_path = ?environ.route_path(), "Result conversion failed");
                Response::internal_error()
            }
        };

        compress_response(
            &self.config.compression,
            environ.header("accept-encoding"),
            &mut response,
        );

        if let Some(after) = &self.config.after_request {
            after(response.status, &mut response.headers, environ);
        }

        if environ.method() == Method::HEAD.as_str() {
            response.body = Body::Empty;
        }

        debug!(status = response.status.as_u16(), "Request handled");
        response
    }

    /// Gateway entry point: emit the status line and headers through
    /// `start_response` and return the body.
    pub fn call<F>(&self, mut environ: Environ, start_response: F) -> Body
    where
        F: FnOnce(&str, &[(String, String)]),
    {
        let response = self.handle(&mut environ);
        start_response(&response.status_line(), &response.header_list());
        response.body
    }

    fn dispatch(&self, environ: &mut Environ, request_id: RequestId) -> anyhow::Result<Reply> {
        let endpoint = self.resolver.resolve(environ)?;
        let input = environ.take_input();
        let kwargs = environ
            .routing_args()
            .map(|args| args.named.clone())
            .unwrap_or_default();

        let environ: &Environ = environ;
        let request = Request::new(&self.config, environ, input, request_id);
        if let Some(before) = &self.config.before_request {
            before(&request)?;
        }
        endpoint.call(&request, kwargs)
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
