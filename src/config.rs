//! # Application Configuration
//!
//! [`AppConfig`] is the explicit configuration object handed to
//! [`App`](crate::server::App). It carries the request hooks, result converters,
//! the JSON codec, the payload binder, the error handler and response compression
//! settings. Nothing here is global: two applications in one process can be
//! configured independently.
//!
//! The scalar part of the configuration lives in [`AppSettings`], which can be
//! deserialized from TOML or read from the environment.
//!
//! ## Environment Variables
//!
//! | Variable | Field |
//! |----------|-------|
//! | `PATHROUTER_MAX_CONTENT_LENGTH` | `max_content_length` (bytes) |
//! | `PATHROUTER_DEFAULT_STR_CONTENT_TYPE` | `default_str_content_type` |
//! | `PATHROUTER_COMPRESS` | `compression.enabled` (`1`/`true` enables) |
//! | `PATHROUTER_COMPRESS_LEVEL` | `compression.level` (0-9) |
//! | `PATHROUTER_COMPRESS_MIN_LENGTH` | `compression.min_length` (bytes) |
//!
//! Unparseable values keep the default.

use std::env;
use std::fmt;
use std::sync::Arc;

use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

use crate::endpoint::{Binder, TypeCheckBinder};
use crate::error::HttpError;
use crate::server::{CompressionConfig, Environ, Reply, Request, ResultConverter};

pub const DEFAULT_STR_CONTENT_TYPE: &str = "text/plain;charset=utf-8";

/// Pluggable JSON encoding and decoding.
pub trait JsonCodec: Send + Sync {
    /// # Errors
    ///
    /// Malformed input.
    fn decode(&self, data: &[u8]) -> anyhow::Result<Value>;

    /// # Errors
    ///
    /// Values the codec cannot represent.
    fn encode(&self, value: &Value) -> anyhow::Result<Vec<u8>>;
}

/// `serde_json` codec producing compact output.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeJsonCodec;

impl JsonCodec for SerdeJsonCodec {
    fn decode(&self, data: &[u8]) -> anyhow::Result<Value> {
        Ok(serde_json::from_slice(data)?)
    }

    fn encode(&self, value: &Value) -> anyhow::Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }
}

/// Runs after resolution and before the handler; an error aborts the request.
pub type BeforeRequestHook = Arc<dyn Fn(&Request<'_>) -> anyhow::Result<()> + Send + Sync>;

/// Runs after conversion; may rewrite response headers.
pub type AfterRequestHook = Arc<dyn Fn(StatusCode, &mut HeaderMap, &Environ) + Send + Sync>;

/// Turns any error raised while handling a request into a reply.
pub type ErrorHandler = Arc<dyn Fn(&Environ, anyhow::Error) -> Reply + Send + Sync>;

/// Default error handler.
///
/// [`HttpError`]s become their status, payload and headers. Anything else is logged
/// and answered with a bare 500.
#[must_use]
pub fn default_error_handler(environ: &Environ, err: anyhow::Error) -> Reply {
    match err.downcast::<HttpError>() {
        Ok(http_error) => Reply::from(http_error),
        Err(err) => {
            error!(
                method = %environ.method(),
                path = ?environ.path_info(),
                error = ?err,
                "Unhandled exception"
            );
            Reply::from(HttpError::internal())
        }
    }
}

/// Scalar application settings.
///
/// ```rust
/// use pathrouter::config::AppSettings;
///
/// let settings = AppSettings::from_toml_str(r#"
///     max_content_length = 1048576
///
///     [compression]
///     enabled = true
///     min_length = 1024
/// "#).unwrap();
/// assert_eq!(settings.max_content_length, Some(1_048_576));
/// assert_eq!(settings.compression.min_length, 1024);
/// assert!(settings.compression.enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Largest accepted request body in bytes; `None` means unlimited
    pub max_content_length: Option<u64>,
    /// `Content-Type` for text results that do not set one
    pub default_str_content_type: String,
    pub compression: CompressionConfig,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            max_content_length: None,
            default_str_content_type: DEFAULT_STR_CONTENT_TYPE.to_string(),
            compression: CompressionConfig::default(),
        }
    }
}

impl AppSettings {
    /// # Errors
    ///
    /// Invalid TOML or mismatched field types.
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    /// Load settings from `PATHROUTER_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Some(max) = env_parse::<u64>("PATHROUTER_MAX_CONTENT_LENGTH") {
            settings.max_content_length = Some(max);
        }
        if let Ok(content_type) = env::var("PATHROUTER_DEFAULT_STR_CONTENT_TYPE") {
            if !content_type.trim().is_empty() {
                settings.default_str_content_type = content_type;
            }
        }
        if let Ok(enabled) = env::var("PATHROUTER_COMPRESS") {
            settings.compression.enabled =
                matches!(enabled.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(level) = env_parse::<u32>("PATHROUTER_COMPRESS_LEVEL") {
            settings.compression.level = level.min(9);
        }
        if let Some(min_length) = env_parse::<usize>("PATHROUTER_COMPRESS_MIN_LENGTH") {
            settings.compression.min_length = min_length;
        }
        settings
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Per-application configuration.
#[derive(Clone)]
pub struct AppConfig {
    pub before_request: Option<BeforeRequestHook>,
    pub after_request: Option<AfterRequestHook>,
    /// Consulted in order for object results; first match wins
    pub result_converters: Vec<ResultConverter>,
    pub default_str_content_type: String,
    pub max_content_length: Option<u64>,
    pub json_codec: Arc<dyn JsonCodec>,
    pub binder: Arc<dyn Binder>,
    pub error_handler: ErrorHandler,
    pub compression: CompressionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_settings(AppSettings::default())
    }
}

impl AppConfig {
    #[must_use]
    pub fn from_settings(settings: AppSettings) -> Self {
        Self {
            before_request: None,
            after_request: None,
            result_converters: Vec::new(),
            default_str_content_type: settings.default_str_content_type,
            max_content_length: settings.max_content_length,
            json_codec: Arc::new(SerdeJsonCodec),
            binder: Arc::new(TypeCheckBinder),
            error_handler: Arc::new(default_error_handler),
            compression: settings.compression,
        }
    }

    #[must_use]
    pub fn before_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Request<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.before_request = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn after_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(StatusCode, &mut HeaderMap, &Environ) + Send + Sync + 'static,
    {
        self.after_request = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn result_converter(mut self, converter: ResultConverter) -> Self {
        self.result_converters.push(converter);
        self
    }

    #[must_use]
    pub fn binder<B: Binder + 'static>(mut self, binder: B) -> Self {
        self.binder = Arc::new(binder);
        self
    }

    #[must_use]
    pub fn json_codec<C: JsonCodec + 'static>(mut self, codec: C) -> Self {
        self.json_codec = Arc::new(codec);
        self
    }

    #[must_use]
    pub fn error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Environ, anyhow::Error) -> Reply + Send + Sync + 'static,
    {
        self.error_handler = Arc::new(handler);
        self
    }

    #[must_use]
    pub fn max_content_length(mut self, max: Option<u64>) -> Self {
        self.max_content_length = max;
        self
    }

    #[must_use]
    pub fn compression(mut self, compression: CompressionConfig) -> Self {
        self.compression = compression;
        self
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("before_request", &self.before_request.is_some())
            .field("after_request", &self.after_request.is_some())
            .field("result_converters", &self.result_converters.len())
            .field("default_str_content_type", &self.default_str_content_type)
            .field("max_content_length", &self.max_content_length)
            .field("compression", &self.compression)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = AppSettings::default();
        assert_eq!(settings.max_content_length, None);
        assert_eq!(settings.default_str_content_type, DEFAULT_STR_CONTENT_TYPE);
        assert_eq!(settings.compression, CompressionConfig::default());
        assert!(!settings.compression.enabled);
    }

    #[test]
    fn test_settings_from_toml() {
        let settings = AppSettings::from_toml_str(
            r#"
            default_str_content_type = "text/html"

            [compression]
            enabled = true
            level = 1
            "#,
        )
        .unwrap();
        assert_eq!(settings.default_str_content_type, "text/html");
        assert!(settings.compression.enabled);
        assert_eq!(settings.compression.level, 1);
        assert_eq!(settings.compression.min_length, 500);

        let config = AppConfig::from_settings(settings);
        assert_eq!(config.default_str_content_type, "text/html");
    }

    #[test]
    fn test_settings_from_env() {
        env::set_var("PATHROUTER_MAX_CONTENT_LENGTH", "4096");
        env::set_var("PATHROUTER_COMPRESS", "true");
        env::set_var("PATHROUTER_COMPRESS_LEVEL", "42");
        let settings = AppSettings::from_env();
        env::remove_var("PATHROUTER_MAX_CONTENT_LENGTH");
        env::remove_var("PATHROUTER_COMPRESS");
        env::remove_var("PATHROUTER_COMPRESS_LEVEL");

        assert_eq!(settings.max_content_length, Some(4096));
        assert!(settings.compression.enabled);
        assert_eq!(settings.compression.level, 9);
    }

    #[test]
    fn test_default_error_handler_hides_unhandled_errors() {
        let environ = Environ::new("GET", "/");
        let reply = default_error_handler(&environ, anyhow::anyhow!("database password leaked"));
        match reply {
            Reply::Status { status, body, .. } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert!(matches!(body.as_deref(), Some(Reply::Text(t)) if t == "Internal Server Error"));
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn test_serde_json_codec() {
        let codec = SerdeJsonCodec;
        let value = codec.decode(br#"{"a": [1, 2]}"#).unwrap();
        assert_eq!(codec.encode(&value).unwrap(), br#"{"a":[1,2]}"#.to_vec());
        assert!(codec.decode(b"{").is_err());
    }
}
