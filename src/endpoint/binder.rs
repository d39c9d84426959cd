//! Payload binding for query and body parameters.
//!
//! A [`Binder`] receives the decoded request data and the payload type declared
//! on the route and turns it into the [`Arg`] handed to the handler, or rejects
//! it with a client error.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use jsonschema::Validator;
use serde_json::Value;
use tracing::debug;

use super::args::Arg;
use crate::error::{ConfigError, HttpError};
use crate::server::FormData;

/// Declared shape of a query or body payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PayloadType {
    /// Any JSON value or form
    Any,
    /// JSON object
    Object,
    /// JSON array
    Array,
    /// Form payload
    Form,
    /// Application-defined type resolved by a custom binder
    Named(Cow<'static, str>),
}

impl PayloadType {
    #[must_use]
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        PayloadType::Named(name.into())
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadType::Any => f.write_str("any"),
            PayloadType::Object => f.write_str("object"),
            PayloadType::Array => f.write_str("array"),
            PayloadType::Form => f.write_str("form"),
            PayloadType::Named(name) => f.write_str(name),
        }
    }
}

/// Decoded request data before binding.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Form(FormData),
}

/// Validates and coerces a payload into a handler argument.
pub trait Binder: Send + Sync {
    /// # Errors
    ///
    /// A client error (typically 400 or 422) when the payload does not fit.
    fn bind(&self, payload: Payload, target: &PayloadType) -> Result<Arg, HttpError>;
}

/// Structural type check only; the default binder.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeCheckBinder;

impl Binder for TypeCheckBinder {
    fn bind(&self, payload: Payload, target: &PayloadType) -> Result<Arg, HttpError> {
        match (payload, target) {
            (Payload::Json(value), PayloadType::Any) => Ok(Arg::Json(value)),
            (Payload::Json(value), PayloadType::Object) if value.is_object() => Ok(Arg::Json(value)),
            (Payload::Json(value), PayloadType::Array) if value.is_array() => Ok(Arg::Json(value)),
            (Payload::Form(form), PayloadType::Any | PayloadType::Form) => Ok(Arg::Form(form)),
            (_, target) => Err(HttpError::bad_request_because(format!(
                "payload is not of type {target}"
            ))),
        }
    }
}

/// Validates [`PayloadType::Named`] payloads against registered JSON Schemas.
///
/// Other payload types fall back to [`TypeCheckBinder`]. Forms are validated as
/// `{name: first value}` objects.
#[derive(Default)]
pub struct SchemaBinder {
    schemas: HashMap<String, Validator>,
}

impl SchemaBinder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and register `schema` under `name`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidSchema`] when the schema does not compile.
    pub fn register(&mut self, name: impl Into<String>, schema: &Value) -> Result<(), ConfigError> {
        let name = name.into();
        let validator = jsonschema::validator_for(schema).map_err(|err| ConfigError::InvalidSchema {
            name: name.clone(),
            message: err.to_string(),
        })?;
        self.schemas.insert(name, validator);
        Ok(())
    }

    /// Builder form of [`SchemaBinder::register`].
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidSchema`] when the schema does not compile.
    pub fn with_schema(mut self, name: impl Into<String>, schema: &Value) -> Result<Self, ConfigError> {
        self.register(name, schema)?;
        Ok(self)
    }
}

impl Binder for SchemaBinder {
    fn bind(&self, payload: Payload, target: &PayloadType) -> Result<Arg, HttpError> {
        let PayloadType::Named(name) = target else {
            return TypeCheckBinder.bind(payload, target);
        };
        let Some(validator) = self.schemas.get(name.as_ref()) else {
            return Err(HttpError::bad_request_because(format!(
                "no schema registered for {name}"
            )));
        };
        let value = match payload {
            Payload::Json(value) => value,
            Payload::Form(form) => form.to_json(),
        };
        let errors: Vec<String> = validator.iter_errors(&value).map(|e| e.to_string()).collect();
        if !errors.is_empty() {
            debug!(schema = %name, error_count = errors.len(), "Payload failed schema validation");
            return Err(HttpError::unprocessable_entity(errors));
        }
        Ok(Arg::Json(value))
    }
}

impl fmt::Debug for SchemaBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("SchemaBinder").field("schemas", &names).finish()
    }
}
