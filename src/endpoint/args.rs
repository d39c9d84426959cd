use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use uuid::Uuid;

use crate::server::{FormData, Request};

/// A single keyword argument value.
///
/// Path parameters convert into the scalar variants, defaults may be any variant,
/// and the query/body bindings produce [`Arg::Json`] or [`Arg::Form`].
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    Uuid(Uuid),
    Json(Value),
    Form(FormData),
}

impl Arg {
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Arg::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Arg::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Arg::Uuid(u) => Some(*u),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Arg::Json(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_form(&self) -> Option<&FormData> {
        match self {
            Arg::Form(f) => Some(f),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Arg::Null)
    }

    /// JSON view of the value; forms become `{name: first value}` objects.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Arg::Null => Value::Null,
            Arg::Bool(b) => Value::Bool(*b),
            Arg::Int(i) => Value::from(*i),
            Arg::Str(s) => Value::String(s.clone()),
            Arg::Uuid(u) => Value::String(u.to_string()),
            Arg::Json(v) => v.clone(),
            Arg::Form(f) => f.to_json(),
        }
    }

    /// Deserialize the value into a typed payload.
    ///
    /// # Errors
    ///
    /// Returns the serde error when the value does not fit `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_json())
    }
}

impl Serialize for Arg {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Arg::Null => serializer.serialize_unit(),
            Arg::Bool(b) => serializer.serialize_bool(*b),
            Arg::Int(i) => serializer.serialize_i64(*i),
            Arg::Str(s) => serializer.serialize_str(s),
            Arg::Uuid(u) => serializer.collect_str(u),
            Arg::Json(v) => v.serialize(serializer),
            Arg::Form(f) => {
                let mut map = serializer.serialize_map(None)?;
                for name in f.keys() {
                    map.serialize_entry(name, &f.get_first(name))?;
                }
                map.end()
            }
        }
    }
}

impl From<bool> for Arg {
    fn from(v: bool) -> Self {
        Arg::Bool(v)
    }
}

impl From<i64> for Arg {
    fn from(v: i64) -> Self {
        Arg::Int(v)
    }
}

impl From<i32> for Arg {
    fn from(v: i32) -> Self {
        Arg::Int(i64::from(v))
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::Str(v.to_string())
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Arg::Str(v)
    }
}

impl From<Uuid> for Arg {
    fn from(v: Uuid) -> Self {
        Arg::Uuid(v)
    }
}

impl From<Value> for Arg {
    fn from(v: Value) -> Self {
        Arg::Json(v)
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(v: Option<T>) -> Self {
        v.map_or(Arg::Null, Into::into)
    }
}

/// Keyword arguments assembled from defaults and path parameters.
pub type Kwargs = BTreeMap<String, Arg>;

/// Routing arguments written into the environment after resolution.
///
/// Positional arguments are never produced by the trie and are kept only so
/// downstream consumers see the conventional `(args, kwargs)` pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingArgs {
    pub positional: Vec<Arg>,
    pub named: Kwargs,
}

/// Arguments handed to a raw handler.
///
/// Holds every keyword argument (defaults, path parameters, bound query and body
/// payloads) plus the request context when the route declared a request binding.
pub struct Args<'r> {
    named: Kwargs,
    request: Option<(String, &'r Request<'r>)>,
}

impl<'r> Args<'r> {
    pub(crate) fn new(named: Kwargs) -> Self {
        Self {
            named,
            request: None,
        }
    }

    pub(crate) fn bind_request(&mut self, name: &str, request: &'r Request<'r>) {
        self.request = Some((name.to_string(), request));
    }

    pub(crate) fn insert(&mut self, name: &str, value: Arg) {
        self.named.insert(name.to_string(), value);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arg> {
        self.named.get(name)
    }

    /// Remove and return an argument, e.g. to move a large body out.
    pub fn take(&mut self, name: &str) -> Option<Arg> {
        self.named.remove(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.named.contains_key(name)
            || self
                .request
                .as_ref()
                .is_some_and(|(bound, _)| bound == name)
    }

    #[must_use]
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Arg::as_bool)
    }

    #[must_use]
    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Arg::as_int)
    }

    #[must_use]
    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Arg::as_str)
    }

    #[must_use]
    pub fn uuid(&self, name: &str) -> Option<Uuid> {
        self.get(name).and_then(Arg::as_uuid)
    }

    #[must_use]
    pub fn json(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(Arg::as_json)
    }

    #[must_use]
    pub fn form(&self, name: &str) -> Option<&FormData> {
        self.get(name).and_then(Arg::as_form)
    }

    /// The request context, when the route declared a request binding.
    #[must_use]
    pub fn request(&self) -> Option<&'r Request<'r>> {
        self.request.as_ref().map(|(_, request)| *request)
    }

    /// Name under which the request context was bound.
    #[must_use]
    pub fn request_binding(&self) -> Option<&str> {
        self.request.as_ref().map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.named.len() + usize::from(self.request.is_some())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arg)> {
        self.named.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn into_kwargs(self) -> Kwargs {
        self.named
    }
}

impl std::fmt::Debug for Args<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("named", &self.named)
            .field("request", &self.request_binding())
            .finish()
    }
}
