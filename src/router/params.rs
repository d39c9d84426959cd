//! Typed matchers for single path segments.
//!
//! A matcher answers two questions about a segment: does it match
//! ([`PathMatcher::matches`], total) and what value does it convert to
//! ([`PathMatcher::convert`], only called after a successful match).
//! Matchers are looked up by [`ParamType`] in a [`ParamTypes`] registry, which is
//! open for extension: register a custom type before adding routes that use it.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::endpoint::Arg;

const BOOL_TRUE_VALUES: [&str; 4] = ["1", "true", "yes", "on"];
const BOOL_FALSE_VALUES: [&str; 4] = ["0", "false", "no", "off"];

static UUID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(
        r"^[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}$",
    )
    .expect("UUID segment regex is valid")
});

/// Semantic type of a path parameter, e.g. `int` or `uuid`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamType(Cow<'static, str>);

impl ParamType {
    pub const BOOL: ParamType = ParamType(Cow::Borrowed("bool"));
    pub const INT: ParamType = ParamType(Cow::Borrowed("int"));
    pub const STR: ParamType = ParamType(Cow::Borrowed("str"));
    pub const UUID: ParamType = ParamType(Cow::Borrowed("uuid"));

    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Matching and conversion of one path segment.
pub trait PathMatcher: Send + Sync + fmt::Debug {
    /// Whether `segment` belongs to this type. Must not panic.
    fn matches(&self, segment: &str) -> bool;

    /// Typed value of a segment that already matched.
    ///
    /// `None` is treated as a miss by the resolver.
    fn convert(&self, segment: &str) -> Option<Arg>;
}

/// `1 true yes on` / `0 false no off`, case-sensitive.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolMatcher;

impl PathMatcher for BoolMatcher {
    fn matches(&self, segment: &str) -> bool {
        BOOL_TRUE_VALUES.contains(&segment) || BOOL_FALSE_VALUES.contains(&segment)
    }

    fn convert(&self, segment: &str) -> Option<Arg> {
        Some(Arg::Bool(BOOL_TRUE_VALUES.contains(&segment)))
    }
}

/// Optional leading `-` followed by ASCII digits.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntMatcher;

impl PathMatcher for IntMatcher {
    fn matches(&self, segment: &str) -> bool {
        let digits = segment.strip_prefix('-').unwrap_or(segment);
        !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
    }

    fn convert(&self, segment: &str) -> Option<Arg> {
        // out-of-range values fall through as a miss
        segment.parse::<i64>().ok().map(Arg::Int)
    }
}

/// Any non-empty segment, passed through undecoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrMatcher;

impl PathMatcher for StrMatcher {
    fn matches(&self, segment: &str) -> bool {
        !segment.is_empty()
    }

    fn convert(&self, segment: &str) -> Option<Arg> {
        Some(Arg::Str(segment.to_string()))
    }
}

/// Canonical 8-4-4-4-12 hex form, case-insensitive.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidMatcher;

impl PathMatcher for UuidMatcher {
    fn matches(&self, segment: &str) -> bool {
        UUID_SEGMENT.is_match(segment)
    }

    fn convert(&self, segment: &str) -> Option<Arg> {
        Uuid::parse_str(segment).ok().map(Arg::Uuid)
    }
}

/// Registry of parameter types to matchers.
#[derive(Clone)]
pub struct ParamTypes {
    matchers: HashMap<ParamType, Arc<dyn PathMatcher>>,
}

impl Default for ParamTypes {
    fn default() -> Self {
        let mut types = Self::empty();
        types.register(ParamType::BOOL, BoolMatcher);
        types.register(ParamType::INT, IntMatcher);
        types.register(ParamType::STR, StrMatcher);
        types.register(ParamType::UUID, UuidMatcher);
        types
    }
}

impl ParamTypes {
    /// A registry without the built-in types.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            matchers: HashMap::new(),
        }
    }

    /// Register (or replace) the matcher for `param_type`.
    pub fn register<M: PathMatcher + 'static>(&mut self, param_type: ParamType, matcher: M) {
        self.matchers.insert(param_type, Arc::new(matcher));
    }

    #[must_use]
    pub fn get(&self, param_type: &ParamType) -> Option<Arc<dyn PathMatcher>> {
        self.matchers.get(param_type).map(Arc::clone)
    }

    #[must_use]
    pub fn contains(&self, param_type: &ParamType) -> bool {
        self.matchers.contains_key(param_type)
    }
}

impl fmt::Debug for ParamTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.matchers.keys().map(ParamType::name).collect();
        names.sort_unstable();
        f.debug_struct("ParamTypes").field("types", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_matcher() {
        for truthy in BOOL_TRUE_VALUES {
            assert!(BoolMatcher.matches(truthy));
            assert_eq!(BoolMatcher.convert(truthy), Some(Arg::Bool(true)));
        }
        for falsy in BOOL_FALSE_VALUES {
            assert!(BoolMatcher.matches(falsy));
            assert_eq!(BoolMatcher.convert(falsy), Some(Arg::Bool(false)));
        }
        assert!(!BoolMatcher.matches("True"));
        assert!(!BoolMatcher.matches("abc"));
        assert!(!BoolMatcher.matches(""));
    }

    #[test]
    fn test_int_matcher() {
        assert!(IntMatcher.matches("123"));
        assert!(IntMatcher.matches("-456"));
        assert!(IntMatcher.matches("-0"));
        assert!(!IntMatcher.matches("-"));
        assert!(!IntMatcher.matches(""));
        assert!(!IntMatcher.matches("abc"));
        assert!(!IntMatcher.matches("1.5"));
        assert!(!IntMatcher.matches("+1"));
        assert_eq!(IntMatcher.convert("-0"), Some(Arg::Int(0)));
        assert_eq!(IntMatcher.convert("-789"), Some(Arg::Int(-789)));
        assert_eq!(IntMatcher.convert("99999999999999999999"), None);
    }

    #[test]
    fn test_str_matcher() {
        assert!(StrMatcher.matches("abc"));
        assert!(!StrMatcher.matches(""));
        assert_eq!(StrMatcher.convert("a%20b"), Some(Arg::Str("a%20b".to_string())));
    }

    #[test]
    fn test_uuid_matcher() {
        let id = "6F9619FF-8B86-D011-B42D-00C04FC964FF";
        assert!(UuidMatcher.matches(id));
        assert!(UuidMatcher.matches(&id.to_lowercase()));
        assert!(!UuidMatcher.matches("6F9619FF8B86D011B42D00C04FC964FF"));
        assert!(!UuidMatcher.matches("not-a-uuid"));
        assert_eq!(
            UuidMatcher.convert(id),
            Some(Arg::Uuid(Uuid::parse_str(id).unwrap()))
        );
    }

    #[test]
    fn test_registry_defaults_and_custom() {
        #[derive(Debug)]
        struct Slug;
        impl PathMatcher for Slug {
            fn matches(&self, segment: &str) -> bool {
                !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_lowercase() || b == b'-')
            }
            fn convert(&self, segment: &str) -> Option<Arg> {
                Some(Arg::Str(segment.to_string()))
            }
        }

        let mut types = ParamTypes::default();
        assert!(types.contains(&ParamType::INT));
        assert!(!types.contains(&ParamType::new("slug")));
        types.register(ParamType::new("slug"), Slug);
        let slug = types.get(&ParamType::new("slug")).unwrap();
        assert!(slug.matches("hello-world"));
        assert!(!slug.matches("Hello"));
    }
}
