//! Attribute hooks: value transforms, validations and defaults.
//!
//! Each hook is a closed set of tagged variants. The `Custom` variants carry a
//! capability trait object so callers can plug in arbitrary logic while the
//! common cases stay plain data.

use std::fmt;
use std::sync::Arc;

use facetdb_model::{AttributeValue, FacetError};

use crate::clock::Clock;
use crate::error::Result;

// ---------------------------------------------------------------------------
// Transforms
// ---------------------------------------------------------------------------

/// A user supplied value transform.
pub trait ValueTransform: Send + Sync {
    /// Produce the transformed value.
    fn transform(&self, value: &AttributeValue) -> AttributeValue;
}

impl<F> ValueTransform for F
where
    F: Fn(&AttributeValue) -> AttributeValue + Send + Sync,
{
    fn transform(&self, value: &AttributeValue) -> AttributeValue {
        self(value)
    }
}

/// Letter case applied by [`Transform::StringCase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LetterCase {
    /// Upper-case every letter.
    Upper,
    /// Lower-case every letter.
    Lower,
}

/// A transform applied to an attribute value on write (`set`) or read (`get`).
#[derive(Clone, Default)]
pub enum Transform {
    /// Leave the value untouched.
    #[default]
    Identity,
    /// Multiply a number by the factor. Non-numbers pass through.
    NumericScale(f64),
    /// Change the letter case of a string. Non-strings pass through.
    StringCase(LetterCase),
    /// Run a user supplied transform.
    Custom(Arc<dyn ValueTransform>),
}

impl Transform {
    /// Wrap a closure as a custom transform.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&AttributeValue) -> AttributeValue + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Returns `true` for [`Transform::Identity`].
    #[must_use]
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }

    /// Apply the transform.
    #[must_use]
    pub fn apply(&self, value: &AttributeValue) -> AttributeValue {
        match self {
            Self::Identity => value.clone(),
            Self::NumericScale(factor) => match value.as_f64() {
                Some(n) => AttributeValue::N(format_number(n * factor)),
                None => value.clone(),
            },
            Self::StringCase(case) => match value {
                AttributeValue::S(s) => AttributeValue::S(match case {
                    LetterCase::Upper => s.to_uppercase(),
                    LetterCase::Lower => s.to_lowercase(),
                }),
                other => other.clone(),
            },
            Self::Custom(t) => t.transform(value),
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => f.write_str("Identity"),
            Self::NumericScale(factor) => f.debug_tuple("NumericScale").field(factor).finish(),
            Self::StringCase(case) => f.debug_tuple("StringCase").field(case).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Render a float the way number attributes are stored: integral values
/// without a fractional part.
#[allow(clippy::cast_possible_truncation)]
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// ---------------------------------------------------------------------------
// Validations
// ---------------------------------------------------------------------------

/// A user supplied validation. `Err` carries the failure reason.
pub trait ValueCheck: Send + Sync {
    /// Check the value.
    fn check(&self, value: &AttributeValue) -> std::result::Result<(), String>;
}

impl<F> ValueCheck for F
where
    F: Fn(&AttributeValue) -> std::result::Result<(), String> + Send + Sync,
{
    fn check(&self, value: &AttributeValue) -> std::result::Result<(), String> {
        self(value)
    }
}

/// A rule a written value must satisfy.
#[derive(Clone)]
pub enum Validation {
    /// String (or number text) must match the pattern.
    Pattern(regex::Regex),
    /// Number must fall inside the inclusive bounds.
    Range {
        /// Lower bound.
        min: Option<f64>,
        /// Upper bound.
        max: Option<f64>,
    },
    /// String length (in chars) or collection size must fall inside the bounds.
    Length {
        /// Lower bound.
        min: Option<usize>,
        /// Upper bound.
        max: Option<usize>,
    },
    /// Run a user supplied check.
    Custom(Arc<dyn ValueCheck>),
}

impl Validation {
    /// Compile a pattern validation.
    pub fn pattern(pattern: &str) -> Result<Self> {
        regex::Regex::new(pattern).map(Self::Pattern).map_err(|e| {
            FacetError::invalid_schema(format!("invalid validation pattern {pattern:?}")).with_source(e)
        })
    }

    /// Wrap a closure as a custom validation.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&AttributeValue) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Check `value` for `attribute`, returning `ValidationError` on failure.
    pub fn check(&self, attribute: &str, value: &AttributeValue) -> Result<()> {
        let outcome = match self {
            Self::Pattern(re) => match value {
                AttributeValue::S(s) | AttributeValue::N(s) if re.is_match(s) => Ok(()),
                AttributeValue::S(_) | AttributeValue::N(_) => {
                    Err(format!("does not match pattern {}", re.as_str()))
                }
                other => Err(format!("expected text, got {}", other.type_descriptor())),
            },
            Self::Range { min, max } => match value.as_f64() {
                Some(n) if min.is_some_and(|m| n < m) => Err(format!("{n} is below the minimum")),
                Some(n) if max.is_some_and(|m| n > m) => Err(format!("{n} is above the maximum")),
                Some(_) => Ok(()),
                None => Err(format!("expected number, got {}", value.type_descriptor())),
            },
            Self::Length { min, max } => match measure(value) {
                Some(len) if min.is_some_and(|m| len < m) => {
                    Err(format!("length {len} is below the minimum"))
                }
                Some(len) if max.is_some_and(|m| len > m) => {
                    Err(format!("length {len} is above the maximum"))
                }
                Some(_) => Ok(()),
                None => Err(format!("{} has no length", value.type_descriptor())),
            },
            Self::Custom(c) => c.check(value),
        };
        outcome.map_err(|reason| {
            FacetError::validation(format!("invalid value for attribute {attribute}: {reason}"))
        })
    }
}

fn measure(value: &AttributeValue) -> Option<usize> {
    match value {
        AttributeValue::S(s) => Some(s.chars().count()),
        AttributeValue::B(b) => Some(b.len()),
        AttributeValue::Ss(v) | AttributeValue::Ns(v) => Some(v.len()),
        AttributeValue::Bs(v) => Some(v.len()),
        AttributeValue::L(v) => Some(v.len()),
        AttributeValue::M(m) => Some(m.len()),
        _ => None,
    }
}

impl fmt::Debug for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Self::Range { min, max } => f
                .debug_struct("Range")
                .field("min", min)
                .field("max", max)
                .finish(),
            Self::Length { min, max } => f
                .debug_struct("Length")
                .field("min", min)
                .field("max", max)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Value assigned to an absent attribute on write.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// A fixed value.
    Static(AttributeValue),
    /// The current unix time in seconds.
    Timestamp,
    /// A random v4 UUID.
    Uuid,
}

impl DefaultValue {
    /// Produce the default value.
    #[must_use]
    pub fn resolve(&self, clock: &dyn Clock) -> AttributeValue {
        match self {
            Self::Static(v) => v.clone(),
            Self::Timestamp => AttributeValue::from(clock.unix_seconds()),
            Self::Uuid => AttributeValue::S(uuid::Uuid::new_v4().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    #[test]
    fn test_should_scale_numbers_and_skip_other_types() {
        let t = Transform::NumericScale(100.0);
        assert_eq!(t.apply(&AttributeValue::from(1.5)), AttributeValue::from(150_i64));
        assert_eq!(t.apply(&AttributeValue::from("x")), AttributeValue::from("x"));
        let half = Transform::NumericScale(0.5);
        assert_eq!(half.apply(&AttributeValue::from(3_i64)), AttributeValue::from(1.5));
    }

    #[test]
    fn test_should_change_string_case() {
        let t = Transform::StringCase(LetterCase::Upper);
        assert_eq!(t.apply(&AttributeValue::from("abc")), AttributeValue::from("ABC"));
    }

    #[test]
    fn test_should_run_custom_transform() {
        let t = Transform::custom(|v| match v {
            AttributeValue::S(s) => AttributeValue::S(format!("{s}!")),
            other => other.clone(),
        });
        assert_eq!(t.apply(&AttributeValue::from("hi")), AttributeValue::from("hi!"));
    }

    #[test]
    fn test_should_validate_pattern() {
        let v = Validation::pattern("^[a-z]+$").unwrap();
        assert!(v.check("name", &AttributeValue::from("abc")).is_ok());
        let err = v.check("name", &AttributeValue::from("ABC")).unwrap_err();
        assert_eq!(err.code, facetdb_model::ErrorCode::ValidationError);
        assert!(err.message.contains("name"));
    }

    #[test]
    fn test_should_reject_bad_pattern() {
        let err = Validation::pattern("(").unwrap_err();
        assert_eq!(err.code, facetdb_model::ErrorCode::InvalidSchema);
    }

    #[test]
    fn test_should_validate_range_and_length() {
        let range = Validation::Range { min: Some(1.0), max: Some(5.0) };
        assert!(range.check("n", &AttributeValue::from(3_i32)).is_ok());
        assert!(range.check("n", &AttributeValue::from(6_i32)).is_err());
        assert!(range.check("n", &AttributeValue::from("3")).is_err());

        let length = Validation::Length { min: None, max: Some(2) };
        assert!(length.check("tags", &AttributeValue::string_set(["a", "b"])).is_ok());
        assert!(length.check("tags", &AttributeValue::from("abc")).is_err());
    }

    #[test]
    fn test_should_run_custom_check() {
        let v = Validation::custom(|value| {
            if value.as_bool() == Some(true) {
                Ok(())
            } else {
                Err("must be true".to_owned())
            }
        });
        assert!(v.check("flag", &AttributeValue::from(true)).is_ok());
        let err = v.check("flag", &AttributeValue::from(false)).unwrap_err();
        assert!(err.message.contains("must be true"));
    }

    #[test]
    fn test_should_resolve_defaults() {
        let clock = FixedClock::at_unix(42);
        assert_eq!(DefaultValue::Timestamp.resolve(&clock), AttributeValue::from(42_i64));
        let id = DefaultValue::Uuid.resolve(&clock);
        assert_eq!(id.as_s().map(str::len), Some(36));
        let fixed = DefaultValue::Static(AttributeValue::from("open"));
        assert_eq!(fixed.resolve(&clock), AttributeValue::from("open"));
    }
}
