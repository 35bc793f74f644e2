//! Write-path enrichment: defaults, timestamps, padding and TTL values.

use chrono::Duration;
use facetdb_model::{AttributeValue, Item};
use tracing::warn;

use crate::clock::Clock;
use crate::expression::{UpdateAction, UpdateIntent};
use crate::key::render_value;
use crate::schema::{Padding, Schema};

/// Fill absent attributes that declare a default.
pub fn apply_defaults(schema: &Schema, item: &mut Item, clock: &dyn Clock) {
    for (name, attr) in &schema.attributes {
        if item.contains_key(name) {
            continue;
        }
        if let Some(default) = &attr.default {
            item.insert(name.clone(), default.resolve(clock));
        }
    }
}

/// Stamp a written item. `created_at` is only filled when absent, `updated_at`
/// is always overwritten.
pub fn apply_timestamps(schema: &Schema, item: &mut Item, clock: &dyn Clock) {
    let Some(ts) = &schema.timestamps else {
        return;
    };
    let now = AttributeValue::from(clock.unix_seconds());
    if let Some(created) = &ts.created_at {
        item.entry(created.clone()).or_insert_with(|| now.clone());
    }
    if let Some(updated) = &ts.updated_at {
        item.insert(updated.clone(), now);
    }
}

/// Add an `updated_at` assignment to an update unless the caller already
/// touches that attribute.
pub fn apply_update_timestamps(schema: &Schema, intent: &mut UpdateIntent, clock: &dyn Clock) {
    let Some(updated) = schema.timestamps.as_ref().and_then(|t| t.updated_at.as_ref()) else {
        return;
    };
    if !intent.touches(updated) {
        intent.push(
            updated.clone(),
            UpdateAction::Assign(AttributeValue::from(clock.unix_seconds())),
        );
    }
}

// ---------------------------------------------------------------------------
// Padding
// ---------------------------------------------------------------------------

/// Left-pad the rendered value to `padding.length`, producing a string.
#[must_use]
pub fn pad_value(value: &AttributeValue, padding: &Padding) -> AttributeValue {
    let text = match value {
        AttributeValue::N(n) => integer_text(n),
        other => render_value(other),
    };
    let width = text.chars().count();
    if width >= padding.length {
        return AttributeValue::S(text);
    }
    let mut padded: String = std::iter::repeat_n(padding.pad_char, padding.length - width).collect();
    padded.push_str(&text);
    AttributeValue::S(padded)
}

/// Strip the pad char from a padded string. An all-pad value becomes `"0"`;
/// pure integers come back as numbers. Non-strings pass through.
#[must_use]
pub fn unpad_value(value: &AttributeValue, padding: &Padding) -> AttributeValue {
    let AttributeValue::S(s) = value else {
        return value.clone();
    };
    let trimmed = s.trim_start_matches(padding.pad_char);
    let trimmed = if trimmed.is_empty() { "0" } else { trimmed };
    match trimmed.parse::<i64>() {
        Ok(n) => AttributeValue::from(n),
        Err(_) => AttributeValue::S(trimmed.to_owned()),
    }
}

/// Pad every attribute of `item` that declares padding.
pub fn apply_padding(schema: &Schema, item: &mut Item) {
    for (name, attr) in &schema.attributes {
        let Some(padding) = &attr.padding else {
            continue;
        };
        if let Some(value) = item.get_mut(name) {
            *value = pad_value(value, padding);
        }
    }
}

/// Remove padding from every attribute of `item` that declares it.
pub fn remove_padding(schema: &Schema, item: &mut Item) {
    for (name, attr) in &schema.attributes {
        let Some(padding) = &attr.padding else {
            continue;
        };
        if let Some(value) = item.get_mut(name) {
            *value = unpad_value(value, padding);
        }
    }
}

/// Whole-number text of a number; fractional parts are truncated.
#[allow(clippy::cast_possible_truncation)]
fn integer_text(n: &str) -> String {
    if n.parse::<i64>().is_ok() {
        return n.to_owned();
    }
    match n.parse::<f64>() {
        Ok(f) if f.is_finite() => (f.trunc() as i64).to_string(),
        _ => n.to_owned(),
    }
}

// ---------------------------------------------------------------------------
// TTL
// ---------------------------------------------------------------------------

/// Unix seconds `duration` from now.
#[must_use]
pub fn ttl_from_now(clock: &dyn Clock, duration: Duration) -> i64 {
    (clock.now() + duration).timestamp()
}

/// An expiry requested by a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Expire this long after the write.
    After(Duration),
    /// Expire at these unix seconds.
    At(i64),
}

impl Ttl {
    /// The expiry as unix seconds.
    #[must_use]
    pub fn resolve(self, clock: &dyn Clock) -> i64 {
        match self {
            Self::After(duration) => ttl_from_now(clock, duration),
            Self::At(seconds) => seconds,
        }
    }
}

/// Write the requested expiry into `item`. Ignored when the schema has no
/// TTL attribute.
pub fn apply_ttl(schema: &Schema, item: &mut Item, ttl: Option<Ttl>, clock: &dyn Clock) {
    let Some(ttl) = ttl else {
        return;
    };
    match &schema.ttl {
        Some(config) => {
            item.insert(config.attribute.clone(), AttributeValue::from(ttl.resolve(clock)));
        }
        None => warn!(entity = %schema.entity, "ttl requested but entity declares no ttl attribute"),
    }
}

/// Push an assignment of the requested expiry, and a removal when `remove`
/// is set. Asking for both is left for the intent to reject as a conflict.
pub fn apply_update_ttl(
    schema: &Schema,
    intent: &mut UpdateIntent,
    ttl: Option<Ttl>,
    remove: bool,
    clock: &dyn Clock,
) {
    if ttl.is_none() && !remove {
        return;
    }
    let Some(config) = &schema.ttl else {
        warn!(entity = %schema.entity, "ttl change requested but entity declares no ttl attribute");
        return;
    };
    if let Some(ttl) = ttl {
        intent.push(
            config.attribute.clone(),
            UpdateAction::Assign(AttributeValue::from(ttl.resolve(clock))),
        );
    }
    if remove {
        intent.push(config.attribute.clone(), UpdateAction::Remove);
    }
}

/// The expiry stored in `item`, if the schema declares a TTL attribute and
/// the item holds a whole number there.
#[must_use]
pub fn ttl_of(schema: &Schema, item: &Item) -> Option<i64> {
    let config = schema.ttl.as_ref()?;
    item.get(&config.attribute)?.as_n()?.parse().ok()
}

/// Returns `true` when `ttl` (unix seconds) lies in the past.
#[must_use]
pub fn is_expired(clock: &dyn Clock, ttl: i64) -> bool {
    clock.unix_seconds() > ttl
}

/// Time left until `ttl`; negative once expired.
#[must_use]
pub fn time_until(clock: &dyn Clock, ttl: i64) -> Duration {
    Duration::seconds(ttl - clock.unix_seconds())
}
