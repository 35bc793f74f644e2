//! Placeholder bookkeeping for expression attribute names and values.

use std::collections::HashMap;

use facetdb_model::AttributeValue;
use facetdb_model::types::{ExpressionAttributeNames, ExpressionAttributeValues};

/// Prefix of name placeholders.
pub const NAME_PREFIX: &str = "#attr";

/// Prefix of value placeholders.
pub const VALUE_PREFIX: &str = ":val";

/// An expression together with the substitutions it references.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledExpression {
    /// Expression text using `#attrN` / `:valN` placeholders.
    pub expression: String,
    /// Name substitutions.
    pub names: ExpressionAttributeNames,
    /// Value substitutions.
    pub values: ExpressionAttributeValues,
}

impl CompiledExpression {
    /// Returns `true` when there is no expression text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expression.is_empty()
    }
}

/// Name and value substitution tables with their counters.
///
/// Counters only move forward, so a table never hands out the same
/// placeholder twice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceholderTable {
    names: ExpressionAttributeNames,
    values: ExpressionAttributeValues,
    name_count: usize,
    value_count: usize,
}

impl PlaceholderTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an attribute name and return its placeholder.
    pub fn add_name(&mut self, attribute: &str) -> String {
        let placeholder = self.fresh_name(|_| false);
        self.names.insert(placeholder.clone(), attribute.to_owned());
        placeholder
    }

    /// Register a value and return its placeholder.
    pub fn add_value(&mut self, value: AttributeValue) -> String {
        let placeholder = self.fresh_value(|_| false);
        self.values.insert(placeholder.clone(), value);
        placeholder
    }

    /// Name substitutions registered so far.
    #[must_use]
    pub fn names(&self) -> &ExpressionAttributeNames {
        &self.names
    }

    /// Value substitutions registered so far.
    #[must_use]
    pub fn values(&self) -> &ExpressionAttributeValues {
        &self.values
    }

    /// Returns `true` when nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.values.is_empty()
    }

    /// Consume the table, returning its substitutions.
    #[must_use]
    pub fn into_parts(self) -> (ExpressionAttributeNames, ExpressionAttributeValues) {
        (self.names, self.values)
    }

    /// Merge an independently compiled expression into this table.
    ///
    /// Placeholders of `compiled` that are already taken here are renumbered
    /// and the returned expression text is rewritten to match. Every entry of
    /// both sides survives the merge.
    pub fn absorb(&mut self, compiled: CompiledExpression) -> String {
        let CompiledExpression {
            expression,
            names,
            values,
        } = compiled;
        let mut renames = HashMap::new();

        for key in ordered_keys(&names) {
            let Some(attribute) = names.get(&key) else {
                continue;
            };
            let target = if self.names.contains_key(&key) {
                let fresh = self.fresh_name(|p| names.contains_key(p));
                renames.insert(key, fresh.clone());
                fresh
            } else {
                key
            };
            self.names.insert(target, attribute.clone());
        }

        for key in ordered_keys(&values) {
            let Some(value) = values.get(&key) else {
                continue;
            };
            let target = if self.values.contains_key(&key) {
                let fresh = self.fresh_value(|p| values.contains_key(p));
                renames.insert(key, fresh.clone());
                fresh
            } else {
                key
            };
            self.values.insert(target, value.clone());
        }

        if renames.is_empty() {
            expression
        } else {
            rewrite_placeholders(&expression, &renames)
        }
    }

    fn fresh_name(&mut self, taken: impl Fn(&str) -> bool) -> String {
        loop {
            let candidate = format!("{NAME_PREFIX}{}", self.name_count);
            self.name_count += 1;
            if !self.names.contains_key(&candidate) && !taken(&candidate) {
                return candidate;
            }
        }
    }

    fn fresh_value(&mut self, taken: impl Fn(&str) -> bool) -> String {
        loop {
            let candidate = format!("{VALUE_PREFIX}{}", self.value_count);
            self.value_count += 1;
            if !self.values.contains_key(&candidate) && !taken(&candidate) {
                return candidate;
            }
        }
    }
}

/// Keys in placeholder order (`#attr2` before `#attr10`).
fn ordered_keys<V>(map: &HashMap<String, V>) -> Vec<String> {
    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    keys
}

/// Rewrite whole placeholder tokens (`#` or `:` followed by word chars) in a
/// single pass so renames never chain.
fn rewrite_placeholders(expression: &str, renames: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(expression.len());
    let mut chars = expression.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c != '#' && c != ':' {
            out.push(c);
            continue;
        }
        let mut end = start + c.len_utf8();
        while let Some(&(i, next)) = chars.peek() {
            if next.is_ascii_alphanumeric() || next == '_' {
                end = i + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        let token = &expression[start..end];
        match renames.get(token) {
            Some(replacement) => out.push_str(replacement),
            None => out.push_str(token),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled(expression: &str, names: &[(&str, &str)], values: &[(&str, i64)]) -> CompiledExpression {
        CompiledExpression {
            expression: expression.to_owned(),
            names: names
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            values: values
                .iter()
                .map(|(k, v)| ((*k).to_owned(), AttributeValue::from(*v)))
                .collect(),
        }
    }

    #[test]
    fn test_should_hand_out_increasing_placeholders() {
        let mut table = PlaceholderTable::new();
        assert_eq!(table.add_name("a"), "#attr0");
        assert_eq!(table.add_name("a"), "#attr1");
        assert_eq!(table.add_value(AttributeValue::from(1_i32)), ":val0");
        assert_eq!(table.names().len(), 2);
    }

    #[test]
    fn test_should_absorb_without_collisions_verbatim() {
        let mut table = PlaceholderTable::new();
        let text = table.absorb(compiled("#attr0 = :val0", &[("#attr0", "a")], &[(":val0", 1)]));
        assert_eq!(text, "#attr0 = :val0");
        assert_eq!(table.names()["#attr0"], "a");
    }

    #[test]
    fn test_should_renumber_colliding_placeholders() {
        let mut table = PlaceholderTable::new();
        let first = table.absorb(compiled(
            "#attr0 = :val0 AND #attr1 > :val1",
            &[("#attr0", "a"), ("#attr1", "b")],
            &[(":val0", 1), (":val1", 2)],
        ));
        let second = table.absorb(compiled(
            "#attr0 = :val0 AND #attr1 > :val1",
            &[("#attr0", "c"), ("#attr1", "d")],
            &[(":val0", 3), (":val1", 4)],
        ));
        assert_eq!(first, "#attr0 = :val0 AND #attr1 > :val1");
        assert_eq!(second, "#attr2 = :val2 AND #attr3 > :val3");
        assert_eq!(table.names().len(), 4);
        assert_eq!(table.values().len(), 4);
        assert_eq!(table.names()["#attr2"], "c");
        assert_eq!(table.values()[":val3"], AttributeValue::from(4_i64));
    }

    #[test]
    fn test_should_not_chain_renames() {
        let mut table = PlaceholderTable::new();
        table.add_name("x");
        let text = table.absorb(compiled(
            "#attr0 <> #attr1",
            &[("#attr0", "a"), ("#attr1", "b")],
            &[],
        ));
        assert_eq!(text, "#attr2 <> #attr1");
        assert_eq!(table.names()["#attr1"], "b");
        assert_eq!(table.names()["#attr2"], "a");
        assert_eq!(table.add_name("y"), "#attr3");
    }

    #[test]
    fn test_should_leave_longer_tokens_alone() {
        let mut renames = HashMap::new();
        renames.insert("#attr1".to_owned(), "#attr5".to_owned());
        let text = rewrite_placeholders("(#attr1 = :val1) AND size(#attr10) > :val11", &renames);
        assert_eq!(text, "(#attr5 = :val1) AND size(#attr10) > :val11");
    }
}
