//! Update intents and their compilation into update expressions.

use facetdb_model::{AttributeValue, ErrorCode, FacetError};

use super::ExpressionCompiler;
use crate::error::Result;

/// What to do with one attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    /// `SET #a = :v`.
    Assign(AttributeValue),
    /// `ADD #a :v` (numeric increment).
    Add(AttributeValue),
    /// `SET #a = #a - :v`.
    Subtract(AttributeValue),
    /// `SET #a = list_append(#a, :v)`.
    Append(AttributeValue),
    /// `SET #a = list_append(:v, #a)`.
    Prepend(AttributeValue),
    /// `ADD #a :v` (set union).
    AddToSet(AttributeValue),
    /// `DELETE #a :v` (set difference).
    DeleteFromSet(AttributeValue),
    /// `REMOVE #a`.
    Remove,
    /// `REMOVE #a[i]` for each index.
    RemoveIndexes(Vec<usize>),
}

impl UpdateAction {
    /// Short name of the action kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Assign(_) => "set",
            Self::Add(_) => "add",
            Self::Subtract(_) => "subtract",
            Self::Append(_) => "append",
            Self::Prepend(_) => "prepend",
            Self::AddToSet(_) => "add_to_set",
            Self::DeleteFromSet(_) => "delete_from_set",
            Self::Remove => "remove",
            Self::RemoveIndexes(_) => "remove_indexes",
        }
    }

    /// The value carried by the action, if any.
    #[must_use]
    pub fn value(&self) -> Option<&AttributeValue> {
        match self {
            Self::Assign(v)
            | Self::Add(v)
            | Self::Subtract(v)
            | Self::Append(v)
            | Self::Prepend(v)
            | Self::AddToSet(v)
            | Self::DeleteFromSet(v) => Some(v),
            Self::Remove | Self::RemoveIndexes(_) => None,
        }
    }

    /// Mutable access to the carried value.
    pub fn value_mut(&mut self) -> Option<&mut AttributeValue> {
        match self {
            Self::Assign(v)
            | Self::Add(v)
            | Self::Subtract(v)
            | Self::Append(v)
            | Self::Prepend(v)
            | Self::AddToSet(v)
            | Self::DeleteFromSet(v) => Some(v),
            Self::Remove | Self::RemoveIndexes(_) => None,
        }
    }
}

/// An ordered list of attribute updates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateIntent {
    actions: Vec<(String, UpdateAction)>,
}

impl UpdateIntent {
    /// An empty intent.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action.
    pub fn push(&mut self, attribute: impl Into<String>, action: UpdateAction) {
        self.actions.push((attribute.into(), action));
    }

    /// Append an action, builder style.
    #[must_use]
    pub fn with(mut self, attribute: impl Into<String>, action: UpdateAction) -> Self {
        self.push(attribute, action);
        self
    }

    /// Returns `true` when there are no actions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Iterate over the actions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &UpdateAction)> {
        self.actions.iter().map(|(a, act)| (a.as_str(), act))
    }

    /// Iterate mutably over the actions in insertion order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut UpdateAction)> {
        self.actions.iter_mut().map(|(a, act)| (a.as_str(), act))
    }

    /// Returns `true` when `attribute` has an action.
    #[must_use]
    pub fn touches(&self, attribute: &str) -> bool {
        self.actions.iter().any(|(a, _)| a == attribute)
    }

    /// Collapse repeated attributes: a repeated kind replaces the earlier
    /// value (index removals merge), a different kind is a conflict.
    pub fn normalize(&self) -> Result<Vec<(String, UpdateAction)>> {
        let mut out: Vec<(String, UpdateAction)> = Vec::with_capacity(self.actions.len());
        for (attribute, action) in &self.actions {
            let Some(slot) = out.iter_mut().find(|(a, _)| a == attribute) else {
                out.push((attribute.clone(), action.clone()));
                continue;
            };
            if slot.1.kind() != action.kind() {
                return Err(FacetError::with_message(
                    ErrorCode::ConflictingUpdate,
                    format!(
                        "attribute {attribute} is used by both {} and {}",
                        slot.1.kind(),
                        action.kind()
                    ),
                ));
            }
            match (&mut slot.1, action) {
                (UpdateAction::RemoveIndexes(existing), UpdateAction::RemoveIndexes(more)) => {
                    existing.extend(more.iter().copied());
                    existing.sort_unstable();
                    existing.dedup();
                }
                (existing, replacement) => *existing = replacement.clone(),
            }
        }
        Ok(out)
    }
}

/// Render `intent` as an update expression over `compiler`'s placeholders.
///
/// Clauses appear in the fixed order SET, ADD, DELETE, REMOVE, each once.
pub fn compile_update(intent: &UpdateIntent, compiler: &mut ExpressionCompiler<'_>) -> Result<String> {
    let mut set = Vec::new();
    let mut add = Vec::new();
    let mut delete = Vec::new();
    let mut remove = Vec::new();

    for (attribute, action) in intent.normalize()? {
        let n = compiler.add_name(&attribute);
        match action {
            UpdateAction::Assign(v) => {
                let v = compiler.add_value(v);
                set.push(format!("{n} = {v}"));
            }
            UpdateAction::Subtract(v) => {
                let v = compiler.add_value(v);
                set.push(format!("{n} = {n} - {v}"));
            }
            UpdateAction::Append(v) => {
                let v = compiler.add_value(v);
                set.push(format!("{n} = list_append({n}, {v})"));
            }
            UpdateAction::Prepend(v) => {
                let v = compiler.add_value(v);
                set.push(format!("{n} = list_append({v}, {n})"));
            }
            UpdateAction::Add(v) | UpdateAction::AddToSet(v) => {
                let v = compiler.add_value(v);
                add.push(format!("{n} {v}"));
            }
            UpdateAction::DeleteFromSet(v) => {
                let v = compiler.add_value(v);
                delete.push(format!("{n} {v}"));
            }
            UpdateAction::Remove => remove.push(n),
            UpdateAction::RemoveIndexes(indexes) => {
                remove.extend(indexes.iter().map(|i| format!("{n}[{i}]")));
            }
        }
    }

    let clauses: Vec<String> = [("SET", set), ("ADD", add), ("DELETE", delete), ("REMOVE", remove)]
        .into_iter()
        .filter(|(_, ops)| !ops.is_empty())
        .map(|(keyword, ops)| format!("{keyword} {}", ops.join(", ")))
        .collect();
    Ok(clauses.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(intent: &UpdateIntent) -> Result<(String, super::super::CompiledExpression)> {
        let mut c = ExpressionCompiler::new();
        let text = compile_update(intent, &mut c)?;
        Ok((text, c.finish()?))
    }

    #[test]
    fn test_should_render_clauses_in_fixed_order() {
        let intent = UpdateIntent::new()
            .with("old", UpdateAction::Remove)
            .with("tags", UpdateAction::DeleteFromSet(AttributeValue::string_set(["a"])))
            .with("visits", UpdateAction::Add(AttributeValue::from(1_i32)))
            .with("rent", UpdateAction::Assign(AttributeValue::from("2000.00")));
        let (text, compiled) = compile(&intent).unwrap();
        assert_eq!(
            text,
            "SET #attr3 = :val2 ADD #attr2 :val1 DELETE #attr1 :val0 REMOVE #attr0"
        );
        assert_eq!(compiled.names["#attr3"], "rent");
    }

    #[test]
    fn test_should_render_list_and_arithmetic_actions() {
        let intent = UpdateIntent::new()
            .with("stock", UpdateAction::Subtract(AttributeValue::from(2_i32)))
            .with("log", UpdateAction::Append(AttributeValue::L(vec!["x".into()])))
            .with("hist", UpdateAction::Prepend(AttributeValue::L(vec!["y".into()])));
        let (text, _) = compile(&intent).unwrap();
        assert_eq!(
            text,
            "SET #attr0 = #attr0 - :val0, #attr1 = list_append(#attr1, :val1), #attr2 = list_append(:val2, #attr2)"
        );
    }

    #[test]
    fn test_should_merge_index_removals() {
        let intent = UpdateIntent::new()
            .with("items", UpdateAction::RemoveIndexes(vec![3, 1]))
            .with("items", UpdateAction::RemoveIndexes(vec![1, 0]));
        let (text, _) = compile(&intent).unwrap();
        assert_eq!(text, "REMOVE #attr0[0], #attr0[1], #attr0[3]");
    }

    #[test]
    fn test_should_replace_repeated_assignment() {
        let intent = UpdateIntent::new()
            .with("rent", UpdateAction::Assign("1".into()))
            .with("rent", UpdateAction::Assign("2".into()));
        let (text, compiled) = compile(&intent).unwrap();
        assert_eq!(text, "SET #attr0 = :val0");
        assert_eq!(compiled.values[":val0"], AttributeValue::from("2"));
    }

    #[test]
    fn test_should_reject_conflicting_actions() {
        let intent = UpdateIntent::new()
            .with("rent", UpdateAction::Assign("1".into()))
            .with("rent", UpdateAction::Remove);
        let err = compile(&intent).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConflictingUpdate);
        assert!(err.message.contains("rent"));
    }

    #[test]
    fn test_should_compile_empty_intent_to_empty_text() {
        let (text, compiled) = compile(&UpdateIntent::new()).unwrap();
        assert!(text.is_empty());
        assert!(compiled.names.is_empty());
    }
}
