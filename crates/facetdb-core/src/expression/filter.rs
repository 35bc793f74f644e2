//! Where-callbacks and named filters.

use std::fmt;
use std::sync::Arc;

use facetdb_model::{ErrorCode, FacetError, Item};

use super::{CompiledExpression, ExpressionCompiler};
use crate::error::Result;
use crate::schema::Schema;

/// A callback producing one filter or condition fragment.
pub type WhereCallback = Arc<dyn Fn(&mut ExpressionCompiler<'_>) -> String + Send + Sync>;

/// Wrap a closure as a [`WhereCallback`].
pub fn where_callback<F>(f: F) -> WhereCallback
where
    F: Fn(&mut ExpressionCompiler<'_>) -> String + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A reusable filter declared on a schema and invoked by name with parameters.
#[derive(Clone)]
pub struct NamedFilter(Arc<dyn Fn(&mut ExpressionCompiler<'_>, &Item) -> String + Send + Sync>);

impl NamedFilter {
    /// Wrap a closure as a named filter.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut ExpressionCompiler<'_>, &Item) -> String + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Produce the filter fragment for `params`.
    pub fn apply(&self, compiler: &mut ExpressionCompiler<'_>, params: &Item) -> String {
        (self.0)(compiler, params)
    }
}

impl fmt::Debug for NamedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NamedFilter(..)")
    }
}

/// Filters accumulated by a read operation before compilation.
#[derive(Clone, Default)]
pub struct FilterSet {
    wheres: Vec<WhereCallback>,
    named: Vec<(String, Item)>,
}

impl FilterSet {
    /// Add a where-callback.
    pub fn push_where(&mut self, callback: WhereCallback) {
        self.wheres.push(callback);
    }

    /// Add an invocation of a named filter.
    pub fn push_named(&mut self, name: impl Into<String>, params: Item) {
        self.named.push((name.into(), params));
    }

    /// Returns `true` when no filter was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.wheres.is_empty() && self.named.is_empty()
    }

    /// Compile every filter against `schema`: where-callbacks first, then
    /// named filters in the order they were added.
    pub fn compile(&self, schema: &Schema) -> Result<CompiledExpression> {
        let mut compiler = ExpressionCompiler::with_catalog(schema);
        for callback in &self.wheres {
            compiler.where_with(|c| (**callback)(c));
        }
        for (name, params) in &self.named {
            let filter = schema.filters.get(name).ok_or_else(|| {
                FacetError::with_message(ErrorCode::UnknownFilter, format!("unknown filter: {name}"))
            })?;
            compiler.where_with(|c| filter.apply(c, params));
        }
        compiler.finish()
    }
}

impl fmt::Debug for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterSet")
            .field("wheres", &self.wheres.len())
            .field("named", &self.named.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .finish()
    }
}
