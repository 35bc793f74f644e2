//! Expression compilation.
//!
//! Builds placeholder-safe condition, filter, update and projection
//! expressions. The pipeline is:
//!
//! 1. **Compile**: an [`ExpressionCompiler`] registers every attribute name
//!    and value in its [`PlaceholderTable`] and accumulates AND-combined
//!    fragments.
//! 2. **Merge**: independently compiled expressions are folded into one table
//!    with [`PlaceholderTable::absorb`], which renumbers colliding
//!    placeholders.

pub mod filter;
pub mod placeholder;
pub mod update;

use std::fmt;

use facetdb_model::{AttributeValue, FacetError};

pub use filter::{NamedFilter, WhereCallback};
pub use placeholder::{CompiledExpression, PlaceholderTable};
pub use update::{UpdateAction, UpdateIntent, compile_update};

use crate::error::Result;
use crate::schema::Schema;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal (`=`).
    Eq,
    /// Not equal (`<>`).
    Ne,
    /// Less than (`<`).
    Lt,
    /// Less than or equal (`<=`).
    Le,
    /// Greater than (`>`).
    Gt,
    /// Greater than or equal (`>=`).
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Ne => write!(f, "<>"),
            Self::Lt => write!(f, "<"),
            Self::Le => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::Ge => write!(f, ">="),
        }
    }
}

/// Accumulates expression fragments over one placeholder table.
///
/// When built with a schema, every attribute referenced through
/// [`attr`](Self::attr) or the function helpers must belong to the entity;
/// the first offender makes [`finish`](Self::finish) fail with
/// `UnknownAttribute`.
#[derive(Debug, Default)]
pub struct ExpressionCompiler<'a> {
    table: PlaceholderTable,
    expression: String,
    catalog: Option<&'a Schema>,
    unknown: Option<String>,
    chained: bool,
}

impl<'a> ExpressionCompiler<'a> {
    /// A compiler that accepts any attribute name.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A compiler restricted to the attributes of `schema`.
    #[must_use]
    pub fn with_catalog(schema: &'a Schema) -> Self {
        Self {
            catalog: Some(schema),
            ..Self::default()
        }
    }

    /// Register an attribute name.
    pub fn add_name(&mut self, attribute: &str) -> String {
        self.table.add_name(attribute)
    }

    /// Register a value.
    pub fn add_value(&mut self, value: impl Into<AttributeValue>) -> String {
        self.table.add_value(value.into())
    }

    /// Reference an attribute for a comparison.
    pub fn attr(&mut self, name: &str) -> AttributeRef<'_, 'a> {
        self.check(name);
        AttributeRef {
            compiler: self,
            name: name.to_owned(),
        }
    }

    /// `attribute_exists(#a)`.
    pub fn exists(&mut self, name: &str) -> String {
        let n = self.reference(name);
        format!("attribute_exists({n})")
    }

    /// `attribute_not_exists(#a)`.
    pub fn not_exists(&mut self, name: &str) -> String {
        let n = self.reference(name);
        format!("attribute_not_exists({n})")
    }

    /// `size(#a)`, usable as the left side of a comparison.
    pub fn size(&mut self, name: &str) -> String {
        let n = self.reference(name);
        format!("size({n})")
    }

    /// `attribute_type(#a, :v)` where `type_tag` is a tag such as `"S"`.
    pub fn attribute_type(&mut self, name: &str, type_tag: &str) -> String {
        let n = self.reference(name);
        let v = self.add_value(type_tag);
        format!("attribute_type({n}, {v})")
    }

    /// Comma-joined name placeholders for a projection.
    pub fn projection<S: AsRef<str>>(&mut self, attributes: &[S]) -> String {
        attributes
            .iter()
            .map(|a| self.reference(a.as_ref()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// AND a fragment onto the accumulated expression. Empty fragments are
    /// ignored.
    pub fn add_expression(&mut self, fragment: &str) {
        if fragment.is_empty() {
            return;
        }
        if self.expression.is_empty() {
            self.expression = fragment.to_owned();
            return;
        }
        // An AND chain of parenthesised terms can be extended as is; anything
        // else is wrapped whole unless one pair of parens already encloses it.
        if !self.chained && !is_enclosed(&self.expression) {
            self.expression = format!("({})", self.expression);
        }
        self.expression = format!("{} AND ({fragment})", self.expression);
        self.chained = true;
    }

    /// Run `callback` against this compiler and AND its fragment on.
    pub fn where_with<F>(&mut self, callback: F)
    where
        F: FnOnce(&mut Self) -> String,
    {
        let fragment = callback(self);
        self.add_expression(&fragment);
    }

    /// Merge an independently compiled expression into this compiler's
    /// table, returning its text with colliding placeholders renumbered.
    /// The text is not added to the accumulated expression.
    pub fn absorb(&mut self, compiled: CompiledExpression) -> String {
        self.table.absorb(compiled)
    }

    /// The accumulated expression text.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Finish compilation.
    pub fn finish(self) -> Result<CompiledExpression> {
        if let Some(name) = self.unknown {
            return Err(FacetError::unknown_attribute(&name));
        }
        let (names, values) = self.table.into_parts();
        Ok(CompiledExpression {
            expression: self.expression,
            names,
            values,
        })
    }

    fn reference(&mut self, name: &str) -> String {
        self.check(name);
        self.add_name(name)
    }

    fn check(&mut self, name: &str) {
        if self.unknown.is_some() {
            return;
        }
        if let Some(schema) = self.catalog {
            if !schema.is_entity_attribute(name) {
                self.unknown = Some(name.to_owned());
            }
        }
    }
}

/// Returns `true` if the opening paren at the start of `text` closes at its
/// very end.
fn is_enclosed(text: &str) -> bool {
    if !text.starts_with('(') {
        return false;
    }
    let mut depth = 0_usize;
    for (i, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i + ch.len_utf8() == text.len();
                }
            }
            _ => {}
        }
    }
    false
}

/// An attribute operand bound to a compiler.
#[derive(Debug)]
pub struct AttributeRef<'c, 'a> {
    compiler: &'c mut ExpressionCompiler<'a>,
    name: String,
}

impl AttributeRef<'_, '_> {
    fn compare(self, op: CompareOp, value: AttributeValue) -> String {
        let n = self.compiler.add_name(&self.name);
        let v = self.compiler.add_value(value);
        format!("{n} {op} {v}")
    }

    /// `#a = :v`.
    pub fn eq(self, value: impl Into<AttributeValue>) -> String {
        self.compare(CompareOp::Eq, value.into())
    }

    /// `#a <> :v`.
    pub fn ne(self, value: impl Into<AttributeValue>) -> String {
        self.compare(CompareOp::Ne, value.into())
    }

    /// `#a > :v`.
    pub fn gt(self, value: impl Into<AttributeValue>) -> String {
        self.compare(CompareOp::Gt, value.into())
    }

    /// `#a >= :v`.
    pub fn gte(self, value: impl Into<AttributeValue>) -> String {
        self.compare(CompareOp::Ge, value.into())
    }

    /// `#a < :v`.
    pub fn lt(self, value: impl Into<AttributeValue>) -> String {
        self.compare(CompareOp::Lt, value.into())
    }

    /// `#a <= :v`.
    pub fn lte(self, value: impl Into<AttributeValue>) -> String {
        self.compare(CompareOp::Le, value.into())
    }

    /// `(#a BETWEEN :v0 AND :v1)`.
    pub fn between(
        self,
        start: impl Into<AttributeValue>,
        end: impl Into<AttributeValue>,
    ) -> String {
        let n = self.compiler.add_name(&self.name);
        let lo = self.compiler.add_value(start);
        let hi = self.compiler.add_value(end);
        format!("({n} BETWEEN {lo} AND {hi})")
    }

    /// `begins_with(#a, :v)`.
    pub fn begins(self, value: impl Into<AttributeValue>) -> String {
        let n = self.compiler.add_name(&self.name);
        let v = self.compiler.add_value(value);
        format!("begins_with({n}, {v})")
    }

    /// `contains(#a, :v)`.
    pub fn contains(self, value: impl Into<AttributeValue>) -> String {
        let n = self.compiler.add_name(&self.name);
        let v = self.compiler.add_value(value);
        format!("contains({n}, {v})")
    }
}
