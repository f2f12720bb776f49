//! Resolved types and the deduplicated type graph.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::diagnostic::CompilerError;
use crate::ir::{ScalarKind, TypedefRef};

/// Identity of a generated class: owning module plus derived class name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId {
    pub module: String,
    pub name: String,
}

impl TypeId {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.name)
    }
}

/// The canonical form of one IDL type.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedType {
    /// Module the type is considered to belong to.
    pub module: String,
    /// Typedefs unwound to reach the shape, outermost first.
    pub alias_chain: Vec<TypedefRef>,
    pub shape: ResolvedShape,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedShape {
    Scalar(ScalarKind),
    UnspecifiedObject,
    List(Box<ResolvedType>),
    Mapping(Box<ResolvedType>, Box<ResolvedType>),
    /// Backed by the shared container for its arity.
    Tuple(Vec<TupleSlot>),
    /// A generated class; its fields live in the [`TypeGraph`].
    Struct(TypeId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TupleSlot {
    pub name: Option<String>,
    pub typ: ResolvedType,
}

impl ResolvedType {
    /// Whether this type is emitted as its own class.
    pub fn needs_class(&self) -> bool {
        matches!(self.shape, ResolvedShape::Struct(_))
    }

    /// The generated class this type refers to, if any.
    pub fn class_id(&self) -> Option<&TypeId> {
        match &self.shape {
            ResolvedShape::Struct(id) => Some(id),
            _ => None,
        }
    }

    /// The typedef named at the point of use, if the type was reached through one.
    pub fn typedef(&self) -> Option<&TypedefRef> {
        self.alias_chain.first()
    }

    /// Directly nested resolved types (list element, mapping key/value, tuple elements).
    pub fn internal_types(&self) -> Vec<&ResolvedType> {
        match &self.shape {
            ResolvedShape::List(element) => vec![element.as_ref()],
            ResolvedShape::Mapping(key, value) => vec![key.as_ref(), value.as_ref()],
            ResolvedShape::Tuple(slots) => slots.iter().map(|s| &s.typ).collect(),
            ResolvedShape::Scalar(_)
            | ResolvedShape::UnspecifiedObject
            | ResolvedShape::Struct(_) => Vec::new(),
        }
    }

    /// Renders the alias chain for documentation, e.g. `Calc.pair -> Calc.Pair`.
    pub fn describe_aliases(&self) -> Option<String> {
        if self.alias_chain.is_empty() {
            return None;
        }
        Some(
            self.alias_chain
                .iter()
                .map(|r| r.to_string())
                .collect::<Vec<_>>()
                .join(" -> "),
        )
    }
}

/// One field of a generated class.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    pub name: String,
    pub typ: ResolvedType,
}

/// A type that requires its own emitted class.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedType {
    pub id: TypeId,
    /// The typedef that declares the structure.
    pub source: TypedefRef,
    pub comment: String,
    pub fields: Vec<ResolvedField>,
}

/// Accumulated output of resolution: generated classes and tuple arities.
///
/// Both collections are ordered, so iteration order does not depend on
/// declaration order in the IDL.
#[derive(Debug, Default, Clone)]
pub struct TypeGraph {
    types: BTreeMap<TypeId, GeneratedType>,
    tuple_arities: BTreeSet<usize>,
}

impl TypeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a generated type. Returns `false` if one with the same identity exists.
    pub fn insert_type(&mut self, generated: GeneratedType) -> bool {
        if self.types.contains_key(&generated.id) {
            return false;
        }
        self.types.insert(generated.id.clone(), generated);
        true
    }

    pub fn contains_type(&self, id: &TypeId) -> bool {
        self.types.contains_key(id)
    }

    pub fn get(&self, id: &TypeId) -> Option<&GeneratedType> {
        self.types.get(id)
    }

    /// Generated types ordered by module, then name.
    pub fn types(&self) -> impl Iterator<Item = &GeneratedType> {
        self.types.values()
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Records that a tuple of `arity` elements is in use.
    pub fn register_arity(&mut self, arity: usize, context: &str) -> Result<(), CompilerError> {
        if arity < 1 {
            return Err(CompilerError::InvalidTupleArity {
                arity,
                context: context.to_string(),
            });
        }
        self.tuple_arities.insert(arity);
        Ok(())
    }

    /// Distinct tuple arities in ascending order.
    pub fn tuple_arities(&self) -> impl Iterator<Item = usize> + '_ {
        self.tuple_arities.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generated(module: &str, name: &str) -> GeneratedType {
        GeneratedType {
            id: TypeId::new(module, name),
            source: TypedefRef::new(module, name),
            comment: String::new(),
            fields: Vec::new(),
        }
    }

    #[test]
    fn test_insert_deduplicates() {
        let mut graph = TypeGraph::new();
        assert!(graph.insert_type(generated("M", "Pair")));
        assert!(!graph.insert_type(generated("M", "Pair")));
        assert_eq!(graph.type_count(), 1);
    }

    #[test]
    fn test_types_are_ordered() {
        let mut graph = TypeGraph::new();
        graph.insert_type(generated("Zeta", "A"));
        graph.insert_type(generated("Alpha", "Z"));
        graph.insert_type(generated("Alpha", "B"));

        let order: Vec<String> = graph.types().map(|t| t.id.to_string()).collect();
        assert_eq!(order, vec!["Alpha.B", "Alpha.Z", "Zeta.A"]);
    }

    #[test]
    fn test_zero_arity_rejected() {
        let mut graph = TypeGraph::new();
        let err = graph.register_arity(0, "function M.f").unwrap_err();
        assert!(matches!(err, CompilerError::InvalidTupleArity { arity: 0, .. }));

        graph.register_arity(3, "x").unwrap();
        graph.register_arity(2, "x").unwrap();
        graph.register_arity(3, "x").unwrap();
        assert_eq!(graph.tuple_arities().collect::<Vec<_>>(), vec![2, 3]);
    }
}
