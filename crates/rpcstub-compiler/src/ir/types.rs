//! IDL type nodes.

use std::fmt;

/// Primitive scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScalarKind {
    Int,
    Float,
    String,
}

impl ScalarKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarKind::Int => "int",
            ScalarKind::Float => "float",
            ScalarKind::String => "string",
        }
    }
}

/// A type as written in the IDL.
///
/// `Typedef` is the only variant that introduces a name; the others are
/// purely structural.
#[derive(Debug, Clone, PartialEq)]
pub enum IdlType {
    Scalar(ScalarKind),
    List(Box<IdlType>),
    Mapping(Box<IdlType>, Box<IdlType>),
    Tuple(Vec<TupleElement>),
    Struct(StructType),
    Typedef(TypedefRef),
    /// Accepts any JSON value.
    UnspecifiedObject,
}

/// One element of a tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct TupleElement {
    pub name: Option<String>,
    pub typ: IdlType,
}

/// A structure with ordered, named fields.
#[derive(Debug, Clone, PartialEq)]
pub struct StructType {
    pub fields: Vec<StructField>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub name: String,
    pub typ: IdlType,
}

/// A use of a typedef by name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypedefRef {
    pub module: String,
    pub name: String,
}

impl TypedefRef {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TypedefRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.name)
    }
}

/// A typedef declaration: `typedef <alias> <name>;`
#[derive(Debug, Clone, PartialEq)]
pub struct TypedefDecl {
    pub module: String,
    pub name: String,
    pub comment: String,
    pub alias: IdlType,
}

impl TypedefDecl {
    pub fn reference(&self) -> TypedefRef {
        TypedefRef::new(&self.module, &self.name)
    }
}
