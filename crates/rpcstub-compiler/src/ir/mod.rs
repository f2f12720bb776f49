//! Language-agnostic representation of a parsed IDL document.
//!
//! This IR is produced by frontends from the parser's syntax tree and is
//! read-only to the rest of the compiler.

mod access;
mod module;
mod types;

pub use access::AuthMode;
pub use module::{Declaration, FunctionDecl, ModuleIR, ParamDecl};
pub use types::{
    IdlType, ScalarKind, StructField, StructType, TupleElement, TypedefDecl, TypedefRef,
};

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::diagnostic::CompilerError;

/// A complete IDL document: one or more modules.
#[derive(Debug, Clone)]
pub struct IdlDocument {
    pub modules: Vec<ModuleIR>,
    /// Where the syntax tree was loaded from.
    pub source: PathBuf,
}

impl IdlDocument {
    pub fn new(source: PathBuf) -> Self {
        Self {
            modules: Vec::new(),
            source,
        }
    }

    /// Builds the lookup table for typedef references across all modules.
    pub fn typedef_table(&self) -> Result<TypedefTable<'_>, CompilerError> {
        TypedefTable::build(&self.modules)
    }
}

/// Typedef declarations indexed by `module.name`.
#[derive(Debug, Default)]
pub struct TypedefTable<'a> {
    entries: BTreeMap<TypedefRef, &'a TypedefDecl>,
}

impl<'a> TypedefTable<'a> {
    pub fn build(modules: &'a [ModuleIR]) -> Result<Self, CompilerError> {
        let mut entries = BTreeMap::new();
        for module in modules {
            for typedef in module.typedefs() {
                if entries.insert(typedef.reference(), typedef).is_some() {
                    return Err(CompilerError::DuplicateTypedef {
                        module: typedef.module.clone(),
                        name: typedef.name.clone(),
                    });
                }
            }
        }
        Ok(Self { entries })
    }

    pub fn get(&self, reference: &TypedefRef) -> Option<&'a TypedefDecl> {
        self.entries.get(reference).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
