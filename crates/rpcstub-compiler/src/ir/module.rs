//! Module and function declarations.

use super::{AuthMode, IdlType, TypedefDecl};

/// A parameter or return value of a remote function.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    /// Name as declared; the IDL allows it to be omitted.
    pub name: Option<String>,
    pub typ: IdlType,
}

/// A remote function declaration (`funcdef`).
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub comment: String,
    /// Authentication declared on the function itself, if any.
    pub auth: Option<AuthMode>,
    pub params: Vec<ParamDecl>,
    pub returns: Vec<ParamDecl>,
}

/// A top-level declaration inside a module.
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Typedef(TypedefDecl),
    Function(FunctionDecl),
}

/// One IDL module: an ordered list of declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleIR {
    pub name: String,
    pub comment: String,
    /// Module-wide `authentication` default.
    pub default_auth: Option<AuthMode>,
    pub declarations: Vec<Declaration>,
}

impl ModuleIR {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: String::new(),
            default_auth: None,
            declarations: Vec::new(),
        }
    }

    /// Functions in declaration order.
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Function(f) => Some(f),
            Declaration::Typedef(_) => None,
        })
    }

    /// Typedefs in declaration order.
    pub fn typedefs(&self) -> impl Iterator<Item = &TypedefDecl> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Typedef(t) => Some(t),
            Declaration::Function(_) => None,
        })
    }
}
