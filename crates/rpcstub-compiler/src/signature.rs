//! Function signature building.
//!
//! Turns each `funcdef` of a module into a resolved signature with usable,
//! collision-free names for every parameter and return value.

use std::collections::{BTreeSet, HashSet};

use crate::diagnostic::CompilerError;
use crate::ir::{AuthMode, FunctionDecl, ModuleIR, ParamDecl};
use crate::naming::to_snake_case;
use crate::resolve::{ResolvedType, Resolver, TupleSlot};

/// Name of the function that replaces the built-in status accessor.
pub const STATUS_FUNCTION: &str = "status";

/// A parameter or return value with its resolved type.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue {
    pub typ: ResolvedType,
    /// Name as declared in the IDL, if any.
    pub original_name: Option<String>,
    /// Name used for generated identifiers; unique within the function.
    pub name: String,
}

/// A fully resolved remote function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub module: String,
    pub name: String,
    pub comment: String,
    pub params: Vec<NamedValue>,
    pub returns: Vec<NamedValue>,
    pub auth: AuthMode,
    /// Tuple over all return values; present only for multi-value returns.
    pub combined_return: Option<ResolvedType>,
}

impl FunctionSignature {
    pub fn is_void(&self) -> bool {
        self.returns.is_empty()
    }

    /// `<module>.<function>`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }
}

/// Signatures of one module, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleSignatures {
    pub module: String,
    pub comment: String,
    pub functions: Vec<FunctionSignature>,
    /// The IDL declares its own `status` function.
    pub has_custom_status: bool,
}

impl ModuleSignatures {
    /// Original names of all emitted functions.
    pub fn function_names(&self) -> Vec<String> {
        self.functions.iter().map(|f| f.name.clone()).collect()
    }

    /// Whether a default status accessor must be generated.
    pub fn needs_default_status(&self) -> bool {
        !self.has_custom_status
    }
}

/// Builds signatures for every function in `module`, skipping other declarations.
pub fn build_signatures(
    module: &ModuleIR,
    resolver: &mut Resolver<'_>,
) -> Result<ModuleSignatures, CompilerError> {
    let mut seen = BTreeSet::new();
    for func in module.functions() {
        if !seen.insert(func.name.as_str()) {
            return Err(CompilerError::DuplicateFunction {
                module: module.name.clone(),
                name: func.name.clone(),
            });
        }
    }

    let functions = module
        .functions()
        .map(|func| build_signature(module, func, resolver))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ModuleSignatures {
        module: module.name.clone(),
        comment: module.comment.clone(),
        has_custom_status: functions.iter().any(|f| f.name == STATUS_FUNCTION),
        functions,
    })
}

fn build_signature(
    module: &ModuleIR,
    func: &FunctionDecl,
    resolver: &mut Resolver<'_>,
) -> Result<FunctionSignature, CompilerError> {
    let context = format!("function {}.{}", module.name, func.name);
    let mut names = NameAllocator::default();

    let params = resolve_values(&func.params, module, &context, "parameter", resolver)?
        .into_iter()
        .enumerate()
        .map(|(i, (typ, original))| {
            let base = original.clone().unwrap_or_else(|| format!("arg_{}", i + 1));
            NamedValue {
                name: names.allocate(&base),
                original_name: original,
                typ,
            }
        })
        .collect::<Vec<_>>();

    let single_return = func.returns.len() == 1;
    let returns = resolve_values(&func.returns, module, &context, "return", resolver)?
        .into_iter()
        .enumerate()
        .map(|(i, (typ, original))| {
            let base = match (&original, typ.typedef()) {
                (Some(name), _) => name.clone(),
                (None, Some(typedef)) if single_return => to_snake_case(&typedef.name),
                (None, _) => format!("return_{}", i + 1),
            };
            NamedValue {
                name: names.allocate(&base),
                original_name: original,
                typ,
            }
        })
        .collect::<Vec<_>>();

    let combined_return = if returns.len() > 1 {
        let slots = returns
            .iter()
            .map(|r| TupleSlot {
                name: Some(r.name.clone()),
                typ: r.typ.clone(),
            })
            .collect();
        Some(resolver.synthesize_tuple(slots, &module.name, &context)?)
    } else {
        None
    };

    Ok(FunctionSignature {
        module: module.name.clone(),
        name: func.name.clone(),
        comment: func.comment.clone(),
        params,
        returns,
        auth: AuthMode::effective(func.auth, module.default_auth),
        combined_return,
    })
}

fn resolve_values(
    values: &[ParamDecl],
    module: &ModuleIR,
    context: &str,
    role: &str,
    resolver: &mut Resolver<'_>,
) -> Result<Vec<(ResolvedType, Option<String>)>, CompilerError> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            let context = format!("{} {} {}", context, role, i + 1);
            let typ = resolver.resolve(&value.typ, &module.name, &context)?;
            Ok((typ, value.name.clone()))
        })
        .collect()
}

/// Hands out names unique within one function, suffixing `_2`, `_3`, ... on collision.
#[derive(Debug, Default)]
struct NameAllocator {
    used: HashSet<String>,
}

impl NameAllocator {
    fn allocate(&mut self, base: &str) -> String {
        if self.used.insert(base.to_string()) {
            return base.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}_{}", base, n);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}
