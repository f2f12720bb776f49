//! Convert the raw JSON syntax tree to IR.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::diagnostic::CompilerError;
use crate::ir::{
    AuthMode, Declaration, FunctionDecl, IdlDocument, IdlType, ModuleIR, ParamDecl, ScalarKind,
    StructField, StructType, TupleElement, TypedefDecl, TypedefRef,
};
use super::ast::*;

/// Converts a raw syntax tree document to IR.
pub fn to_ir(raw: RawDocument, source: PathBuf) -> Result<IdlDocument, CompilerError> {
    let mut document = IdlDocument::new(source);

    for raw_module in raw.modules {
        let module = convert_module(raw_module, &document.source)?;
        document.modules.push(module);
    }

    Ok(document)
}

fn convert_module(raw: RawModule, source: &Path) -> Result<ModuleIR, CompilerError> {
    let mut module = ModuleIR::new(&raw.name);
    module.comment = raw.comment;
    module.default_auth = parse_auth(raw.authentication.as_deref(), &raw.name, source)?;

    for decl in raw.declarations {
        match decl.kind.as_str() {
            "typedef" => {
                let context = format!("typedef {}.{}", raw.name, decl.name);
                let raw_type = decl.typ.ok_or_else(|| malformed(source, &context, "missing 'type'"))?;
                let alias = convert_type(&raw_type, &raw.name, &context, source)?;
                module.declarations.push(Declaration::Typedef(TypedefDecl {
                    module: raw.name.clone(),
                    name: decl.name,
                    comment: decl.comment,
                    alias,
                }));
            }
            "funcdef" => {
                let context = format!("function {}.{}", raw.name, decl.name);
                let auth = parse_auth(decl.authentication.as_deref(), &context, source)?;
                let params = convert_params(&decl.params, &raw.name, &context, "parameter", source)?;
                let returns = convert_params(&decl.returns, &raw.name, &context, "return", source)?;
                module.declarations.push(Declaration::Function(FunctionDecl {
                    name: decl.name,
                    comment: decl.comment,
                    auth,
                    params,
                    returns,
                }));
            }
            other => {
                debug!(module = %raw.name, kind = other, "skipping declaration");
            }
        }
    }

    Ok(module)
}

fn convert_params(
    raw: &[RawParam],
    module: &str,
    context: &str,
    role: &str,
    source: &Path,
) -> Result<Vec<ParamDecl>, CompilerError> {
    raw.iter()
        .enumerate()
        .map(|(i, p)| {
            let context = format!("{} {} {}", context, role, i + 1);
            Ok(ParamDecl {
                name: p.name.clone().filter(|n| !n.is_empty()),
                typ: convert_type(&p.typ, module, &context, source)?,
            })
        })
        .collect()
}

/// Converts a raw type node. `module` is the module the node appears in and
/// is used for typedef references that omit their module.
fn convert_type(
    raw: &RawType,
    module: &str,
    context: &str,
    source: &Path,
) -> Result<IdlType, CompilerError> {
    let typ = match raw.kind.as_str() {
        "int" => IdlType::Scalar(ScalarKind::Int),
        "float" => IdlType::Scalar(ScalarKind::Float),
        "string" => IdlType::Scalar(ScalarKind::String),
        "UnspecifiedObject" => IdlType::UnspecifiedObject,
        "list" => {
            let element = raw
                .element
                .as_ref()
                .ok_or_else(|| malformed(source, context, "list without 'element'"))?;
            IdlType::List(Box::new(convert_type(element, module, context, source)?))
        }
        "mapping" => {
            let key = raw
                .key
                .as_ref()
                .ok_or_else(|| malformed(source, context, "mapping without 'key'"))?;
            let value = raw
                .value
                .as_ref()
                .ok_or_else(|| malformed(source, context, "mapping without 'value'"))?;
            IdlType::Mapping(
                Box::new(convert_type(key, module, context, source)?),
                Box::new(convert_type(value, module, context, source)?),
            )
        }
        "tuple" => {
            let elements = raw
                .elements
                .as_ref()
                .ok_or_else(|| malformed(source, context, "tuple without 'elements'"))?;
            let elements = elements
                .iter()
                .map(|e| {
                    Ok(TupleElement {
                        name: e.name.clone().filter(|n| !n.is_empty()),
                        typ: convert_type(&e.typ, module, context, source)?,
                    })
                })
                .collect::<Result<Vec<_>, CompilerError>>()?;
            IdlType::Tuple(elements)
        }
        "structure" => {
            let fields = raw
                .fields
                .as_ref()
                .ok_or_else(|| malformed(source, context, "structure without 'fields'"))?;
            let fields = fields
                .iter()
                .map(|f| {
                    let field_context = format!("{} field {}", context, f.name);
                    Ok(StructField {
                        name: f.name.clone(),
                        typ: convert_type(&f.typ, module, &field_context, source)?,
                    })
                })
                .collect::<Result<Vec<_>, CompilerError>>()?;
            IdlType::Struct(StructType { fields })
        }
        "typedef" => {
            let name = raw
                .name
                .as_ref()
                .ok_or_else(|| malformed(source, context, "typedef reference without 'name'"))?;
            let owner = raw.module.as_deref().unwrap_or(module);
            IdlType::Typedef(TypedefRef::new(owner, name))
        }
        other => {
            return Err(CompilerError::UnknownTypeShape {
                kind: other.to_string(),
                context: context.to_string(),
            })
        }
    };
    Ok(typ)
}

fn parse_auth(
    raw: Option<&str>,
    context: &str,
    source: &Path,
) -> Result<Option<AuthMode>, CompilerError> {
    match raw {
        None => Ok(None),
        Some(s) => AuthMode::from_str(s)
            .map(Some)
            .ok_or_else(|| malformed(source, context, &format!("unknown authentication mode '{}'", s))),
    }
}

fn malformed(source: &Path, context: &str, message: &str) -> CompilerError {
    CompilerError::SyntaxTreeLoadFailed {
        path: source.to_path_buf(),
        message: format!("{}: {}", context, message),
    }
}
