//! Python target.
//!
//! Layout under `<out>/python/`:
//! - `idl_types.py`: dataclasses, tuple containers, JSON encode/decode helpers
//! - `<module>_client.py`: client class
//! - `<module>_impl.py`: implementation skeleton with `#` regions
//! - `<module>_server.py`: JSON-RPC dispatcher and job registry

mod client;
mod implementation;
mod server;
mod types;

use std::collections::BTreeMap;

use super::EmitContext;
use crate::ir::ScalarKind;
use crate::naming::to_snake_case;
use crate::regions::RegionMap;
use crate::resolve::{ResolvedShape, ResolvedType};

const TYPES_MODULE: &str = "idl_types";

pub fn generate(ctx: &EmitContext<'_>, regions: &BTreeMap<String, RegionMap>) -> Vec<(String, String)> {
    let empty = RegionMap::empty();
    let mut files = vec![(
        format!("python/{}.py", TYPES_MODULE),
        types::generate_types(&ctx.document.graph),
    )];

    for module in &ctx.document.modules {
        let snake = to_snake_case(&module.module);
        let prior = regions.get(&module.module).unwrap_or(&empty);

        files.push((format!("python/{}_client.py", snake), client::generate_client(ctx, module)));
        files.push((
            format!("python/{}_impl.py", snake),
            implementation::generate_impl(ctx, module, prior),
        ));
        if ctx.emit_server {
            files.push((format!("python/{}_server.py", snake), server::generate_server(module)));
        }
    }

    files
}

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

/// Names the generated methods use for their own parameters.
const RESERVED: &[&str] = &["self", "ctx", "cancel"];

/// Names client method bodies use besides their parameters.
const CLIENT_LOCALS: &[&str] = &["result", "job_id", "encode", "identity", "list_of", "dict_of", "tuple_of"];

/// Escapes a name that would not be a usable Python identifier.
fn py_ident(name: &str) -> String {
    if KEYWORDS.contains(&name) || RESERVED.contains(&name) {
        format!("{}_", name)
    } else {
        name.to_string()
    }
}

/// Parameter name inside a generated client method.
fn py_param(name: &str) -> String {
    if CLIENT_LOCALS.contains(&name) {
        format!("{}_", name)
    } else {
        py_ident(name)
    }
}

/// Type annotation for a resolved type.
fn py_type(typ: &ResolvedType) -> String {
    match &typ.shape {
        ResolvedShape::Scalar(ScalarKind::Int) => "int".to_string(),
        ResolvedShape::Scalar(ScalarKind::Float) => "float".to_string(),
        ResolvedShape::Scalar(ScalarKind::String) => "str".to_string(),
        ResolvedShape::UnspecifiedObject => "Any".to_string(),
        ResolvedShape::List(element) => format!("List[{}]", py_type(element)),
        ResolvedShape::Mapping(key, value) => format!("Dict[{}, {}]", py_type(key), py_type(value)),
        ResolvedShape::Tuple(slots) => format!(
            "Tuple{}[{}]",
            slots.len(),
            slots.iter().map(|s| py_type(&s.typ)).collect::<Vec<_>>().join(", ")
        ),
        ResolvedShape::Struct(id) => id.name.clone(),
    }
}

/// A callable expression turning decoded JSON into the Python value of `typ`.
/// `None` when the JSON value is used as is.
fn py_decoder(typ: &ResolvedType) -> Option<String> {
    match &typ.shape {
        ResolvedShape::Scalar(_) | ResolvedShape::UnspecifiedObject => None,
        ResolvedShape::Struct(id) => Some(format!("{}.from_json", id.name)),
        ResolvedShape::List(element) => Some(format!("list_of({})", decoder_or_identity(element))),
        ResolvedShape::Mapping(_, value) => Some(format!("dict_of({})", decoder_or_identity(value))),
        ResolvedShape::Tuple(slots) => {
            let decoders: Vec<String> = slots.iter().map(|s| decoder_or_identity(&s.typ)).collect();
            Some(format!("tuple_of(Tuple{}, {})", slots.len(), decoders.join(", ")))
        }
    }
}

fn decoder_or_identity(typ: &ResolvedType) -> String {
    py_decoder(typ).unwrap_or_else(|| "identity".to_string())
}

/// Applies the decoder of `typ` to `expr`.
fn decode_expr(typ: &ResolvedType, expr: &str) -> String {
    match py_decoder(typ) {
        Some(decoder) => format!("{}({})", decoder, expr),
        None => expr.to_string(),
    }
}

/// One-line description of a type for docstrings.
fn describe(typ: &ResolvedType) -> String {
    match typ.describe_aliases() {
        Some(chain) => format!("{} (alias {})", py_type(typ), chain),
        None => py_type(typ),
    }
}

/// Renders a docstring at `indent`; empty when there is nothing to say.
fn docstring(lines: &[String], indent: &str) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut doc = format!("{indent}\"\"\"\n");
    for line in lines {
        if line.is_empty() {
            doc.push('\n');
        } else {
            let escaped = line.replace('\\', "\\\\").replace("\"\"\"", "\\\"\\\"\\\"");
            doc.push_str(&format!("{indent}{}\n", escaped));
        }
    }
    doc.push_str(&format!("{indent}\"\"\"\n"));
    doc
}

/// Quotes a string as a Python literal.
fn py_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}
