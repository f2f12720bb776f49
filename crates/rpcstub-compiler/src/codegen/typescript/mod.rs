//! TypeScript target.
//!
//! Layout under `<out>/typescript/`:
//! - `types.ts`: interfaces and tuple containers
//! - `<Module>Client.ts`: client class
//! - `<Module>Impl.ts`: implementation skeleton with `//` regions

mod client;
mod implementation;
mod types;

use std::collections::BTreeMap;

use super::EmitContext;
use crate::ir::ScalarKind;
use crate::naming::to_pascal_case;
use crate::regions::RegionMap;
use crate::resolve::{ResolvedShape, ResolvedType, TypeGraph};

pub fn generate(ctx: &EmitContext<'_>, regions: &BTreeMap<String, RegionMap>) -> Vec<(String, String)> {
    let empty = RegionMap::empty();
    let mut files = vec![(
        "typescript/types.ts".to_string(),
        types::generate_types(&ctx.document.graph),
    )];

    for module in &ctx.document.modules {
        let pascal = to_pascal_case(&module.module);
        let prior = regions.get(&module.module).unwrap_or(&empty);

        files.push((
            format!("typescript/{}Client.ts", pascal),
            client::generate_client(ctx, module),
        ));
        files.push((
            format!("typescript/{}Impl.ts", pascal),
            implementation::generate_impl(ctx, module, prior),
        ));
    }

    files
}

const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete",
    "do", "else", "enum", "export", "extends", "false", "finally", "for", "function", "if",
    "import", "in", "instanceof", "new", "null", "return", "super", "switch", "this", "throw",
    "true", "try", "typeof", "var", "void", "while", "with", "let", "static", "yield", "await",
    "ctx", "signal",
];

/// Locals declared by client method bodies.
const CLIENT_LOCALS: &[&str] = &["result", "jobId"];

/// Escapes a name that would not be a usable TypeScript identifier.
fn ts_ident(name: &str) -> String {
    if RESERVED.contains(&name) {
        format!("{}_", name)
    } else {
        name.to_string()
    }
}

/// Parameter name inside a generated client method.
fn ts_param(name: &str) -> String {
    if CLIENT_LOCALS.contains(&name) {
        format!("{}_", name)
    } else {
        ts_ident(name)
    }
}

fn ts_type(typ: &ResolvedType) -> String {
    match &typ.shape {
        ResolvedShape::Scalar(ScalarKind::Int) | ResolvedShape::Scalar(ScalarKind::Float) => {
            "number".to_string()
        }
        ResolvedShape::Scalar(ScalarKind::String) => "string".to_string(),
        ResolvedShape::UnspecifiedObject => "unknown".to_string(),
        ResolvedShape::List(element) => match element.shape {
            ResolvedShape::List(_) | ResolvedShape::Mapping(..) | ResolvedShape::Tuple(_) => {
                format!("Array<{}>", ts_type(element))
            }
            _ => format!("{}[]", ts_type(element)),
        },
        // JSON object keys are always strings on the wire.
        ResolvedShape::Mapping(_, value) => format!("{{ [key: string]: {} }}", ts_type(value)),
        ResolvedShape::Tuple(slots) => format!(
            "Tuple{}<{}>",
            slots.len(),
            slots.iter().map(|s| ts_type(&s.typ)).collect::<Vec<_>>().join(", ")
        ),
        ResolvedShape::Struct(id) => id.name.clone(),
    }
}

fn describe(typ: &ResolvedType) -> String {
    match typ.describe_aliases() {
        Some(chain) => format!("{} (alias {})", ts_type(typ), chain),
        None => ts_type(typ),
    }
}

/// Renders a JSDoc block at `indent`; empty when there is nothing to say.
fn jsdoc(lines: &[String], indent: &str) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut doc = format!("{indent}/**\n");
    for line in lines {
        if line.is_empty() {
            doc.push_str(&format!("{indent} *\n"));
        } else {
            doc.push_str(&format!("{indent} * {}\n", line.replace("*/", "*\\/")));
        }
    }
    doc.push_str(&format!("{indent} */\n"));
    doc
}

/// Quotes a string as a single-quoted TypeScript literal.
fn ts_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Import line for the generated type names, if there are any.
fn types_import(graph: &TypeGraph) -> String {
    let mut names: Vec<String> = graph.tuple_arities().map(|n| format!("Tuple{}", n)).collect();
    names.extend(graph.types().map(|t| t.id.name.clone()));
    if names.is_empty() {
        return String::new();
    }
    format!("import type {{ {} }} from './types';\n", names.join(", "))
}
