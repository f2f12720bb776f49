//! `idl_types.py`: generated classes and tuple containers.

use super::{decode_expr, describe, docstring, py_ident, py_str, py_type};
use crate::codegen::comment_lines;
use crate::resolve::{GeneratedType, TypeGraph};

const HELPERS: &str = r#"

def encode(value: Any) -> Any:
    """Converts generated values into plain JSON data."""
    if hasattr(value, "to_json"):
        return value.to_json()
    if isinstance(value, (list, tuple)):
        return [encode(v) for v in value]
    if isinstance(value, dict):
        return {k: encode(v) for k, v in value.items()}
    return value


def identity(value: Any) -> Any:
    return value


def list_of(decode: Callable[[Any], Any]) -> Callable[[Any], Any]:
    return lambda value: None if value is None else [decode(v) for v in value]


def dict_of(decode: Callable[[Any], Any]) -> Callable[[Any], Any]:
    return lambda value: None if value is None else {k: decode(v) for k, v in value.items()}


def tuple_of(container: Any, *decoders: Callable[[Any], Any]) -> Callable[[Any], Any]:
    def decode(value: Any) -> Any:
        if value is None:
            return None
        if len(value) != len(decoders):
            raise ValueError(
                "expected {} tuple elements, got {}".format(len(decoders), len(value))
            )
        return container(*[d(v) for d, v in zip(decoders, value)])
    return decode
"#;

/// Renders the shared types module.
pub fn generate_types(graph: &TypeGraph) -> String {
    let mut names: Vec<String> = ["encode", "identity", "list_of", "dict_of", "tuple_of"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    names.extend(graph.tuple_arities().map(|n| format!("Tuple{}", n)));
    names.extend(graph.types().map(|t| t.id.name.clone()));

    let mut code = String::new();
    code.push_str("# Generated by rpcstub. Do not edit.\n");
    code.push_str("from __future__ import annotations\n\n");
    code.push_str("from dataclasses import dataclass\n");
    code.push_str("from typing import Any, Callable, Dict, Generic, List, TypeVar\n\n");

    code.push_str("__all__ = [\n");
    for name in &names {
        code.push_str(&format!("    {},\n", py_str(name)));
    }
    code.push_str("]\n");

    let max_arity = graph.tuple_arities().max().unwrap_or(0);
    if max_arity > 0 {
        code.push('\n');
        for i in 1..=max_arity {
            code.push_str(&format!("T{i} = TypeVar(\"T{i}\")\n"));
        }
    }

    code.push_str(HELPERS);

    for arity in graph.tuple_arities() {
        code.push_str(&generate_tuple(arity));
    }
    for generated in graph.types() {
        code.push_str(&generate_class(generated));
    }

    code
}

fn generate_tuple(arity: usize) -> String {
    let params: Vec<String> = (1..=arity).map(|i| format!("T{}", i)).collect();
    let mut code = format!(
        "\n\n@dataclass\nclass Tuple{arity}(Generic[{}]):\n    \"\"\"Container for {arity}-element tuples.\"\"\"\n\n",
        params.join(", ")
    );
    for i in 1..=arity {
        code.push_str(&format!("    e_{i}: T{i}\n"));
    }
    let elements: Vec<String> = (1..=arity).map(|i| format!("encode(self.e_{})", i)).collect();
    code.push_str(&format!(
        "\n    def to_json(self) -> List[Any]:\n        return [{}]\n",
        elements.join(", ")
    ));
    code
}

fn generate_class(generated: &GeneratedType) -> String {
    let name = &generated.id.name;
    let mut doc: Vec<String> = comment_lines(&generated.comment)
        .into_iter()
        .map(str::to_string)
        .collect();
    if !doc.is_empty() {
        doc.push(String::new());
    }
    doc.push(format!("Declared as {}.", generated.source));
    for field in &generated.fields {
        doc.push(format!("{}: {}", field.name, describe(&field.typ)));
    }

    let mut code = format!("\n\n@dataclass\nclass {}:\n", name);
    code.push_str(&docstring(&doc, "    "));
    code.push('\n');

    for field in &generated.fields {
        code.push_str(&format!("    {}: {}\n", py_ident(&field.name), py_type(&field.typ)));
    }

    code.push_str("\n    def to_json(self) -> Dict[str, Any]:\n        return {");
    if generated.fields.is_empty() {
        code.push_str("}\n");
    } else {
        code.push('\n');
        for field in &generated.fields {
            code.push_str(&format!(
                "            {}: encode(self.{}),\n",
                py_str(&field.name),
                py_ident(&field.name)
            ));
        }
        code.push_str("        }\n");
    }

    code.push_str(&format!(
        "\n    @classmethod\n    def from_json(cls, data: Any) -> \"{name}\":\n        if data is None:\n            return None\n        return cls(\n"
    ));
    for field in &generated.fields {
        let value = format!("data.get({})", py_str(&field.name));
        code.push_str(&format!(
            "            {}={},\n",
            py_ident(&field.name),
            decode_expr(&field.typ, &value)
        ));
    }
    code.push_str("        )\n");
    code
}
