//! `types.ts`: interfaces and tuple containers.

use super::{describe, jsdoc, ts_type};
use crate::codegen::comment_lines;
use crate::resolve::TypeGraph;

/// Renders the shared types module.
pub fn generate_types(graph: &TypeGraph) -> String {
    let mut code = String::from("// Generated by rpcstub. Do not edit.\n");

    code.push_str(
        r#"
/** Reported by every service's status function. */
export interface ServiceStatus {
  state: string;
  message: string;
  version: string;
  git_url: string;
  git_commit_hash: string;
}
"#,
    );

    for arity in graph.tuple_arities() {
        let params: Vec<String> = (1..=arity).map(|i| format!("T{}", i)).collect();
        code.push_str(&format!(
            "\n/** Container for {arity}-element tuples. */\nexport type Tuple{arity}<{params}> = [{params}];\n",
            params = params.join(", ")
        ));
    }

    for generated in graph.types() {
        let mut doc: Vec<String> = comment_lines(&generated.comment)
            .into_iter()
            .map(str::to_string)
            .collect();
        if !doc.is_empty() {
            doc.push(String::new());
        }
        doc.push(format!("Declared as {}.", generated.source));

        code.push('\n');
        code.push_str(&jsdoc(&doc, ""));
        code.push_str(&format!("export interface {} {{\n", generated.id.name));
        for field in &generated.fields {
            if field.typ.alias_chain.is_empty() {
                code.push_str(&format!("  {}: {};\n", field.name, ts_type(&field.typ)));
            } else {
                code.push_str(&format!(
                    "  /** {} */\n  {}: {};\n",
                    describe(&field.typ),
                    field.name,
                    ts_type(&field.typ)
                ));
            }
        }
        code.push_str("}\n");
    }

    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ScalarKind, TypedefRef};
    use crate::resolve::{GeneratedType, ResolvedField, ResolvedShape, ResolvedType, TypeId};

    #[test]
    fn test_interfaces_and_tuples() {
        let mut graph = TypeGraph::new();
        graph.register_arity(3, "x").unwrap();
        graph.insert_type(GeneratedType {
            id: TypeId::new("Calc", "Point"),
            source: TypedefRef::new("Calc", "point"),
            comment: String::new(),
            fields: vec![ResolvedField {
                name: "x".to_string(),
                typ: ResolvedType {
                    module: "Calc".to_string(),
                    alias_chain: vec![TypedefRef::new("Calc", "coordinate")],
                    shape: ResolvedShape::Scalar(ScalarKind::Float),
                },
            }],
        });

        let code = generate_types(&graph);
        assert!(code.contains("export type Tuple3<T1, T2, T3> = [T1, T2, T3];\n"));
        assert!(code.contains("export interface Point {\n  /** number (alias Calc.coordinate) */\n  x: number;\n}\n"));
        assert!(code.contains("export interface ServiceStatus {"));
    }
}
