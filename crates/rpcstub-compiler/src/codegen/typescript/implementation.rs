//! `<Module>Impl.ts`: the implementation skeleton.

use super::{describe, jsdoc, ts_ident, ts_str, ts_type, types_import};
use crate::codegen::{comment_lines, EmitContext};
use crate::naming::to_pascal_case;
use crate::regions::{MarkerSyntax, RegionKey, RegionMap};
use crate::signature::{FunctionSignature, ModuleSignatures, STATUS_FUNCTION};

const SYNTAX: MarkerSyntax = MarkerSyntax::TYPESCRIPT;

const CALL_CONTEXT: &str = r#"
export interface CallContext {
  token?: string;
  method: string;
  rpcContext: { service_ver?: string };
}
"#;

/// Renders the implementation file, splicing in `prior` regions.
pub fn generate_impl(ctx: &EmitContext<'_>, module: &ModuleSignatures, prior: &RegionMap) -> String {
    let class = format!("{}Impl", to_pascal_case(&module.module));

    let mut code = prior.render(&RegionKey::Header, SYNTAX, "");
    code.push_str(&types_import(&ctx.document.graph));
    if module.needs_default_status() {
        code.push_str("import type { ServiceStatus } from './types';\n");
    }
    code.push_str(CALL_CONTEXT);

    let mut doc = vec![format!("Module Name: {}", module.module)];
    let comment = comment_lines(&module.comment);
    if !comment.is_empty() {
        doc.push(String::new());
        doc.push("Module Description:".to_string());
        doc.extend(comment.into_iter().map(str::to_string));
    }
    code.push('\n');
    code.push_str(&jsdoc(&doc, ""));
    code.push_str(&format!("export class {} {{\n", class));
    code.push_str(&format!(
        "  static readonly VERSION = {};\n  static readonly GIT_URL = {};\n  static readonly GIT_COMMIT_HASH = {};\n\n",
        ts_str(&ctx.service.version),
        ts_str(&ctx.service.git_url),
        ts_str(&ctx.service.git_commit_hash),
    ));
    code.push_str(&prior.render(&RegionKey::ClassHeader, SYNTAX, "  "));
    code.push_str("\n  constructor(config: Record<string, unknown> | null) {\n");
    code.push_str(&prior.render(&RegionKey::Constructor, SYNTAX, "    "));
    code.push_str("  }\n");

    for func in &module.functions {
        code.push_str(&generate_method(func, prior));
    }
    if module.needs_default_status() {
        code.push_str(&generate_status(&class, prior));
    }

    code.push_str("}\n");
    code
}

fn generate_method(func: &FunctionSignature, prior: &RegionMap) -> String {
    let mut params = vec!["ctx: CallContext".to_string()];
    params.extend(
        func.params
            .iter()
            .map(|p| format!("{}: {}", ts_ident(&p.name), ts_type(&p.typ))),
    );
    let return_type = match (&func.combined_return, func.returns.first()) {
        (Some(combined), _) => ts_type(combined),
        (None, Some(single)) => ts_type(&single.typ),
        (None, None) => "void".to_string(),
    };

    let mut doc: Vec<String> = comment_lines(&func.comment)
        .into_iter()
        .map(str::to_string)
        .collect();
    if !doc.is_empty() {
        doc.push(String::new());
    }
    for p in &func.params {
        doc.push(format!("@param {} {}", ts_ident(&p.name), describe(&p.typ)));
    }
    for r in &func.returns {
        doc.push(format!("@returns {}: {}", r.name, describe(&r.typ)));
    }
    doc.push(format!("Authentication: {}", func.auth.as_str()));

    let mut code = String::from("\n");
    code.push_str(&jsdoc(&doc, "  "));
    code.push_str(&format!(
        "  async {}({}): Promise<{}> {{\n",
        ts_ident(&func.name),
        params.join(", "),
        return_type
    ));
    for r in &func.returns {
        code.push_str(&format!("    let {}!: {};\n", ts_ident(&r.name), ts_type(&r.typ)));
    }
    code.push_str(&prior.render(&RegionKey::Function(func.name.clone()), SYNTAX, "    "));

    let names: Vec<String> = func.returns.iter().map(|r| ts_ident(&r.name)).collect();
    match names.len() {
        0 => {}
        1 => code.push_str(&format!("    return {};\n", names[0])),
        _ => code.push_str(&format!("    return [{}];\n", names.join(", "))),
    }
    code.push_str("  }\n");
    code
}

fn generate_status(class: &str, prior: &RegionMap) -> String {
    let mut code = format!(
        r#"
  async {STATUS_FUNCTION}(ctx: CallContext): Promise<ServiceStatus> {{
    const returnVal: ServiceStatus = {{
      state: 'OK',
      message: '',
      version: {class}.VERSION,
      git_url: {class}.GIT_URL,
      git_commit_hash: {class}.GIT_COMMIT_HASH,
    }};
"#
    );
    code.push_str(&prior.render(&RegionKey::Status, SYNTAX, "    "));
    code.push_str("    return returnVal;\n  }\n");
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::ir::{AuthMode, ScalarKind};
    use crate::resolve::{ResolvedDocument, ResolvedShape, ResolvedType, TupleSlot, TypeGraph};
    use crate::signature::NamedValue;
    use std::path::Path;

    fn document() -> ResolvedDocument {
        let value = |name: &str, kind: ScalarKind| NamedValue {
            typ: ResolvedType {
                module: "Calc".to_string(),
                alias_chain: Vec::new(),
                shape: ResolvedShape::Scalar(kind),
            },
            original_name: None,
            name: name.to_string(),
        };
        let returns = vec![value("return_1", ScalarKind::String), value("return_2", ScalarKind::Int)];
        let combined = ResolvedType {
            module: "Calc".to_string(),
            alias_chain: Vec::new(),
            shape: ResolvedShape::Tuple(
                returns
                    .iter()
                    .map(|r| TupleSlot { name: Some(r.name.clone()), typ: r.typ.clone() })
                    .collect(),
            ),
        };
        let mut graph = TypeGraph::new();
        graph.register_arity(2, "x").unwrap();
        ResolvedDocument {
            graph,
            modules: vec![ModuleSignatures {
                module: "Calc".to_string(),
                comment: String::new(),
                functions: vec![FunctionSignature {
                    module: "Calc".to_string(),
                    name: "describe".to_string(),
                    comment: String::new(),
                    params: vec![value("arg_1", ScalarKind::Int)],
                    returns,
                    auth: AuthMode::Optional,
                    combined_return: Some(combined),
                }],
                has_custom_status: false,
            }],
        }
    }

    fn render(document: &ResolvedDocument, prior: &RegionMap) -> String {
        let config = CompilerConfig::default();
        let ctx = EmitContext::new(document, &config);
        generate_impl(&ctx, &document.modules[0], prior)
    }

    #[test]
    fn test_skeleton() {
        let doc = document();
        let code = render(&doc, &RegionMap::empty());
        assert!(code.starts_with("//BEGIN_HEADER\n//END_HEADER\nimport type { Tuple2 } from './types';\n"));
        assert!(code.contains("  async describe(ctx: CallContext, arg_1: number): Promise<Tuple2<string, number>> {\n"));
        assert!(code.contains("    let return_1!: string;\n    let return_2!: number;\n    //BEGIN describe\n    //END describe\n    return [return_1, return_2];\n"));
        assert!(code.contains("      version: CalcImpl.VERSION,\n"));
        assert!(code.contains("    //BEGIN_STATUS\n    //END_STATUS\n"));
    }

    #[test]
    fn test_round_trip_is_stable() {
        let doc = document();
        let edited = render(&doc, &RegionMap::empty())
            .replace("    //BEGIN describe\n", "    //BEGIN describe\n    return_1 = String(arg_1);\n    return_2 = arg_1;\n")
            .replace("  //BEGIN_CLASS_HEADER\n", "  //BEGIN_CLASS_HEADER\n  private calls = 0;\n");

        let prior = RegionMap::extract(&edited, SYNTAX, &doc.modules[0].function_names(), Path::new("CalcImpl.ts")).unwrap();
        assert_eq!(render(&doc, &prior), edited);
    }
}
