//! `<module>_impl.py`: the implementation skeleton.
//!
//! Only the marker-delimited regions belong to the user; everything else is
//! rebuilt from the signatures on every pass.

use super::{describe, docstring, py_ident, py_str, TYPES_MODULE};
use crate::codegen::{comment_lines, EmitContext};
use crate::regions::{MarkerSyntax, RegionKey, RegionMap};
use crate::signature::{FunctionSignature, ModuleSignatures, STATUS_FUNCTION};

const SYNTAX: MarkerSyntax = MarkerSyntax::PYTHON;

/// Renders the implementation file, splicing in `prior` regions.
pub fn generate_impl(ctx: &EmitContext<'_>, module: &ModuleSignatures, prior: &RegionMap) -> String {
    let mut code = String::new();
    code.push_str("# -*- coding: utf-8 -*-\n");
    code.push_str(&prior.render(&RegionKey::Header, SYNTAX, ""));
    code.push_str(&format!("from {} import *  # noqa: F401,F403\n", TYPES_MODULE));

    code.push_str(&format!("\n\nclass {}:\n", module.module));
    let mut doc = vec![
        "Module Name:".to_string(),
        module.module.clone(),
        String::new(),
        "Module Description:".to_string(),
    ];
    doc.extend(comment_lines(&module.comment).into_iter().map(str::to_string));
    code.push_str(&docstring(&doc, "    "));

    code.push_str(&format!(
        "\n    VERSION = {}\n    GIT_URL = {}\n    GIT_COMMIT_HASH = {}\n\n",
        py_str(&ctx.service.version),
        py_str(&ctx.service.git_url),
        py_str(&ctx.service.git_commit_hash),
    ));
    code.push_str(&prior.render(&RegionKey::ClassHeader, SYNTAX, "    "));

    code.push_str("\n    # config holds the service configuration, or None\n");
    code.push_str("    def __init__(self, config):\n");
    code.push_str(&prior.render(&RegionKey::Constructor, SYNTAX, "        "));
    code.push_str("        pass\n");

    for func in &module.functions {
        code.push_str(&generate_method(func, prior));
    }
    if module.needs_default_status() {
        code.push_str(&generate_status(prior));
    }

    code
}

fn generate_method(func: &FunctionSignature, prior: &RegionMap) -> String {
    let params: String = func
        .params
        .iter()
        .map(|p| format!(", {}", py_ident(&p.name)))
        .collect();
    let mut code = format!("\n    def {}(self, ctx{}):\n", py_ident(&func.name), params);

    let mut doc: Vec<String> = comment_lines(&func.comment)
        .into_iter()
        .map(str::to_string)
        .collect();
    if !doc.is_empty() {
        doc.push(String::new());
    }
    for p in &func.params {
        doc.push(format!(":param {}: instance of {}", py_ident(&p.name), describe(&p.typ)));
    }
    for r in &func.returns {
        doc.push(format!(":returns {}: instance of {}", r.name, describe(&r.typ)));
    }
    doc.push(format!("Authentication: {}", func.auth.as_str()));
    code.push_str(&docstring(&doc, "        "));

    code.push_str("        # ctx is the call context\n");
    let returns: Vec<String> = func.returns.iter().map(|r| py_ident(&r.name)).collect();
    if !returns.is_empty() {
        code.push_str(&format!("        # return variables are: {}\n", returns.join(", ")));
        for name in &returns {
            code.push_str(&format!("        {} = None\n", name));
        }
    }
    code.push_str(&prior.render(&RegionKey::Function(func.name.clone()), SYNTAX, "        "));
    code.push_str(&format!("        return [{}]\n", returns.join(", ")));
    code
}

fn generate_status(prior: &RegionMap) -> String {
    let mut code = format!("\n    def {}(self, ctx):\n", STATUS_FUNCTION);
    code.push_str(
        "        returnVal = {\n            \"state\": \"OK\",\n            \"message\": \"\",\n            \"version\": self.VERSION,\n            \"git_url\": self.GIT_URL,\n            \"git_commit_hash\": self.GIT_COMMIT_HASH,\n        }\n",
    );
    code.push_str(&prior.render(&RegionKey::Status, SYNTAX, "        "));
    code.push_str("        return [returnVal]\n");
    code
}
