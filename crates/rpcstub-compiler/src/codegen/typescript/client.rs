//! `<Module>Client.ts`: one async method per remote function.

use super::{describe, jsdoc, ts_ident, ts_param, ts_str, ts_type, types_import};
use crate::codegen::{comment_lines, EmitContext, MemberNames};
use crate::config::CallingConvention;
use crate::ir::AuthMode;
use crate::naming::{to_camel_case, to_pascal_case};
use crate::signature::{FunctionSignature, ModuleSignatures, STATUS_FUNCTION};

const RUNTIME: &str = r#"
export interface ClientOptions {
  token?: string;
  asyncJobCheckTimeMs?: number;
  asyncJobCheckTimeScalePercent?: number;
  asyncJobCheckMaxTimeMs?: number;
  serviceVer?: string;
}

interface ErrorEnvelope {
  name?: string;
  code?: number;
  message?: string;
  error?: string | null;
}

export interface JobState {
  finished: number;
  result: unknown[] | null;
  error: ErrorEnvelope | null;
}

export class ServerError extends Error {
  readonly code: number;
  readonly data?: string;

  constructor(envelope: ErrorEnvelope) {
    super(envelope.message ?? '');
    this.name = envelope.name ?? 'JSONRPCError';
    this.code = envelope.code ?? -32500;
    this.data = envelope.error ?? undefined;
  }
}

export class JobCancelledError extends Error {
  constructor(readonly jobId: string) {
    super(`job ${jobId} was cancelled`);
    this.name = 'JobCancelledError';
  }
}

const sleep = (ms: number): Promise<void> => new Promise((resolve) => setTimeout(resolve, ms));
"#;

const CALL: &str = r#"
  private async call(method: string, params: unknown[]): Promise<unknown[]> {
    const body: Record<string, unknown> = { version: '1.1', method, params };
    if (this.serviceVer !== undefined) {
      body.context = { service_ver: this.serviceVer };
    }
    const headers: Record<string, string> = { 'Content-Type': 'application/json' };
    if (this.token !== undefined) {
      headers.Authorization = this.token;
    }
    const response = await fetch(this.url, { method: 'POST', headers, body: JSON.stringify(body) });
    const payload = (await response.json()) as { result?: unknown[]; error?: ErrorEnvelope };
    if (payload.error) {
      throw new ServerError(payload.error);
    }
    return payload.result ?? [];
  }

  private requireToken(method: string): void {
    if (this.token === undefined) {
      throw new Error(`${method} requires authentication`);
    }
  }
"#;

const WAIT_FOR_JOB: &str = r#"
  private async waitForJob(jobId: string, signal?: AbortSignal): Promise<unknown[]> {
    let wait = this.asyncJobCheckTimeMs;
    for (;;) {
      if (signal?.aborted) {
        throw new JobCancelledError(jobId);
      }
      await sleep(wait);
      const state = await this.checkJob(jobId);
      if (state.finished) {
        if (state.error) {
          throw new ServerError(state.error);
        }
        return state.result ?? [];
      }
      wait = Math.min((wait * this.asyncJobCheckTimeScalePercent) / 100, this.asyncJobCheckMaxTimeMs);
    }
  }
"#;

/// Members every client class defines besides its function methods.
const FIXED_MEMBERS: &[&str] = &[
    "constructor", "url", "token", "asyncJobCheckTimeMs", "asyncJobCheckTimeScalePercent",
    "asyncJobCheckMaxTimeMs", "serviceVer", "call", "requireToken", "checkJob", "waitForJob",
];

/// Client method names of one function.
struct Methods {
    call: String,
    submit: String,
}

/// Allocates every function's methods, direct names first so that a submit
/// helper never takes a name the IDL asked for.
fn allocate_methods(module: &ModuleSignatures) -> Vec<Methods> {
    let mut members = MemberNames::new(FIXED_MEMBERS);
    if module.needs_default_status() {
        members.allocate(STATUS_FUNCTION.to_string());
    }
    let calls: Vec<String> = module
        .functions
        .iter()
        .map(|func| members.allocate(ts_ident(&func.name)))
        .collect();
    calls
        .into_iter()
        .zip(&module.functions)
        .map(|(call, func)| Methods {
            call,
            submit: members.allocate(format!("{}Submit", to_camel_case(&func.name))),
        })
        .collect()
}

/// Renders the client module for one IDL module.
pub fn generate_client(ctx: &EmitContext<'_>, module: &ModuleSignatures) -> String {
    let asynchronous = ctx.convention == CallingConvention::Async;
    let class = format!("{}Client", to_pascal_case(&module.module));

    let mut code = String::from("// Generated by rpcstub. Do not edit.\n");
    let mut imports = types_import(&ctx.document.graph);
    if module.needs_default_status() {
        imports.push_str("import type { ServiceStatus } from './types';\n");
    }
    if !imports.is_empty() {
        code.push_str(&imports);
    }
    code.push_str(RUNTIME);

    let mut doc = vec![format!("Client for module {}.", module.module)];
    let comment = comment_lines(&module.comment);
    if !comment.is_empty() {
        doc.push(String::new());
        doc.extend(comment.into_iter().map(str::to_string));
    }
    code.push('\n');
    code.push_str(&jsdoc(&doc, ""));
    code.push_str(&format!("export class {} {{\n", class));
    code.push_str(&generate_fields_and_constructor(ctx));
    code.push_str(CALL);
    if asynchronous {
        code.push_str(&format!(
            r#"
  /** Polls a submitted job. */
  async checkJob(jobId: string): Promise<JobState> {{
    const result = await this.call({}, [jobId]);
    return result[0] as JobState;
  }}
"#,
            ts_str(&format!("{}._check_job", module.module))
        ));
        code.push_str(WAIT_FOR_JOB);
    }

    for (func, methods) in module.functions.iter().zip(allocate_methods(module)) {
        if asynchronous {
            code.push_str(&generate_submit(func, &methods));
            code.push_str(&generate_async_call(func, &methods));
        } else {
            code.push_str(&generate_direct_call(func, &methods));
        }
    }
    if module.needs_default_status() {
        code.push_str(&format!(
            r#"
  /** Reports service state, version and provenance. */
  async {STATUS_FUNCTION}(): Promise<ServiceStatus> {{
    const result = await this.call({}, []);
    return result[0] as ServiceStatus;
  }}
"#,
            ts_str(&format!("{}.{}", module.module, STATUS_FUNCTION))
        ));
    }

    code.push_str("}\n");
    code
}

fn generate_fields_and_constructor(ctx: &EmitContext<'_>) -> String {
    let url = match ctx.url {
        Some(url) => format!("url: string = {}", ts_str(url)),
        None => "url: string".to_string(),
    };
    let service_ver = match &ctx.service_ver {
        Some(ver) => format!("options.serviceVer ?? {}", ts_str(ver)),
        None => "options.serviceVer".to_string(),
    };

    format!(
        r#"  private readonly url: string;
  private readonly token?: string;
  private readonly asyncJobCheckTimeMs: number;
  private readonly asyncJobCheckTimeScalePercent: number;
  private readonly asyncJobCheckMaxTimeMs: number;
  private readonly serviceVer?: string;

  constructor({url}, options: ClientOptions = {{}}) {{
    this.url = url;
    this.token = options.token;
    this.asyncJobCheckTimeMs = options.asyncJobCheckTimeMs ?? {initial};
    this.asyncJobCheckTimeScalePercent = options.asyncJobCheckTimeScalePercent ?? {scale};
    this.asyncJobCheckMaxTimeMs = options.asyncJobCheckMaxTimeMs ?? {max};
    this.serviceVer = {service_ver};
  }}
"#,
        initial = ctx.poll.initial_wait_ms,
        scale = ctx.poll.scale_percent,
        max = ctx.poll.max_wait_ms,
    )
}

fn param_list(func: &FunctionSignature) -> Vec<String> {
    func.params
        .iter()
        .map(|p| format!("{}: {}", ts_param(&p.name), ts_type(&p.typ)))
        .collect()
}

fn arg_list(func: &FunctionSignature) -> String {
    func.params
        .iter()
        .map(|p| ts_param(&p.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn return_type(func: &FunctionSignature) -> String {
    match (&func.combined_return, func.returns.first()) {
        (Some(combined), _) => ts_type(combined),
        (None, Some(single)) => ts_type(&single.typ),
        (None, None) => "void".to_string(),
    }
}

fn return_statement(func: &FunctionSignature) -> String {
    match (&func.combined_return, func.returns.first()) {
        (Some(combined), _) => format!("    return result as {};\n", ts_type(combined)),
        (None, Some(single)) => format!("    return result[0] as {};\n", ts_type(&single.typ)),
        (None, None) => String::new(),
    }
}

fn function_doc(func: &FunctionSignature, extra: Option<&str>) -> Vec<String> {
    let mut doc: Vec<String> = comment_lines(&func.comment)
        .into_iter()
        .map(str::to_string)
        .collect();
    if !doc.is_empty() {
        doc.push(String::new());
    }
    for p in &func.params {
        doc.push(format!("@param {} {}", ts_param(&p.name), describe(&p.typ)));
    }
    if let Some(extra) = extra {
        doc.push(extra.to_string());
    }
    for r in &func.returns {
        doc.push(format!("@returns {}: {}", r.name, describe(&r.typ)));
    }
    doc
}

fn auth_check(func: &FunctionSignature) -> String {
    if func.auth == AuthMode::Required {
        format!("    this.requireToken({});\n", ts_str(&func.qualified_name()))
    } else {
        String::new()
    }
}

/// Binds the response to `result` unless nothing is returned.
fn call_statement(func: &FunctionSignature, call: &str) -> String {
    if func.is_void() {
        format!("    await {};\n", call)
    } else {
        format!("    const result = await {};\n", call)
    }
}

fn generate_direct_call(func: &FunctionSignature, methods: &Methods) -> String {
    let mut code = String::from("\n");
    code.push_str(&jsdoc(&function_doc(func, None), "  "));
    code.push_str(&format!(
        "  async {}({}): Promise<{}> {{\n",
        methods.call,
        param_list(func).join(", "),
        return_type(func)
    ));
    code.push_str(&auth_check(func));
    let call = format!("this.call({}, [{}])", ts_str(&func.qualified_name()), arg_list(func));
    code.push_str(&call_statement(func, &call));
    code.push_str(&return_statement(func));
    code.push_str("  }\n");
    code
}

fn generate_submit(func: &FunctionSignature, methods: &Methods) -> String {
    let mut code = format!(
        "\n  /** Submits {} as a job and returns its id. */\n  async {}({}): Promise<string> {{\n",
        func.qualified_name(),
        methods.submit,
        param_list(func).join(", ")
    );
    code.push_str(&auth_check(func));
    code.push_str(&format!(
        "    const result = await this.call({}, [{}]);\n    return result[0] as string;\n  }}\n",
        ts_str(&format!("{}._{}_submit", func.module, func.name)),
        arg_list(func)
    ));
    code
}

fn generate_async_call(func: &FunctionSignature, methods: &Methods) -> String {
    let mut params = param_list(func);
    params.push("signal?: AbortSignal".to_string());

    let mut code = String::from("\n");
    let doc = function_doc(
        func,
        Some("@param signal checked before every poll; aborting rejects with JobCancelledError"),
    );
    code.push_str(&jsdoc(&doc, "  "));
    code.push_str(&format!(
        "  async {}({}): Promise<{}> {{\n",
        methods.call,
        params.join(", "),
        return_type(func)
    ));
    code.push_str(&format!(
        "    const jobId = await this.{}({});\n",
        methods.submit,
        arg_list(func)
    ));
    code.push_str(&call_statement(func, "this.waitForJob(jobId, signal)"));
    code.push_str(&return_statement(func));
    code.push_str("  }\n");
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::ir::ScalarKind;
    use crate::resolve::{ResolvedDocument, ResolvedShape, ResolvedType, TypeGraph};
    use crate::signature::NamedValue;

    fn int(name: &str) -> NamedValue {
        NamedValue {
            typ: ResolvedType {
                module: "calc".to_string(),
                alias_chain: Vec::new(),
                shape: ResolvedShape::Scalar(ScalarKind::Int),
            },
            original_name: Some(name.to_string()),
            name: name.to_string(),
        }
    }

    fn function(name: &str, params: &[&str], returns: &[&str], auth: AuthMode) -> FunctionSignature {
        FunctionSignature {
            module: "calc".to_string(),
            name: name.to_string(),
            comment: String::new(),
            params: params.iter().map(|p| int(p)).collect(),
            returns: returns.iter().map(|r| int(r)).collect(),
            auth,
            combined_return: None,
        }
    }

    fn document(functions: Vec<FunctionSignature>) -> ResolvedDocument {
        ResolvedDocument {
            graph: TypeGraph::new(),
            modules: vec![ModuleSignatures {
                module: "calc".to_string(),
                comment: String::new(),
                functions,
                has_custom_status: false,
            }],
        }
    }

    fn calc() -> Vec<FunctionSignature> {
        vec![
            function("add", &["a", "b"], &["c"], AuthMode::None),
            function("reset", &[], &[], AuthMode::Required),
        ]
    }

    fn render_functions(functions: Vec<FunctionSignature>, config: &CompilerConfig) -> String {
        let document = document(functions);
        let ctx = EmitContext::new(&document, config);
        generate_client(&ctx, &document.modules[0])
    }

    fn render(config: &CompilerConfig) -> String {
        render_functions(calc(), config)
    }

    fn asynchronous() -> CompilerConfig {
        CompilerConfig {
            convention: CallingConvention::Async,
            ..CompilerConfig::default()
        }
    }

    #[test]
    fn test_direct_client() {
        let code = render(&CompilerConfig::default());
        assert!(code.contains("export class CalcClient {\n"));
        assert!(code.contains("  async add(a: number, b: number): Promise<number> {\n    const result = await this.call('calc.add', [a, b]);\n    return result[0] as number;\n  }\n"));
        assert!(code.contains("  async reset(): Promise<void> {\n    this.requireToken('calc.reset');\n    await this.call('calc.reset', []);\n  }\n"));
        assert!(code.contains("  async status(): Promise<ServiceStatus> {"));
        assert!(!code.contains("checkJob"));
    }

    #[test]
    fn test_async_client() {
        let code = render(&asynchronous());
        assert!(code.contains("  async addSubmit(a: number, b: number): Promise<string> {"));
        assert!(code.contains("this.call('calc._add_submit', [a, b])"));
        assert!(code.contains("this.call('calc._check_job', [jobId])"));
        assert!(code.contains("  async add(a: number, b: number, signal?: AbortSignal): Promise<number> {"));
        assert!(code.contains("    await this.waitForJob(jobId, signal);\n"));
        assert!(code.contains("options.asyncJobCheckTimeScalePercent ?? 150;"));
    }

    #[test]
    fn test_dynamic_client_defaults_service_ver() {
        let config = CompilerConfig {
            convention: CallingConvention::Dynamic,
            service_ver: Some("dev".to_string()),
            ..CompilerConfig::default()
        };
        let code = render(&config);
        assert!(code.contains("this.serviceVer = options.serviceVer ?? 'dev';"));
        assert!(code.contains("constructor(url: string, options: ClientOptions = {}) {"));
    }

    #[test]
    fn test_params_do_not_collide_with_locals() {
        let functions = vec![function("store", &["result", "jobId"], &["out"], AuthMode::None)];

        let code = render_functions(functions.clone(), &CompilerConfig::default());
        assert!(code.contains("  async store(result_: number, jobId_: number): Promise<number> {\n    const result = await this.call('calc.store', [result_, jobId_]);\n"));

        let code = render_functions(functions, &asynchronous());
        assert!(code.contains("    const jobId = await this.storeSubmit(result_, jobId_);\n"));
    }

    #[test]
    fn test_functions_do_not_shadow_helpers() {
        let functions = vec![
            function("call", &["a"], &["b"], AuthMode::None),
            function("check_job", &[], &[], AuthMode::None),
            function("checkJob", &[], &[], AuthMode::None),
            function("waitForJob", &[], &[], AuthMode::None),
            function("addSubmit", &[], &[], AuthMode::None),
            function("add", &[], &[], AuthMode::None),
        ];

        let code = render_functions(functions.clone(), &CompilerConfig::default());
        assert!(code.contains("  async call_(a: number): Promise<number> {\n    const result = await this.call('calc.call', [a]);\n"));
        assert!(code.contains("  async checkJob_(): Promise<void> {\n    await this.call('calc.checkJob', []);\n"));
        assert!(code.contains("  async waitForJob_(): Promise<void> {"));
        assert!(code.contains("  private async call(method: string, params: unknown[]): Promise<unknown[]> {"));

        let code = render_functions(functions, &asynchronous());
        assert!(code.contains("  async checkJob(jobId: string): Promise<JobState> {"));
        assert!(code.contains("  async checkJob_(signal?: AbortSignal): Promise<void> {"));
        assert!(code.contains("  async checkJobSubmit_(): Promise<string> {\n    const result = await this.call('calc._checkJob_submit', []);\n"));
        assert!(code.contains("  async callSubmit(a: number): Promise<string> {"));
        // The IDL function `addSubmit` keeps its name; the helper of `add` steps aside.
        assert!(code.contains("  async addSubmit(signal?: AbortSignal): Promise<void> {"));
        assert!(code.contains("  async addSubmit_(): Promise<string> {\n    const result = await this.call('calc._add_submit', []);\n"));
        assert!(code.contains("    const jobId = await this.addSubmit_();\n"));
    }

    #[test]
    fn test_status_function_is_never_duplicated() {
        let code = render_functions(
            vec![function("Status", &[], &["s"], AuthMode::None)],
            &CompilerConfig::default(),
        );
        assert!(code.contains("  async status(): Promise<ServiceStatus> {"));
        assert!(code.contains("  async Status(): Promise<number> {"));
    }
}
