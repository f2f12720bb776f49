//! `<module>_client.py`: one callable per remote function.

use super::{decode_expr, describe, docstring, py_ident, py_param, py_str, py_type, TYPES_MODULE};
use crate::codegen::{comment_lines, EmitContext, MemberNames};
use crate::config::CallingConvention;
use crate::ir::AuthMode;
use crate::signature::{FunctionSignature, ModuleSignatures, STATUS_FUNCTION};

const PRELUDE: &str = r#"import json
import threading
import time
import urllib.error
import urllib.request
from typing import Any, Dict, List, Optional
"#;

const ERRORS: &str = r#"

class ServerError(Exception):
    """Error envelope returned by the service."""

    def __init__(self, name: str, code: int, message: str, data: Optional[str] = None):
        super().__init__(message)
        self.name = name
        self.code = code
        self.message = message
        self.data = data

    def __str__(self) -> str:
        return "{}: {}. {}\n{}".format(self.name, self.code, self.message, self.data or "")


class JobCancelled(Exception):
    """Raised when a submitted job is abandoned through its cancel event."""

    def __init__(self, job_id: str):
        super().__init__("job {} was cancelled".format(job_id))
        self.job_id = job_id


def _server_error(error: Dict[str, Any]) -> ServerError:
    return ServerError(
        error.get("name", "JSONRPCError"),
        error.get("code", -32500),
        error.get("message", ""),
        error.get("error"),
    )
"#;

const CALL: &str = r#"
    def _call(self, method: str, params: List[Any]) -> List[Any]:
        body: Dict[str, Any] = {
            "version": "1.1",
            "method": method,
            "params": [encode(p) for p in params],
        }
        if self.service_ver is not None:
            body["context"] = {"service_ver": self.service_ver}
        headers = {"Content-Type": "application/json"}
        if self.token is not None:
            headers["Authorization"] = self.token
        request = urllib.request.Request(
            self.url, data=json.dumps(body).encode("utf-8"), headers=headers, method="POST"
        )
        try:
            with urllib.request.urlopen(request, timeout=self.timeout) as response:
                payload = json.loads(response.read().decode("utf-8"))
        except urllib.error.HTTPError as e:
            try:
                payload = json.loads(e.read().decode("utf-8"))
            except ValueError:
                raise ServerError("HTTPError", e.code, str(e))
        if payload.get("error"):
            raise _server_error(payload["error"])
        return payload.get("result") or []

    def _require_token(self, method: str) -> None:
        if self.token is None:
            raise ValueError("{} requires authentication".format(method))
"#;

const WAIT_FOR_JOB: &str = r#"
    def _wait_for_job(self, job_id: str, cancel: Optional[threading.Event]) -> List[Any]:
        wait = self.async_job_check_time_ms / 1000.0
        ceiling = self.async_job_check_max_time_ms / 1000.0
        while True:
            if cancel is not None and cancel.is_set():
                raise JobCancelled(job_id)
            time.sleep(wait)
            state = self.check_job(job_id)
            if state.get("finished"):
                if state.get("error"):
                    raise _server_error(state["error"])
                return state.get("result") or []
            wait = min(wait * self.async_job_check_time_scale_percent / 100.0, ceiling)
"#;

/// Members every client class defines besides its function methods.
const FIXED_MEMBERS: &[&str] = &[
    "url", "token", "timeout", "async_job_check_time_ms", "async_job_check_time_scale_percent",
    "async_job_check_max_time_ms", "service_ver", "_call", "_require_token", "check_job",
    "_wait_for_job",
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
        .map(|func| members.allocate(py_ident(&func.name)))
        .collect();
    calls
        .into_iter()
        .zip(&module.functions)
        .map(|(call, func)| Methods {
            call,
            submit: members.allocate(format!("{}_submit", func.name)),
        })
        .collect()
}

/// Renders the client module for one IDL module.
pub fn generate_client(ctx: &EmitContext<'_>, module: &ModuleSignatures) -> String {
    let asynchronous = ctx.convention == CallingConvention::Async;

    let mut code = String::new();
    code.push_str("# Generated by rpcstub. Do not edit.\n");
    code.push_str("from __future__ import annotations\n\n");
    code.push_str(PRELUDE);
    code.push_str(&format!("\nfrom {} import *  # noqa: F401,F403\n", TYPES_MODULE));
    code.push_str(ERRORS);

    code.push_str(&format!("\n\nclass {}Client:\n", module.module));
    let mut doc = vec![format!("Client for module {}.", module.module)];
    let comment = comment_lines(&module.comment);
    if !comment.is_empty() {
        doc.push(String::new());
        doc.extend(comment.into_iter().map(str::to_string));
    }
    code.push_str(&docstring(&doc, "    "));
    code.push_str(&generate_constructor(ctx));
    code.push_str(CALL);
    if asynchronous {
        code.push_str(&generate_check_job(module));
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
        code.push_str(&generate_status(module));
    }

    code
}

fn generate_constructor(ctx: &EmitContext<'_>) -> String {
    let url = ctx.url.map(py_str).unwrap_or_else(|| "None".to_string());
    let service_ver = ctx
        .service_ver
        .as_deref()
        .map(py_str)
        .unwrap_or_else(|| "None".to_string());

    format!(
        r#"
    def __init__(
        self,
        url: Optional[str] = {url},
        token: Optional[str] = None,
        timeout: float = 30 * 60,
        async_job_check_time_ms: int = {initial},
        async_job_check_time_scale_percent: int = {scale},
        async_job_check_max_time_ms: int = {max},
        service_ver: Optional[str] = {service_ver},
    ):
        if url is None:
            raise ValueError("A url is required")
        self.url = url
        self.token = token
        self.timeout = timeout
        self.async_job_check_time_ms = async_job_check_time_ms
        self.async_job_check_time_scale_percent = async_job_check_time_scale_percent
        self.async_job_check_max_time_ms = async_job_check_max_time_ms
        self.service_ver = service_ver
"#,
        initial = ctx.poll.initial_wait_ms,
        scale = ctx.poll.scale_percent,
        max = ctx.poll.max_wait_ms,
    )
}

fn generate_check_job(module: &ModuleSignatures) -> String {
    format!(
        r#"
    def check_job(self, job_id: str) -> Dict[str, Any]:
        """Polls a submitted job: {{"finished": 0|1, "result": ..., "error": ...}}."""
        return self._call("{}._check_job", [job_id])[0]
"#,
        module.module
    )
}

fn param_list(func: &FunctionSignature) -> String {
    func.params
        .iter()
        .map(|p| format!(", {}: {}", py_param(&p.name), py_type(&p.typ)))
        .collect()
}

fn arg_list(func: &FunctionSignature) -> String {
    func.params
        .iter()
        .map(|p| py_param(&p.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn return_annotation(func: &FunctionSignature) -> String {
    match (&func.combined_return, func.returns.first()) {
        (Some(combined), _) => py_type(combined),
        (None, Some(single)) => py_type(&single.typ),
        (None, None) => "None".to_string(),
    }
}

/// Statement returning the decoded value(s) held in the list `result`.
fn return_statement(func: &FunctionSignature) -> String {
    match (&func.combined_return, func.returns.first()) {
        (Some(combined), _) => format!("        return {}\n", decode_expr(combined, "result")),
        (None, Some(single)) => format!("        return {}\n", decode_expr(&single.typ, "result[0]")),
        (None, None) => "        return None\n".to_string(),
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
        doc.push(format!(":param {}: instance of {}", py_param(&p.name), describe(&p.typ)));
    }
    for r in &func.returns {
        doc.push(format!(":returns {}: instance of {}", r.name, describe(&r.typ)));
    }
    if let Some(extra) = extra {
        doc.push(extra.to_string());
    }
    doc
}

fn auth_check(func: &FunctionSignature) -> String {
    if func.auth == AuthMode::Required {
        format!("        self._require_token({})\n", py_str(&func.qualified_name()))
    } else {
        String::new()
    }
}

fn generate_direct_call(func: &FunctionSignature, methods: &Methods) -> String {
    let mut code = format!(
        "\n    def {}(self{}) -> {}:\n",
        methods.call,
        param_list(func),
        return_annotation(func)
    );
    code.push_str(&docstring(&function_doc(func, None), "        "));
    code.push_str(&auth_check(func));
    code.push_str(&format!(
        "        result = self._call({}, [{}])\n",
        py_str(&func.qualified_name()),
        arg_list(func)
    ));
    code.push_str(&return_statement(func));
    code
}

fn generate_submit(func: &FunctionSignature, methods: &Methods) -> String {
    let mut code = format!(
        "\n    def {}(self{}) -> str:\n",
        methods.submit,
        param_list(func)
    );
    code.push_str(&format!(
        "        \"\"\"Submits {} as a job and returns its id.\"\"\"\n",
        func.qualified_name()
    ));
    code.push_str(&auth_check(func));
    code.push_str(&format!(
        "        return self._call({}, [{}])[0]\n",
        py_str(&format!("{}._{}_submit", func.module, func.name)),
        arg_list(func)
    ));
    code
}

fn generate_async_call(func: &FunctionSignature, methods: &Methods) -> String {
    let mut code = format!(
        "\n    def {}(self{}, cancel: Optional[threading.Event] = None) -> {}:\n",
        methods.call,
        param_list(func),
        return_annotation(func)
    );
    let doc = function_doc(
        func,
        Some(":param cancel: checked before every poll; setting it raises JobCancelled"),
    );
    code.push_str(&docstring(&doc, "        "));
    code.push_str(&format!(
        "        job_id = self.{}({})\n",
        methods.submit,
        arg_list(func)
    ));
    code.push_str("        result = self._wait_for_job(job_id, cancel)\n");
    code.push_str(&return_statement(func));
    code
}

fn generate_status(module: &ModuleSignatures) -> String {
    format!(
        r#"
    def {STATUS_FUNCTION}(self) -> Dict[str, Any]:
        """Reports service state, version and provenance."""
        return self._call("{}.{STATUS_FUNCTION}", [])[0]
"#,
        module.module
    )
}
