//! `<module>_server.py`: JSON-RPC dispatcher in front of the implementation.
//!
//! Every function is served both directly and through the submit/poll pair,
//! whatever convention the clients were generated with.

use super::{decoder_or_identity, py_ident, py_str, TYPES_MODULE};
use crate::naming::to_snake_case;
use crate::signature::{FunctionSignature, ModuleSignatures, STATUS_FUNCTION};

const PRELUDE: &str = r#"import json
import os
import threading
import traceback
from collections import deque
from http.server import BaseHTTPRequestHandler, ThreadingHTTPServer
from typing import Any, Callable, Dict, List, Optional, Tuple
"#;

const RUNTIME: &str = r#"
DEFAULT_MAX_JOBS = 32
DEFAULT_MAX_RETAINED = 1024

PARSE_ERROR = -32700
INVALID_REQUEST = -32600
METHOD_NOT_FOUND = -32601
INVALID_PARAMS = -32602
INTERNAL_ERROR = -32603
SERVER_ERROR = -32500
UNAUTHORIZED = -32400


class JSONRPCError(Exception):
    def __init__(self, code: int, message: str, data: Optional[str] = None):
        super().__init__(message)
        self.code = code
        self.message = message
        self.data = data

    def envelope(self) -> Dict[str, Any]:
        return {
            "name": "JSONRPCError",
            "code": self.code,
            "message": self.message,
            "error": self.data,
        }


def _failure(error: JSONRPCError) -> Tuple[int, Dict[str, Any]]:
    return 500, {"version": "1.1", "error": error.envelope()}


def _success(result: List[Any]) -> Tuple[int, Dict[str, Any]]:
    return 200, {"version": "1.1", "result": result}


class JobRegistry:
    """Runs submitted jobs on their own threads and keeps their outcome.

    A finished outcome is handed out once; unpolled outcomes are capped at
    max_retained, oldest dropped first.
    """

    def __init__(self, max_jobs: int = DEFAULT_MAX_JOBS, max_retained: int = DEFAULT_MAX_RETAINED):
        self._lock = threading.Lock()
        self._next_id = 0
        self._running = 0
        self._max_jobs = max_jobs
        self._max_retained = max_retained
        self._jobs: Dict[str, Dict[str, Any]] = {}
        self._finished: deque = deque()

    def submit(self, run: Callable[[], List[Any]]) -> str:
        # Id allocation and registration happen under one lock.
        with self._lock:
            if self._running >= self._max_jobs:
                raise JSONRPCError(
                    SERVER_ERROR, "concurrent job limit of {} reached".format(self._max_jobs)
                )
            self._next_id += 1
            job_id = str(self._next_id)
            self._jobs[job_id] = {"finished": 0, "result": None, "error": None}
            self._running += 1
        threading.Thread(target=self._run, args=(job_id, run), daemon=True).start()
        return job_id

    def _run(self, job_id: str, run: Callable[[], List[Any]]) -> None:
        result, error = None, None
        try:
            result = run()
        except JSONRPCError as e:
            error = e.envelope()
        except Exception as e:
            error = JSONRPCError(SERVER_ERROR, str(e), traceback.format_exc()).envelope()
        with self._lock:
            self._jobs[job_id] = {"finished": 1, "result": result, "error": error}
            self._running -= 1
            self._finished.append(job_id)
            while len(self._finished) > self._max_retained:
                self._jobs.pop(self._finished.popleft(), None)

    def check(self, job_id: Any) -> Dict[str, Any]:
        if not isinstance(job_id, str) or not job_id.isdigit():
            raise JSONRPCError(INVALID_PARAMS, "malformed job id: {!r}".format(job_id))
        with self._lock:
            state = self._jobs.get(job_id)
            if state is None:
                raise JSONRPCError(INVALID_PARAMS, "unknown job id: {}".format(job_id))
            if state["finished"]:
                del self._jobs[job_id]
            return dict(state)

    def __len__(self) -> int:
        with self._lock:
            return len(self._jobs)
"#;

const DISPATCH: &str = r#"
    def dispatch(self, request: Any, token: Optional[str] = None) -> Tuple[int, Dict[str, Any]]:
        """Handles one decoded request; returns the HTTP status and response body."""
        try:
            if not isinstance(request, dict) or not isinstance(request.get("method"), str):
                raise JSONRPCError(INVALID_REQUEST, "request must be an object with a method")
            method = request["method"]
            params = request.get("params", [])
            if not isinstance(params, list):
                raise JSONRPCError(INVALID_PARAMS, "params must be a list")
            ctx = {"token": token, "method": method, "rpc_context": request.get("context") or {}}

            if method == self.CHECK_JOB:
                if len(params) != 1:
                    raise JSONRPCError(INVALID_PARAMS, "{} takes one job id".format(method))
                return _success([self._jobs.check(params[0])])

            submit = False
            name = method
            module, _, function = method.partition(".")
            if function.startswith("_") and function.endswith("_submit"):
                submit = True
                name = "{}.{}".format(module, function[1:-len("_submit")])

            entry = self._methods.get(name)
            if entry is None:
                raise JSONRPCError(METHOD_NOT_FOUND, "method not found: {}".format(method))
            call, decoders, auth = entry
            if auth == "required" and not token:
                raise JSONRPCError(UNAUTHORIZED, "{} requires authentication".format(name))
            if len(params) != len(decoders):
                raise JSONRPCError(
                    INVALID_PARAMS,
                    "{} takes {} parameters, got {}".format(name, len(decoders), len(params)),
                )
            args = [decode(p) for decode, p in zip(decoders, params)]

            def run() -> List[Any]:
                return [encode(v) for v in call(ctx, *args)]

            if submit:
                return _success([self._jobs.submit(run)])
            return _success(run())
        except JSONRPCError as e:
            return _failure(e)
        except Exception as e:
            return _failure(JSONRPCError(SERVER_ERROR, str(e), traceback.format_exc()))
"#;

const HTTP: &str = r#"

class _Handler(BaseHTTPRequestHandler):
    dispatcher: Optional[Dispatcher] = None

    def do_POST(self) -> None:
        length = int(self.headers.get("Content-Length", 0))
        body = self.rfile.read(length)
        try:
            request = json.loads(body.decode("utf-8"))
        except ValueError:
            status, response = _failure(JSONRPCError(PARSE_ERROR, "request body is not JSON"))
        else:
            status, response = self.dispatcher.dispatch(request, self.headers.get("Authorization"))
        data = json.dumps(response).encode("utf-8")
        self.send_response(status)
        self.send_header("Content-Type", "application/json")
        self.send_header("Content-Length", str(len(data)))
        self.end_headers()
        self.wfile.write(data)
"#;

/// Renders the server module for one IDL module.
pub fn generate_server(module: &ModuleSignatures) -> String {
    let name = &module.module;
    let impl_module = format!("{}_impl", to_snake_case(name));

    let mut code = String::new();
    code.push_str("# Generated by rpcstub. Do not edit.\n");
    code.push_str(PRELUDE);
    code.push_str(&format!("\nfrom {} import {}\n", impl_module, name));
    code.push_str(&format!("from {} import *  # noqa: F401,F403\n", TYPES_MODULE));
    code.push_str(RUNTIME);

    code.push_str(&format!(
        "\n\nclass Dispatcher:\n    \"\"\"Routes {name} requests to an implementation instance.\"\"\"\n\n    CHECK_JOB = {}\n\n",
        py_str(&format!("{}._check_job", name))
    ));
    code.push_str(&format!(
        "    def __init__(self, impl: {name}, max_jobs: int = DEFAULT_MAX_JOBS):\n        self._jobs = JobRegistry(max_jobs)\n        self._methods = {{\n"
    ));
    for func in &module.functions {
        code.push_str(&method_entry(func));
    }
    if module.needs_default_status() {
        code.push_str(&format!(
            "            {}: (impl.{}, [], \"none\"),\n",
            py_str(&format!("{}.{}", name, STATUS_FUNCTION)),
            STATUS_FUNCTION
        ));
    }
    code.push_str("        }\n");
    code.push_str(DISPATCH);
    code.push_str(HTTP);

    code.push_str(&format!(
        r#"

def serve(host: str = "0.0.0.0", port: int = 5000, config: Optional[Dict[str, Any]] = None) -> None:
    handler = type("Handler", (_Handler,), {{"dispatcher": Dispatcher({name}(config))}})
    ThreadingHTTPServer((host, port), handler).serve_forever()


if __name__ == "__main__":
    serve(port=int(os.environ.get("PORT", "5000")))
"#
    ));

    code
}

fn method_entry(func: &FunctionSignature) -> String {
    let decoders: Vec<String> = func.params.iter().map(|p| decoder_or_identity(&p.typ)).collect();
    format!(
        "            {}: (impl.{}, [{}], {}),\n",
        py_str(&func.qualified_name()),
        py_ident(&func.name),
        decoders.join(", "),
        py_str(func.auth.as_str())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{AuthMode, ScalarKind};
    use crate::resolve::{ResolvedShape, ResolvedType, TypeId};
    use crate::signature::NamedValue;

    fn module() -> ModuleSignatures {
        let value = |name: &str, shape: ResolvedShape| NamedValue {
            typ: ResolvedType {
                module: "Genomes".to_string(),
                alias_chain: Vec::new(),
                shape,
            },
            original_name: Some(name.to_string()),
            name: name.to_string(),
        };
        ModuleSignatures {
            module: "Genomes".to_string(),
            comment: String::new(),
            functions: vec![FunctionSignature {
                module: "Genomes".to_string(),
                name: "save".to_string(),
                comment: String::new(),
                params: vec![
                    value("genome", ResolvedShape::Struct(TypeId::new("Genomes", "Genome"))),
                    value("overwrite", ResolvedShape::Scalar(ScalarKind::Int)),
                ],
                returns: Vec::new(),
                auth: AuthMode::Required,
                combined_return: None,
            }],
            has_custom_status: false,
        }
    }

    #[test]
    fn test_dispatcher_table() {
        let code = generate_server(&module());
        assert!(code.contains("from genomes_impl import Genomes\n"));
        assert!(code.contains("    CHECK_JOB = \"Genomes._check_job\"\n"));
        assert!(code.contains(
            "            \"Genomes.save\": (impl.save, [Genome.from_json, identity], \"required\"),\n"
        ));
        assert!(code.contains("            \"Genomes.status\": (impl.status, [], \"none\"),\n"));
    }

    #[test]
    fn test_job_ids_allocated_under_lock() {
        let code = generate_server(&module());
        let lock = code.find("        with self._lock:\n            if self._running").unwrap();
        let increment = code.find("self._next_id += 1").unwrap();
        let register = code.find("self._jobs[job_id] = {\"finished\": 0").unwrap();
        let spawn = code.find("threading.Thread(target=self._run").unwrap();
        assert!(lock < increment && increment < register && register < spawn);
    }

    #[test]
    fn test_finished_jobs_are_evicted() {
        let code = generate_server(&module());
        let check = code.find("    def check(self, job_id: Any)").unwrap();
        let evict = code.find("            if state[\"finished\"]:\n                del self._jobs[job_id]\n").unwrap();
        assert!(check < evict);
        assert!(code.contains("            while len(self._finished) > self._max_retained:\n                self._jobs.pop(self._finished.popleft(), None)\n"));
    }
}
