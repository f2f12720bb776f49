//! JSON-RPC 1.1 envelopes spoken by generated clients and servers.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: &str = "1.1";

/// Name carried by every error envelope.
pub const ERROR_NAME: &str = "JSONRPCError";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
pub const SERVER_ERROR: i64 = -32500;
pub const UNAUTHORIZED: i64 = -32400;

/// `{"version":"1.1","method":...,"params":[...],"context"?:{...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub version: String,
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<RpcContext>,
}

impl RpcRequest {
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            method: method.into(),
            params,
            context: None,
        }
    }

    /// Pins the request to a service version (release channel or commit).
    pub fn with_service_ver(mut self, service_ver: Option<String>) -> Self {
        self.context = service_ver.map(|v| RpcContext {
            service_ver: Some(v),
        });
        self
    }

    pub fn service_ver(&self) -> Option<&str> {
        self.context.as_ref().and_then(|c| c.service_ver.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_ver: Option<String>,
}

/// A response envelope: either `result` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcResponse {
    Success { version: String, result: Vec<Value> },
    Failure { version: String, error: RpcError },
}

impl RpcResponse {
    pub fn success(result: Vec<Value>) -> Self {
        RpcResponse::Success {
            version: PROTOCOL_VERSION.to_string(),
            result,
        }
    }

    pub fn failure(error: RpcError) -> Self {
        RpcResponse::Failure {
            version: PROTOCOL_VERSION.to_string(),
            error,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RpcResponse::Success { .. })
    }

    /// Transport status that accompanies the envelope.
    pub fn http_status(&self) -> u16 {
        if self.is_success() {
            200
        } else {
            500
        }
    }

    pub fn into_result(self) -> Result<Vec<Value>, RpcError> {
        match self {
            RpcResponse::Success { result, .. } => Ok(result),
            RpcResponse::Failure { error, .. } => Err(error),
        }
    }
}

/// `{"name":"JSONRPCError","code":...,"message":...,"error":...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub name: String,
    pub code: i64,
    pub message: String,
    /// Stack or trace text, if any.
    #[serde(default)]
    pub error: Option<String>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            name: ERROR_NAME.to_string(),
            code,
            message: message.into(),
            error: None,
        }
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.error = Some(trace.into());
        self
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}. {}", self.name, self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

/// Outcome record returned by `_check_job`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    /// 0 while running, 1 once finished.
    pub finished: u8,
    #[serde(default)]
    pub result: Option<Vec<Value>>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

impl JobState {
    pub fn pending() -> Self {
        Self {
            finished: 0,
            result: None,
            error: None,
        }
    }

    pub fn completed(result: Vec<Value>) -> Self {
        Self {
            finished: 1,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(error: RpcError) -> Self {
        Self {
            finished: 1,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished != 0
    }
}

/// `<module>.<function>`
pub fn method_name(module: &str, function: &str) -> String {
    format!("{}.{}", module, function)
}

/// `<module>._<function>_submit`
pub fn submit_method_name(module: &str, function: &str) -> String {
    format!("{}._{}_submit", module, function)
}

/// `<module>._check_job`
pub fn check_job_method_name(module: &str) -> String {
    format!("{}._check_job", module)
}

/// What a method name asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind<'a> {
    Direct { module: &'a str, function: &'a str },
    Submit { module: &'a str, function: &'a str },
    CheckJob { module: &'a str },
}

impl<'a> MethodKind<'a> {
    pub fn parse(method: &'a str) -> Option<Self> {
        let (module, function) = method.split_once('.')?;
        if module.is_empty() || function.is_empty() {
            return None;
        }
        if function == "_check_job" {
            return Some(MethodKind::CheckJob { module });
        }
        if let Some(inner) = function
            .strip_prefix('_')
            .and_then(|f| f.strip_suffix("_submit"))
            .filter(|f| !f.is_empty())
        {
            return Some(MethodKind::Submit {
                module,
                function: inner,
            });
        }
        Some(MethodKind::Direct { module, function })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let request = RpcRequest::new("Calc.add", vec![json!(1), json!(2)]);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"version": "1.1", "method": "Calc.add", "params": [1, 2]})
        );

        let pinned = request.with_service_ver(Some("beta".to_string()));
        assert_eq!(pinned.service_ver(), Some("beta"));
        assert_eq!(
            serde_json::to_value(&pinned).unwrap()["context"],
            json!({"service_ver": "beta"})
        );
    }

    #[test]
    fn test_response_envelopes() {
        let ok: RpcResponse = serde_json::from_value(json!({"version": "1.1", "result": [3]})).unwrap();
        assert_eq!(ok.clone().into_result().unwrap(), vec![json!(3)]);
        assert_eq!(ok.http_status(), 200);

        let failed: RpcResponse = serde_json::from_value(json!({
            "version": "1.1",
            "error": {"name": "JSONRPCError", "code": -32601, "message": "nope", "error": null}
        }))
        .unwrap();
        assert_eq!(failed.http_status(), 500);
        assert_eq!(failed.into_result().unwrap_err().code, METHOD_NOT_FOUND);
    }

    #[test]
    fn test_job_state_wire_shape() {
        assert_eq!(
            serde_json::to_value(JobState::completed(vec![json!(3)])).unwrap(),
            json!({"finished": 1, "result": [3], "error": null})
        );
        assert!(!JobState::pending().is_finished());
    }

    #[test]
    fn test_method_kinds() {
        assert_eq!(
            MethodKind::parse("Calc.add"),
            Some(MethodKind::Direct { module: "Calc", function: "add" })
        );
        assert_eq!(
            MethodKind::parse(&submit_method_name("Calc", "add")),
            Some(MethodKind::Submit { module: "Calc", function: "add" })
        );
        assert_eq!(
            MethodKind::parse(&check_job_method_name("Calc")),
            Some(MethodKind::CheckJob { module: "Calc" })
        );
        assert_eq!(MethodKind::parse("nomodule"), None);
        assert_eq!(
            MethodKind::parse("Calc._submit"),
            Some(MethodKind::Direct { module: "Calc", function: "_submit" })
        );
    }
}
