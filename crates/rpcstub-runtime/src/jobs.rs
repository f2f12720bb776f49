//! # Job Service
//!
//! Server side of the wire protocol. Handlers are registered per
//! `<module>.<function>` and served three ways:
//!
//! - `<module>.<function>`: run inline, answer with the result
//! - `<module>._<function>_submit`: run on a dedicated worker thread, answer with a job id
//! - `<module>._check_job`: report a job's [`JobState`]
//!
//! A finished state is handed out once: the poll that reports it also drops
//! the job. Finished jobs nobody polls are kept up to
//! [`JobServiceConfig::max_retained`], oldest dropped first.
//!
//! Handler errors and panics become error envelopes; they never take down
//! the hosting process or other jobs.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use serde_json::Value;
use tracing::{debug, warn};

use crate::protocol::{
    method_name, JobState, MethodKind, RpcError, RpcRequest, RpcResponse, INTERNAL_ERROR,
    INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, SERVER_ERROR, UNAUTHORIZED,
};

/// Per-call information handed to handlers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallContext {
    pub method: String,
    pub token: Option<String>,
    pub service_ver: Option<String>,
}

/// A registered remote function.
pub type Handler =
    Arc<dyn Fn(&CallContext, Vec<Value>) -> Result<Vec<Value>, RpcError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobServiceConfig {
    /// Jobs allowed to run at once; further submissions are rejected.
    pub max_jobs: usize,
    /// Finished jobs kept until polled.
    pub max_retained: usize,
}

impl Default for JobServiceConfig {
    fn default() -> Self {
        Self {
            max_jobs: 32,
            max_retained: 1024,
        }
    }
}

struct Registration {
    handler: Handler,
    requires_auth: bool,
}

#[derive(Default)]
struct JobTable {
    next_id: u64,
    running: usize,
    jobs: HashMap<String, JobState>,
    /// Finish order, for retention. May name jobs already polled.
    finished: VecDeque<String>,
}

pub struct JobService {
    handlers: HashMap<String, Registration>,
    table: Arc<Mutex<JobTable>>,
    config: JobServiceConfig,
}

impl JobService {
    pub fn new(config: JobServiceConfig) -> Self {
        Self {
            handlers: HashMap::new(),
            table: Arc::new(Mutex::new(JobTable::default())),
            config,
        }
    }

    /// Registers `handler` as `<module>.<function>`.
    pub fn register<F>(&mut self, module: &str, function: &str, requires_auth: bool, handler: F)
    where
        F: Fn(&CallContext, Vec<Value>) -> Result<Vec<Value>, RpcError> + Send + Sync + 'static,
    {
        self.handlers.insert(
            method_name(module, function),
            Registration {
                handler: Arc::new(handler),
                requires_auth,
            },
        );
    }

    /// Handles one request.
    pub fn dispatch(&self, request: RpcRequest, token: Option<&str>) -> RpcResponse {
        match self.try_dispatch(request, token) {
            Ok(result) => RpcResponse::success(result),
            Err(error) => RpcResponse::failure(error),
        }
    }

    /// Handles one raw request body; returns the transport status and response body.
    pub fn dispatch_json(&self, body: &str, token: Option<&str>) -> (u16, String) {
        let response = match serde_json::from_str::<RpcRequest>(body) {
            Ok(request) => self.dispatch(request, token),
            Err(e) => RpcResponse::failure(RpcError::new(PARSE_ERROR, e.to_string())),
        };
        let status = response.http_status();
        match serde_json::to_string(&response) {
            Ok(body) => (status, body),
            Err(e) => (
                500,
                format!(
                    r#"{{"version":"1.1","error":{{"name":"JSONRPCError","code":{},"message":{:?},"error":null}}}}"#,
                    INTERNAL_ERROR,
                    e.to_string()
                ),
            ),
        }
    }

    fn try_dispatch(&self, request: RpcRequest, token: Option<&str>) -> Result<Vec<Value>, RpcError> {
        let kind = MethodKind::parse(&request.method).ok_or_else(|| {
            RpcError::new(INVALID_REQUEST, format!("malformed method name '{}'", request.method))
        })?;

        let ctx = CallContext {
            method: request.method.clone(),
            token: token.map(str::to_string),
            service_ver: request.service_ver().map(str::to_string),
        };

        match kind {
            MethodKind::CheckJob { .. } => {
                let job_id = match request.params.as_slice() {
                    [Value::String(id)] => id.as_str(),
                    [other] => {
                        return Err(RpcError::new(INVALID_PARAMS, format!("malformed job id: {}", other)))
                    }
                    _ => return Err(RpcError::new(INVALID_PARAMS, "_check_job takes one job id")),
                };
                let state = self.check_job(job_id)?;
                let value = serde_json::to_value(state)
                    .map_err(|e| RpcError::new(INTERNAL_ERROR, e.to_string()))?;
                Ok(vec![value])
            }
            MethodKind::Submit { module, function } => {
                let name = method_name(module, function);
                let handler = self.authorize(&name, token)?;
                let job_id = self.submit(&name, handler, ctx, request.params)?;
                Ok(vec![Value::String(job_id)])
            }
            MethodKind::Direct { module, function } => {
                let name = method_name(module, function);
                let handler = self.authorize(&name, token)?;
                run_handler(&handler, &ctx, request.params)
            }
        }
    }

    fn authorize(&self, name: &str, token: Option<&str>) -> Result<Handler, RpcError> {
        let registration = self
            .handlers
            .get(name)
            .ok_or_else(|| RpcError::new(METHOD_NOT_FOUND, format!("method not found: {}", name)))?;
        if registration.requires_auth && token.map_or(true, str::is_empty) {
            return Err(RpcError::new(UNAUTHORIZED, format!("{} requires authentication", name)));
        }
        Ok(Arc::clone(&registration.handler))
    }

    fn submit(
        &self,
        name: &str,
        handler: Handler,
        ctx: CallContext,
        params: Vec<Value>,
    ) -> Result<String, RpcError> {
        // Id allocation and registration happen under one lock, so concurrent
        // submitters can never be handed the same id.
        let job_id = {
            let mut table = lock(&self.table);
            if table.running >= self.config.max_jobs {
                return Err(RpcError::new(
                    SERVER_ERROR,
                    format!("concurrent job limit of {} reached", self.config.max_jobs),
                ));
            }
            table.next_id += 1;
            let job_id = table.next_id.to_string();
            table.jobs.insert(job_id.clone(), JobState::pending());
            table.running += 1;
            job_id
        };

        let table = Arc::clone(&self.table);
        let retained = self.config.max_retained;
        let worker_id = job_id.clone();
        let spawned = thread::Builder::new()
            .name(format!("rpcstub-job-{}", job_id))
            .spawn(move || {
                let state = match run_handler(&handler, &ctx, params) {
                    Ok(result) => JobState::completed(result),
                    Err(error) => JobState::failed(error),
                };
                debug!(job_id = %worker_id, failed = state.error.is_some(), "job finished");
                finish(&table, &worker_id, state, retained);
            });

        if let Err(e) = spawned {
            let error = RpcError::new(SERVER_ERROR, format!("failed to start job: {}", e));
            finish(&self.table, &job_id, JobState::failed(error.clone()), self.config.max_retained);
            return Err(error);
        }

        debug!(job_id = %job_id, method = name, "job submitted");
        Ok(job_id)
    }

    /// Current state of a submitted job. A finished job is dropped once its
    /// state has been returned, so later polls report an unknown id.
    pub fn check_job(&self, job_id: &str) -> Result<JobState, RpcError> {
        if job_id.is_empty() || !job_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(RpcError::new(INVALID_PARAMS, format!("malformed job id: '{}'", job_id)));
        }
        let mut table = lock(&self.table);
        let state = table
            .jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| RpcError::new(INVALID_PARAMS, format!("unknown job id: {}", job_id)))?;
        if state.is_finished() {
            table.jobs.remove(job_id);
            debug!(job_id, "finished job delivered");
        }
        Ok(state)
    }

    /// Jobs submitted but not yet finished.
    pub fn running_jobs(&self) -> usize {
        lock(&self.table).running
    }

    /// Jobs the service still holds, running or finished but not yet polled.
    pub fn tracked_jobs(&self) -> usize {
        lock(&self.table).jobs.len()
    }
}

impl Default for JobService {
    fn default() -> Self {
        Self::new(JobServiceConfig::default())
    }
}

fn lock(table: &Mutex<JobTable>) -> MutexGuard<'_, JobTable> {
    // Worker panics are caught before they reach the lock, so a poisoned
    // table still holds consistent data.
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn finish(table: &Mutex<JobTable>, job_id: &str, state: JobState, retained: usize) {
    let mut table = lock(table);
    table.jobs.insert(job_id.to_string(), state);
    table.running = table.running.saturating_sub(1);
    table.finished.push_back(job_id.to_string());
    while table.finished.len() > retained {
        if let Some(expired) = table.finished.pop_front() {
            if table.jobs.remove(&expired).is_some() {
                debug!(job_id = %expired, "unclaimed job dropped");
            }
        }
    }
}

fn run_handler(handler: &Handler, ctx: &CallContext, params: Vec<Value>) -> Result<Vec<Value>, RpcError> {
    match panic::catch_unwind(AssertUnwindSafe(|| handler(ctx, params))) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(method = %ctx.method, %message, "handler panicked");
            Err(RpcError::new(SERVER_ERROR, message).with_trace(format!("panic in {}", ctx.method)))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
