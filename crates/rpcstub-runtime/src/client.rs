//! Reference client for the direct and submit/poll calling conventions.
//!
//! Polling waits start at [`PollConfig::initial_wait`], grow by
//! `scale_percent` after each unfinished poll and never exceed
//! [`PollConfig::max_wait`]. The cancel token is checked before every sleep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::jobs::JobService;
use crate::protocol::{
    check_job_method_name, method_name, submit_method_name, JobState, RpcRequest, RpcResponse,
};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub initial_wait: Duration,
    /// Growth per unfinished poll, in percent. Values below 100 are treated as 100.
    pub scale_percent: u32,
    pub max_wait: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_wait: Duration::from_millis(100),
            scale_percent: 150,
            max_wait: Duration::from_secs(300),
        }
    }
}

/// Wait schedule between job polls.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    scale_percent: u32,
    max_wait: Duration,
}

impl Backoff {
    pub fn new(config: PollConfig) -> Self {
        Self {
            current: config.initial_wait.min(config.max_wait),
            scale_percent: config.scale_percent.max(100),
            max_wait: config.max_wait,
        }
    }

    /// Returns the wait to use now and advances the schedule.
    ///
    /// Scaling rounds up to the next nanosecond, so any scale above 100 %
    /// grows even the shortest wait.
    pub fn next_wait(&mut self) -> Duration {
        let wait = self.current;
        let nanos = (wait.as_nanos() * u128::from(self.scale_percent)).div_ceil(100);
        let scaled = Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX));
        self.current = scaled.min(self.max_wait);
        wait
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_wait())
    }
}

/// Shared flag that stops a waiting client.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Moves one request to a service and brings back its response.
pub trait Transport {
    fn send(&self, request: &RpcRequest, token: Option<&str>) -> Result<RpcResponse>;
}

impl Transport for JobService {
    fn send(&self, request: &RpcRequest, token: Option<&str>) -> Result<RpcResponse> {
        Ok(self.dispatch(request.clone(), token))
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: &RpcRequest, token: Option<&str>) -> Result<RpcResponse> {
        (**self).send(request, token)
    }
}

/// Client bound to one service module.
pub struct Client<T> {
    transport: T,
    module: String,
    token: Option<String>,
    service_ver: Option<String>,
    poll: PollConfig,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T, module: impl Into<String>) -> Self {
        Self {
            transport,
            module: module.into(),
            token: None,
            service_ver: None,
            poll: PollConfig::default(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Pins every request to a service version.
    pub fn with_service_ver(mut self, service_ver: impl Into<String>) -> Self {
        self.service_ver = Some(service_ver.into());
        self
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    fn send(&self, method: String, params: Vec<Value>) -> Result<Vec<Value>> {
        let request = RpcRequest::new(method, params).with_service_ver(self.service_ver.clone());
        self.transport
            .send(&request, self.token.as_deref())?
            .into_result()
            .map_err(Error::Server)
    }

    /// Calls `<module>.<function>` and waits for its result inline.
    pub fn call_direct(&self, function: &str, params: Vec<Value>) -> Result<Vec<Value>> {
        self.send(method_name(&self.module, function), params)
    }

    /// Starts `<module>.<function>` as a job and returns its id.
    pub fn submit(&self, function: &str, params: Vec<Value>) -> Result<String> {
        let result = self.send(submit_method_name(&self.module, function), params)?;
        match result.as_slice() {
            [Value::String(job_id)] => Ok(job_id.clone()),
            other => Err(Error::Protocol(format!("expected a job id, got {:?}", other))),
        }
    }

    pub fn check_job(&self, job_id: &str) -> Result<JobState> {
        let result = self.send(
            check_job_method_name(&self.module),
            vec![Value::String(job_id.to_string())],
        )?;
        match result.into_iter().next() {
            Some(state) => Ok(serde_json::from_value(state)?),
            None => Err(Error::Protocol("empty _check_job result".to_string())),
        }
    }

    /// Submits a job and polls until it finishes or `cancel` is set.
    pub fn call_async(
        &self,
        function: &str,
        params: Vec<Value>,
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<Value>> {
        let job_id = self.submit(function, params)?;
        let mut backoff = Backoff::new(self.poll);

        loop {
            if cancel.map_or(false, CancelToken::is_cancelled) {
                debug!(job_id = %job_id, "wait cancelled");
                return Err(Error::Cancelled { job_id });
            }
            thread::sleep(backoff.next_wait());

            let state = self.check_job(&job_id)?;
            if !state.is_finished() {
                continue;
            }
            if let Some(error) = state.error {
                return Err(Error::Server(error));
            }
            return state
                .result
                .ok_or_else(|| Error::Protocol(format!("job {} finished without a result", job_id)));
        }
    }

    /// [`Client::call_direct`] for a function declaring `arity` return values.
    pub fn call_direct_returning(&self, function: &str, params: Vec<Value>, arity: usize) -> Result<Vec<Value>> {
        into_return(self.call_direct(function, params)?, arity)
    }

    /// [`Client::call_async`] for a function declaring `arity` return values.
    pub fn call_async_returning(
        &self,
        function: &str,
        params: Vec<Value>,
        arity: usize,
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<Value>> {
        into_return(self.call_async(function, params, cancel)?, arity)
    }
}

/// Checks that a service answered with exactly `arity` values.
pub fn into_return(values: Vec<Value>, arity: usize) -> Result<Vec<Value>> {
    if values.len() != arity {
        return Err(Error::Protocol(format!(
            "expected {} return values, got {}",
            arity,
            values.len()
        )));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::CallContext;
    use crate::protocol::{RpcError, INVALID_PARAMS};
    use serde_json::json;
    use std::sync::mpsc;
    use std::sync::Mutex;

    fn fast_poll() -> PollConfig {
        PollConfig {
            initial_wait: Duration::from_millis(1),
            scale_percent: 150,
            max_wait: Duration::from_millis(10),
        }
    }

    fn calc_service() -> Arc<JobService> {
        let mut service = JobService::default();
        service.register("Calc", "add", false, |_: &CallContext, params: Vec<Value>| {
            let sum: i64 = params.iter().filter_map(Value::as_i64).sum();
            Ok(vec![json!(sum)])
        });
        service.register("Calc", "fail", false, |_, _| {
            Err(RpcError::new(INVALID_PARAMS, "bad input"))
        });
        service.register("Calc", "version", false, |ctx, _| {
            Ok(vec![json!(ctx.service_ver.clone())])
        });
        service.register("Calc", "whoami", true, |ctx, _| Ok(vec![json!(ctx.token.clone())]));
        Arc::new(service)
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let waits: Vec<Duration> = Backoff::new(PollConfig {
            initial_wait: Duration::from_millis(100),
            scale_percent: 200,
            max_wait: Duration::from_millis(500),
        })
        .take(5)
        .collect();

        let expected: Vec<Duration> = [100, 200, 400, 500, 500]
            .into_iter()
            .map(Duration::from_millis)
            .collect();
        assert_eq!(waits, expected);
    }

    #[test]
    fn test_backoff_is_non_decreasing() {
        let waits: Vec<Duration> = Backoff::new(PollConfig::default()).take(30).collect();
        assert!(waits.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(waits.last(), Some(&Duration::from_secs(300)));

        let flat: Vec<Duration> = Backoff::new(PollConfig {
            scale_percent: 50,
            ..PollConfig::default()
        })
        .take(3)
        .collect();
        assert_eq!(flat, vec![Duration::from_millis(100); 3]);
    }

    #[test]
    fn test_backoff_grows_below_a_microsecond() {
        let waits: Vec<Duration> = Backoff::new(PollConfig {
            initial_wait: Duration::from_nanos(1),
            scale_percent: 150,
            max_wait: Duration::from_nanos(10),
        })
        .take(7)
        .collect();

        let expected: Vec<Duration> = [1, 2, 3, 5, 8, 10, 10]
            .into_iter()
            .map(Duration::from_nanos)
            .collect();
        assert_eq!(waits, expected);
    }

    #[test]
    fn test_direct_and_async_calls() {
        let client = Client::new(calc_service(), "Calc").with_poll(fast_poll());
        assert_eq!(client.call_direct("add", vec![json!(1), json!(2)]).unwrap(), vec![json!(3)]);
        assert_eq!(
            client.call_async("add", vec![json!(1), json!(2)], None).unwrap(),
            vec![json!(3)]
        );
    }

    #[test]
    fn test_async_failure_surfaces_server_error() {
        let client = Client::new(calc_service(), "Calc").with_poll(fast_poll());
        match client.call_async("fail", vec![], None) {
            Err(Error::Server(error)) => assert_eq!(error.message, "bad input"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_cancel_stops_waiting() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        let mut service = JobService::default();
        service.register("Calc", "slow", false, move |_, _| {
            let _ = release_rx.lock().unwrap().recv();
            Ok(vec![])
        });

        let client = Client::new(Arc::new(service), "Calc").with_poll(fast_poll());
        let cancel = CancelToken::new();
        cancel.cancel();
        match client.call_async("slow", vec![], Some(&cancel)) {
            Err(Error::Cancelled { job_id }) => assert_eq!(job_id, "1"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        release_tx.send(()).unwrap();
    }

    #[test]
    fn test_service_ver_reaches_handler() {
        let client = Client::new(calc_service(), "Calc").with_service_ver("release");
        assert_eq!(client.call_direct("version", vec![]).unwrap(), vec![json!("release")]);
    }

    #[test]
    fn test_token_is_forwarded() {
        let anonymous = Client::new(calc_service(), "Calc");
        assert!(matches!(anonymous.call_direct("whoami", vec![]), Err(Error::Server(_))));

        let client = Client::new(calc_service(), "Calc").with_token("secret");
        assert_eq!(client.call_direct("whoami", vec![]).unwrap(), vec![json!("secret")]);
    }

    #[test]
    fn test_into_return_checks_arity() {
        assert!(into_return(vec![json!(1), json!(2)], 2).is_ok());
        assert!(matches!(into_return(vec![json!(1)], 2), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_returning_calls_check_arity() {
        let client = Client::new(calc_service(), "Calc").with_poll(fast_poll());
        assert_eq!(
            client.call_direct_returning("add", vec![json!(1), json!(2)], 1).unwrap(),
            vec![json!(3)]
        );
        assert_eq!(
            client.call_async_returning("add", vec![json!(2), json!(2)], 1, None).unwrap(),
            vec![json!(4)]
        );
        match client.call_async_returning("add", vec![json!(1), json!(2)], 2, None) {
            Err(Error::Protocol(message)) => assert!(message.contains("expected 2 return values")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
