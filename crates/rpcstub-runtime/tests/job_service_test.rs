use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::{json, Value};

use rpcstub_runtime::client::{Client, PollConfig};
use rpcstub_runtime::jobs::JobService;
use rpcstub_runtime::protocol::{RpcResponse, INVALID_PARAMS, METHOD_NOT_FOUND};

fn calc_service() -> Arc<JobService> {
    let mut service = JobService::default();
    service.register("Calc", "add", false, |_, params| {
        let sum: i64 = params.iter().filter_map(Value::as_i64).sum();
        Ok(vec![json!(sum)])
    });
    service.register("Calc", "describe", false, |_, params| {
        let label = params.first().and_then(Value::as_str).unwrap_or_default().to_string();
        Ok(vec![json!(label.clone()), json!(label.len())])
    });
    Arc::new(service)
}

fn fast_poll() -> PollConfig {
    PollConfig {
        initial_wait: Duration::from_millis(1),
        scale_percent: 200,
        max_wait: Duration::from_millis(20),
    }
}

#[test]
fn wire_level_direct_call() {
    let service = calc_service();
    let (status, body) = service.dispatch_json(
        r#"{"version":"1.1","method":"Calc.add","params":[1,2]}"#,
        None,
    );
    assert_eq!(status, 200);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body, json!({"version": "1.1", "result": [3]}));
}

#[test]
fn wire_level_errors_use_the_envelope() {
    let service = calc_service();

    let (status, body) = service.dispatch_json(
        r#"{"version":"1.1","method":"Calc.missing","params":[]}"#,
        None,
    );
    assert_eq!(status, 500);
    let response: RpcResponse = serde_json::from_str(&body).unwrap();
    let error = response.into_result().unwrap_err();
    assert_eq!(error.name, "JSONRPCError");
    assert_eq!(error.code, METHOD_NOT_FOUND);

    let (_, body) = service.dispatch_json(
        r#"{"version":"1.1","method":"Calc._check_job","params":["x1"]}"#,
        None,
    );
    let response: RpcResponse = serde_json::from_str(&body).unwrap();
    assert_eq!(response.into_result().unwrap_err().code, INVALID_PARAMS);
}

#[test]
fn submit_poll_round_trip_returns_every_value() {
    let client = Client::new(calc_service(), "Calc").with_poll(fast_poll());
    let values = client.call_async("describe", vec![json!("pair")], None).unwrap();
    assert_eq!(values, vec![json!("pair"), json!(4)]);
}

#[test]
fn concurrent_async_clients_each_get_their_own_result() {
    let service = calc_service();
    let workers: Vec<_> = (0..16i64)
        .map(|i| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                let client = Client::new(service, "Calc").with_poll(fast_poll());
                let result = client.call_async("add", vec![json!(i), json!(100)], None).unwrap();
                (i, result)
            })
        })
        .collect();

    for worker in workers {
        let (i, result) = worker.join().unwrap();
        assert_eq!(result, vec![json!(i + 100)]);
    }
    assert_eq!(service.running_jobs(), 0);
    assert_eq!(service.tracked_jobs(), 0);
}

#[test]
fn delivered_job_cannot_be_polled_again() {
    let service = calc_service();
    let client = Client::new(Arc::clone(&service), "Calc").with_poll(fast_poll());
    assert_eq!(client.call_async("add", vec![json!(1), json!(1)], None).unwrap(), vec![json!(2)]);

    let (_, body) = service.dispatch_json(
        r#"{"version":"1.1","method":"Calc._check_job","params":["1"]}"#,
        None,
    );
    let error = serde_json::from_str::<RpcResponse>(&body).unwrap().into_result().unwrap_err();
    assert_eq!(error.code, INVALID_PARAMS);
    assert!(error.message.contains("unknown job id"));
}
