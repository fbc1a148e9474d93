//! The HTTP binding in front of a running AppService.
//!
//! Requests go through the real parser and router, and the commands land
//! on the service's session exactly as the socket adapter would deliver
//! them.

use pulseox::app::commands::ControlCommand;
use pulseox::fsm::StateId;
use pulseox::http::{Parse, Response, dispatch, parse_request, write_response};
use serde_json::Value;

use crate::mock_hw::Rig;

fn call(rig: &mut Rig, raw: &[u8]) -> Response {
    let Ok(Parse::Complete(req)) = parse_request(raw) else {
        panic!("request did not parse: {:?}", String::from_utf8_lossy(raw));
    };
    dispatch(&req, &mut |cmd: ControlCommand| rig.app.handle_command(cmd))
}

fn json(resp: &Response) -> Value {
    serde_json::from_str(&resp.body).expect("JSON body")
}

fn start(name: &str) -> Vec<u8> {
    let body = format!(r#"{{"name":"{name}"}}"#);
    format!(
        "POST /start HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    )
    .into_bytes()
}

const STATUS: &[u8] = b"GET /status HTTP/1.1\r\nHost: oximeter\r\n\r\n";
const STOP: &[u8] = b"POST /stop HTTP/1.1\r\nContent-Length: 0\r\n\r\n";

#[test]
fn idle_status_payload() {
    let mut rig = Rig::started();
    let resp = call(&mut rig, STATUS);
    assert_eq!(resp.status_line, "200 OK");

    let v = json(&resp);
    assert_eq!(v["heartRate"], 0);
    assert_eq!(v["spo2"], 0);
    assert_eq!(v["hrValid"], 0);
    assert_eq!(v["spo2Valid"], 0);
    assert_eq!(v["totalSamples"], 5);
    assert_eq!(v["running"], false);
    assert_eq!(v["status"], "idle");
    assert_eq!(v["phase"], "Idle");
    assert_eq!(v["name"], Value::Null);
    assert_eq!(v["sensorFault"], false);
}

#[test]
fn start_is_acknowledged_and_running_immediately() {
    let mut rig = Rig::started();
    let resp = call(&mut rig, &start("Ana"));
    assert_eq!(resp.status_line, "200 OK");
    assert_eq!(json(&resp)["ok"], true);

    let v = json(&call(&mut rig, STATUS));
    assert_eq!(v["running"], true);
    assert_eq!(v["status"], "measuring");
    assert_eq!(v["name"], "Ana");

    rig.tick();
    assert_eq!(rig.app.state(), StateId::AwaitingFinger);
}

#[test]
fn start_with_unusable_body_has_no_name() {
    let mut rig = Rig::started();
    let raw = b"POST /start HTTP/1.1\r\nContent-Length: 8\r\n\r\n{\"name\":";
    call(&mut rig, raw);
    let v = json(&call(&mut rig, STATUS));
    assert_eq!(v["running"], true);
    assert_eq!(v["name"], Value::Null);
}

#[test]
fn second_start_is_acknowledged_but_ignored() {
    let mut rig = Rig::started();
    call(&mut rig, &start("Ana"));
    rig.tick();
    let resp = call(&mut rig, &start("Bob"));
    assert_eq!(resp.status_line, "200 OK");
    assert_eq!(json(&call(&mut rig, STATUS))["name"], "Ana");
}

#[test]
fn stop_returns_to_idle() {
    let mut rig = Rig::started();
    call(&mut rig, &start("Ana"));
    rig.run_until_state(StateId::Countdown);

    assert_eq!(json(&call(&mut rig, STOP))["ok"], true);
    rig.run_until_state(StateId::Idle);

    let v = json(&call(&mut rig, STATUS));
    assert_eq!(v["running"], false);
    assert_eq!(v["status"], "idle");
    assert_eq!(v["message"], "Cancelled");
}

#[test]
fn completed_session_reports_classification() {
    let mut rig = Rig::started();
    rig.estimator.fallback = pulseox::sensors::Estimate {
        heart_rate: 110,
        hr_valid: true,
        spo2: 97,
        spo2_valid: true,
    };
    call(&mut rig, &start("Ana"));
    rig.run_until_state(StateId::ResultHold);

    let v = json(&call(&mut rig, STATUS));
    assert_eq!(v["heartRate"], 110);
    assert_eq!(v["spo2"], 97);
    assert_eq!(v["hrValid"], 5);
    assert_eq!(v["status"], "Warning");
    assert_eq!(v["phase"], "ResultHold");
}

#[test]
fn preflight_has_cors_and_no_body() {
    let mut rig = Rig::started();
    let resp = call(&mut rig, b"OPTIONS /start HTTP/1.1\r\nOrigin: http://x\r\n\r\n");
    assert!(resp.is_no_content());

    let mut wire = Vec::new();
    write_response(&mut wire, &resp).unwrap();
    let text = String::from_utf8(wire).unwrap();
    assert!(text.starts_with("HTTP/1.1 204 No Content\r\n"));
    assert!(text.contains("Access-Control-Allow-Origin: *\r\n"));
    assert!(!text.contains("Content-Length"));
    assert!(text.ends_with("\r\n\r\n"));
    assert_eq!(rig.app.state(), StateId::Idle);
}

#[test]
fn unknown_path_and_wrong_method() {
    let mut rig = Rig::started();
    let resp = call(&mut rig, b"GET /reboot HTTP/1.1\r\n\r\n");
    assert_eq!(resp.status_line, "404 Not Found");
    assert_eq!(json(&resp)["ok"], false);

    let resp = call(&mut rig, b"GET /start HTTP/1.1\r\n\r\n");
    assert_eq!(resp.status_line, "405 Method Not Allowed");
    assert!(!rig.app.session().is_active());
}
