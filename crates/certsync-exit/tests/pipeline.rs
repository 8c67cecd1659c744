// crates/certsync-exit/tests/pipeline.rs
// ============================================================================
// Module: Exit Pipeline Tests
// Description: End-to-end handling of notifications through the exit module.
// Purpose: Ensure every event is delivered or durably buffered.
// Dependencies: certsync-core, certsync-exit, tempfile, tiny_http
// ============================================================================

//! ## Overview
//! Exercises the exit module against scripted transports and a local HTTP
//! server, checking buffer files, audit events, and operator redelivery.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use certsync_core::EventKind;
use certsync_core::InstanceId;
use certsync_exit::BufferError;
use certsync_exit::BufferStore;
use certsync_exit::DeliveryReport;
use certsync_exit::EventExtractor;
use certsync_exit::ExitError;
use certsync_exit::ExitModule;
use certsync_exit::ExitOutcome;
use certsync_exit::FailureKind;
use certsync_exit::HttpTransport;
use certsync_exit::PropertyValue;
use certsync_exit::StaticTemplateResolver;
use certsync_exit::Transport;
use certsync_exit::TransportError;
use certsync_exit::build_payload;
use common::RecordingSink;
use common::ScriptedTransport;
use common::TEMPLATE_OID;
use common::complete_bag;
use tiny_http::Response;
use tiny_http::Server;
use url::Url;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a module over `transport` with a fresh buffer directory.
fn module(
    dir: &tempfile::TempDir,
    transport: ScriptedTransport,
) -> (ExitModule<StaticTemplateResolver>, Arc<RecordingSink>) {
    let mut names = BTreeMap::new();
    names.insert(TEMPLATE_OID.to_string(), "WebServer".to_string());
    let extractor = EventExtractor::new(
        "CA-01",
        "Example Issuing CA",
        StaticTemplateResolver::new(names),
        "UnknownTemplate",
    );
    let sink = Arc::new(RecordingSink::default());
    let buffer = BufferStore::open(dir.path().join("buffer")).unwrap();
    let module = ExitModule::new(extractor, Box::new(transport), buffer, sink.clone());
    (module, sink)
}

/// Returns the outcomes recorded so far.
fn outcomes(sink: &RecordingSink) -> Vec<ExitOutcome> {
    sink.events.lock().unwrap().iter().map(|event| event.outcome).collect()
}

// ============================================================================
// SECTION: Exit Module
// ============================================================================

#[test]
fn accepted_delivery_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (module, sink) = module(&dir, ScriptedTransport::accepting(200));
    let report = module.on_certificate_event(7, EventKind::Issued, &complete_bag("1A2B")).unwrap();
    assert_eq!(report, DeliveryReport::Delivered { status: 200 });
    assert!(module.buffer().list().unwrap().is_empty());
    assert_eq!(outcomes(&sink), vec![ExitOutcome::Delivered]);
}

#[test]
fn transport_failure_buffers_payload_by_serial() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::failing(TransportError::Status {
        status: 503,
        detail: "maintenance".to_string(),
    });
    let (module, sink) = module(&dir, transport);
    let report = module.on_certificate_event(7, EventKind::Issued, &complete_bag("1A2B")).unwrap();
    let DeliveryReport::Buffered { failure, receipt } = report else {
        panic!("expected buffered report");
    };
    assert_eq!(failure.kind, FailureKind::Transport);
    assert!(receipt.attempt_file.starts_with("Notify_7_"));
    assert_eq!(receipt.serial_file.as_deref(), Some("1A2B.json"));

    let envelope = module.buffer().load("1A2B.json").unwrap();
    assert_eq!(envelope.serial_number.as_deref(), Some("1A2B"));
    assert_eq!(envelope.event_kind, EventKind::Issued);
    let payload = envelope.certificate_payload().unwrap();
    assert_eq!(payload.data.serial_number.as_deref(), Some("1A2B"));

    let events = sink.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].outcome, ExitOutcome::Buffered);
    assert_eq!(events[0].http_status, Some(503));
    assert_eq!(events[0].buffer_files.len(), 2);
}

#[test]
fn repeated_failures_keep_distinct_attempt_files() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::failing(TransportError::Request("refused".to_string()));
    let (module, _sink) = module(&dir, transport);
    for _ in 0 .. 3 {
        module.on_certificate_event(7, EventKind::Issued, &complete_bag("1A2B")).unwrap();
    }
    let names: Vec<String> =
        module.buffer().list().unwrap().into_iter().map(|entry| entry.name).collect();
    assert_eq!(names.len(), 4);
    assert_eq!(names.iter().filter(|name| name.starts_with("Notify_7_")).count(), 3);
    assert!(names.contains(&"1A2B.json".to_string()));
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
}

#[test]
fn validation_failure_is_buffered_not_delivered() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::accepting(200);
    let delivered = transport.delivered.clone();
    let (module, _sink) = module(&dir, transport);
    let mut bag = complete_bag("1A2B");
    bag.remove("Request_RequestID");
    let report = module.on_certificate_event(3, EventKind::Issued, &bag).unwrap();
    let DeliveryReport::Buffered { failure, .. } = report else {
        panic!("expected buffered report");
    };
    assert_eq!(failure.kind, FailureKind::Validation);
    assert!(failure.detail.contains("request_RequestID"));
    assert!(delivered.lock().unwrap().is_empty());
}

#[test]
fn extraction_failure_buffers_raw_properties() {
    let dir = tempfile::tempdir().unwrap();
    let (module, _sink) = module(&dir, ScriptedTransport::accepting(200));
    let mut bag = complete_bag("1A2B");
    bag.insert("Request_Disposition".to_string(), PropertyValue::Text("Archived".to_string()));
    let report = module.on_certificate_event(5, EventKind::Issued, &bag).unwrap();
    let DeliveryReport::Buffered { failure, receipt } = report else {
        panic!("expected buffered report");
    };
    assert_eq!(failure.kind, FailureKind::Extraction);
    let envelope = module.buffer().load(&receipt.attempt_file).unwrap();
    assert_eq!(envelope.payload["data"]["Request_Disposition"]["value"], "Archived");
    assert_eq!(envelope.payload["sans"], serde_json::json!([]));
    assert!(matches!(envelope.certificate_payload(), Err(BufferError::Decode(_))));
}

#[test]
fn event_without_serial_is_still_buffered() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::failing(TransportError::Request("refused".to_string()));
    let (module, _sink) = module(&dir, transport);
    let mut bag = complete_bag("1A2B");
    bag.remove("SerialNumber");
    let report = module.on_certificate_event(9, EventKind::Pending, &bag).unwrap();
    let DeliveryReport::Buffered { receipt, .. } = report else {
        panic!("expected buffered report");
    };
    assert!(receipt.serial_file.is_none());
    assert_eq!(module.buffer().list().unwrap().len(), 1);
}

#[test]
fn unwritable_buffer_reports_loss() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::failing(TransportError::Request("refused".to_string()));
    let (module, sink) = module(&dir, transport);
    std::fs::remove_dir_all(module.buffer().dir()).unwrap();
    std::fs::write(module.buffer().dir(), b"not a directory").unwrap();
    let result = module.on_certificate_event(1, EventKind::Issued, &complete_bag("1A2B"));
    assert!(matches!(result, Err(ExitError::BufferWrite { .. })));
    assert_eq!(outcomes(&sink), vec![ExitOutcome::BufferFailed]);
}

#[test]
fn redelivery_removes_file_unless_kept() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::failing(TransportError::Request("refused".to_string()));
    let (failing, _sink) = module(&dir, transport);
    failing.on_certificate_event(7, EventKind::Issued, &complete_bag("1A2B")).unwrap();

    let (accepting, _sink) = module(&dir, ScriptedTransport::accepting(200));
    let receipt = accepting.redeliver("1A2B.json", true).unwrap();
    assert_eq!(receipt.status, 200);
    assert!(accepting.buffer().load("1A2B.json").is_ok());
    accepting.redeliver("1A2B.json", false).unwrap();
    assert!(accepting.buffer().load("1A2B.json").is_err());
}

#[test]
fn buffer_rejects_names_outside_directory() {
    let dir = tempfile::tempdir().unwrap();
    let store = BufferStore::open(dir.path()).unwrap();
    assert!(matches!(store.load("../etc/passwd.json"), Err(BufferError::InvalidName(_))));
    assert!(matches!(store.remove(".hidden.json"), Err(BufferError::InvalidName(_))));
}

#[test]
fn concurrent_failures_for_one_serial_are_all_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::failing(TransportError::Request("refused".to_string()));
    let (module, _sink) = module(&dir, transport);
    let bag = complete_bag("ABCD");
    thread::scope(|scope| {
        for worker in 0 .. 8 {
            let module = &module;
            let bag = &bag;
            scope.spawn(move || {
                for _ in 0 .. 25 {
                    let report = module.on_certificate_event(worker, EventKind::Issued, bag);
                    assert!(matches!(report, Ok(DeliveryReport::Buffered { .. })));
                }
            });
        }
    });
    let names: Vec<String> =
        module.buffer().list().unwrap().into_iter().map(|entry| entry.name).collect();
    assert_eq!(names.iter().filter(|name| name.starts_with("Notify_")).count(), 200);
    assert!(names.contains(&"ABCD.json".to_string()));
}

#[test]
fn failed_serial_snapshot_still_counts_as_buffered() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::failing(TransportError::Request("refused".to_string()));
    let (module, sink) = module(&dir, transport);
    std::fs::create_dir(module.buffer().dir().join("1A2B.json")).unwrap();
    let report = module.on_certificate_event(4, EventKind::Issued, &complete_bag("1A2B")).unwrap();
    let DeliveryReport::Buffered { receipt, .. } = report else {
        panic!("expected buffered report");
    };
    assert!(receipt.serial_file.is_none());
    assert!(receipt.serial_error.is_some());
    assert!(module.buffer().load(&receipt.attempt_file).is_ok());
    assert_eq!(outcomes(&sink), vec![ExitOutcome::Buffered]);
}

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

#[test]
fn http_transport_sends_credentials_and_json() {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let (sender, receiver) = mpsc::channel();
    let handle = thread::spawn(move || {
        if let Ok(mut request) = server.recv() {
            let header = |name: &'static str| {
                request
                    .headers()
                    .iter()
                    .find(|header| header.field.equiv(name))
                    .map(|header| header.value.as_str().to_string())
            };
            let authorization = header("Authorization");
            let instance = header("X-Producer-Instance-Id");
            let mut body = String::new();
            let _ = request.as_reader().read_to_string(&mut body);
            let _ = sender.send((authorization, instance, body));
            let _ = request.respond(Response::from_string("{}").with_status_code(201));
        }
    });

    let instance = InstanceId::parse("6f9619ff-8b86-d011-b42d-00c04fc964ff").unwrap();
    let endpoint = Url::parse(&format!("http://{addr}/api/certificate-data")).unwrap();
    let transport = HttpTransport::new(
        endpoint,
        "producer-token".to_string(),
        instance,
        Duration::from_secs(2),
        Duration::from_secs(5),
    )
    .unwrap();
    let payload = build_payload(
        &EventExtractor::new("CA-01", "CA", StaticTemplateResolver::default(), "Unknown")
            .extract(EventKind::Issued, &complete_bag("1A2B"))
            .unwrap(),
    );
    let receipt = transport.deliver(&payload).unwrap();
    assert_eq!(receipt.status, 201);

    let (authorization, instance_header, body) = receiver.recv().unwrap();
    assert_eq!(authorization.as_deref(), Some("Bearer producer-token"));
    assert_eq!(instance_header.as_deref(), Some("6f9619ff-8b86-d011-b42d-00c04fc964ff"));
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value["data"]["serialNumber"], "1A2B");
    handle.join().unwrap();
}

#[test]
fn http_conflict_is_a_transport_error() {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let handle = thread::spawn(move || {
        if let Ok(request) = server.recv() {
            let _ = request.respond(Response::from_string("duplicate").with_status_code(409));
        }
    });
    let transport = HttpTransport::new(
        Url::parse(&format!("http://{addr}/")).unwrap(),
        "token".to_string(),
        InstanceId::parse("6f9619ff-8b86-d011-b42d-00c04fc964ff").unwrap(),
        Duration::from_secs(2),
        Duration::from_secs(5),
    )
    .unwrap();
    let result = transport.deliver(&certsync_core::CertificatePayload::default());
    assert_eq!(
        result,
        Err(TransportError::Status {
            status: 409,
            detail: "duplicate".to_string(),
        })
    );
    handle.join().unwrap();
}
