//! End-to-end route tests: real router on an ephemeral port, mock ledger behind it.

use async_trait::async_trait;
use records_ledger_gateway::domain::decode::TRUNCATION_MARKER;
use records_ledger_gateway::infra::config::PeerSettings;
use records_ledger_gateway::transport;
use records_ledger_gateway::{
    ContractTarget, FabricSessionFactory, GatewayError, LedgerConnection, Session, SessionFactory,
    TransactionRequest,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
enum Behavior {
    /// Submits succeed; evaluates return these bytes.
    Payload(Vec<u8>),
    /// Every ledger call is rejected with this message.
    Rejected(String),
    /// The session cannot be opened at all.
    Unreachable(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Call {
    kind: &'static str,
    target: ContractTarget,
    operation: String,
    args: Vec<String>,
}

#[derive(Default)]
struct Stats {
    opens: AtomicUsize,
    closes: AtomicUsize,
    calls: Mutex<Vec<Call>>,
}

struct MockConnection {
    behavior: Behavior,
    stats: Arc<Stats>,
}

impl MockConnection {
    fn record(&self, kind: &'static str, target: &ContractTarget, tx: &TransactionRequest) {
        self.stats.calls.lock().unwrap().push(Call {
            kind,
            target: target.clone(),
            operation: tx.operation.clone(),
            args: tx
                .arguments
                .iter()
                .map(|a| String::from_utf8(a.clone()).unwrap())
                .collect(),
        });
    }
}

#[async_trait]
impl LedgerConnection for MockConnection {
    async fn submit(&self, target: &ContractTarget, tx: &TransactionRequest) -> Result<(), GatewayError> {
        self.record("submit", target, tx);
        match &self.behavior {
            Behavior::Rejected(msg) => Err(GatewayError::Ledger {
                message: msg.clone(),
                details: vec!["code: Aborted".to_string()],
                cause: Some("endorsement policy failure".to_string()),
            }),
            _ => Ok(()),
        }
    }

    async fn evaluate(
        &self,
        target: &ContractTarget,
        tx: &TransactionRequest,
    ) -> Result<Vec<u8>, GatewayError> {
        self.record("evaluate", target, tx);
        match &self.behavior {
            Behavior::Payload(bytes) => Ok(bytes.clone()),
            Behavior::Rejected(msg) => Err(GatewayError::ledger(msg.clone())),
            Behavior::Unreachable(_) => unreachable!("session never opened"),
        }
    }

    fn close(&mut self) {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockFactory {
    behavior: Behavior,
    stats: Arc<Stats>,
}

#[async_trait]
impl SessionFactory for MockFactory {
    async fn open(&self) -> Result<Session, GatewayError> {
        if let Behavior::Unreachable(msg) = &self.behavior {
            return Err(GatewayError::connection(msg.clone(), Some("connection refused".to_string())));
        }
        self.stats.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Session::new(Box::new(MockConnection {
            behavior: self.behavior.clone(),
            stats: self.stats.clone(),
        })))
    }
}

fn target() -> ContractTarget {
    ContractTarget {
        channel: "mychannel".to_string(),
        chaincode: "records".to_string(),
    }
}

async fn serve(sessions: Arc<dyn SessionFactory>, raw_preview_limit: usize) -> String {
    let app_state = transport::http::AppState {
        sessions,
        target: target(),
        raw_preview_limit,
    };
    let router = transport::http::create_router(app_state);

    // Bind to an ephemeral port to avoid conflicts with a running gateway.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://127.0.0.1:{}", port)
}

async fn spawn_mock(behavior: Behavior) -> (String, Arc<Stats>) {
    let stats = Arc::new(Stats::default());
    let factory = MockFactory {
        behavior,
        stats: stats.clone(),
    };
    (serve(Arc::new(factory), 2000).await, stats)
}

fn calls(stats: &Stats) -> Vec<Call> {
    stats.calls.lock().unwrap().clone()
}

fn assert_balanced(stats: &Stats, expected: usize) {
    assert_eq!(stats.opens.load(Ordering::SeqCst), expected);
    assert_eq!(stats.closes.load(Ordering::SeqCst), expected);
}

#[tokio::test]
async fn health_is_ok_without_touching_the_ledger() {
    let (base_url, stats) = spawn_mock(Behavior::Unreachable("down".to_string())).await;

    let resp = reqwest::get(format!("{}/health", base_url)).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.json::<Value>().await.unwrap(), json!({"ok": true}));
    assert_balanced(&stats, 0);
}

#[tokio::test]
async fn create_record_submits_the_body() {
    let (base_url, stats) = spawn_mock(Behavior::Payload(Vec::new())).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/records", base_url))
        .json(&json!({"id": "p1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.json::<Value>().await.unwrap(), json!({"ok": true}));

    assert_eq!(
        calls(&stats),
        vec![Call {
            kind: "submit",
            target: target(),
            operation: "createRecord".to_string(),
            args: vec![r#"{"id":"p1"}"#.to_string()],
        }]
    );
    assert_balanced(&stats, 1);
}

#[tokio::test]
async fn update_record_submits_the_body_only() {
    let (base_url, stats) = spawn_mock(Behavior::Payload(Vec::new())).await;

    let resp = reqwest::Client::new()
        .put(format!("{}/records/p1", base_url))
        .json(&json!({"patient_id": "p1", "version": 2}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let recorded = calls(&stats);
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].kind, "submit");
    assert_eq!(recorded[0].operation, "updateRecord");
    assert_eq!(recorded[0].args.len(), 1);
    let sent: Value = serde_json::from_str(&recorded[0].args[0]).unwrap();
    assert_eq!(sent, json!({"patient_id": "p1", "version": 2}));
    assert_balanced(&stats, 1);
}

#[tokio::test]
async fn record_bodies_reach_the_chaincode_byte_for_byte() {
    let (base_url, stats) = spawn_mock(Behavior::Payload(Vec::new())).await;
    let client = reqwest::Client::new();
    let body = r#"{"version":2, "patient_id":"p1","audit_logs":[],"note":"\u00e9"}"#;

    for request in [
        client.post(format!("{}/records", base_url)),
        client.put(format!("{}/records/p1", base_url)),
        client.post(format!("{}/records/p1/audit", base_url)),
    ] {
        let resp = request
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let forwarded: Vec<String> = calls(&stats)
        .into_iter()
        .map(|call| call.args.last().cloned().unwrap())
        .collect();
    assert_eq!(forwarded, vec![body.to_string(); 3]);
    assert_balanced(&stats, 3);
}

#[tokio::test]
async fn read_latest_returns_decoded_json() {
    let payload = br#"{"id":"p1","name":"A"}"#.to_vec();
    let (base_url, stats) = spawn_mock(Behavior::Payload(payload)).await;

    let resp = reqwest::get(format!("{}/records/p1/latest", base_url)).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.json::<Value>().await.unwrap(), json!({"id": "p1", "name": "A"}));

    let recorded = calls(&stats);
    assert_eq!(recorded[0].kind, "evaluate");
    assert_eq!(recorded[0].operation, "getLatestRecord");
    assert_eq!(recorded[0].args, vec!["p1".to_string()]);
    assert_balanced(&stats, 1);
}

#[tokio::test]
async fn read_latest_non_json_is_500_with_raw_and_still_closes() {
    let (base_url, stats) = spawn_mock(Behavior::Payload(b"oops".to_vec())).await;

    let resp = reqwest::get(format!("{}/records/p1/latest", base_url)).await.unwrap();
    assert_eq!(resp.status(), 500);
    let body = resp.json::<Value>().await.unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("chaincode returned non-JSON output:"));
    assert_eq!(body["raw"], json!("oops"));
    assert_balanced(&stats, 1);
}

#[tokio::test]
async fn long_raw_output_is_truncated_to_the_limit() {
    let raw = "x".repeat(5000);
    let (base_url, stats) = spawn_mock(Behavior::Payload(raw.clone().into_bytes())).await;

    let resp = reqwest::get(format!("{}/records/p1/history", base_url)).await.unwrap();
    assert_eq!(resp.status(), 500);
    let body = resp.json::<Value>().await.unwrap();
    let returned = body["raw"].as_str().unwrap();
    assert_eq!(returned, format!("{}{}", "x".repeat(2000), TRUNCATION_MARKER));
    assert_ne!(returned, raw);
    assert_balanced(&stats, 1);
}

#[tokio::test]
async fn history_wraps_decoded_json_with_patient_id() {
    let payload = br#"[{"version":1},{"version":2}]"#.to_vec();
    let (base_url, stats) = spawn_mock(Behavior::Payload(payload)).await;

    let resp = reqwest::get(format!("{}/records/p1/history", base_url)).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.json::<Value>().await.unwrap(),
        json!({"patientId": "p1", "history": [{"version": 1}, {"version": 2}]})
    );
    assert_eq!(calls(&stats)[0].operation, "getHistory");
    assert_balanced(&stats, 1);
}

#[tokio::test]
async fn audit_entry_passes_patient_id_then_body() {
    let (base_url, stats) = spawn_mock(Behavior::Payload(Vec::new())).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/records/p1/audit", base_url))
        .json(&json!({"actor": "dr-who"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.json::<Value>().await.unwrap(), json!({"ok": true}));

    let recorded = calls(&stats);
    assert_eq!(recorded[0].operation, "appendAuditLog");
    assert_eq!(
        recorded[0].args,
        vec!["p1".to_string(), r#"{"actor":"dr-who"}"#.to_string()]
    );
    assert_balanced(&stats, 1);
}

#[tokio::test]
async fn ledger_rejection_is_400_with_classified_message() {
    let (base_url, stats) = spawn_mock(Behavior::Rejected("submit createRecord failed".to_string())).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/records", base_url))
        .json(&json!({"id": "p1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body = resp.json::<Value>().await.unwrap();
    assert_eq!(
        body,
        json!({"error": "submit createRecord failed | code: Aborted | cause: endorsement policy failure"})
    );
    assert_balanced(&stats, 1);
}

#[tokio::test]
async fn ledger_rejection_on_reads_is_400_and_closes_the_session() {
    let (base_url, stats) = spawn_mock(Behavior::Rejected("evaluate getLatestRecord failed".to_string())).await;

    for route in ["latest", "history"] {
        let resp = reqwest::get(format!("{}/records/p1/{}", base_url, route)).await.unwrap();
        assert_eq!(resp.status(), 400);
        assert_eq!(
            resp.json::<Value>().await.unwrap(),
            json!({"error": "evaluate getLatestRecord failed"})
        );
    }
    assert_eq!(calls(&stats).len(), 2);
    assert_balanced(&stats, 2);
}

#[tokio::test]
async fn unreachable_peer_is_400_on_every_ledger_route() {
    let (base_url, stats) = spawn_mock(Behavior::Unreachable("failed to connect to peer".to_string())).await;
    let client = reqwest::Client::new();

    let responses = vec![
        client.post(format!("{}/records", base_url)).json(&json!({})).send().await.unwrap(),
        client.put(format!("{}/records/p1", base_url)).json(&json!({})).send().await.unwrap(),
        client.get(format!("{}/records/p1/latest", base_url)).send().await.unwrap(),
        client.get(format!("{}/records/p1/history", base_url)).send().await.unwrap(),
        client.post(format!("{}/records/p1/audit", base_url)).json(&json!({})).send().await.unwrap(),
    ];
    for resp in responses {
        assert_eq!(resp.status(), 400);
        let body = resp.json::<Value>().await.unwrap();
        assert_eq!(body, json!({"error": "failed to connect to peer | connection refused"}));
    }
    assert!(calls(&stats).is_empty());
    assert_balanced(&stats, 0);
}

#[tokio::test]
async fn malformed_body_is_rejected_before_opening_a_session() {
    let (base_url, stats) = spawn_mock(Behavior::Payload(Vec::new())).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/records", base_url))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body = resp.json::<Value>().await.unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON body"));
    assert_balanced(&stats, 0);
}

#[tokio::test]
async fn empty_credential_store_is_reported_on_every_ledger_route() {
    let dir = tempfile::tempdir().unwrap();
    let msp = dir.path().join("users/Admin@org1.example.com/msp");
    std::fs::create_dir_all(msp.join("signcerts")).unwrap();
    std::fs::create_dir_all(msp.join("keystore")).unwrap();

    let mut vars: HashMap<&str, String> = HashMap::new();
    vars.insert("FABRIC_MSP_ID", "Org1MSP".to_string());
    vars.insert("FABRIC_CRYPTO_PATH", dir.path().display().to_string());
    vars.insert("FABRIC_PEER_ENDPOINT", "127.0.0.1:1".to_string());
    vars.insert("FABRIC_TLS_CERT_PATH", dir.path().join("ca.crt").display().to_string());
    let peer = PeerSettings::from_lookup(|k| vars.get(k).cloned());

    let base_url = serve(Arc::new(FabricSessionFactory::new(peer)), 2000).await;
    let client = reqwest::Client::new();
    let expected = json!({"error": format!("no files in {}", msp.join("signcerts").display())});

    let responses = vec![
        client.post(format!("{}/records", base_url)).json(&json!({})).send().await.unwrap(),
        client.put(format!("{}/records/p1", base_url)).json(&json!({})).send().await.unwrap(),
        client.get(format!("{}/records/p1/latest", base_url)).send().await.unwrap(),
        client.get(format!("{}/records/p1/history", base_url)).send().await.unwrap(),
        client.post(format!("{}/records/p1/audit", base_url)).json(&json!({})).send().await.unwrap(),
    ];
    for resp in responses {
        assert_eq!(resp.status(), 400);
        assert_eq!(resp.json::<Value>().await.unwrap(), expected);
    }
}

#[tokio::test]
async fn missing_peer_setting_is_named_in_the_error() {
    let peer = PeerSettings::from_lookup(|_| None);
    let base_url = serve(Arc::new(FabricSessionFactory::new(peer)), 2000).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/records/p1/audit", base_url))
        .json(&json!({"actor": "dr-who"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(
        resp.json::<Value>().await.unwrap(),
        json!({"error": "FABRIC_MSP_ID not set"})
    );
}
