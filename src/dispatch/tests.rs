use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use serde_json::json;

use super::drug::{PublicLabelStrategy, RemoteDrugStrategy};
use super::guideline::RemoteGuidelineStrategy;
use super::*;
use crate::fda::{DrugLabel, DrugLabelSource};
use crate::kb::{ChunkWindow, IndexCache, KbSettings, SemanticRetriever};
use crate::model::{DrugQuery, DrugSafetyRecord, GuidelineLookup};
use crate::semantic::{LocalHashEmbedder, SemanticModelConfig};

const GUIDELINES: &str = "Severe malaria requires intravenous artesunate.\u{000C}\
Community acquired pneumonia is treated with amoxicillin for five days.\u{000C}\
Oral rehydration salts and zinc are used for acute diarrhoea.";

/// Answers `connections` requests with a fixed status line and body, then exits.
fn stub_tool_service(status_line: &'static str, body: String, connections: usize) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub");
    let address = listener.local_addr().expect("stub address");
    thread::spawn(move || {
        for stream in listener.incoming().take(connections) {
            let Ok(stream) = stream else { continue };
            let mut reader = BufReader::new(stream);
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap_or(0);
                    }
                }
            }
            let mut request_body = vec![0_u8; content_length];
            let _ = reader.read_exact(&mut request_body);

            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let mut stream = reader.into_inner();
            let _ = stream.write_all(response.as_bytes());
            let _ = stream.flush();
        }
    });
    format!("http://{address}/invoke_tool")
}

/// Accepts connections but never answers.
fn hung_tool_service() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub");
    let address = listener.local_addr().expect("stub address");
    thread::spawn(move || {
        let held = listener.incoming().take(1).collect::<Vec<_>>();
        thread::sleep(Duration::from_secs(5));
        drop(held);
    });
    format!("http://{address}/invoke_tool")
}

fn refused_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let address = listener.local_addr().expect("address");
    drop(listener);
    format!("http://{address}/invoke_tool")
}

fn client(endpoint: &str) -> ToolClient {
    ToolClient::new(endpoint, Duration::from_millis(500)).expect("tool client")
}

fn local_retriever(root: &Path) -> SemanticRetriever {
    let document_path = root.join("guidelines.txt");
    fs::write(&document_path, GUIDELINES).expect("write guidelines");
    let settings = KbSettings {
        document_path,
        snapshot_path: root.join("kb_index.sqlite"),
        window: ChunkWindow::new(8, 2).expect("window"),
    };
    let embedder = LocalHashEmbedder::new(SemanticModelConfig::local_hash(None, None));
    SemanticRetriever::new(Arc::new(IndexCache::new(settings, Arc::new(embedder))))
}

fn object_keys(value: &serde_json::Value) -> Vec<String> {
    let mut keys = value
        .as_object()
        .expect("object")
        .keys()
        .cloned()
        .collect::<Vec<String>>();
    keys.sort();
    keys
}

struct StaticLabels;

impl DrugLabelSource for StaticLabels {
    fn lookup(&self, query: &DrugQuery) -> Result<Option<DrugLabel>> {
        Ok((query.as_str() == "aspirin").then(|| DrugLabel {
            brand: "Bayer Aspirin".to_string(),
            generic: "ASPIRIN".to_string(),
            warnings: "Stomach bleeding warning.".to_string(),
        }))
    }
}

struct BrokenLabels;

impl DrugLabelSource for BrokenLabels {
    fn lookup(&self, query: &DrugQuery) -> Result<Option<DrugLabel>> {
        bail!("label source unreachable for {query}")
    }
}

struct CountingStrategy {
    calls: Arc<AtomicUsize>,
}

impl LookupStrategy<GuidelineRequest, GuidelineLookup> for CountingStrategy {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn attempt(&self, request: &GuidelineRequest) -> Result<GuidelineLookup> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(GuidelineLookup::empty(&request.query))
    }
}

#[test]
fn guideline_lookup_falls_back_to_local_index_on_server_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let endpoint = stub_tool_service(
        "500 Internal Server Error",
        json!({"detail": "index not loaded"}).to_string(),
        1,
    );
    let service = GuidelineService::new(Some(client(&endpoint)), local_retriever(temp.path()));

    let lookup = service.fetch("  amoxicillin for pneumonia ", 2);
    assert_eq!(lookup.query_used, "amoxicillin for pneumonia");
    assert!(!lookup.guideline_snippets.is_empty());
    assert!(lookup.guideline_snippets.len() <= 2);
    assert!(lookup.guideline_snippets[0].contains("amoxicillin"));
}

#[test]
fn fallback_result_has_the_same_shape_as_a_remote_result() {
    let temp = tempfile::tempdir().expect("tempdir");
    let healthy = stub_tool_service(
        "200 OK",
        json!({
            "success": true,
            "result": {"guideline_snippets": ["Give artesunate."], "query_used": "malaria"}
        })
        .to_string(),
        1,
    );
    let remote = GuidelineService::new(Some(client(&healthy)), local_retriever(temp.path()))
        .fetch("malaria", 4);
    assert_eq!(remote.guideline_snippets, vec!["Give artesunate."]);

    let fallback = GuidelineService::new(
        Some(client(&refused_endpoint())),
        local_retriever(temp.path()),
    )
    .fetch("malaria", 4);

    let remote_json = serde_json::to_value(&remote).expect("json");
    let fallback_json = serde_json::to_value(&fallback).expect("json");
    assert_eq!(object_keys(&remote_json), object_keys(&fallback_json));
    assert!(fallback.guideline_snippets[0].contains("malaria"));
}

#[test]
fn empty_remote_result_is_still_canonical() {
    let endpoint = stub_tool_service(
        "200 OK",
        json!({"success": true, "result": {"guideline_snippets": [], "query_used": "rash"}})
            .to_string(),
        1,
    );
    let calls = Arc::new(AtomicUsize::new(0));
    let dispatcher = RemoteFirst::new()
        .then(RemoteGuidelineStrategy::new(client(&endpoint)))
        .then(CountingStrategy {
            calls: calls.clone(),
        });

    let lookup = GuidelineService::from_dispatcher(dispatcher).fetch("rash", 4);
    assert!(lookup.guideline_snippets.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn malformed_or_unsuccessful_bodies_fall_through() {
    let bodies = [
        "not json at all".to_string(),
        json!({"success": false, "result": {}}).to_string(),
        json!({"success": true, "result": {"snippets": ["wrong key"]}}).to_string(),
    ];

    for body in bodies {
        let endpoint = stub_tool_service("200 OK", body.clone(), 1);
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = RemoteFirst::new()
            .then(RemoteGuidelineStrategy::new(client(&endpoint)))
            .then(CountingStrategy {
                calls: calls.clone(),
            });

        let lookup = GuidelineService::from_dispatcher(dispatcher).fetch("rash", 4);
        assert_eq!(lookup, GuidelineLookup::empty("rash"));
        assert_eq!(calls.load(Ordering::SeqCst), 1, "body: {body}");
    }
}

#[test]
fn hung_tool_service_is_bounded_by_timeout() {
    let service = DrugSafetyService::new(
        Some(ToolClient::new(&hung_tool_service(), Duration::from_millis(200)).expect("client")),
        Arc::new(StaticLabels),
    );
    let query = DrugQuery::parse("aspirin").expect("query");

    let started = Instant::now();
    let outcome = service.check(&query);
    assert!(started.elapsed() < Duration::from_secs(4));
    let record = outcome.into_record();
    assert!(record.found);
    assert_eq!(record.brand, "Bayer Aspirin");
}

#[test]
fn drug_check_falls_back_to_public_source_with_identical_shape() {
    let failing = stub_tool_service("500 Internal Server Error", "{}".to_string(), 1);
    let service = DrugSafetyService::new(Some(client(&failing)), Arc::new(StaticLabels));
    let query = DrugQuery::parse("Aspirin").expect("query");

    let fallback = service.check(&query).into_record();
    assert_eq!(
        fallback,
        DrugSafetyRecord {
            drug_name: "aspirin".to_string(),
            brand: "Bayer Aspirin".to_string(),
            generic: "ASPIRIN".to_string(),
            warnings: "Stomach bleeding warning.".to_string(),
            found: true,
        }
    );

    let healthy = stub_tool_service(
        "200 OK",
        json!({
            "success": true,
            "result": {
                "drug_name": "aspirin",
                "brand": "Ecotrin",
                "generic": "ASPIRIN",
                "warnings": "Allergy alert.",
                "found": true
            }
        })
        .to_string(),
        1,
    );
    let remote = DrugSafetyService::new(Some(client(&healthy)), Arc::new(BrokenLabels))
        .check(&query)
        .into_record();
    assert_eq!(remote.brand, "Ecotrin");
    assert_eq!(
        object_keys(&serde_json::to_value(&remote).expect("json")),
        object_keys(&serde_json::to_value(&fallback).expect("json"))
    );
}

#[test]
fn remote_drug_result_fills_missing_fields_with_sentinels() {
    let endpoint = stub_tool_service(
        "200 OK",
        json!({"success": true, "result": {"generic": "METFORMIN"}}).to_string(),
        1,
    );
    let record = DrugSafetyService::new(Some(client(&endpoint)), Arc::new(BrokenLabels))
        .check(&DrugQuery::parse("metformin").expect("query"))
        .into_record();

    assert_eq!(record.drug_name, "metformin");
    assert_eq!(record.brand, "N/A");
    assert_eq!(record.generic, "METFORMIN");
    assert_eq!(record.warnings, "No warnings available.");
    assert!(!record.found);
}

#[test]
fn exhausted_dispatch_yields_unresolved_outcome() {
    let service = DrugSafetyService::new(Some(client(&refused_endpoint())), Arc::new(BrokenLabels));
    let query = DrugQuery::parse("unknownxyz123").expect("query");

    let outcome = service.check(&query);
    assert!(matches!(outcome, DrugOutcome::Unresolved { .. }));
    assert_eq!(
        outcome.into_record(),
        DrugSafetyRecord::not_found("unknownxyz123")
    );
}

#[test]
fn dispatcher_reports_attempted_strategies_when_exhausted() {
    let dispatcher: RemoteFirst<DrugQuery, DrugSafetyRecord> = RemoteFirst::new()
        .then(RemoteDrugStrategy::new(client(&refused_endpoint())))
        .then(PublicLabelStrategy::new(Arc::new(BrokenLabels)));
    assert_eq!(
        dispatcher.strategy_names(),
        vec!["fda-tool-service", "public-label-source"]
    );

    let err = dispatcher
        .dispatch(&DrugQuery::parse("aspirin").expect("query"))
        .expect_err("every strategy fails");
    assert_eq!(err.attempted, 2);
    assert!(err.last_error.contains("label source unreachable"));
}
