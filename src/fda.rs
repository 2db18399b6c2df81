//! Public drug-label lookup against the openFDA `drug/label` endpoint.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::model::{DrugQuery, DrugSafetyRecord, NO_WARNINGS_AVAILABLE, NOT_AVAILABLE};

/// Fields searched in order; the first label found wins.
const SEARCH_KEYS: [&str; 2] = ["brand_name", "generic_name"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrugLabel {
    pub brand: String,
    pub generic: String,
    pub warnings: String,
}

impl DrugLabel {
    pub fn into_record(self, query: &DrugQuery) -> DrugSafetyRecord {
        DrugSafetyRecord {
            drug_name: query.to_string(),
            brand: self.brand,
            generic: self.generic,
            warnings: self.warnings,
            found: true,
        }
    }
}

/// Source of drug-label safety data. `Ok(None)` means the drug is unknown to the source.
pub trait DrugLabelSource: Send + Sync {
    fn lookup(&self, query: &DrugQuery) -> Result<Option<DrugLabel>>;
}

pub struct OpenFdaClient {
    client: Client,
    base_url: String,
}

impl OpenFdaClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build openFDA HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    fn search(&self, key: &str, query: &DrugQuery) -> Result<Option<DrugLabel>> {
        let search = search_expression(key, query);
        debug!(url = %self.base_url, %search, "querying openFDA");

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("search", search.as_str()), ("limit", "1")])
            .send()
            .with_context(|| format!("openFDA request failed for {search}"))?;

        let status = resp.status();
        // openFDA answers 404 when the search matches nothing.
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            anyhow::bail!("openFDA returned {status} for {search}: {body}");
        }

        let parsed: LabelSearchResponse = resp
            .json()
            .with_context(|| format!("failed to parse openFDA response for {search}"))?;
        Ok(parsed.results.into_iter().next().map(LabelResult::into_label))
    }
}

impl DrugLabelSource for OpenFdaClient {
    /// A failed search on one key does not stop the next key from being tried. The lookup
    /// only fails when every key failed; any clean miss makes it `Ok(None)`.
    fn lookup(&self, query: &DrugQuery) -> Result<Option<DrugLabel>> {
        let mut last_error = None;
        let mut answered = false;
        for key in SEARCH_KEYS {
            match self.search(key, query) {
                Ok(Some(label)) => {
                    info!(
                        drug = %query,
                        brand = %label.brand,
                        generic = %label.generic,
                        "openFDA label found"
                    );
                    return Ok(Some(label));
                }
                Ok(None) => answered = true,
                Err(err) => {
                    warn!(drug = %query, key, error = %format!("{err:#}"), "openFDA search failed");
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(err) if !answered => {
                Err(err.context(format!("openFDA lookup failed for {query}")))
            }
            _ => {
                info!(drug = %query, "openFDA has no label");
                Ok(None)
            }
        }
    }
}

fn search_expression(key: &str, query: &DrugQuery) -> String {
    let name = query.as_str().replace('"', "");
    if name.contains(char::is_whitespace) {
        format!("openfda.{key}:\"{name}\"")
    } else {
        format!("openfda.{key}:{name}")
    }
}

#[derive(Debug, Deserialize)]
struct LabelSearchResponse {
    #[serde(default)]
    results: Vec<LabelResult>,
}

#[derive(Debug, Deserialize)]
struct LabelResult {
    #[serde(default)]
    openfda: OpenFdaFields,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenFdaFields {
    #[serde(default)]
    brand_name: Vec<String>,
    #[serde(default)]
    generic_name: Vec<String>,
}

impl LabelResult {
    fn into_label(self) -> DrugLabel {
        let first_or = |values: Vec<String>, fallback: &str| {
            values
                .into_iter()
                .next()
                .unwrap_or_else(|| fallback.to_string())
        };
        DrugLabel {
            brand: first_or(self.openfda.brand_name, NOT_AVAILABLE),
            generic: first_or(self.openfda.generic_name, NOT_AVAILABLE),
            warnings: first_or(self.warnings, NO_WARNINGS_AVAILABLE),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;

    const ASPIRIN_LABEL: &str = r#"{"results":[{"openfda":{"brand_name":["Bayer"],"generic_name":["ASPIRIN"]},"warnings":["Reye's syndrome"]}]}"#;
    const NOT_FOUND_BODY: &str = r#"{"error":{"code":"NOT_FOUND","message":"No matches found!"}}"#;

    type Reply = (&'static str, &'static str);

    /// Answers label searches by key: `brand` for brand-name searches, `generic` otherwise.
    /// Returns the base URL and a counter of the requests served.
    fn stub_openfda(brand: Reply, generic: Reply) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub");
        let address = listener.local_addr().expect("stub address");
        let served = Arc::new(AtomicUsize::new(0));
        let counter = served.clone();
        thread::spawn(move || {
            for stream in listener.incoming().take(SEARCH_KEYS.len()) {
                let Ok(stream) = stream else { continue };
                let mut reader = BufReader::new(stream);
                let mut request_line = String::new();
                let _ = reader.read_line(&mut request_line);
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
                        break;
                    }
                }

                let (status_line, body) = if request_line.contains("brand_name") {
                    brand
                } else {
                    generic
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let response = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let mut stream = reader.into_inner();
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            }
        });
        (format!("http://{address}/drug/label.json"), served)
    }

    fn client(base_url: &str) -> OpenFdaClient {
        OpenFdaClient::new(base_url, Duration::from_secs(2)).expect("openFDA client")
    }

    fn aspirin() -> DrugQuery {
        DrugQuery::parse("Aspirin").expect("query")
    }

    #[test]
    fn brand_name_match_wins_without_generic_search() {
        let (base_url, served) = stub_openfda(("200 OK", ASPIRIN_LABEL), ("200 OK", "{}"));
        let label = client(&base_url)
            .lookup(&aspirin())
            .expect("lookup")
            .expect("label");

        assert_eq!(label.brand, "Bayer");
        assert_eq!(served.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn brand_name_miss_falls_through_to_generic_name() {
        let (base_url, served) =
            stub_openfda(("404 Not Found", NOT_FOUND_BODY), ("200 OK", ASPIRIN_LABEL));
        let label = client(&base_url)
            .lookup(&aspirin())
            .expect("lookup")
            .expect("label");

        assert_eq!(label.generic, "ASPIRIN");
        assert_eq!(label.warnings, "Reye's syndrome");
        assert_eq!(served.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn no_match_on_either_key_is_no_label() {
        let (base_url, _) = stub_openfda(
            ("404 Not Found", NOT_FOUND_BODY),
            ("404 Not Found", NOT_FOUND_BODY),
        );
        assert_eq!(client(&base_url).lookup(&aspirin()).expect("lookup"), None);
    }

    #[test]
    fn brand_name_server_error_still_tries_generic_name() {
        let (base_url, _) =
            stub_openfda(("503 Service Unavailable", "{}"), ("200 OK", ASPIRIN_LABEL));
        let label = client(&base_url)
            .lookup(&aspirin())
            .expect("lookup")
            .expect("label");
        assert_eq!(label.generic, "ASPIRIN");
    }

    #[test]
    fn failure_and_miss_together_is_no_label() {
        let (base_url, _) = stub_openfda(
            ("429 Too Many Requests", "{}"),
            ("404 Not Found", NOT_FOUND_BODY),
        );
        assert_eq!(client(&base_url).lookup(&aspirin()).expect("lookup"), None);
    }

    #[test]
    fn failure_on_every_key_is_an_error() {
        let (base_url, _) = stub_openfda(
            ("503 Service Unavailable", "{}"),
            ("500 Internal Server Error", "not json"),
        );
        let err = client(&base_url)
            .lookup(&aspirin())
            .expect_err("every search failed");
        assert!(format!("{err:#}").contains("openFDA lookup failed for aspirin"));
    }

    #[test]
    fn label_result_falls_back_to_sentinels() {
        let raw = serde_json::json!({
            "results": [{
                "openfda": { "generic_name": ["ASPIRIN"] }
            }]
        });
        let parsed: LabelSearchResponse = serde_json::from_value(raw).expect("parse");
        let label = parsed
            .results
            .into_iter()
            .next()
            .map(LabelResult::into_label)
            .expect("label");

        assert_eq!(label.brand, NOT_AVAILABLE);
        assert_eq!(label.generic, "ASPIRIN");
        assert_eq!(label.warnings, NO_WARNINGS_AVAILABLE);
    }

    #[test]
    fn search_expression_quotes_multi_word_names() {
        let single = DrugQuery::parse("Ibuprofen").expect("query");
        assert_eq!(search_expression("brand_name", &single), "openfda.brand_name:ibuprofen");

        let multi = DrugQuery::parse(" Tylenol PM ").expect("query");
        assert_eq!(
            search_expression("generic_name", &multi),
            "openfda.generic_name:\"tylenol pm\""
        );
    }

    #[test]
    fn found_label_becomes_found_record() {
        let query = DrugQuery::parse("Aspirin").expect("query");
        let record = DrugLabel {
            brand: "Bayer".to_string(),
            generic: "ASPIRIN".to_string(),
            warnings: "Reye's syndrome".to_string(),
        }
        .into_record(&query);
        assert!(record.found);
        assert_eq!(record.drug_name, "aspirin");
    }
}
