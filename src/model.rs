use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const NOT_AVAILABLE: &str = "N/A";
pub const NO_DATA_FOUND: &str = "No data found.";
pub const NO_WARNINGS_AVAILABLE: &str = "No warnings available.";
pub const INVALID_DRUG_NAME: &str = "Invalid or empty drug name provided.";

pub const TOOL_SEARCH_GUIDELINES: &str = "search_medical_guidelines";
pub const TOOL_CHECK_DRUG_SAFETY: &str = "check_drug_safety";
pub const TOOL_CHECK_MULTIPLE_DRUGS: &str = "check_multiple_drugs";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub chunk_index: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalHit {
    pub rank: usize,
    pub chunk_index: usize,
    pub distance: f32,
    pub passage: String,
}

/// Normalized drug name: trimmed, lower-cased and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DrugQuery(String);

impl DrugQuery {
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DrugQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrugSafetyRecord {
    pub drug_name: String,
    pub brand: String,
    pub generic: String,
    pub warnings: String,
    pub found: bool,
}

impl DrugSafetyRecord {
    pub fn not_found(drug_name: &str) -> Self {
        Self {
            drug_name: drug_name.to_string(),
            brand: NOT_AVAILABLE.to_string(),
            generic: NOT_AVAILABLE.to_string(),
            warnings: NO_DATA_FOUND.to_string(),
            found: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Success,
    NoData,
    /// Only produced by the tool server for a request without any usable name.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub status: BatchStatus,
    pub count: usize,
    pub results: Vec<DrugSafetyRecord>,
}

impl BatchReport {
    pub fn from_records(results: Vec<DrugSafetyRecord>) -> Self {
        let status = if results.is_empty() {
            BatchStatus::NoData
        } else {
            BatchStatus::Success
        };
        Self {
            status,
            count: results.len(),
            results,
        }
    }

    pub fn rejected() -> Self {
        Self {
            status: BatchStatus::Error,
            count: 0,
            results: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuidelineLookup {
    pub guideline_snippets: Vec<String>,
    pub query_used: String,
}

impl GuidelineLookup {
    pub fn empty(query: &str) -> Self {
        Self {
            guideline_snippets: Vec::new(),
            query_used: query.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    pub success: bool,
    #[serde(default)]
    pub result: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexBuildManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub generated_at: String,
    pub document_path: String,
    pub document_sha256: String,
    pub snapshot_path: String,
    pub model_id: String,
    pub embedding_backend: String,
    pub embedding_dim: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub passage_count: usize,
    pub duration_ms: u128,
    pub status: String,
}
