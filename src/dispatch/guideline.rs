use anyhow::Result;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::kb::SemanticRetriever;
use crate::model::{GuidelineLookup, TOOL_SEARCH_GUIDELINES};

use super::{LookupStrategy, RemoteFirst, ToolClient};

pub const DEFAULT_TOP_K: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuidelineRequest {
    pub query: String,
    pub top_k: usize,
}

pub struct RemoteGuidelineStrategy {
    client: ToolClient,
}

impl RemoteGuidelineStrategy {
    pub fn new(client: ToolClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct RemoteGuidelineResult {
    guideline_snippets: Vec<String>,
    #[serde(default)]
    query_used: Option<String>,
}

impl LookupStrategy<GuidelineRequest, GuidelineLookup> for RemoteGuidelineStrategy {
    fn name(&self) -> &'static str {
        "kb-tool-service"
    }

    fn attempt(&self, request: &GuidelineRequest) -> Result<GuidelineLookup> {
        let mut arguments = Map::new();
        arguments.insert("query".to_string(), Value::from(request.query.as_str()));
        arguments.insert("top_k".to_string(), Value::from(request.top_k));

        let result: RemoteGuidelineResult = self.client.invoke(TOOL_SEARCH_GUIDELINES, arguments)?;
        Ok(GuidelineLookup {
            guideline_snippets: result.guideline_snippets,
            query_used: result
                .query_used
                .unwrap_or_else(|| request.query.clone()),
        })
    }
}

pub struct LocalGuidelineStrategy {
    retriever: SemanticRetriever,
}

impl LocalGuidelineStrategy {
    pub fn new(retriever: SemanticRetriever) -> Self {
        Self { retriever }
    }
}

impl LookupStrategy<GuidelineRequest, GuidelineLookup> for LocalGuidelineStrategy {
    fn name(&self) -> &'static str {
        "local-index"
    }

    fn attempt(&self, request: &GuidelineRequest) -> Result<GuidelineLookup> {
        let guideline_snippets = self
            .retriever
            .search(&request.query, request.top_k)
            .into_iter()
            .map(|hit| hit.passage.trim().to_string())
            .filter(|passage| !passage.is_empty())
            .collect();
        Ok(GuidelineLookup {
            guideline_snippets,
            query_used: request.query.clone(),
        })
    }
}

/// Guideline snippets, from the KB tool service when reachable and the local index otherwise.
pub struct GuidelineService {
    dispatcher: RemoteFirst<GuidelineRequest, GuidelineLookup>,
}

impl GuidelineService {
    pub fn new(remote: Option<ToolClient>, retriever: SemanticRetriever) -> Self {
        let mut dispatcher = RemoteFirst::new();
        if let Some(client) = remote {
            dispatcher = dispatcher.then(RemoteGuidelineStrategy::new(client));
        }
        Self::from_dispatcher(dispatcher.then(LocalGuidelineStrategy::new(retriever)))
    }

    pub fn from_dispatcher(dispatcher: RemoteFirst<GuidelineRequest, GuidelineLookup>) -> Self {
        debug!(strategies = ?dispatcher.strategy_names(), "guideline lookup strategies");
        Self { dispatcher }
    }

    pub fn fetch(&self, query: &str, top_k: usize) -> GuidelineLookup {
        let request = GuidelineRequest {
            query: query.trim().to_string(),
            top_k,
        };
        match self.dispatcher.dispatch(&request) {
            Ok(lookup) => {
                info!(
                    query = %lookup.query_used,
                    snippets = lookup.guideline_snippets.len(),
                    "guideline lookup completed"
                );
                lookup
            }
            Err(err) => {
                warn!(error = %err, "guideline lookup failed on every path");
                GuidelineLookup::empty(&request.query)
            }
        }
    }
}
