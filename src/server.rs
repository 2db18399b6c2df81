//! HTTP side of the tool-invocation protocol.
//!
//! Guideline search runs on the local index and drug checks go straight to the public
//! label source, so a running server never calls back into itself.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::dispatch::{
    DEFAULT_TOP_K, DrugSafetyService, GuidelineRequest, LocalGuidelineStrategy, LookupStrategy,
};
use crate::error::ToolError;
use crate::fda::DrugLabelSource;
use crate::kb::SemanticRetriever;
use crate::model::{
    BatchReport, DrugQuery, DrugSafetyRecord, GuidelineLookup, INVALID_DRUG_NAME, NOT_AVAILABLE,
    TOOL_CHECK_DRUG_SAFETY, TOOL_CHECK_MULTIPLE_DRUGS, TOOL_SEARCH_GUIDELINES, ToolInvocation,
    ToolResponse,
};
use crate::verify::BatchVerifier;

pub struct ToolService {
    guidelines: LocalGuidelineStrategy,
    drugs: Arc<DrugSafetyService>,
    verifier: BatchVerifier,
}

impl ToolService {
    pub fn new(retriever: SemanticRetriever, labels: Arc<dyn DrugLabelSource>) -> Self {
        let drugs = Arc::new(DrugSafetyService::new(None, labels));
        Self {
            guidelines: LocalGuidelineStrategy::new(retriever),
            verifier: BatchVerifier::new(drugs.clone()),
            drugs,
        }
    }

    pub fn invoke(&self, invocation: &ToolInvocation) -> Result<Value, ToolError> {
        let tool = invocation.tool_name.as_str();
        let arguments = &invocation.arguments;
        match tool {
            TOOL_SEARCH_GUIDELINES => encode(tool, &self.search_guidelines(arguments)?),
            TOOL_CHECK_DRUG_SAFETY => encode(tool, &self.check_drug_safety(arguments)?),
            TOOL_CHECK_MULTIPLE_DRUGS => encode(tool, &self.check_multiple_drugs(arguments)?),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    fn search_guidelines(
        &self,
        arguments: &Map<String, Value>,
    ) -> Result<GuidelineLookup, ToolError> {
        let query = match arguments.get("query") {
            Some(Value::String(query)) => query.trim().to_string(),
            Some(_) => return Err(invalid(TOOL_SEARCH_GUIDELINES, "`query` must be a string")),
            None => return Err(invalid(TOOL_SEARCH_GUIDELINES, "missing `query`")),
        };
        let top_k = match arguments.get("top_k") {
            None | Some(Value::Null) => DEFAULT_TOP_K,
            Some(value) => value
                .as_u64()
                .map(|top_k| usize::try_from(top_k).unwrap_or(usize::MAX))
                .ok_or_else(|| {
                    invalid(TOOL_SEARCH_GUIDELINES, "`top_k` must be a non-negative integer")
                })?,
        };

        let request = GuidelineRequest { query, top_k };
        // The local strategy never fails; an unavailable index just yields no snippets.
        Ok(self
            .guidelines
            .attempt(&request)
            .unwrap_or_else(|_| GuidelineLookup::empty(&request.query)))
    }

    fn check_drug_safety(
        &self,
        arguments: &Map<String, Value>,
    ) -> Result<DrugSafetyRecord, ToolError> {
        let raw = match arguments.get("drug_name") {
            None | Some(Value::Null) => "",
            Some(Value::String(name)) => name.as_str(),
            Some(_) => {
                return Err(invalid(TOOL_CHECK_DRUG_SAFETY, "`drug_name` must be a string"));
            }
        };

        let Some(query) = DrugQuery::parse(raw) else {
            debug!("rejecting empty drug name");
            return Ok(DrugSafetyRecord {
                drug_name: NOT_AVAILABLE.to_string(),
                brand: NOT_AVAILABLE.to_string(),
                generic: NOT_AVAILABLE.to_string(),
                warnings: INVALID_DRUG_NAME.to_string(),
                found: false,
            });
        };
        Ok(self.drugs.check(&query).into_record())
    }

    fn check_multiple_drugs(
        &self,
        arguments: &Map<String, Value>,
    ) -> Result<BatchReport, ToolError> {
        let names = match arguments.get("drug_list") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        invalid(TOOL_CHECK_MULTIPLE_DRUGS, "`drug_list` must contain strings")
                    })
                })
                .collect::<Result<Vec<String>, ToolError>>()?,
            Some(_) => {
                return Err(invalid(
                    TOOL_CHECK_MULTIPLE_DRUGS,
                    "`drug_list` must be an array of strings",
                ));
            }
        };

        if names.iter().all(|name| name.trim().is_empty()) {
            debug!("rejecting drug batch without usable names");
            return Ok(BatchReport::rejected());
        }
        Ok(self.verifier.verify_batch(&names))
    }
}

fn invalid(tool: &str, reason: &str) -> ToolError {
    ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: reason.to_string(),
    }
}

fn encode<T: Serialize>(tool: &str, value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|source| ToolError::Encode {
        tool: tool.to_string(),
        source,
    })
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

type HandlerError = (StatusCode, Json<ErrorBody>);

pub fn router(service: Arc<ToolService>) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/tools", get(list_tools))
        .route("/invoke_tool", post(invoke_tool))
        .with_state(service)
}

pub async fn serve(bind: &str, service: Arc<ToolService>) -> Result<()> {
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address {bind}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(endpoint = %format!("http://{addr}/invoke_tool"), "tool server listening");

    axum::serve(listener, router(service))
        .await
        .context("tool server shutdown")?;
    Ok(())
}

async fn banner() -> Json<Value> {
    Json(json!({
        "message": "clinrag tool server is running",
        "version": env!("CARGO_PKG_VERSION"),
        "available_tools": [
            TOOL_SEARCH_GUIDELINES,
            TOOL_CHECK_DRUG_SAFETY,
            TOOL_CHECK_MULTIPLE_DRUGS,
        ],
    }))
}

async fn list_tools() -> Json<Value> {
    Json(json!({
        "tools": [
            {
                "name": TOOL_SEARCH_GUIDELINES,
                "description": "Search the treatment guideline knowledge base",
                "parameters": {
                    "query": {"type": "string", "description": "The clinical query to search"},
                    "top_k": {
                        "type": "integer",
                        "description": "Number of passages to return",
                        "default": DEFAULT_TOP_K,
                    },
                },
            },
            {
                "name": TOOL_CHECK_DRUG_SAFETY,
                "description": "Check drug-label safety information for a single drug",
                "parameters": {
                    "drug_name": {
                        "type": "string",
                        "description": "The brand or generic name of the drug to check",
                    },
                },
            },
            {
                "name": TOOL_CHECK_MULTIPLE_DRUGS,
                "description": "Check drug-label safety information for multiple drugs",
                "parameters": {
                    "drug_list": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "List of drug names to check",
                    },
                },
            },
        ],
    }))
}

pub async fn invoke_tool(
    State(service): State<Arc<ToolService>>,
    Json(invocation): Json<ToolInvocation>,
) -> Result<Json<ToolResponse>, HandlerError> {
    info!(tool = %invocation.tool_name, "invoking tool");
    let arguments = Value::Object(invocation.arguments.clone());
    debug!(%arguments, "tool arguments");

    let outcome = tokio::task::spawn_blocking(move || service.invoke(&invocation))
        .await
        .map_err(|err| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    detail: format!("tool task join error: {err}"),
                }),
            )
        })?;

    match outcome {
        Ok(result) => Ok(Json(ToolResponse {
            success: true,
            result,
        })),
        Err(err) => {
            warn!(error = %err, "tool invocation rejected");
            let status = match err {
                ToolError::UnknownTool(_) | ToolError::InvalidArguments { .. } => {
                    StatusCode::BAD_REQUEST
                }
                ToolError::Encode { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err((
                status,
                Json(ErrorBody {
                    detail: err.to_string(),
                }),
            ))
        }
    }
}
