use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::model::{ToolInvocation, ToolResponse};

/// Blocking client for a tool service's `invoke_tool` endpoint.
#[derive(Clone)]
pub struct ToolClient {
    client: Client,
    endpoint: String,
}

impl ToolClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        anyhow::ensure!(!endpoint.trim().is_empty(), "missing tool service endpoint");
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build tool service HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.trim().to_string(),
        })
    }

    /// Invokes `tool_name`; anything but a 200 carrying `success: true` and a result of
    /// the expected shape is an error.
    pub fn invoke<T: DeserializeOwned>(
        &self,
        tool_name: &str,
        arguments: Map<String, Value>,
    ) -> Result<T> {
        let invocation = ToolInvocation {
            tool_name: tool_name.to_string(),
            arguments,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&invocation)
            .send()
            .with_context(|| format!("tool service unreachable at {}", self.endpoint))?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            anyhow::bail!("tool service returned {status} for {tool_name}: {body}");
        }

        let envelope: ToolResponse = resp
            .json()
            .with_context(|| format!("malformed tool service response for {tool_name}"))?;
        anyhow::ensure!(
            envelope.success,
            "tool service reported failure for {tool_name}"
        );
        serde_json::from_value(envelope.result)
            .with_context(|| format!("unexpected result shape from {tool_name}"))
    }
}
