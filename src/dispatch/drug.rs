use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::fda::DrugLabelSource;
use crate::model::{
    DrugQuery, DrugSafetyRecord, NO_WARNINGS_AVAILABLE, NOT_AVAILABLE, TOOL_CHECK_DRUG_SAFETY,
};

use super::{LookupStrategy, RemoteFirst, ToolClient};

pub struct RemoteDrugStrategy {
    client: ToolClient,
}

impl RemoteDrugStrategy {
    pub fn new(client: ToolClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct RemoteDrugResult {
    brand: Option<String>,
    generic: Option<String>,
    warnings: Option<String>,
    #[serde(default)]
    found: bool,
}

impl LookupStrategy<DrugQuery, DrugSafetyRecord> for RemoteDrugStrategy {
    fn name(&self) -> &'static str {
        "fda-tool-service"
    }

    fn attempt(&self, query: &DrugQuery) -> Result<DrugSafetyRecord> {
        let mut arguments = Map::new();
        arguments.insert("drug_name".to_string(), Value::from(query.as_str()));

        let result: RemoteDrugResult = self.client.invoke(TOOL_CHECK_DRUG_SAFETY, arguments)?;
        Ok(DrugSafetyRecord {
            drug_name: query.to_string(),
            brand: result.brand.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            generic: result.generic.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            warnings: result
                .warnings
                .unwrap_or_else(|| NO_WARNINGS_AVAILABLE.to_string()),
            found: result.found,
        })
    }
}

pub struct PublicLabelStrategy {
    source: Arc<dyn DrugLabelSource>,
}

impl PublicLabelStrategy {
    pub fn new(source: Arc<dyn DrugLabelSource>) -> Self {
        Self { source }
    }
}

impl LookupStrategy<DrugQuery, DrugSafetyRecord> for PublicLabelStrategy {
    fn name(&self) -> &'static str {
        "public-label-source"
    }

    fn attempt(&self, query: &DrugQuery) -> Result<DrugSafetyRecord> {
        Ok(match self.source.lookup(query)? {
            Some(label) => label.into_record(query),
            None => DrugSafetyRecord::not_found(query.as_str()),
        })
    }
}

/// Result of checking one drug; `Unresolved` means no path produced an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrugOutcome {
    Resolved(DrugSafetyRecord),
    Unresolved { query: DrugQuery, reason: String },
}

impl DrugOutcome {
    pub fn into_record(self) -> DrugSafetyRecord {
        match self {
            Self::Resolved(record) => record,
            Self::Unresolved { query, reason } => {
                debug!(drug = %query, %reason, "reporting unresolved drug as not found");
                DrugSafetyRecord::not_found(query.as_str())
            }
        }
    }
}

pub struct DrugSafetyService {
    dispatcher: RemoteFirst<DrugQuery, DrugSafetyRecord>,
}

impl DrugSafetyService {
    pub fn new(remote: Option<ToolClient>, source: Arc<dyn DrugLabelSource>) -> Self {
        let mut dispatcher = RemoteFirst::new();
        if let Some(client) = remote {
            dispatcher = dispatcher.then(RemoteDrugStrategy::new(client));
        }
        Self::from_dispatcher(dispatcher.then(PublicLabelStrategy::new(source)))
    }

    pub fn from_dispatcher(dispatcher: RemoteFirst<DrugQuery, DrugSafetyRecord>) -> Self {
        debug!(strategies = ?dispatcher.strategy_names(), "drug safety strategies");
        Self { dispatcher }
    }

    pub fn check(&self, query: &DrugQuery) -> DrugOutcome {
        match self.dispatcher.dispatch(query) {
            Ok(record) => DrugOutcome::Resolved(record),
            Err(err) => {
                warn!(drug = %query, error = %err, "drug safety check failed on every path");
                DrugOutcome::Unresolved {
                    query: query.clone(),
                    reason: err.to_string(),
                }
            }
        }
    }
}
