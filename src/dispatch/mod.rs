//! Remote-first lookups: an ordered list of strategies, first success wins.
//!
//! Every strategy of a dispatcher produces the same result type, so callers cannot
//! tell whether the tool service or a fallback answered.

mod drug;
mod guideline;
mod tool_client;
#[cfg(test)]
mod tests;

use anyhow::Result;
use tracing::{debug, warn};

use crate::error::DispatchExhausted;

pub use drug::{DrugOutcome, DrugSafetyService};
pub use guideline::{DEFAULT_TOP_K, GuidelineRequest, GuidelineService, LocalGuidelineStrategy};
pub use tool_client::ToolClient;

pub trait LookupStrategy<Q, R>: Send + Sync {
    fn name(&self) -> &'static str;

    fn attempt(&self, request: &Q) -> Result<R>;
}

pub struct RemoteFirst<Q, R> {
    strategies: Vec<Box<dyn LookupStrategy<Q, R>>>,
}

impl<Q, R> RemoteFirst<Q, R> {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    pub fn then(mut self, strategy: impl LookupStrategy<Q, R> + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|strategy| strategy.name()).collect()
    }

    pub fn dispatch(&self, request: &Q) -> Result<R, DispatchExhausted> {
        let mut last_error = String::from("no strategies configured");
        for strategy in &self.strategies {
            match strategy.attempt(request) {
                Ok(result) => {
                    debug!(strategy = strategy.name(), "lookup strategy answered");
                    return Ok(result);
                }
                Err(err) => {
                    last_error = format!("{err:#}");
                    warn!(
                        strategy = strategy.name(),
                        error = %last_error,
                        "lookup strategy failed; trying next"
                    );
                }
            }
        }

        Err(DispatchExhausted {
            attempted: self.strategies.len(),
            last_error,
        })
    }
}

impl<Q, R> Default for RemoteFirst<Q, R> {
    fn default() -> Self {
        Self::new()
    }
}
