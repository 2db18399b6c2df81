use std::sync::Arc;

use tracing::info;

use crate::dispatch::{DrugOutcome, DrugSafetyService};
use crate::model::{BatchReport, DrugQuery, DrugSafetyRecord};

pub const DISPLAY_TEXT_LIMIT: usize = 1000;
pub const DISPLAY_TEXT_CUT: usize = 950;
const ELLIPSIS: &str = "...";

/// Shortens text longer than `DISPLAY_TEXT_LIMIT` characters to the last whole word
/// within the first `DISPLAY_TEXT_CUT` characters, followed by an ellipsis.
pub fn truncate_for_display(text: &str) -> String {
    if text.chars().count() <= DISPLAY_TEXT_LIMIT {
        return text.to_string();
    }

    let head_end = text
        .char_indices()
        .nth(DISPLAY_TEXT_CUT)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len());
    let head = &text[..head_end];
    let cut = match head.rfind(char::is_whitespace) {
        Some(boundary) => head[..boundary].trim_end(),
        None => head,
    };
    format!("{cut}{ELLIPSIS}")
}

/// Splits raw name arguments on commas and drops anything empty after trimming.
pub fn parse_drug_queries<S: AsRef<str>>(names: &[S]) -> Vec<DrugQuery> {
    names
        .iter()
        .flat_map(|name| name.as_ref().split(','))
        .filter_map(DrugQuery::parse)
        .collect()
}

/// Checks each drug independently, in input order; one failing drug never aborts the batch.
pub struct BatchVerifier {
    service: Arc<DrugSafetyService>,
}

impl BatchVerifier {
    pub fn new(service: Arc<DrugSafetyService>) -> Self {
        Self { service }
    }

    pub fn verify_batch<S: AsRef<str>>(&self, names: &[S]) -> BatchReport {
        let queries = names
            .iter()
            .filter_map(|name| DrugQuery::parse(name.as_ref()))
            .collect::<Vec<DrugQuery>>();
        self.verify_queries(&queries)
    }

    pub fn verify_queries(&self, queries: &[DrugQuery]) -> BatchReport {
        info!(drugs = queries.len(), "starting drug safety batch");

        let outcomes = queries
            .iter()
            .map(|query| self.service.check(query))
            .collect::<Vec<DrugOutcome>>();
        let unresolved = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, DrugOutcome::Unresolved { .. }))
            .count();

        let records = outcomes
            .into_iter()
            .map(DrugOutcome::into_record)
            .map(for_display)
            .collect::<Vec<DrugSafetyRecord>>();
        let found = records.iter().filter(|record| record.found).count();

        info!(
            drugs = records.len(),
            found,
            unresolved,
            "drug safety batch completed"
        );
        BatchReport::from_records(records)
    }
}

fn for_display(mut record: DrugSafetyRecord) -> DrugSafetyRecord {
    record.warnings = truncate_for_display(&record.warnings);
    record
}
