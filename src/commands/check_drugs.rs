use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

use crate::cli::CheckDrugsArgs;
use crate::dispatch::DrugSafetyService;
use crate::model::BatchReport;
use crate::util::print_json;
use crate::verify::{BatchVerifier, parse_drug_queries};

use super::context::{openfda_client, tool_client};

pub fn run(args: CheckDrugsArgs) -> Result<()> {
    let queries = parse_drug_queries(&args.names);
    if queries.is_empty() {
        warn!("no usable drug names given");
    }

    let remote = tool_client(
        &args.tools.fda_tool_url,
        args.tools.fda_timeout_ms,
        args.tools.no_remote,
    )?;
    let service = DrugSafetyService::new(remote, openfda_client(&args.openfda)?);
    let report = BatchVerifier::new(Arc::new(service)).verify_queries(&queries);

    if args.json {
        print_json(&report)
    } else {
        write_report(&report)
    }
}

fn write_report(report: &BatchReport) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(output, "Drugs checked: {}", report.count)?;
    for record in &report.results {
        let marker = if record.found { "found" } else { "not found" };
        writeln!(output, "- {} ({marker})", record.drug_name)?;
        writeln!(output, "\tbrand: {}", record.brand)?;
        writeln!(output, "\tgeneric: {}", record.generic)?;
        writeln!(output, "\twarnings: {}", record.warnings)?;
    }
    output.flush()?;
    Ok(())
}
