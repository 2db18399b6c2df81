use std::io::{self, Write};

use anyhow::Result;

use crate::cli::SearchArgs;
use crate::dispatch::GuidelineService;
use crate::kb::SemanticRetriever;
use crate::model::{GuidelineLookup, RetrievalHit};
use crate::util::print_json;
use crate::verify::truncate_for_display;

use super::context::{open_index_cache, tool_client};

pub fn run(args: SearchArgs) -> Result<()> {
    let retriever = SemanticRetriever::new(open_index_cache(&args.kb)?);

    if args.local_hits {
        let hits = retriever.search(&args.query, args.top_k);
        return if args.json {
            print_json(&hits)
        } else {
            write_hits(&args.query, &hits)
        };
    }

    let remote = tool_client(
        &args.tools.kb_tool_url,
        args.tools.kb_timeout_ms,
        args.tools.no_remote,
    )?;
    let lookup = GuidelineService::new(remote, retriever).fetch(&args.query, args.top_k);
    if args.json {
        print_json(&lookup)
    } else {
        write_lookup(&lookup)
    }
}

fn write_lookup(lookup: &GuidelineLookup) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(output, "Query: {}", lookup.query_used)?;
    writeln!(output, "Snippets: {}", lookup.guideline_snippets.len())?;
    for (position, snippet) in lookup.guideline_snippets.iter().enumerate() {
        writeln!(output, "{}.\t{}", position + 1, truncate_for_display(snippet))?;
    }
    output.flush()?;
    Ok(())
}

fn write_hits(query: &str, hits: &[RetrievalHit]) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(output, "Query: {}", query.trim())?;
    writeln!(output, "Results: {}", hits.len())?;
    for hit in hits {
        writeln!(
            output,
            "{}.\tchunk={}\tdistance={:.6}",
            hit.rank + 1,
            hit.chunk_index,
            hit.distance
        )?;
        writeln!(output, "\t{}", truncate_for_display(&hit.passage))?;
    }
    output.flush()?;
    Ok(())
}
