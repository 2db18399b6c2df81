use std::fs;
use std::path::Path;
use std::process::Command;

use regex::Regex;
use tracing::debug;

use crate::error::KbError;

/// Reads the guideline document and joins its pages in page order.
pub fn load_document_text(path: &Path) -> Result<String, KbError> {
    if !path.is_file() {
        return Err(KbError::DocumentNotFound(path.to_path_buf()));
    }

    let pages = if is_pdf(path) {
        extract_pages_with_pdftotext(path)?
    } else {
        let raw = fs::read_to_string(path).map_err(|err| KbError::DocumentRead {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        split_pages(&raw)
    };
    debug!(path = %path.display(), pages = pages.len(), "extracted document pages");

    let blank_line_runs = Regex::new(r"\n{2,}").map_err(|err| KbError::DocumentRead {
        path: path.to_path_buf(),
        reason: format!("failed to compile blank-line pattern: {err}"),
    })?;
    Ok(join_pages(&pages, &blank_line_runs))
}

fn join_pages(pages: &[String], blank_line_runs: &Regex) -> String {
    let joined = pages.join("\n");
    blank_line_runs.replace_all(&joined, "\n").into_owned()
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

fn split_pages(raw: &str) -> Vec<String> {
    let mut pages = raw
        .split('\u{000C}')
        .map(|page| page.replace('\u{0000}', ""))
        .collect::<Vec<String>>();

    while pages.last().is_some_and(|page| page.trim().is_empty()) {
        pages.pop();
    }
    pages
}

fn extract_pages_with_pdftotext(pdf_path: &Path) -> Result<Vec<String>, KbError> {
    let read_error = |reason: String| KbError::DocumentRead {
        path: pdf_path.to_path_buf(),
        reason,
    };

    let output = Command::new("pdftotext")
        .arg("-enc")
        .arg("UTF-8")
        .arg(pdf_path)
        .arg("-")
        .output()
        .map_err(|err| read_error(format!("failed to execute pdftotext: {err}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(read_error(format!(
            "pdftotext returned non-zero exit status: {}",
            stderr.trim()
        )));
    }

    Ok(split_pages(&String::from_utf8_lossy(&output.stdout)))
}
