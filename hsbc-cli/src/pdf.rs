use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::Path;

/// Per-page lines from a PDF eStatement or a pre-extracted text file.
///
/// Text files are split into pages on form feed.
pub fn read_pages(path: &Path) -> Result<Vec<Vec<String>>> {
    let is_pdf = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        pdf_pages(path)
    } else {
        let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Ok(hsbc_ingest::normalize::split_pages(&text))
    }
}

pub fn pdf_pages(path: &Path) -> Result<Vec<Vec<String>>> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    tracing::debug!(bytes = bytes.len(), path = %path.display(), "read pdf");

    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
        .map_err(|e| anyhow!("extract text from {}: {e}", path.display()))?;
    tracing::debug!(pages = pages.len(), "extracted pdf text");

    Ok(pages
        .iter()
        .map(|page| page.lines().map(str::to_string).collect())
        .collect())
}
