//! Text extraction from uploaded files

use serde_json::json;
use tracing::debug;

use llamadesk_core::{Document, Error, Result, SourceFile};

/// Extract one document per file.
///
/// PDFs go through `pdf-extract`; `.txt` and `.md` must be UTF-8. Any other
/// extension is rejected before anything is read.
pub fn load_documents(files: &[SourceFile]) -> Result<Vec<Document>> {
    files.iter().enumerate().map(|(i, file)| load_one(i, file)).collect()
}

fn load_one(index: usize, file: &SourceFile) -> Result<Document> {
    let content = match file.extension().as_deref() {
        Some("pdf") => pdf_extract::extract_text_from_mem(&file.bytes).map_err(|e| {
            Error::InvalidInput(format!("Could not read PDF '{}': {}", file.name, e))
        })?,
        Some("txt") | Some("md") => String::from_utf8(file.bytes.clone()).map_err(|_| {
            Error::InvalidInput(format!("'{}' is not valid UTF-8 text", file.name))
        })?,
        _ => {
            return Err(Error::InvalidInput(format!(
                "Unsupported file type: '{}' (expected .pdf, .txt or .md)",
                file.name
            )));
        }
    };

    debug!(file = %file.name, chars = content.chars().count(), "extracted text");

    Ok(Document {
        id: format!("doc-{}", index),
        source: file.name.clone(),
        content,
        metadata: json!({ "source": file.name }),
    })
}
