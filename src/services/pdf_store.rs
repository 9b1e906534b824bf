use anyhow::{Context, Result};
use base64::Engine;
use std::path::PathBuf;

/// A stored PDF, ready to embed in a document block.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfContent {
    pub file_name: String,
    pub base64_data: String,
}

#[async_trait::async_trait]
pub trait PdfStore: Send + Sync {
    async fn get_pdf_content(&self, file_id: &str) -> Result<PdfContent>;
}

/// PDFs kept as `<id>.pdf` files in one directory.
pub struct DirectoryPdfStore {
    root: PathBuf,
}

impl DirectoryPdfStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait::async_trait]
impl PdfStore for DirectoryPdfStore {
    async fn get_pdf_content(&self, file_id: &str) -> Result<PdfContent> {
        if file_id.is_empty() || file_id.contains(['/', '\\']) || file_id.contains("..") {
            anyhow::bail!("Invalid PDF id: {:?}", file_id);
        }

        let file_name = format!("{}.pdf", file_id);
        let path = self.root.join(&file_name);
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read PDF {}", path.display()))?;

        log::info!("PdfStore: loaded {} ({} bytes)", file_name, bytes.len());

        Ok(PdfContent {
            file_name,
            base64_data: base64::engine::general_purpose::STANDARD.encode(bytes),
        })
    }
}
