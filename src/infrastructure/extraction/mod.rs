//! Attachment text extraction.
//!
//! Plain text formats are decoded as UTF-8, PDF goes through `lopdf`, Word through
//! `docx-rs`. Images and anything else are reported as unsupported.

mod docx;
mod pdf;
mod text;

use crate::domain::error::{AppError, Result};
use crate::domain::issue::{AttachmentMeta, ProcessedAttachment};
use crate::shared::TokenCounter;
use tracing::debug;

/// Default cap on extracted text per attachment, in estimated tokens
pub const DEFAULT_MAX_ATTACHMENT_TOKENS: usize = 6_000;

pub trait DocumentExtractor: Send + Sync {
    /// Fails with `UnsupportedFormat` or `ExtractionError`.
    fn extract_text(&self, attachment: &AttachmentMeta, bytes: &[u8])
        -> Result<ProcessedAttachment>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DocumentKind {
    Text,
    Pdf,
    Docx,
    Image,
    Unknown,
}

impl DocumentKind {
    pub(crate) fn detect(attachment: &AttachmentMeta) -> Self {
        if let Some(ext) = attachment.extension() {
            match ext.as_str() {
                "txt" | "md" | "markdown" | "csv" | "json" | "log" | "feature" | "xml" | "yaml"
                | "yml" => return DocumentKind::Text,
                "pdf" => return DocumentKind::Pdf,
                "docx" => return DocumentKind::Docx,
                "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp" | "tiff" => {
                    return DocumentKind::Image
                }
                _ => {}
            }
        }

        match attachment.mime_type.as_deref().unwrap_or_default() {
            "application/pdf" => DocumentKind::Pdf,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                DocumentKind::Docx
            }
            "application/json" | "application/xml" => DocumentKind::Text,
            mime if mime.starts_with("text/") => DocumentKind::Text,
            mime if mime.starts_with("image/") => DocumentKind::Image,
            _ => DocumentKind::Unknown,
        }
    }
}

pub struct LocalDocumentExtractor {
    max_tokens_per_attachment: usize,
}

impl LocalDocumentExtractor {
    pub fn new(max_tokens_per_attachment: usize) -> Self {
        Self {
            max_tokens_per_attachment,
        }
    }
}

impl Default for LocalDocumentExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTACHMENT_TOKENS)
    }
}

impl DocumentExtractor for LocalDocumentExtractor {
    fn extract_text(
        &self,
        attachment: &AttachmentMeta,
        bytes: &[u8],
    ) -> Result<ProcessedAttachment> {
        let kind = DocumentKind::detect(attachment);
        let raw = match kind {
            DocumentKind::Text => text::extract(bytes),
            DocumentKind::Pdf => pdf::extract(bytes)?,
            DocumentKind::Docx => docx::extract(bytes)?,
            DocumentKind::Image => {
                return Err(AppError::UnsupportedFormat(format!(
                    "{} is an image; OCR is not available",
                    attachment.filename
                )))
            }
            DocumentKind::Unknown => {
                return Err(AppError::UnsupportedFormat(format!(
                    "Cannot extract text from {}",
                    attachment.filename
                )))
            }
        };

        let trimmed = raw.trim();
        let (text, truncated) =
            TokenCounter::truncate_to_budget(trimmed, self.max_tokens_per_attachment);
        debug!(
            filename = %attachment.filename,
            kind = ?kind,
            chars = text.chars().count(),
            truncated,
            "Extracted attachment text"
        );

        Ok(ProcessedAttachment {
            attachment_id: attachment.id.clone(),
            filename: attachment.filename.clone(),
            mime_type: attachment.mime_type.clone(),
            char_count: text.chars().count(),
            text,
            truncated,
        })
    }
}
