//! Document model.
//!
//! # Invariants
//! - `provenance.extracted_text` is never mutated after ingest; re-ingest
//!   with `force` rebuilds atoms but keeps the document id.
//! - `checksum` is the sha256 of the extracted text.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::digest::sha256_hex;

pub type DocumentId = Uuid;

/// Ingested corpus unit and root of branch lineages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub checksum: String,
    /// Ingest metadata; always carries `extracted_text`.
    pub provenance: Value,
    /// Epoch ms.
    pub created_at: i64,
}

impl Document {
    /// Builds a not-yet-persisted document from plain text.
    pub fn from_text(title: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            checksum: sha256_hex(&text),
            provenance: json!({ "extracted_text": text, "source": "text" }),
            created_at: 0,
        }
    }

    /// Extracted plain text, or empty when provenance lacks it.
    pub fn extracted_text(&self) -> &str {
        self.provenance
            .get("extracted_text")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}
