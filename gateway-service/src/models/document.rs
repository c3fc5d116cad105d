use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Processed, renderable form of a source document, as written to object
/// storage. Visibility is derived from the Policy Store at sync time and is
/// never persisted back into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentArtifact {
    pub slug: String,
    pub content_type: String,
    pub title: String,
    pub date: Option<NaiveDate>,
    pub reading_time_minutes: u32,
    pub excerpt: String,
    pub rendered_body: String,
    pub is_protected: bool,
}

impl DocumentArtifact {
    /// Object-storage key for this artifact within its visibility prefix.
    pub fn storage_key(&self) -> String {
        format!("{}/{}.json", self.content_type, self.slug)
    }
}
