//! Catalog of synchronized documents, assembled from the storage key
//! listings rather than the source repository.

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Serialize;

use crate::AppState;
use service_core::error::AppError;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(rename = "type")]
    pub content_type: String,
    pub slug: String,
    pub protected: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogResponse {
    pub documents: Vec<CatalogEntry>,
    pub total: usize,
}

/// GET /api/content-catalog
pub async fn get_catalog(State(state): State<AppState>) -> Result<Json<CatalogResponse>, AppError> {
    build_catalog(&state, None).await
}

/// GET /api/content-catalog/{type}
pub async fn get_catalog_by_type(
    State(state): State<AppState>,
    Path(content_type): Path<String>,
) -> Result<Json<CatalogResponse>, AppError> {
    build_catalog(&state, Some(&content_type)).await
}

async fn build_catalog(
    state: &AppState,
    content_type: Option<&str>,
) -> Result<Json<CatalogResponse>, AppError> {
    let mut documents = Vec::new();

    for (storage, protected) in [
        (&state.public_storage, false),
        (&state.protected_storage, true),
    ] {
        for key in storage.list().await? {
            let Some(entry) = entry_from_key(&key, protected) else {
                continue;
            };
            if content_type.map_or(true, |ct| entry.content_type == ct) {
                documents.push(entry);
            }
        }
    }

    documents.sort_by(|a, b| {
        (a.content_type.as_str(), a.slug.as_str()).cmp(&(b.content_type.as_str(), b.slug.as_str()))
    });

    let total = documents.len();
    Ok(Json(CatalogResponse { documents, total }))
}

fn entry_from_key(key: &str, protected: bool) -> Option<CatalogEntry> {
    let (content_type, file) = key.split_once('/')?;
    let slug = file.strip_suffix(".json")?;
    if content_type.is_empty() || slug.is_empty() || slug.contains('/') {
        return None;
    }
    Some(CatalogEntry {
        content_type: content_type.to_string(),
        slug: slug.to_string(),
        protected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_parsing() {
        let entry = entry_from_key("notes/my-note.json", true).unwrap();
        assert_eq!(entry.content_type, "notes");
        assert_eq!(entry.slug, "my-note");
        assert!(entry.protected);

        assert!(entry_from_key("stray.json", false).is_none());
        assert!(entry_from_key("notes/sub/deep.json", false).is_none());
        assert!(entry_from_key("notes/readme.md", false).is_none());
    }
}
