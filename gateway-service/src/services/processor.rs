//! Parses a raw markdown document into a servable artifact: frontmatter
//! metadata plus rendered body.

use chrono::NaiveDate;
use pulldown_cmark::{html, Options, Parser};
use serde::Deserialize;
use service_core::error::AppError;

use crate::models::DocumentArtifact;

const WORDS_PER_MINUTE: usize = 200;
const EXCERPT_MAX_CHARS: usize = 200;

#[derive(Debug, Default, Deserialize)]
struct Frontmatter {
    title: Option<String>,
    date: Option<String>,
    description: Option<String>,
    excerpt: Option<String>,
}

/// Derive (content_type, slug) from a repository path like
/// `content/notes/my-note.md`.
pub fn document_location(path: &str, content_root: &str) -> Result<(String, String), AppError> {
    let rel = path
        .strip_prefix(&format!("{}/", content_root))
        .ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("Path is outside the content root: {}", path))
        })?;

    let mut parts = rel.splitn(2, '/');
    let content_type = parts.next().unwrap_or_default();
    let file = parts.next().ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!("Path has no document segment: {}", path))
    })?;

    let slug = file
        .rsplit('/')
        .next()
        .unwrap_or(file)
        .strip_suffix(".md")
        .ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("Not a markdown document: {}", path))
        })?;

    if content_type.is_empty() || slug.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Path has empty type or slug: {}",
            path
        )));
    }

    Ok((content_type.to_string(), slug.to_string()))
}

/// Parse and render one document. Visibility is left unset (`false`); the
/// reconciler classifies it against the Policy Store.
pub fn process_document(
    path: &str,
    raw: &str,
    content_root: &str,
) -> Result<DocumentArtifact, AppError> {
    let (content_type, slug) = document_location(path, content_root)?;

    let (frontmatter_src, body) = split_frontmatter(raw);
    let frontmatter = match frontmatter_src {
        Some(src) => serde_yaml::from_str::<Frontmatter>(src).map_err(|e| {
            AppError::BadRequest(anyhow::anyhow!("Invalid frontmatter in {}: {}", path, e))
        })?,
        None => Frontmatter::default(),
    };

    let title = frontmatter
        .title
        .or_else(|| first_heading(body))
        .unwrap_or_else(|| title_from_slug(&slug));

    let date = match frontmatter.date.as_deref() {
        Some(raw_date) => match NaiveDate::parse_from_str(raw_date, "%Y-%m-%d") {
            Ok(d) => Some(d),
            Err(_) => {
                tracing::warn!(path = %path, date = %raw_date, "Unparseable frontmatter date");
                None
            }
        },
        None => None,
    };

    let word_count = body.split_whitespace().count();
    let reading_time_minutes = word_count.div_ceil(WORDS_PER_MINUTE).max(1) as u32;

    let excerpt = frontmatter
        .description
        .or(frontmatter.excerpt)
        .unwrap_or_else(|| first_paragraph_excerpt(body));

    Ok(DocumentArtifact {
        slug,
        content_type,
        title,
        date,
        reading_time_minutes,
        excerpt,
        rendered_body: render_markdown(body),
        is_protected: false,
    })
}

fn render_markdown(body: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_FOOTNOTES);

    let parser = Parser::new_ext(body, options);
    let mut out = String::with_capacity(body.len() * 2);
    html::push_html(&mut out, parser);
    out
}

fn split_frontmatter(raw: &str) -> (Option<&str>, &str) {
    let Some(after) = raw
        .strip_prefix("---\n")
        .or_else(|| raw.strip_prefix("---\r\n"))
    else {
        return (None, raw);
    };

    for marker in ["\n---\n", "\n---\r\n"] {
        if let Some(idx) = after.find(marker) {
            return (Some(&after[..idx]), &after[idx + marker.len()..]);
        }
    }
    if let Some(stripped) = after.strip_suffix("\n---") {
        return (Some(stripped), "");
    }

    (None, raw)
}

fn first_heading(body: &str) -> Option<String> {
    body.lines()
        .map(str::trim)
        .find(|l| l.starts_with("# "))
        .map(|l| l.trim_start_matches("# ").trim().to_string())
}

fn title_from_slug(slug: &str) -> String {
    slug.replace(['-', '_'], " ")
}

fn first_paragraph_excerpt(body: &str) -> String {
    let paragraph = body
        .split("\n\n")
        .map(str::trim)
        .find(|p| !p.is_empty() && !p.starts_with('#'))
        .unwrap_or("");

    let text: String = paragraph
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(" ");

    if text.chars().count() <= EXCERPT_MAX_CHARS {
        text
    } else {
        let truncated: String = text.chars().take(EXCERPT_MAX_CHARS).collect();
        format!("{}…", truncated.trim_end())
    }
}
