use serde::{Deserialize, Serialize};
use url::Url;

use super::errors::ValidationError;

/// A saved bookmark as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub title: String,
    pub url: String,
    /// Principal id of the session that created the record.
    pub owner: String,
    /// Unix milliseconds, assigned by the store.
    pub created_at: i64,
}

/// User input for a bookmark that has passed client-side validation.
///
/// The only way to obtain one is [`NewBookmark::parse`], so a store never
/// sees an empty title or a malformed URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBookmark {
    title: String,
    url: String,
}

impl NewBookmark {
    /// Validates raw form input.
    ///
    /// The title must be non-empty after trimming and is kept trimmed. The URL
    /// must parse as an absolute URL with a host; it is kept as submitted
    /// (minus surrounding whitespace) rather than in normalised form.
    ///
    /// The host requirement is stricter than a plain absolute-URL parse:
    /// `javascript:`, `mailto:` and `data:` URLs parse fine but carry no host,
    /// and are rejected because stored URLs end up as clickable links.
    pub fn parse(title: &str, url: &str) -> Result<Self, ValidationError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }

        let url = url.trim();
        let parsed = Url::parse(url).map_err(|_| ValidationError::InvalidUrl(url.to_string()))?;
        if !parsed.has_host() {
            return Err(ValidationError::InvalidUrl(url.to_string()));
        }

        Ok(Self {
            title: title.to_string(),
            url: url.to_string(),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Row selector for store reads and deletes. Every filter is owner-scoped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkFilter {
    pub owner: String,
    pub id: Option<String>,
}

impl BookmarkFilter {
    /// All bookmarks belonging to `owner`.
    pub fn owned_by(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            id: None,
        }
    }

    /// A single bookmark, and only if `owner` holds it.
    pub fn single(owner: &str, id: &str) -> Self {
        Self {
            owner: owner.to_string(),
            id: Some(id.to_string()),
        }
    }
}
