use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    pub content: String,
    /// Username of the creator, copied at creation time.
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub likes: i64,
    pub liked_by: Vec<String>,
    pub comments: Vec<Comment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub username: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub author: String,
    pub image_url: Option<String>,
}

impl NewPost {
    pub fn new(
        title: Option<String>,
        content: Option<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            title: title.unwrap_or_default().trim().to_string(),
            content: content.unwrap_or_default(),
            author: author.into(),
            image_url: None,
        }
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.title.trim().is_empty() || self.content.trim().is_empty() {
            return Err(StoreError::Validation(
                "Title and content are required".into(),
            ));
        }
        Ok(())
    }
}

/// Partial update; absent or blank fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostPatch {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl PostPatch {
    pub fn normalized(self) -> Result<Self, StoreError> {
        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let content = self.content.filter(|c| !c.trim().is_empty());

        if title.is_none() && content.is_none() {
            return Err(StoreError::Validation("Nothing to update".into()));
        }
        Ok(Self { title, content })
    }
}

/// Lowercased needle for the store's `fold()` substring match.
pub fn search_needle(query: &str) -> Result<String, StoreError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(StoreError::Validation("Search query is required".into()));
    }
    Ok(query.to_lowercase())
}

pub fn comment_text(raw: &str) -> Result<&str, StoreError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(StoreError::Validation("Comment is required".into()));
    }
    Ok(text)
}
