//! Blog model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A blog post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blog {
    /// Unique identifier
    pub id: i64,
    pub title: String,
    /// URL-safe unique identifier derived from the title
    pub slug: String,
    /// Markdown source
    pub content: String,
    /// Owner
    pub author_id: i64,
    pub category_id: Option<i64>,
    pub is_published: bool,
    /// Number of detail page reads
    pub views: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Blog {
    pub fn new(
        title: String,
        slug: String,
        content: String,
        author_id: i64,
        category_id: Option<i64>,
        is_published: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            title,
            slug,
            content,
            author_id,
            category_id,
            is_published,
            views: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Published posts are public, drafts only visible to their author
    pub fn is_visible_to(&self, user_id: Option<i64>) -> bool {
        self.is_published || user_id == Some(self.author_id)
    }
}

/// Blog joined with the names listings and detail pages display
#[derive(Debug, Clone, Serialize)]
pub struct BlogWithMeta {
    #[serde(flatten)]
    pub blog: Blog,
    pub author_username: String,
    pub category_name: Option<String>,
    pub like_count: i64,
}

/// Input for creating a blog
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBlogInput {
    pub title: String,
    pub content: String,
    pub category_id: Option<i64>,
    pub is_published: bool,
}

/// Input for updating a blog
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateBlogInput {
    pub title: String,
    pub content: String,
    pub category_id: Option<i64>,
    pub is_published: bool,
}

/// Composable listing filter, translated to a parameterised WHERE clause
#[derive(Debug, Clone, Default)]
pub struct BlogFilter {
    /// Case-insensitive substring of title, content or author username
    pub search: Option<String>,
    pub category_id: Option<i64>,
    pub author_id: Option<i64>,
    /// Drop drafts
    pub published_only: bool,
}

impl BlogFilter {
    /// Published posts, newest first
    pub fn published() -> Self {
        Self {
            published_only: true,
            ..Default::default()
        }
    }

    /// Keep the search term only when it is non-blank
    pub fn with_search(mut self, search: Option<&str>) -> Self {
        self.search = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        self
    }

    pub fn with_category(mut self, category_id: Option<i64>) -> Self {
        self.category_id = category_id;
        self
    }

    pub fn with_author(mut self, author_id: i64) -> Self {
        self.author_id = Some(author_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_visible_only_to_author() {
        let mut blog = Blog::new("T".into(), "t".into(), "c".into(), 7, None, false);
        assert!(!blog.is_visible_to(None));
        assert!(!blog.is_visible_to(Some(8)));
        assert!(blog.is_visible_to(Some(7)));

        blog.is_published = true;
        assert!(blog.is_visible_to(None));
    }

    #[test]
    fn test_blank_search_is_dropped() {
        assert_eq!(BlogFilter::published().with_search(Some("   ")).search, None);
        assert_eq!(BlogFilter::published().with_search(None).search, None);
        assert_eq!(
            BlogFilter::published().with_search(Some("  rust ")).search.as_deref(),
            Some("rust")
        );
    }
}
