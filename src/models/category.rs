//! Category model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A flat, admin-managed grouping for blogs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    /// Unique identifier
    pub id: i64,
    /// Category name (unique)
    pub name: String,
    /// Free-form description, may be empty
    pub description: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn new(name: String, description: String) -> Self {
        Self {
            id: 0, // Will be set by the database
            name,
            description,
            created_at: Utc::now(),
        }
    }
}

/// Category with the number of published blogs in it
#[derive(Debug, Clone, Serialize)]
pub struct CategoryWithCount {
    #[serde(flatten)]
    pub category: Category,
    pub blog_count: i64,
}

/// Input for creating a category
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
}
