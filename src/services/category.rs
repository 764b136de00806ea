//! Category service
//!
//! Categories are a flat list managed by administrators. Deleting one
//! leaves its blogs uncategorised.

use crate::db::repositories::CategoryRepository;
use crate::models::{Category, CategoryWithCount, CreateCategoryInput};
use anyhow::Context;
use std::sync::Arc;

/// Maximum length of a category name
pub const MAX_CATEGORY_NAME_LENGTH: usize = 100;

/// Error types for category service operations
#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    /// Category name already exists
    #[error("Category with this name already exists: {0}")]
    DuplicateName(String),

    #[error("Category not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>) -> Self {
        Self { repo }
    }

    /// All categories ordered by name
    pub async fn list(&self) -> Result<Vec<Category>, CategoryServiceError> {
        Ok(self.repo.list().await.context("Failed to list categories")?)
    }

    /// All categories with their published-blog counts
    pub async fn list_with_counts(&self) -> Result<Vec<CategoryWithCount>, CategoryServiceError> {
        Ok(self
            .repo
            .list_with_counts()
            .await
            .context("Failed to list categories")?)
    }

    pub async fn get(&self, id: i64) -> Result<Category, CategoryServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get category")?
            .ok_or(CategoryServiceError::NotFound(id))
    }

    /// Create a category. Names are unique, compared case-insensitively.
    pub async fn create(&self, input: CreateCategoryInput) -> Result<Category, CategoryServiceError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(CategoryServiceError::ValidationError(
                "Category name cannot be empty".to_string(),
            ));
        }
        if name.chars().count() > MAX_CATEGORY_NAME_LENGTH {
            return Err(CategoryServiceError::ValidationError(format!(
                "Category name cannot exceed {} characters",
                MAX_CATEGORY_NAME_LENGTH
            )));
        }

        if self
            .repo
            .get_by_name(&name)
            .await
            .context("Failed to check category name")?
            .is_some()
        {
            return Err(CategoryServiceError::DuplicateName(name));
        }

        let category = Category::new(name, input.description.trim().to_string());
        let created = self
            .repo
            .create(&category)
            .await
            .context("Failed to create category")?;

        tracing::info!("Created category '{}' ({})", created.name, created.id);
        Ok(created)
    }

    pub async fn delete(&self, id: i64) -> Result<(), CategoryServiceError> {
        let deleted = self.repo.delete(id).await.context("Failed to delete category")?;
        if !deleted {
            return Err(CategoryServiceError::NotFound(id));
        }
        tracing::info!("Deleted category {}", id);
        Ok(())
    }
}
