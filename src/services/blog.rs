//! Blog service
//!
//! Listing with search, category filter and pagination; the detail view
//! and its view counter; create, update and delete restricted to the
//! post's author; unique slug generation.

use crate::db::repositories::{BlogRepository, CategoryRepository};
use crate::models::{
    Blog, BlogFilter, BlogWithMeta, CreateBlogInput, ListParams, PagedResult, UpdateBlogInput, User,
};
use anyhow::Context;
use std::sync::Arc;

/// Maximum length of a blog title
pub const MAX_TITLE_LENGTH: usize = 200;

/// Path segments that share the `/blog/{slug}/` namespace
const RESERVED_SLUGS: &[&str] = &["azadd"];

/// Slug used when a title has no ASCII letters or digits
const FALLBACK_SLUG: &str = "post";

#[derive(Debug, thiserror::Error)]
pub enum BlogServiceError {
    #[error("Blog not found: {0}")]
    NotFound(String),

    /// The user is not the post's author
    #[error("You do not have permission to change this blog")]
    Forbidden,

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The chosen category does not exist
    #[error("Category not found: {0}")]
    InvalidCategory(i64),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct BlogService {
    blog_repo: Arc<dyn BlogRepository>,
    category_repo: Arc<dyn CategoryRepository>,
    posts_per_page: u32,
}

impl BlogService {
    pub fn new(
        blog_repo: Arc<dyn BlogRepository>,
        category_repo: Arc<dyn CategoryRepository>,
        posts_per_page: u32,
    ) -> Self {
        Self {
            blog_repo,
            category_repo,
            posts_per_page: posts_per_page.max(1),
        }
    }

    /// One page of blogs matching `filter`.
    ///
    /// `raw_page` is the unparsed `page` query value; see [`ListParams::resolve`].
    pub async fn list(
        &self,
        filter: &BlogFilter,
        raw_page: Option<&str>,
    ) -> Result<PagedResult<BlogWithMeta>, BlogServiceError> {
        let total = self.blog_repo.count(filter).await.context("Failed to count blogs")?;
        let params = ListParams::resolve(raw_page, total, self.posts_per_page);
        let items = self
            .blog_repo
            .list(filter, &params)
            .await
            .context("Failed to list blogs")?;
        Ok(PagedResult::new(items, total, &params))
    }

    /// Look up a blog the viewer may see. Drafts are hidden from everyone
    /// but their author.
    pub async fn get_visible(
        &self,
        slug: &str,
        viewer: Option<&User>,
    ) -> Result<BlogWithMeta, BlogServiceError> {
        let blog = self
            .blog_repo
            .get_by_slug(slug)
            .await
            .context("Failed to get blog")?
            .ok_or_else(|| BlogServiceError::NotFound(slug.to_string()))?;

        if !blog.blog.is_visible_to(viewer.map(|u| u.id)) {
            return Err(BlogServiceError::NotFound(slug.to_string()));
        }
        Ok(blog)
    }

    /// Detail view: like [`get_visible`](Self::get_visible), and counts the read.
    pub async fn view(
        &self,
        slug: &str,
        viewer: Option<&User>,
    ) -> Result<BlogWithMeta, BlogServiceError> {
        let mut blog = self.get_visible(slug, viewer).await?;
        self.blog_repo
            .increment_views(blog.blog.id)
            .await
            .context("Failed to count view")?;
        blog.blog.views += 1;
        Ok(blog)
    }

    /// Look up a blog for editing; only its author gets it.
    pub async fn get_owned(&self, slug: &str, user: &User) -> Result<BlogWithMeta, BlogServiceError> {
        let blog = self
            .blog_repo
            .get_by_slug(slug)
            .await
            .context("Failed to get blog")?
            .ok_or_else(|| BlogServiceError::NotFound(slug.to_string()))?;

        if !user.owns(blog.blog.author_id) {
            tracing::warn!("User '{}' denied access to blog '{}'", user.username, slug);
            return Err(BlogServiceError::Forbidden);
        }
        Ok(blog)
    }

    /// Create a blog authored by `author`
    pub async fn create(&self, author: &User, input: CreateBlogInput) -> Result<Blog, BlogServiceError> {
        let title = validate_title(&input.title)?;
        validate_content(&input.content)?;
        self.check_category(input.category_id).await?;

        let slug = self.unique_slug(&title, None).await?;
        let blog = Blog::new(
            title,
            slug,
            input.content,
            author.id,
            input.category_id,
            input.is_published,
        );
        let created = self.blog_repo.create(&blog).await.context("Failed to create blog")?;

        tracing::info!("User '{}' created blog '{}'", author.username, created.slug);
        Ok(created)
    }

    /// Update a blog. The slug is regenerated only when the title changes.
    pub async fn update(
        &self,
        slug: &str,
        user: &User,
        input: UpdateBlogInput,
    ) -> Result<Blog, BlogServiceError> {
        let existing = self.get_owned(slug, user).await?.blog;
        let title = validate_title(&input.title)?;
        validate_content(&input.content)?;
        self.check_category(input.category_id).await?;

        let new_slug = if title != existing.title {
            self.unique_slug(&title, Some(&existing.slug)).await?
        } else {
            existing.slug.clone()
        };

        let blog = Blog {
            title,
            slug: new_slug,
            content: input.content,
            category_id: input.category_id,
            is_published: input.is_published,
            ..existing
        };
        let updated = self.blog_repo.update(&blog).await.context("Failed to update blog")?;

        tracing::info!("User '{}' updated blog '{}'", user.username, updated.slug);
        Ok(updated)
    }

    /// Delete a blog owned by `user`
    pub async fn delete(&self, slug: &str, user: &User) -> Result<(), BlogServiceError> {
        let blog = self.get_owned(slug, user).await?;
        self.blog_repo
            .delete(blog.blog.id)
            .await
            .context("Failed to delete blog")?;

        tracing::info!("User '{}' deleted blog '{}'", user.username, slug);
        Ok(())
    }

    async fn check_category(&self, category_id: Option<i64>) -> Result<(), BlogServiceError> {
        if let Some(id) = category_id {
            if self
                .category_repo
                .get_by_id(id)
                .await
                .context("Failed to check category")?
                .is_none()
            {
                return Err(BlogServiceError::InvalidCategory(id));
            }
        }
        Ok(())
    }

    /// First free slug among `base`, `base-2`, `base-3`, ...
    ///
    /// `current` is the slug the blog already holds, which counts as free.
    async fn unique_slug(&self, title: &str, current: Option<&str>) -> Result<String, BlogServiceError> {
        let base = generate_slug(title);
        let mut candidate = base.clone();
        let mut n = 1;
        loop {
            let free = Some(candidate.as_str()) == current
                || (!is_reserved_slug(&candidate)
                    && !self
                        .blog_repo
                        .slug_exists(&candidate)
                        .await
                        .context("Failed to check slug")?);
            if free {
                return Ok(candidate);
            }
            n += 1;
            candidate = format!("{}-{}", base, n);
        }
    }
}

fn validate_title(title: &str) -> Result<String, BlogServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(BlogServiceError::ValidationError("Title cannot be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(BlogServiceError::ValidationError(format!(
            "Title cannot exceed {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(title.to_string())
}

fn validate_content(content: &str) -> Result<(), BlogServiceError> {
    if content.trim().is_empty() {
        return Err(BlogServiceError::ValidationError("Content cannot be empty".to_string()));
    }
    Ok(())
}

/// Whether a slug would collide with a fixed route
pub fn is_reserved_slug(slug: &str) -> bool {
    RESERVED_SLUGS.contains(&slug)
}

/// Derive a URL-safe slug from a title.
///
/// Lowercase ASCII letters and digits are kept, every other run of
/// characters collapses to one hyphen, and leading or trailing hyphens
/// are dropped.
pub fn generate_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug.truncate(MAX_TITLE_LENGTH);
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}
