//! Category pages and the category admin

use axum::{
    extract::{Query, State},
    response::Response,
    Form,
};
use tera::Context as TeraContext;

use super::flash::redirect_with_flash;
use super::middleware::{AppState, WebError};
use super::page::{IdPath, PageContext, PageQuery};
use crate::forms::{CategoryForm, FormErrors};
use crate::models::BlogFilter;
use crate::services::CategoryServiceError;
use crate::theme::FlashMessage;

/// GET /categories/ - every category with its published post count
pub async fn category_list(
    State(state): State<AppState>,
    page: PageContext,
) -> Result<Response, WebError> {
    let categories = state.category_service.list_with_counts().await?;
    let mut context = TeraContext::new();
    context.insert("categories", &categories);
    state.render(&page, "categories/list.html", &context)
}

/// GET /category/{id}/ - published posts of one category
pub async fn category_detail(
    State(state): State<AppState>,
    page: PageContext,
    IdPath(id): IdPath,
    Query(query): Query<PageQuery>,
) -> Result<Response, WebError> {
    let category = state.category_service.get(id).await?;
    let filter = BlogFilter::published().with_category(Some(category.id));
    let page_obj = state.blog_service.list(&filter, query.page.as_deref()).await?;

    let mut context = TeraContext::new();
    context.insert("category", &category);
    context.insert("page_obj", &page_obj);
    context.insert("page_query", "");
    state.render(&page, "categories/detail.html", &context)
}

async fn render_admin(
    state: &AppState,
    page: &PageContext,
    form: &CategoryForm,
    errors: &FormErrors,
) -> Result<Response, WebError> {
    let categories = state.category_service.list_with_counts().await?;
    let mut context = TeraContext::new();
    context.insert("categories", &categories);
    context.insert("form", form);
    context.insert("errors", errors);
    state.render(page, "admin/categories.html", &context)
}

/// GET /admin/categories/
pub async fn admin_categories(
    State(state): State<AppState>,
    page: PageContext,
) -> Result<Response, WebError> {
    render_admin(&state, &page, &CategoryForm::default(), &FormErrors::new()).await
}

/// POST /admin/categories/ - add a category
pub async fn admin_create_category(
    State(state): State<AppState>,
    page: PageContext,
    Form(form): Form<CategoryForm>,
) -> Result<Response, WebError> {
    let mut errors = form.errors();
    if errors.is_empty() {
        match state.category_service.create(form.to_input()).await {
            Ok(category) => {
                return Ok(redirect_with_flash(
                    "/admin/categories/",
                    FlashMessage::success(format!("Category \"{}\" was added.", category.name)),
                ))
            }
            Err(CategoryServiceError::DuplicateName(_)) => {
                errors.add("name", "Category with this Name already exists.")
            }
            Err(CategoryServiceError::ValidationError(msg)) => errors.add("name", msg),
            Err(e) => return Err(e.into()),
        }
    }
    render_admin(&state, &page, &form, &errors).await
}

/// POST /admin/categories/{id}/delete/
pub async fn admin_delete_category(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> Result<Response, WebError> {
    let category = state.category_service.get(id).await?;
    state.category_service.delete(id).await?;
    Ok(redirect_with_flash(
        "/admin/categories/",
        FlashMessage::success(format!("Category \"{}\" was deleted.", category.name)),
    ))
}
