//! Blog pages: listing and search, detail, create, edit, delete, my blogs

use axum::{
    extract::{Path, Query, State},
    response::Response,
    Form,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use super::flash::redirect_with_flash;
use super::middleware::{AppState, AuthenticatedUser, WebError};
use super::page::{page_query, PageContext, PageQuery};
use crate::forms::{BlogForm, CommentForm, FormErrors, NON_FIELD_ERRORS};
use crate::models::{BlogFilter, BlogWithMeta};
use crate::services::BlogServiceError;
use crate::theme::FlashMessage;

/// Query parameters of the home page
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub page: Option<String>,
}

/// GET / - published posts, filtered by search term and category
pub async fn home(
    State(state): State<AppState>,
    page: PageContext,
    Query(query): Query<ListQuery>,
) -> Result<Response, WebError> {
    let selected_category = query
        .category
        .as_deref()
        .and_then(|c| c.trim().parse::<i64>().ok());
    let filter = BlogFilter::published()
        .with_search(query.search.as_deref())
        .with_category(selected_category);

    let page_obj = state.blog_service.list(&filter, query.page.as_deref()).await?;
    let categories = state.category_service.list().await?;

    let mut context = TeraContext::new();
    context.insert("page_obj", &page_obj);
    context.insert("categories", &categories);
    context.insert("search_query", filter.search.as_deref().unwrap_or(""));
    context.insert("selected_category", &selected_category);
    context.insert(
        "page_query",
        &page_query(&[
            ("search", filter.search.clone()),
            ("category", selected_category.map(|id| id.to_string())),
        ]),
    );
    state.render(&page, "home.html", &context)
}

/// GET /blog/{slug}/ - one post with its comments; counts the view
pub async fn blog_detail(
    State(state): State<AppState>,
    page: PageContext,
    Path(slug): Path<String>,
) -> Result<Response, WebError> {
    let blog = state.blog_service.view(&slug, page.user.as_ref()).await?;
    let comments = state.comment_service.comments_for(blog.blog.id).await?;
    let likes_count = state.comment_service.like_count(blog.blog.id).await?;
    let user_liked = match &page.user {
        Some(user) => state.comment_service.is_liked(user.id, blog.blog.id).await?,
        None => false,
    };
    let author_profile = state.profile_service.get_or_create(blog.blog.author_id).await?;

    let mut context = TeraContext::new();
    context.insert("blog", &blog);
    context.insert("comments", &comments);
    context.insert("comment_form", &CommentForm::default());
    context.insert("likes_count", &likes_count);
    context.insert("user_liked", &user_liked);
    context.insert("author_profile_id", &author_profile.id);
    state.render(&page, "blog/detail.html", &context)
}

async fn render_blog_form(
    state: &AppState,
    page: &PageContext,
    template: &str,
    blog: Option<&BlogWithMeta>,
    form: &BlogForm,
    errors: &FormErrors,
) -> Result<Response, WebError> {
    let categories = state.category_service.list().await?;
    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("categories", &categories);
    if let Some(blog) = blog {
        context.insert("blog", blog);
    }
    state.render(page, template, &context)
}

/// Turn a service rejection of a valid-looking form into field errors
fn form_error(e: BlogServiceError, errors: &mut FormErrors) -> Result<(), WebError> {
    match e {
        BlogServiceError::InvalidCategory(_) => {
            errors.add(
                "category",
                "Select a valid choice. That choice is not one of the available choices.",
            );
            Ok(())
        }
        BlogServiceError::ValidationError(msg) => {
            errors.add(NON_FIELD_ERRORS, msg);
            Ok(())
        }
        other => Err(other.into()),
    }
}

/// GET /blog/azadd/
pub async fn blog_create_form(
    State(state): State<AppState>,
    page: PageContext,
    _user: AuthenticatedUser,
) -> Result<Response, WebError> {
    render_blog_form(
        &state,
        &page,
        "blog/create.html",
        None,
        &BlogForm::new_post(),
        &FormErrors::new(),
    )
    .await
}

/// POST /blog/azadd/
pub async fn blog_create(
    State(state): State<AppState>,
    page: PageContext,
    AuthenticatedUser(user): AuthenticatedUser,
    Form(form): Form<BlogForm>,
) -> Result<Response, WebError> {
    let mut errors = form.errors();
    if errors.is_empty() {
        match state.blog_service.create(&user, form.to_create_input()).await {
            Ok(blog) => {
                return Ok(redirect_with_flash(
                    &format!("/blog/{}/", blog.slug),
                    FlashMessage::success("Your post has been created."),
                ))
            }
            Err(e) => form_error(e, &mut errors)?,
        }
    }
    render_blog_form(&state, &page, "blog/create.html", None, &form, &errors).await
}

/// GET /blog/{slug}/edit/
pub async fn blog_edit_form(
    State(state): State<AppState>,
    page: PageContext,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(slug): Path<String>,
) -> Result<Response, WebError> {
    let blog = state.blog_service.get_owned(&slug, &user).await?;
    let form = BlogForm::from_blog(&blog);
    render_blog_form(&state, &page, "blog/edit.html", Some(&blog), &form, &FormErrors::new()).await
}

/// POST /blog/{slug}/edit/
pub async fn blog_edit(
    State(state): State<AppState>,
    page: PageContext,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(slug): Path<String>,
    Form(form): Form<BlogForm>,
) -> Result<Response, WebError> {
    let blog = state.blog_service.get_owned(&slug, &user).await?;

    let mut errors = form.errors();
    if errors.is_empty() {
        match state
            .blog_service
            .update(&slug, &user, form.to_update_input())
            .await
        {
            Ok(updated) => {
                return Ok(redirect_with_flash(
                    &format!("/blog/{}/", updated.slug),
                    FlashMessage::success("Your post has been updated."),
                ))
            }
            Err(e) => form_error(e, &mut errors)?,
        }
    }
    render_blog_form(&state, &page, "blog/edit.html", Some(&blog), &form, &errors).await
}

/// GET /blog/{slug}/delete/ - confirmation page
pub async fn blog_delete_form(
    State(state): State<AppState>,
    page: PageContext,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(slug): Path<String>,
) -> Result<Response, WebError> {
    let blog = state.blog_service.get_owned(&slug, &user).await?;
    let mut context = TeraContext::new();
    context.insert("blog", &blog);
    state.render(&page, "blog/delete.html", &context)
}

/// POST /blog/{slug}/delete/
pub async fn blog_delete(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(slug): Path<String>,
) -> Result<Response, WebError> {
    state.blog_service.delete(&slug, &user).await?;
    Ok(redirect_with_flash("/", FlashMessage::success("Your post has been deleted.")))
}

/// GET /my-blogs/ - the user's posts, drafts included
pub async fn my_blogs(
    State(state): State<AppState>,
    page: PageContext,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<PageQuery>,
) -> Result<Response, WebError> {
    let filter = BlogFilter::default().with_author(user.id);
    let page_obj = state.blog_service.list(&filter, query.page.as_deref()).await?;

    let mut context = TeraContext::new();
    context.insert("page_obj", &page_obj);
    context.insert("page_query", "");
    state.render(&page, "blog/my_blogs.html", &context)
}
