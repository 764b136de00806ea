//! Comment and like actions on a post. Both redirect back to the post.

use axum::{
    extract::{Path, State},
    response::Response,
    Form,
};

use super::flash::redirect_with_flash;
use super::middleware::{AppState, AuthenticatedUser, WebError};
use crate::forms::CommentForm;
use crate::models::LikeToggle;
use crate::services::CommentServiceError;
use crate::theme::FlashMessage;

/// POST /blog/{slug}/comment/
pub async fn add_comment(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(slug): Path<String>,
    Form(form): Form<CommentForm>,
) -> Result<Response, WebError> {
    let blog = state.blog_service.get_visible(&slug, Some(&user)).await?;
    let detail = format!("/blog/{}/", blog.blog.slug);

    let errors = form.errors();
    if let Some(message) = ["content", "parent_id"]
        .iter()
        .find_map(|field| errors.get(field).and_then(|m| m.first()))
    {
        return Ok(redirect_with_flash(
            &detail,
            FlashMessage::error(format!("Your comment was not posted: {}", message)),
        ));
    }

    match state
        .comment_service
        .add_comment(&blog.blog, &user, &form.content, form.parent())
        .await
    {
        Ok(_) => Ok(redirect_with_flash(
            &detail,
            FlashMessage::success("Your comment has been posted."),
        )),
        Err(CommentServiceError::ValidationError(msg)) => Ok(redirect_with_flash(
            &detail,
            FlashMessage::error(format!("Your comment was not posted: {}", msg)),
        )),
        Err(CommentServiceError::NotFound(_)) => Ok(redirect_with_flash(
            &detail,
            FlashMessage::error("The comment you replied to no longer exists."),
        )),
        Err(e) => Err(e.into()),
    }
}

/// POST /blog/{slug}/like/ - like, or take a like back
pub async fn toggle_like(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(slug): Path<String>,
) -> Result<Response, WebError> {
    let blog = state.blog_service.get_visible(&slug, Some(&user)).await?;
    let message = match state.comment_service.toggle_like(user.id, blog.blog.id).await? {
        LikeToggle::Liked => "You liked this post.",
        LikeToggle::Unliked => "You no longer like this post.",
    };
    Ok(redirect_with_flash(
        &format!("/blog/{}/", blog.blog.slug),
        FlashMessage::success(message),
    ))
}
