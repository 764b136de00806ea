//! Web layer - HTML handlers and routing
//!
//! Every page is server-rendered through the theme engine. Forms post
//! `application/x-www-form-urlencoded` bodies; successful submissions
//! redirect (303) and carry their confirmation in a flash cookie.

pub mod accounts;
pub mod blogs;
pub mod categories;
pub mod comments;
pub mod flash;
pub mod middleware;
pub mod page;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use middleware::{AppState, AuthenticatedUser, WebError};

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .route(
            "/admin/categories/",
            get(categories::admin_categories).post(categories::admin_create_category),
        )
        .route(
            "/admin/categories/{id}/delete/",
            post(categories::admin_delete_category),
        )
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn(middleware::require_login));

    // Protected routes (need login)
    let protected_routes = Router::new()
        .route("/profile/", get(accounts::profile_form).post(accounts::profile_update))
        .route("/blog/azadd/", get(blogs::blog_create_form).post(blogs::blog_create))
        .route("/blog/{slug}/edit/", get(blogs::blog_edit_form).post(blogs::blog_edit))
        .route("/blog/{slug}/delete/", get(blogs::blog_delete_form).post(blogs::blog_delete))
        .route("/blog/{slug}/comment/", post(comments::add_comment))
        .route("/blog/{slug}/like/", post(comments::toggle_like))
        .route("/my-blogs/", get(blogs::my_blogs))
        .route_layer(axum_middleware::from_fn(middleware::require_login));

    // Public routes
    Router::new()
        .route("/", get(blogs::home))
        .route("/register/", get(accounts::register_form).post(accounts::register))
        .route("/login/", get(accounts::login_form).post(accounts::login))
        .route("/logout/", post(accounts::logout))
        .route("/profile/{id}/", get(accounts::profile_detail))
        .route("/blog/{slug}/", get(blogs::blog_detail))
        .route("/categories/", get(categories::category_list))
        .route("/category/{id}/", get(categories::category_detail))
        .merge(admin_routes)
        .merge(protected_routes)
        .fallback(middleware::not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::render_error_pages,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::optional_auth,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
