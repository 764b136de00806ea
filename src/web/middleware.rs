//! Web middleware
//!
//! Contains:
//! - Shared application state
//! - Cookie session authentication
//! - Login and admin guards
//! - `WebError` and the error page renderer

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tera::Context as TeraContext;

use crate::config::{Config, SessionConfig, SiteConfig};
use crate::db::repositories::{
    SqlxBlogRepository, SqlxCategoryRepository, SqlxCommentRepository, SqlxProfileRepository,
    SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    BlogService, BlogServiceError, CategoryService, CategoryServiceError, CommentService,
    CommentServiceError, LoginThrottle, ProfileService, ProfileServiceError, UserService,
    UserServiceError,
};
use crate::theme::{simple_error_page, CurrentUser, StandardTemplateVars, ThemeEngine, ERROR_TEMPLATE};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub blog_service: Arc<BlogService>,
    pub category_service: Arc<CategoryService>,
    pub comment_service: Arc<CommentService>,
    pub profile_service: Arc<ProfileService>,
    pub theme: Arc<ThemeEngine>,
    pub login_throttle: Arc<LoginThrottle>,
    pub site: Arc<SiteConfig>,
    pub session: Arc<SessionConfig>,
    /// Read the client address from proxy headers
    pub trust_proxy_headers: bool,
}

impl AppState {
    /// Wire repositories, services and the theme engine over `pool`
    pub fn new(pool: DynDatabasePool, config: &Config) -> anyhow::Result<Self> {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let profile_repo = SqlxProfileRepository::boxed(pool.clone());
        let category_repo = SqlxCategoryRepository::boxed(pool.clone());
        let blog_repo = SqlxBlogRepository::boxed(pool.clone());
        let comment_repo = SqlxCommentRepository::boxed(pool.clone());

        let user_service = UserService::new(user_repo.clone(), session_repo, profile_repo.clone())
            .with_session_expiration(config.session.expiration_days);
        let blog_service = BlogService::new(
            blog_repo,
            category_repo.clone(),
            config.site.posts_per_page,
        );
        let theme = ThemeEngine::new(&config.theme.path)?;

        Ok(Self {
            user_service: Arc::new(user_service),
            blog_service: Arc::new(blog_service),
            category_service: Arc::new(CategoryService::new(category_repo)),
            comment_service: Arc::new(CommentService::new(comment_repo)),
            profile_service: Arc::new(ProfileService::new(profile_repo, user_repo)),
            theme: Arc::new(theme),
            login_throttle: Arc::new(LoginThrottle::new()),
            site: Arc::new(config.site.clone()),
            session: Arc::new(config.session.clone()),
            trust_proxy_headers: config.server.trust_proxy_headers,
        })
    }

    /// `Set-Cookie` value opening a session
    pub fn session_cookie(&self, token: &str) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            SESSION_COOKIE,
            token,
            self.session.expiration_days * 24 * 60 * 60
        );
        if self.session.secure_cookie {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// `Set-Cookie` value removing the session
pub fn clear_session_cookie() -> &'static str {
    "session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| WebError::LoginRequired {
                next: path_and_query(parts.uri.path_and_query().map(|pq| pq.as_str())),
            })
    }
}

/// Client address: the socket peer, or the proxy headers when
/// `server.trust_proxy_headers` is on
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub Option<IpAddr>);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let forwarded = if state.trust_proxy_headers {
            extract_ip_address(&parts.headers)
        } else {
            None
        };
        let ip = forwarded.or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        });
        Ok(ClientIp(ip))
    }
}

fn extract_ip_address(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(ip) = forwarded.split(',').next().and_then(|ip| ip.trim().parse().ok()) {
            return Some(ip);
        }
    }
    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|ip| ip.trim().parse().ok())
}

fn path_and_query(value: Option<&str>) -> String {
    value.unwrap_or("/").to_string()
}

/// Value of cookie `name`, if the request carries it
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|s| s.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// Session token from the `session` cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, SESSION_COOKIE).filter(|token| !token.is_empty())
}

/// Attach the session's user to the request when the token is valid
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_session_token(request.headers()) {
        match state.user_service.validate_session(&token).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(AuthenticatedUser(user));
            }
            Ok(None) => {}
            Err(e) => tracing::error!("Session validation failed: {}", e),
        }
    }
    next.run(request).await
}

/// Redirect anonymous visitors to the login page
pub async fn require_login(request: Request, next: Next) -> Response {
    if request.extensions().get::<AuthenticatedUser>().is_none() {
        let next_path = path_and_query(request.uri().path_and_query().map(|pq| pq.as_str()));
        return WebError::LoginRequired { next: next_path }.into_response();
    }
    next.run(request).await
}

/// Admin authorization middleware. Expects [`require_login`] to run first.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, WebError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| WebError::LoginRequired {
            next: path_and_query(request.uri().path_and_query().map(|pq| pq.as_str())),
        })?;

    if !user.0.is_admin() {
        tracing::warn!("User '{}' denied admin access to {}", user.0.username, request.uri().path());
        return Err(WebError::Forbidden(
            "You do not have permission to manage categories.".to_string(),
        ));
    }

    Ok(next.run(request).await)
}

// ============================================================================
// Errors
// ============================================================================

/// Errors a handler can return
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Send the visitor to the login page, coming back to `next`
    #[error("Login required")]
    LoginRequired { next: String },

    #[error("Internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

/// Marker left on error responses for [`render_error_pages`]
#[derive(Debug, Clone)]
pub struct ErrorPage {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            WebError::LoginRequired { next } => {
                let target = format!("/login/?next={}", urlencoding::encode(&next));
                return Redirect::to(&target).into_response();
            }
            WebError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                "The page you requested could not be found.".to_string(),
            ),
            WebError::Forbidden(message) => (StatusCode::FORBIDDEN, message),
            WebError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            WebError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong on our side.".to_string(),
                )
            }
        };

        let mut response = (status, message.clone()).into_response();
        response.extensions_mut().insert(ErrorPage { status, message });
        response
    }
}

impl From<BlogServiceError> for WebError {
    fn from(e: BlogServiceError) -> Self {
        match e {
            BlogServiceError::NotFound(slug) => WebError::NotFound(slug),
            BlogServiceError::Forbidden => {
                WebError::Forbidden("You do not have permission to change this post.".to_string())
            }
            BlogServiceError::ValidationError(msg) => WebError::BadRequest(msg),
            BlogServiceError::InvalidCategory(id) => {
                WebError::BadRequest(format!("Category {} does not exist", id))
            }
            BlogServiceError::InternalError(e) => WebError::Internal(e),
        }
    }
}

impl From<CategoryServiceError> for WebError {
    fn from(e: CategoryServiceError) -> Self {
        match e {
            CategoryServiceError::NotFound(id) => WebError::NotFound(format!("category {}", id)),
            CategoryServiceError::DuplicateName(name) => {
                WebError::BadRequest(format!("Category '{}' already exists", name))
            }
            CategoryServiceError::ValidationError(msg) => WebError::BadRequest(msg),
            CategoryServiceError::InternalError(e) => WebError::Internal(e),
        }
    }
}

impl From<CommentServiceError> for WebError {
    fn from(e: CommentServiceError) -> Self {
        match e {
            CommentServiceError::NotFound(id) => WebError::NotFound(format!("comment {}", id)),
            CommentServiceError::ValidationError(msg) => WebError::BadRequest(msg),
            CommentServiceError::InternalError(e) => WebError::Internal(e),
        }
    }
}

impl From<ProfileServiceError> for WebError {
    fn from(e: ProfileServiceError) -> Self {
        match e {
            ProfileServiceError::NotFound(id) => WebError::NotFound(format!("profile {}", id)),
            ProfileServiceError::ValidationError(msg) => WebError::BadRequest(msg),
            ProfileServiceError::InternalError(e) => WebError::Internal(e),
        }
    }
}

impl From<UserServiceError> for WebError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::InternalError(e) => WebError::Internal(e),
            UserServiceError::SessionExpired | UserServiceError::SessionNotFound => {
                WebError::LoginRequired { next: "/".to_string() }
            }
            other => WebError::BadRequest(other.to_string()),
        }
    }
}

/// Replace bodies of error responses with the themed error page
pub async fn render_error_pages(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|u| CurrentUser::from(&u.0));
    let path = request.uri().path().to_string();

    let mut response = next.run(request).await;
    let Some(page) = response.extensions_mut().remove::<ErrorPage>() else {
        return response;
    };

    let mut context = TeraContext::new();
    context.insert("status", &page.status.as_u16());
    context.insert("error_message", &page.message);
    let vars = StandardTemplateVars::new(&state.site.name, &state.site.description, path)
        .with_user(user);

    let html = match state
        .theme
        .render_with_standard_vars(ERROR_TEMPLATE, &context, &vars)
    {
        Ok(html) => html,
        Err(e) => {
            tracing::error!("Failed to render error page: {}", e);
            simple_error_page(page.status.as_u16(), &page.message)
        }
    };
    (page.status, Html(html)).into_response()
}

/// Fallback for unknown routes
pub async fn not_found() -> WebError {
    WebError::NotFound("route".to_string())
}
