//! Account pages: register, login, logout and profiles

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use super::flash::redirect_with_flash;
use super::middleware::{
    clear_session_cookie, extract_session_token, AppState, AuthenticatedUser, ClientIp, WebError,
};
use super::page::{IdPath, PageContext, PageQuery};
use crate::forms::{
    FormErrors, LoginForm, ProfileForm, ProfilePageForm, RegisterForm, UserUpdateForm,
    NON_FIELD_ERRORS,
};
use crate::models::{BlogFilter, CreateUserInput, User};
use crate::services::UserServiceError;
use crate::theme::FlashMessage;

const THROTTLED_MESSAGE: &str = "Too many login attempts. Please try again later.";

fn render_register(
    state: &AppState,
    page: &PageContext,
    form: &RegisterForm,
    errors: &FormErrors,
) -> Result<Response, WebError> {
    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("errors", errors);
    state.render(page, "account/register.html", &context)
}

/// GET /register/
pub async fn register_form(
    State(state): State<AppState>,
    page: PageContext,
) -> Result<Response, WebError> {
    render_register(&state, &page, &RegisterForm::default(), &FormErrors::new())
}

/// POST /register/ - create the account; the visitor logs in afterwards
pub async fn register(
    State(state): State<AppState>,
    page: PageContext,
    Form(form): Form<RegisterForm>,
) -> Result<Response, WebError> {
    let mut errors = form.errors();
    if errors.is_empty() {
        let input = CreateUserInput {
            username: form.username().to_string(),
            email: form.email.trim().to_string(),
            password: form.password1.clone(),
        };
        match state.user_service.register(input).await {
            Ok(user) => {
                return Ok(redirect_with_flash(
                    "/",
                    FlashMessage::success(format!(
                        "Account created for {}. You can now log in.",
                        user.username
                    )),
                ))
            }
            Err(UserServiceError::UserExists { field, message }) => errors.add(field, message),
            Err(UserServiceError::ValidationError(msg)) => errors.add(NON_FIELD_ERRORS, msg),
            Err(e) => return Err(e.into()),
        }
    }
    render_register(&state, &page, &form, &errors)
}

/// `next` must stay on this site. Browsers drop tabs and newlines while
/// parsing a `Location`, so control characters are refused outright.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(|c| c.is_control()) =>
        {
            path
        }
        _ => "/",
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

fn render_login(
    state: &AppState,
    page: &PageContext,
    form: &LoginForm,
    errors: &FormErrors,
) -> Result<Response, WebError> {
    let mut context = TeraContext::new();
    context.insert("form", form);
    context.insert("errors", errors);
    state.render(page, "account/login.html", &context)
}

/// GET /login/
pub async fn login_form(
    State(state): State<AppState>,
    page: PageContext,
    Query(query): Query<NextQuery>,
) -> Result<Response, WebError> {
    let form = LoginForm {
        next: query.next,
        ..Default::default()
    };
    render_login(&state, &page, &form, &FormErrors::new())
}

/// POST /login/ - open a session and follow `next`
pub async fn login(
    State(state): State<AppState>,
    page: PageContext,
    ClientIp(ip): ClientIp,
    Form(form): Form<LoginForm>,
) -> Result<Response, WebError> {
    let throttled = match ip {
        Some(ip) => !state.login_throttle.allow_request(ip).await,
        None => false,
    } || state.login_throttle.is_username_limited(&form.username).await;

    if throttled {
        tracing::warn!("Throttled login for '{}' from {:?}", form.username, ip);
        let mut errors = FormErrors::new();
        errors.add(NON_FIELD_ERRORS, THROTTLED_MESSAGE);
        let mut response = render_login(&state, &page, &form, &errors)?;
        *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
        return Ok(response);
    }

    let mut errors = form.errors();
    if errors.is_empty() {
        match state.user_service.login(&form.username, &form.password).await {
            Ok(session) => {
                state.login_throttle.clear_username(&form.username).await;
                let mut response = Redirect::to(safe_next(form.next.as_deref())).into_response();
                let cookie = HeaderValue::from_str(&state.session_cookie(&session.id))
                    .map_err(|e| WebError::Internal(e.into()))?;
                response.headers_mut().append(header::SET_COOKIE, cookie);
                return Ok(response);
            }
            Err(UserServiceError::AuthenticationError(msg)) => {
                state.login_throttle.record_failure(&form.username).await;
                errors.add(NON_FIELD_ERRORS, msg);
            }
            Err(e) => return Err(e.into()),
        }
    }
    render_login(&state, &page, &form, &errors)
}

/// POST /logout/
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, WebError> {
    if let Some(token) = extract_session_token(&headers) {
        state.user_service.logout(&token).await?;
    }
    let mut response =
        redirect_with_flash("/", FlashMessage::success("You have been logged out."));
    response
        .headers_mut()
        .append(header::SET_COOKIE, HeaderValue::from_static(clear_session_cookie()));
    Ok(response)
}

async fn render_profile(
    state: &AppState,
    page: &PageContext,
    user: &User,
    u_form: &UserUpdateForm,
    p_form: &ProfileForm,
    u_errors: &FormErrors,
    p_errors: &FormErrors,
) -> Result<Response, WebError> {
    let profile = state.profile_service.get_or_create(user.id).await?;
    let mut context = TeraContext::new();
    context.insert("profile", &profile);
    context.insert("u_form", u_form);
    context.insert("p_form", p_form);
    context.insert("u_errors", u_errors);
    context.insert("p_errors", p_errors);
    state.render(page, "account/profile.html", &context)
}

/// GET /profile/
pub async fn profile_form(
    State(state): State<AppState>,
    page: PageContext,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Response, WebError> {
    let profile = state.profile_service.get_or_create(user.id).await?;
    render_profile(
        &state,
        &page,
        &user,
        &UserUpdateForm::from_user(&user),
        &ProfileForm::from_profile(&profile),
        &FormErrors::new(),
        &FormErrors::new(),
    )
    .await
}

/// POST /profile/ - both forms must be valid; account and profile are saved together
pub async fn profile_update(
    State(state): State<AppState>,
    page: PageContext,
    AuthenticatedUser(user): AuthenticatedUser,
    Form(form): Form<ProfilePageForm>,
) -> Result<Response, WebError> {
    let mut u_errors = form.account.errors();
    let p_errors = form.profile.errors();

    if u_errors.is_empty() && p_errors.is_empty() {
        let profile = state
            .profile_service
            .prepare_update(user.id, form.profile.to_input())
            .await?;
        match state
            .user_service
            .update_account(&user, form.account.to_input(), &profile)
            .await
        {
            Ok(_) => {
                return Ok(redirect_with_flash(
                    "/profile/",
                    FlashMessage::success("Your profile has been updated!"),
                ));
            }
            Err(UserServiceError::UserExists { field, message }) => u_errors.add(field, message),
            Err(UserServiceError::ValidationError(msg)) => u_errors.add(NON_FIELD_ERRORS, msg),
            Err(e) => return Err(e.into()),
        }
    }

    render_profile(
        &state,
        &page,
        &user,
        &form.account,
        &form.profile,
        &u_errors,
        &p_errors,
    )
    .await
}

/// GET /profile/{id}/ - public profile with the owner's published posts
pub async fn profile_detail(
    State(state): State<AppState>,
    page: PageContext,
    IdPath(id): IdPath,
    Query(query): Query<PageQuery>,
) -> Result<Response, WebError> {
    let (profile, owner) = state.profile_service.get_with_user(id).await?;
    let filter = BlogFilter::published().with_author(owner.id);
    let page_obj = state.blog_service.list(&filter, query.page.as_deref()).await?;

    let mut context = TeraContext::new();
    context.insert("profile", &profile);
    context.insert("owner", &owner);
    context.insert("page_obj", &page_obj);
    context.insert("page_query", "");
    state.render(&page, "account/profile_detail.html", &context)
}
