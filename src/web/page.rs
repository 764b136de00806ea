//! Page rendering shared by the HTML handlers

use axum::{
    extract::{FromRequestParts, Path},
    http::{header, request::Parts},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use std::convert::Infallible;
use tera::Context as TeraContext;

use super::flash::{clear_flash_cookie, read_flash};
use super::middleware::{AppState, AuthenticatedUser, WebError};
use crate::models::User;
use crate::theme::{CurrentUser, FlashMessage, StandardTemplateVars};

/// Per-request data every page needs
#[derive(Debug, Clone)]
pub struct PageContext {
    pub user: Option<User>,
    pub path: String,
    pub messages: Vec<FlashMessage>,
}

impl<S> FromRequestParts<S> for PageContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(PageContext {
            user: parts.extensions.get::<AuthenticatedUser>().map(|u| u.0.clone()),
            path: parts.uri.path().to_string(),
            messages: read_flash(&parts.headers),
        })
    }
}

/// Numeric `{id}` path segment. Anything that is not a number is a 404.
#[derive(Debug, Clone, Copy)]
pub struct IdPath(pub i64);

impl<S> FromRequestParts<S> for IdPath
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| WebError::NotFound(e.body_text()))?;
        raw.parse().map(IdPath).map_err(|_| WebError::NotFound(raw))
    }
}

impl AppState {
    /// Render `template` as a full page. Consumed flash messages are cleared.
    pub fn render(
        &self,
        page: &PageContext,
        template: &str,
        context: &TeraContext,
    ) -> Result<Response, WebError> {
        let vars = StandardTemplateVars::new(&self.site.name, &self.site.description, &page.path)
            .with_user(page.user.as_ref().map(CurrentUser::from))
            .with_messages(page.messages.clone());

        let html = self.theme.render_with_standard_vars(template, context, &vars)?;

        let mut response = Html(html).into_response();
        if !page.messages.is_empty() {
            response
                .headers_mut()
                .append(header::SET_COOKIE, clear_flash_cookie());
        }
        Ok(response)
    }
}

/// `?page=` alone
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// Query string suffix that keeps filters across pagination links
pub fn page_query(params: &[(&str, Option<String>)]) -> String {
    params
        .iter()
        .filter_map(|(key, value)| value.as_ref().map(|v| (key, v)))
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("&{}={}", key, urlencoding::encode(value)))
        .collect()
}
