//! Flash messages
//!
//! A redirecting handler stores messages in a short-lived `flash` cookie
//! (URL-encoded JSON); the next rendered page shows them and clears it.

use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Redirect, Response};

use super::middleware::cookie_value;
use crate::theme::FlashMessage;

pub const FLASH_COOKIE: &str = "flash";

/// Messages carried by the request, empty when absent or unreadable
pub fn read_flash(headers: &HeaderMap) -> Vec<FlashMessage> {
    let Some(raw) = cookie_value(headers, FLASH_COOKIE).filter(|v| !v.is_empty()) else {
        return Vec::new();
    };
    let decoded = match urlencoding::decode(&raw) {
        Ok(decoded) => decoded,
        Err(_) => return Vec::new(),
    };
    serde_json::from_str(&decoded).unwrap_or_else(|e| {
        tracing::debug!("Ignoring malformed flash cookie: {}", e);
        Vec::new()
    })
}

/// `Set-Cookie` value storing `messages`
pub fn flash_cookie(messages: &[FlashMessage]) -> Option<HeaderValue> {
    let json = serde_json::to_string(messages).ok()?;
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age=300",
        FLASH_COOKIE,
        urlencoding::encode(&json)
    );
    HeaderValue::from_str(&cookie).ok()
}

/// `Set-Cookie` value removing the flash cookie
pub fn clear_flash_cookie() -> HeaderValue {
    HeaderValue::from_static("flash=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// 303 redirect to `to` that shows `message` on the next page
pub fn redirect_with_flash(to: &str, message: FlashMessage) -> Response {
    let mut response = Redirect::to(to).into_response();
    if let Some(cookie) = flash_cookie(&[message]) {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn cookie_header(response: &Response) -> String {
        response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_flash_survives_cookie_round_trip() {
        let response = redirect_with_flash(
            "/",
            FlashMessage::success("Account created for ada; you can now log in."),
        );
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let set_cookie = cookie_header(&response);
        let pair = set_cookie.split(';').next().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(pair).unwrap());

        let messages = read_flash(&headers);
        assert_eq!(
            messages,
            vec![FlashMessage::success("Account created for ada; you can now log in.")]
        );
    }

    #[test]
    fn test_malformed_flash_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("flash=%7Bnot-json"));
        assert!(read_flash(&headers).is_empty());
        assert!(read_flash(&HeaderMap::new()).is_empty());
    }
}
