//! Anonymous claimant sessions.
//!
//! A claimant is identified by a session id read from the session cookie or
//! the session header. Clients that send neither get a freshly generated id,
//! returned in a `Set-Cookie` header.

use axum::http::{header::SET_COOKIE, HeaderMap, HeaderValue};
use axum_extra::extract::cookie::CookieJar;
use rand::Rng;

use crate::config::ClaimsConfig;

const SESSION_ID_LEN: usize = 32;
const MAX_SESSION_ID_LEN: usize = 128;

/// Session id attached to a request by the session middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId {
    pub value: String,
    /// True when the id was generated for this request.
    pub issued: bool,
}

/// Reads and writes the claimant session cookie.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    cookie_name: String,
    header_name: String,
    max_age_secs: i64,
    secure: bool,
}

impl SessionCookie {
    pub fn new(config: &ClaimsConfig) -> Self {
        Self {
            cookie_name: config.session_cookie_name.clone(),
            header_name: config.session_header.to_ascii_lowercase(),
            max_age_secs: config.session_cookie_max_age_days * 86_400,
            secure: config.secure_cookies,
        }
    }

    /// Session id sent by the client: cookie first, then header.
    pub fn extract(&self, headers: &HeaderMap) -> Option<String> {
        let jar = CookieJar::from_headers(headers);
        let from_cookie = jar
            .get(&self.cookie_name)
            .map(|c| c.value().trim().to_string());

        let from_header = || {
            headers
                .get(self.header_name.as_str())
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
        };

        from_cookie
            .filter(|v| is_acceptable(v))
            .or_else(|| from_header().filter(|v| is_acceptable(v)))
    }

    /// Session id sent by the client, or a new one.
    pub fn resolve(&self, headers: &HeaderMap) -> SessionId {
        match self.extract(headers) {
            Some(value) => SessionId {
                value,
                issued: false,
            },
            None => SessionId {
                value: generate_session_id(),
                issued: true,
            },
        }
    }

    /// Build a Set-Cookie header value for a session id.
    pub fn build_cookie(&self, session_id: &str) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            self.cookie_name, session_id, self.max_age_secs
        );

        if self.secure {
            cookie.push_str("; Secure");
        }

        cookie
    }

    /// Append the session cookie to response headers.
    pub fn attach(&self, headers: &mut HeaderMap, session_id: &str) {
        if let Ok(value) = HeaderValue::from_str(&self.build_cookie(session_id)) {
            headers.append(SET_COOKIE, value);
        }
    }
}

fn is_acceptable(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_SESSION_ID_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Generate a random alphanumeric session id.
pub fn generate_session_id() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();

    (0..SESSION_ID_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}
