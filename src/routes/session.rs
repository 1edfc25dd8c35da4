//! Session Routes
//!
//! Cookie middleware applied to every API route, plus:
//! - DELETE /api/v1/session - Drop the caller's session, tasks and files

use axum::{
    extract::{Extension, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::delete,
    Router,
};

use crate::session::SESSION_COOKIE;
use crate::state::AppState;

/// Session token of the current request, set by [`session_layer`]
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub token: String,
}

/// Response marker: the handler ended the session, do not re-issue the cookie
#[derive(Debug, Clone, Copy)]
struct SessionEnded;

pub fn router() -> Router<AppState> {
    Router::new().route("/", delete(end_session))
}

/// Value of the session cookie, if present
pub fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Whether the request reached us over TLS, directly or through a proxy
fn is_secure(request: &Request) -> bool {
    let forwarded_https = request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or("").trim().eq_ignore_ascii_case("https"))
        .unwrap_or(false);
    forwarded_https || request.uri().scheme_str() == Some("https")
}

fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Resolve (or issue) the visitor session and refresh its cookie
pub async fn session_layer(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let presented = cookie_token(request.headers());
    let resolved = state.sessions().resolve(presented.as_deref()).await;
    let secure = is_secure(&request);
    let token = resolved.session.token;

    request.extensions_mut().insert(CurrentSession {
        token: token.clone(),
    });

    let mut response = next.run(request).await;

    if response.extensions().get::<SessionEnded>().is_none() {
        let max_age = state.sessions().timeout().num_seconds();
        match HeaderValue::from_str(&session_cookie(&token, max_age, secure)) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!(error = %e, "Session cookie is not a valid header value"),
        }
    }

    response
}

/// DELETE /api/v1/session
async fn end_session(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Response {
    state.sessions().remove(&session.token).await;
    state.purge_session(&session.token).await;

    let mut response = (
        StatusCode::NO_CONTENT,
        [(
            header::SET_COOKIE,
            format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE),
        )],
    )
        .into_response();
    response.extensions_mut().insert(SessionEnded);
    response
}
