//! Claimant session middleware.

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};

use crate::app::AppState;

/// Resolves the claimant session id and stores it in request extensions.
///
/// When the client sent no usable session id a new one is generated and
/// returned in a `Set-Cookie` header, so a retry is recognised as the same
/// claimant.
pub async fn ensure_session(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let session = state.sessions.resolve(req.headers());
    let issued = session.issued.then(|| session.value.clone());
    req.extensions_mut().insert(session);

    let mut response = next.run(req).await;

    if let Some(session_id) = issued {
        tracing::debug!("Issued new claimant session");
        state.sessions.attach(response.headers_mut(), &session_id);
    }

    response
}
