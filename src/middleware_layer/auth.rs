use axum::{body::Body, http::Request, middleware::Next, response::Response};

use crate::{error::Result, services::session::SessionContext};

/// A middleware that requires an authenticated session.
///
/// Anonymous callers are redirected to `/login`. The resolved context is
/// stored in the request extensions for the handler to reuse.
pub async fn require_authenticated(
    session: SessionContext,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    tracing::debug!("🔐 Checking authentication...");
    session.require_authenticated()?;

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

/// A middleware for pages only meant for anonymous callers.
///
/// Authenticated callers are redirected to `/home`.
pub async fn require_anonymous(
    session: SessionContext,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    session.require_anonymous()?;

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}
