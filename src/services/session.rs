use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, TimeDelta, Utc};
use tower_cookies::{Cookie, Cookies, cookie::SameSite, cookie::time::Duration};

use crate::{
    crypto::token::{generate_session_token, is_well_formed},
    error::{AppError, Result},
    models::session::SessionRecord,
    repositories::store::SessionStore,
    state::AppState,
    validation::auth::escape_html,
};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session_id";

/// Cookie settings shared by every session the context issues.
#[derive(Clone, Copy, Debug)]
pub struct CookiePolicy {
    pub ttl_secs: u64,
    pub secure: bool,
}

impl CookiePolicy {
    /// The cookie max-age and record expiry of a session started at `now`.
    fn expiry(&self, now: DateTime<Utc>) -> Result<(i64, DateTime<Utc>)> {
        let out_of_range =
            || AppError::Internal(format!("Session lifetime out of range: {}s", self.ttl_secs));

        let ttl = i64::try_from(self.ttl_secs).map_err(|_| out_of_range())?;
        let expires_at = TimeDelta::try_seconds(ttl)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(out_of_range)?;
        Ok((ttl, expires_at))
    }

    fn cookie(&self, value: String, max_age_secs: i64) -> Cookie<'static> {
        let mut cookie = Cookie::new(SESSION_COOKIE, value);
        cookie.set_http_only(true);
        if self.secure {
            cookie.set_secure(true);
        }
        cookie.set_same_site(SameSite::Lax);
        cookie.set_max_age(Duration::seconds(max_age_secs));
        cookie.set_path("/");
        cookie
    }
}

/// The authenticated identity bound to one caller, if any.
///
/// Built per request from the `session_id` cookie and passed to whatever
/// needs to know who is calling. `start` and `end` return the cookie the
/// caller must send back.
#[derive(Clone)]
pub struct SessionContext {
    store: Arc<dyn SessionStore>,
    policy: CookiePolicy,
    token: Option<String>,
    identity: Option<SessionRecord>,
}

impl SessionContext {
    /// A context with no identity bound.
    pub fn anonymous(store: Arc<dyn SessionStore>, policy: CookiePolicy) -> Self {
        Self {
            store,
            policy,
            token: None,
            identity: None,
        }
    }

    /// Rebuilds the context for `token`.
    ///
    /// Unknown, malformed and expired tokens yield an anonymous context;
    /// expired records are deleted on the way.
    pub async fn resume(
        store: Arc<dyn SessionStore>,
        policy: CookiePolicy,
        token: Option<&str>,
    ) -> Result<Self> {
        let mut context = Self::anonymous(store, policy);

        let Some(token) = token.filter(|t| is_well_formed(t)) else {
            return Ok(context);
        };

        match context.store.load(token).await? {
            Some(record) if record.is_expired() => {
                tracing::warn!("❌ Session expired for user: {}", record.user_id);
                context.store.remove(token).await?;
            }
            Some(record) => {
                tracing::debug!("✅ Session resumed for user: {}", record.user_id);
                context.token = Some(token.to_string());
                context.identity = Some(record);
            }
            None => tracing::debug!("Unknown session token"),
        }

        Ok(context)
    }

    /// Binds a new identity under a fresh token.
    ///
    /// Any identity already bound is ended first, so its token stops working.
    pub async fn start(&mut self, user_id: i64, email: &str, username: &str) -> Result<Cookie<'static>> {
        let now = Utc::now();
        let (max_age, expires_at) = self.policy.expiry(now)?;

        if let Some(old) = self.token.take() {
            self.store.remove(&old).await?;
        }
        self.identity = None;

        let token = generate_session_token()?;
        let record = SessionRecord {
            user_id,
            username: username.to_string(),
            email: email.to_string(),
            created_at: now,
            expires_at,
        };

        self.store.save(&token, &record, self.policy.ttl_secs).await?;
        tracing::info!("✅ Session started for user: {}", user_id);

        let cookie = self.policy.cookie(token.clone(), max_age);
        self.token = Some(token);
        self.identity = Some(record);
        Ok(cookie)
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// Fails with `Unauthenticated` unless an identity is bound.
    pub fn require_authenticated(&self) -> Result<()> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(AppError::Unauthenticated)
        }
    }

    /// Fails with `AlreadyAuthenticated` if an identity is bound.
    pub fn require_anonymous(&self) -> Result<()> {
        if self.is_authenticated() {
            Err(AppError::AlreadyAuthenticated)
        } else {
            Ok(())
        }
    }

    /// Drops the identity and deletes its record. Returns an expiring cookie.
    pub async fn end(&mut self) -> Result<Cookie<'static>> {
        if let Some(token) = self.token.take() {
            self.store.remove(&token).await?;
        }
        if let Some(record) = self.identity.take() {
            tracing::info!("👋 Session ended for user: {}", record.user_id);
        }
        Ok(self.policy.cookie(String::new(), 0))
    }

    pub fn user_id(&self) -> Option<i64> {
        self.identity.as_ref().map(|r| r.user_id)
    }

    pub fn email(&self) -> Option<&str> {
        self.identity.as_ref().map(|r| r.email.as_str())
    }

    /// The username, HTML-escaped for display.
    pub fn username(&self) -> Option<String> {
        self.identity.as_ref().map(|r| escape_html(&r.username))
    }
}

impl FromRequestParts<AppState> for SessionContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        // Guards resolve the context once and hand it down.
        if let Some(context) = parts.extensions.get::<SessionContext>() {
            return Ok(context.clone());
        }

        let cookies = Cookies::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| AppError::Internal(msg.to_string()))?;
        let token = cookies.get(SESSION_COOKIE).map(|c| c.value().to_string());

        SessionContext::resume(state.sessions.clone(), state.cookie_policy(), token.as_deref()).await
    }
}
