use std::future::{ready, Ready};

use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest, HttpResponseBuilder};
use chrono::Utc;
use uuid::Uuid;

use crate::application::cart::Cart;
use crate::domain::errors::DomainError;
use crate::domain::session::{SessionData, StoredSession};
use crate::errors::AppError;
use crate::state::AppState;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "shop_session";

/// The visitor's session id, read from the session cookie or freshly minted.
#[derive(Debug, Clone, Copy)]
pub struct VisitorSession {
    pub id: Uuid,
    is_new: bool,
}

impl VisitorSession {
    /// Adds the session cookie when the visitor is new or their session was
    /// just persisted (which also slides its expiry).
    pub fn apply_cookie(&self, state: &AppState, saved: bool, builder: &mut HttpResponseBuilder) {
        if !(self.is_new || saved) {
            return;
        }
        let max_age = time::Duration::seconds(state.session_ttl.num_seconds());
        builder.cookie(
            Cookie::build(SESSION_COOKIE_NAME, self.id.to_string())
                .path("/")
                .http_only(true)
                .secure(state.secure_cookies)
                .same_site(SameSite::Lax)
                .max_age(max_age)
                .finish(),
        );
    }
}

impl FromRequest for VisitorSession {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let existing = req
            .cookie(SESSION_COOKIE_NAME)
            .and_then(|c| Uuid::parse_str(c.value()).ok());
        ready(Ok(match existing {
            Some(id) => VisitorSession { id, is_new: false },
            None => VisitorSession {
                id: Uuid::new_v4(),
                is_new: true,
            },
        }))
    }
}

/// Loads the visitor's session, or starts an empty one, stamped with the
/// expiry it gets when next written. Blocking.
pub fn load_session(state: &AppState, session_id: Uuid) -> Result<StoredSession, DomainError> {
    Ok(StoredSession {
        id: session_id,
        data: state.sessions.load(session_id)?.unwrap_or_default(),
        expires_at: Utc::now() + state.session_ttl,
    })
}

/// Loads the visitor's cart, runs `f` against it and persists the session
/// if anything changed. Blocking; call from `web::block`.
///
/// Returns `f`'s output and whether the session was written.
pub fn with_cart<T>(
    state: &AppState,
    session_id: Uuid,
    f: impl FnOnce(&mut Cart<'_, SessionData>) -> Result<T, DomainError>,
) -> Result<(T, bool), DomainError> {
    let mut session = load_session(state, session_id)?;

    let output = {
        let mut cart = Cart::load(&mut session.data);
        f(&mut cart)?
    };

    let saved = session.data.is_modified();
    if saved {
        state
            .sessions
            .save(session.id, &session.data, session.expires_at)?;
    }
    Ok((output, saved))
}
