use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, IntoResponseParts, Response, ResponseParts},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use tracing::{error, warn};

use warbler_db::models::UserRow;
use warbler_types::session::{
    Flash, FlashCategory, SESSION_COOKIE, SESSION_LIFETIME_DAYS, SessionClaims,
};

use crate::pages;
use crate::state::{AppState, run_db};

/// The signed cookie session of the current request.
///
/// Return it alongside the response so changes reach the client; an
/// unmodified session writes no cookie.
#[derive(Debug, Clone)]
pub struct Session {
    claims: SessionClaims,
    secret: String,
    modified: bool,
}

impl Session {
    pub fn curr_user(&self) -> Option<i64> {
        self.claims.curr_user
    }

    pub fn login(&mut self, user_id: i64) {
        self.claims.curr_user = Some(user_id);
        self.modified = true;
    }

    pub fn logout(&mut self) -> Option<i64> {
        self.modified = true;
        self.claims.curr_user.take()
    }

    pub fn flash(&mut self, category: FlashCategory, message: impl Into<String>) {
        self.claims.flashes.push(Flash {
            category,
            message: message.into(),
        });
        self.modified = true;
    }

    pub fn take_flashes(&mut self) -> Vec<Flash> {
        if self.claims.flashes.is_empty() {
            return Vec::new();
        }
        self.modified = true;
        std::mem::take(&mut self.claims.flashes)
    }

    /// The session's CSRF token, minted on first use.
    pub fn csrf_token(&mut self) -> String {
        if let Some(token) = &self.claims.csrf_token {
            return token.clone();
        }

        let mut bytes = [0u8; 20];
        rand::rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        self.claims.csrf_token = Some(token.clone());
        self.modified = true;
        token
    }

    pub fn verify_csrf(&self, enabled: bool, submitted: Option<&str>) -> Result<(), StatusCode> {
        if !enabled {
            return Ok(());
        }
        match (self.claims.csrf_token.as_deref(), submitted) {
            (Some(expected), Some(got)) if expected == got => Ok(()),
            _ => {
                warn!("Rejected form post with a missing or invalid CSRF token");
                Err(StatusCode::BAD_REQUEST)
            }
        }
    }
}

impl FromRequestParts<AppState> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let secret = state.config.secret_key.clone();
        let jar = CookieJar::from_headers(&parts.headers);

        let claims = match jar.get(SESSION_COOKIE) {
            Some(cookie) => decode_session(&secret, cookie.value()).unwrap_or_else(|e| {
                warn!("Discarding invalid session cookie: {}", e);
                SessionClaims::default()
            }),
            None => SessionClaims::default(),
        };

        Ok(Self {
            claims,
            secret,
            modified: false,
        })
    }
}

impl IntoResponseParts for Session {
    type Error = Infallible;

    fn into_response_parts(self, res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if !self.modified {
            return Ok(res);
        }
        match encode_session(&self.secret, &self.claims) {
            Ok(token) => CookieJar::new()
                .add(session_cookie(token))
                .into_response_parts(res),
            Err(e) => {
                error!("Failed to sign session cookie: {}", e);
                Ok(res)
            }
        }
    }
}

/// Sign session claims as an HS256 JWT with a fresh expiry.
pub fn encode_session(secret: &str, claims: &SessionClaims) -> anyhow::Result<String> {
    let claims = SessionClaims {
        exp: (chrono::Utc::now() + chrono::Duration::days(SESSION_LIFETIME_DAYS)).timestamp()
            as usize,
        ..claims.clone()
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn decode_session(secret: &str, token: &str) -> anyhow::Result<SessionClaims> {
    let token_data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// The logged-in user, if the session names one that still exists.
pub async fn current_user(state: &AppState, session: &Session) -> Result<Option<UserRow>, StatusCode> {
    let Some(id) = session.curr_user() else {
        return Ok(None);
    };
    run_db(state, move |db| db.get_user(id)).await
}

/// Extension inserted by [`require_login`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRow);

/// Let logged-in users through; everyone else is flashed and sent to the login page.
pub async fn require_login(
    State(state): State<AppState>,
    mut session: Session,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    match current_user(&state, &session).await? {
        Some(user) => {
            req.extensions_mut().insert(CurrentUser(user));
            Ok(next.run(req).await)
        }
        None => {
            warn!(path = %req.uri().path(), "Unauthenticated request redirected to login");
            if session.curr_user().is_some() {
                session.logout();
            }
            session.flash(FlashCategory::Danger, "Access unauthorized.");
            Ok((session, pages::redirect("/login")).into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_round_trips_through_jwt() {
        let claims = SessionClaims {
            curr_user: Some(7),
            flashes: vec![Flash {
                category: FlashCategory::Success,
                message: "Hello, testuser!".into(),
            }],
            ..Default::default()
        };

        let token = encode_session("secret", &claims).unwrap();
        let decoded = decode_session("secret", &token).unwrap();

        assert_eq!(decoded.curr_user, Some(7));
        assert_eq!(decoded.flashes, claims.flashes);
        assert!(decoded.exp > 0);
    }

    #[test]
    fn session_signed_with_other_key_is_rejected() {
        let claims = SessionClaims {
            curr_user: Some(1),
            ..Default::default()
        };
        let token = encode_session("secret", &claims).unwrap();
        assert!(decode_session("another-secret", &token).is_err());
    }

    #[test]
    fn csrf_check() {
        let mut session = Session {
            claims: SessionClaims::default(),
            secret: "secret".into(),
            modified: false,
        };

        assert_eq!(session.verify_csrf(true, None), Err(StatusCode::BAD_REQUEST));
        assert!(session.verify_csrf(false, None).is_ok());

        let token = session.csrf_token();
        assert!(session.modified);
        assert_eq!(token.len(), 40);
        assert_eq!(session.csrf_token(), token);
        assert!(session.verify_csrf(true, Some(&token)).is_ok());
        assert!(session.verify_csrf(true, Some("forged")).is_err());
    }
}
