use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use actix_web::{
    dev::Payload,
    error::{ErrorBadRequest, ErrorInternalServerError, ErrorUnauthorized},
    http::{header, Cookie},
    web::{Data, Json},
    Error, FromRequest, HttpMessage, HttpRequest, HttpResponse,
};
use futures::Future;
use log::error;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::db::auth::{ChangePassword, CreateUser, Login};
use crate::utils::Success;
use crate::{Actors, Config};

pub use crate::db::models::User;

const TOKEN_SIZE: usize = 32;
pub const SESSION_COOKIE: &str = "session";

/// One logged-in admin session. Expiry is checked on every access, not just
/// left to the cookie's max-age.
#[derive(Clone)]
pub struct Session {
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

pub type Sessions = Arc<Mutex<HashMap<[u8; TOKEN_SIZE], Session>>>;

/// Looks up a token, evicting it when past its expiry.
pub fn session_user(sessions: &Sessions, token: &[u8; TOKEN_SIZE], now: DateTime<Utc>) -> Option<User> {
    let mut lock = sessions.lock();
    match lock.get(token) {
        Some(session) if session.expires_at > now => Some(session.user.clone()),
        Some(_) => {
            lock.remove(token);
            None
        }
        None => None,
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginData {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub subdomain: Option<String>,
}

/// `POST /api/login`
///
/// Checks the credentials, opens a session and sets the session cookie.
/// Returns the tenant's subdomain so the login page can send the browser to
/// the right place. Unknown user or wrong password both answer 401.
pub fn login(
    data: Json<LoginData>,
    sessions: Data<Sessions>,
    config: Data<Config>,
    actors: Data<Actors>,
) -> impl Future<Item = HttpResponse, Error = Error> {
    let data = data.into_inner();
    let msg = Login {
        username: data.username,
        password: data.password.into(),
    };

    let sessions = (*sessions).clone();
    let ttl = config.session_ttl_hours as i64;

    actors
        .db
        .send(msg)
        .map_err(|x| {
            error!("{}", x);

            ErrorInternalServerError("")
        })
        .and_then(move |res| match res {
            Ok(user) => {
                let mut buf = [0u8; TOKEN_SIZE];
                let mut rng = rand::thread_rng();
                rng.fill(&mut buf);

                let subdomain = user.subdomain.clone();
                sessions.lock().insert(
                    buf,
                    Session {
                        user,
                        expires_at: Utc::now() + Duration::hours(ttl),
                    },
                );

                let cookie = Cookie::build(SESSION_COOKIE, base64::encode(&buf))
                    .path("/")
                    .http_only(true)
                    .max_age_time(time::Duration::hours(ttl))
                    .finish();

                Ok(HttpResponse::Ok().cookie(cookie).json(LoginResponse {
                    success: true,
                    subdomain,
                }))
            }
            Err(e) => Err(e.into()),
        })
}

#[derive(Debug, Deserialize)]
pub struct RegisterData {
    pub username: String,
    pub password: String,
    pub subdomain: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// `POST /api/register`
///
/// Creates a tenant account. Username, password and subdomain are all
/// required; a duplicate username or subdomain answers 400 and leaves the
/// existing account untouched.
pub fn register(
    data: Json<RegisterData>,
    actors: Data<Actors>,
) -> impl Future<Item = Json<Success>, Error = Error> {
    let data = data.into_inner();

    if data.username.trim().is_empty()
        || data.password.is_empty()
        || data.subdomain.trim().is_empty()
    {
        return futures::future::Either::A(futures::future::err(ErrorBadRequest(
            "username, password and subdomain are required",
        )));
    }

    let msg = CreateUser {
        username: data.username,
        password: data.password.into(),
        subdomain: data.subdomain,
        display_name: data.display_name.filter(|name| !name.trim().is_empty()),
    };

    futures::future::Either::B(
        actors
            .db
            .send(msg)
            .map_err(|x| {
                error!("{}", x);

                ErrorInternalServerError("")
            })
            .and_then(|res| res.map_err(Error::from).map(|_| Json(Success::new()))),
    )
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordData {
    #[serde(rename = "newPassword")]
    pub new_password: String,
}

/// `POST /api/change-password`
///
/// Replaces the caller's password. The session stays open.
pub fn change_password(
    auth: Auth,
    data: Json<ChangePasswordData>,
    actors: Data<Actors>,
) -> impl Future<Item = Json<Success>, Error = Error> {
    let data = data.into_inner();

    if data.new_password.is_empty() {
        return futures::future::Either::A(futures::future::err(ErrorBadRequest(
            "new password must not be empty",
        )));
    }

    let msg = ChangePassword {
        id: auth.id,
        password: data.new_password.into(),
    };

    futures::future::Either::B(
        actors
            .db
            .send(msg)
            .map_err(ErrorInternalServerError)
            .and_then(|res| res.map_err(Error::from).map(|_| Json(Success::new()))),
    )
}

/// `GET /api/logout`
///
/// Drops the session (if any) and sends the browser back to the login page.
pub fn logout(auth: Option<Auth>, sessions: Data<Sessions>) -> HttpResponse {
    if let Some(auth) = auth {
        sessions.lock().remove(&auth.token);
    }

    let expired = Cookie::build(SESSION_COOKIE, "")
        .path("/")
        .max_age_time(time::Duration::seconds(0))
        .finish();

    HttpResponse::Found()
        .header(header::LOCATION, "/login.html")
        .cookie(expired)
        .finish()
}

/// Authentication extractor for the JSON API.
///
/// Expects the session token in the `session` cookie. A missing, malformed,
/// unknown or expired token answers Unauthorized; page routes that want a
/// redirect instead take `Option<Auth>` and decide themselves.
pub struct Auth {
    pub token: [u8; TOKEN_SIZE],
    pub id: i32,
    pub username: String,
    pub subdomain: Option<String>,
}

impl FromRequest for Auth {
    type Error = Error;
    type Future = Result<Auth, Error>;
    type Config = ();

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let sessions = Data::<Sessions>::from_request(req, payload)?;

        let cookie = req
            .cookie(SESSION_COOKIE)
            .ok_or_else(|| ErrorUnauthorized("Missing session cookie"))?;

        let buf = parse_token(cookie.value())
            .ok_or_else(|| ErrorUnauthorized("Malformed session token"))?;

        match session_user(&sessions, &buf, Utc::now()) {
            Some(user) => Ok(Auth {
                token: buf,
                id: user.id,
                username: user.username,
                subdomain: user.subdomain,
            }),
            None => Err(ErrorUnauthorized("Session doesn't exist")),
        }
    }
}

/// Decodes a cookie value into a session token. The cookie is attacker
/// controlled, so the value is decoded into a growable buffer and
/// length-checked; anything that isn't exactly a 32-byte base64 payload is
/// treated as an invalid token, never as a reason to fail differently.
fn parse_token(value: &str) -> Option<[u8; TOKEN_SIZE]> {
    let decoded = base64::decode(value).ok()?;
    if decoded.len() != TOKEN_SIZE {
        return None;
    }

    let mut buf = [0u8; TOKEN_SIZE];
    buf.copy_from_slice(&decoded);

    Some(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user(id: i32) -> User {
        User {
            id,
            username: format!("user{}", id),
            hash: String::new(),
            subdomain: Some(format!("sub{}", id)),
            display_name: None,
            avatar_url: None,
            intro: None,
            theme_color: None,
            channel_url: None,
            stream_url: None,
            background_url: None,
            button_color: None,
            back_to_top_url: None,
        }
    }

    #[test]
    fn token_round_trips_through_base64() {
        let token = [9u8; TOKEN_SIZE];
        assert_eq!(parse_token(&base64::encode(&token)), Some(token));
    }

    #[test]
    fn oversized_token_is_rejected_without_panicking() {
        // 64 base64 chars decode to 48 bytes, more than the fixed token
        // size. This used to overrun the decode buffer.
        let oversized = "A".repeat(64);
        assert_eq!(parse_token(&oversized), None);
    }

    #[test]
    fn undersized_and_garbage_tokens_are_rejected() {
        assert_eq!(parse_token(&base64::encode(&[1u8; 8])), None);
        assert_eq!(parse_token("not-base64!!"), None);
        assert_eq!(parse_token(""), None);
    }

    #[test]
    fn unknown_token_is_rejected() {
        let sessions: Sessions = Arc::new(Mutex::new(HashMap::new()));
        assert!(session_user(&sessions, &[7u8; TOKEN_SIZE], Utc::now()).is_none());
    }

    #[test]
    fn live_session_resolves_to_its_user() {
        let sessions: Sessions = Arc::new(Mutex::new(HashMap::new()));
        let token = [1u8; TOKEN_SIZE];
        sessions.lock().insert(
            token,
            Session {
                user: test_user(42),
                expires_at: Utc::now() + Duration::hours(1),
            },
        );

        let user = session_user(&sessions, &token, Utc::now()).unwrap();
        assert_eq!(user.id, 42);
    }

    #[test]
    fn expired_session_is_rejected_and_evicted() {
        let sessions: Sessions = Arc::new(Mutex::new(HashMap::new()));
        let token = [2u8; TOKEN_SIZE];
        sessions.lock().insert(
            token,
            Session {
                user: test_user(1),
                expires_at: Utc::now() - Duration::seconds(1),
            },
        );

        assert!(session_user(&sessions, &token, Utc::now()).is_none());
        assert!(sessions.lock().is_empty());
    }
}
