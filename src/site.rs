use actix_web::error::ErrorInternalServerError;
use actix_web::http::header;
use actix_web::web::{Data, Json};
use actix_web::{Error, HttpRequest};
use futures::Future;
use serde::Serialize;

use crate::auth::Auth;
use crate::db::models::{ProfileChangeset, User};
use crate::db::site::{GetSite, SiteKey, UpdateSite};
use crate::tenant::resolve_subdomain;
use crate::utils::Success;
use crate::{Actors, Config};

/// The public view of a tenant profile. Same fields the admin panel edits,
/// plus the subdomain; credentials never leave the db layer.
#[derive(Debug, Serialize)]
pub struct SiteInfo {
    pub subdomain: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub intro: Option<String>,
    pub theme_color: Option<String>,
    pub channel_url: Option<String>,
    pub stream_url: Option<String>,
    pub background_url: Option<String>,
    pub button_color: Option<String>,
    pub back_to_top_url: Option<String>,
}

impl From<User> for SiteInfo {
    fn from(user: User) -> Self {
        SiteInfo {
            subdomain: user.subdomain,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            intro: user.intro,
            theme_color: user.theme_color,
            channel_url: user.channel_url,
            stream_url: user.stream_url,
            background_url: user.background_url,
            button_color: user.button_color,
            back_to_top_url: user.back_to_top_url,
        }
    }
}

/// `GET /api/site-info`
///
/// On the admin panel (valid session, Referer pointing at it) this returns
/// the caller's own profile so the panel works on any host. Everywhere else
/// the tenant is resolved from the Host header; an unresolvable host is 404.
pub fn site_info(
    auth: Option<Auth>,
    req: HttpRequest,
    config: Data<Config>,
    actors: Data<Actors>,
) -> impl Future<Item = Json<SiteInfo>, Error = Error> {
    let from_admin = req
        .headers()
        .get(header::REFERER)
        .and_then(|h| h.to_str().ok())
        .map(|referer| referer.contains("admin"))
        .unwrap_or(false);

    let key = match (auth, from_admin) {
        (Some(auth), true) => SiteKey::Id(auth.id),
        _ => {
            let host = req.connection_info().host().to_string();
            SiteKey::Subdomain(resolve_subdomain(&host, &config.default_tenant))
        }
    };

    actors
        .db
        .send(GetSite { key })
        .map_err(ErrorInternalServerError)
        .and_then(|res| res.map_err(Error::from).map(|user| Json(user.into())))
}

/// `PUT /api/site-info`
///
/// Overwrites all nine editable profile fields at once. There is no partial
/// update: a field missing from the body is cleared.
pub fn update_site_info(
    auth: Auth,
    changes: Json<ProfileChangeset>,
    actors: Data<Actors>,
) -> impl Future<Item = Json<Success>, Error = Error> {
    let msg = UpdateSite {
        id: auth.id,
        changes: changes.into_inner(),
    };

    actors
        .db
        .send(msg)
        .map_err(ErrorInternalServerError)
        .and_then(|res| res.map_err(Error::from).map(|_| Json(Success::new())))
}
