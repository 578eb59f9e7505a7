use actix::prelude::*;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use diesel::prelude::*;
use failure_derive::Fail;

use crate::db::models::{ProfileChangeset, User};
use crate::db::DbExecutor;

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "No tenant for this host")]
    NotFound,
    #[fail(display = "Database error occurred")]
    DbError(#[cause] diesel::result::Error),
}

impl ResponseError for Error {
    fn error_response(&self) -> HttpResponse {
        match self {
            Error::NotFound => HttpResponse::new(StatusCode::NOT_FOUND),
            Error::DbError(_) => HttpResponse::new(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

impl From<diesel::result::Error> for Error {
    fn from(f: diesel::result::Error) -> Self {
        Error::DbError(f)
    }
}

/// How to find the tenant whose site is being asked for: by session (admin
/// panel) or by the subdomain the tenant resolver derived from the host.
pub enum SiteKey {
    Id(i32),
    Subdomain(Option<String>),
}

pub struct GetSite {
    pub key: SiteKey,
}

impl Message for GetSite {
    type Result = Result<User, Error>;
}

impl Handler<GetSite> for DbExecutor {
    type Result = Result<User, Error>;

    fn handle(&mut self, msg: GetSite, _: &mut Self::Context) -> Self::Result {
        get_site(&self.0, msg)
    }
}

pub fn get_site(conn: &SqliteConnection, msg: GetSite) -> Result<User, Error> {
    use super::schema::users::dsl::{id, subdomain, users};

    let result = match msg.key {
        SiteKey::Id(user_id) => users.filter(id.eq(user_id)).first::<User>(conn),
        SiteKey::Subdomain(None) => return Err(Error::NotFound),
        SiteKey::Subdomain(Some(ref sub)) => {
            users.filter(subdomain.eq(sub)).first::<User>(conn)
        }
    };

    match result {
        Ok(user) => Ok(user),
        Err(diesel::result::Error::NotFound) => Err(Error::NotFound),
        Err(e) => Err(Error::DbError(e)),
    }
}

pub struct UpdateSite {
    pub id: i32,
    pub changes: ProfileChangeset,
}

impl Message for UpdateSite {
    type Result = Result<(), Error>;
}

impl Handler<UpdateSite> for DbExecutor {
    type Result = Result<(), Error>;

    fn handle(&mut self, msg: UpdateSite, _: &mut Self::Context) -> Self::Result {
        update_site(&self.0, msg)
    }
}

pub fn update_site(conn: &SqliteConnection, msg: UpdateSite) -> Result<(), Error> {
    use super::schema::users::dsl::{id, users};

    diesel::update(users.filter(id.eq(msg.id)))
        .set(&msg.changes)
        .execute(conn)?;

    Ok(())
}
