use actix::prelude::*;
use diesel::prelude::*;
use failure_derive::Fail;
use unicode_normalization::UnicodeNormalization;

use crate::db::models::{NewUser, User};
use crate::db::DbExecutor;
use crate::utils::PerfLog;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use rand::Rng;

const HASH_CONFIG: argon2::Config = argon2::Config {
    ad: &[],
    hash_length: 32,
    lanes: 1,
    mem_cost: 64 * 1024, // 64 MiB
    secret: &[],
    thread_mode: argon2::ThreadMode::Sequential,
    time_cost: 2,
    variant: argon2::Variant::Argon2i,
    version: argon2::Version::Version13,
};

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "Incorrect username or password")]
    InvalidCredentials,
    #[fail(display = "User already exists")]
    UserExists,
    #[fail(display = "Subdomain is already taken")]
    SubdomainTaken,
    #[fail(display = "Database error occurred")]
    DbError(#[cause] diesel::result::Error),
    #[fail(display = "Error while hashing")]
    HashError(#[cause] argon2::Error),
}

impl ResponseError for Error {
    fn error_response(&self) -> HttpResponse {
        match self {
            Error::InvalidCredentials => HttpResponse::new(StatusCode::UNAUTHORIZED),
            Error::UserExists => HttpResponse::new(StatusCode::BAD_REQUEST),
            Error::SubdomainTaken => HttpResponse::new(StatusCode::BAD_REQUEST),
            Error::DbError(_) => HttpResponse::new(StatusCode::INTERNAL_SERVER_ERROR),
            Error::HashError(_) => HttpResponse::new(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

impl From<diesel::result::Error> for Error {
    fn from(f: diesel::result::Error) -> Self {
        Error::DbError(f)
    }
}

impl From<argon2::Error> for Error {
    fn from(f: argon2::Error) -> Self {
        Error::HashError(f)
    }
}

pub struct CreateUser {
    pub username: String,
    pub password: Vec<u8>,
    pub subdomain: String,
    pub display_name: Option<String>,
}

impl Message for CreateUser {
    type Result = Result<(), Error>;
}

impl Handler<CreateUser> for DbExecutor {
    type Result = Result<(), Error>;

    fn handle(&mut self, msg: CreateUser, _: &mut Self::Context) -> Self::Result {
        create_user(&self.0, msg)
    }
}

pub fn create_user(conn: &SqliteConnection, msg: CreateUser) -> Result<(), Error> {
    use super::schema::users::dsl::{self, users};

    let username = normalize_username(&msg.username);

    match users
        .filter(dsl::username.eq(&username))
        .first::<User>(conn)
    {
        Err(diesel::result::Error::NotFound) => (),
        Ok(_) => return Err(Error::UserExists),
        Err(e) => return Err(Error::DbError(e)),
    }

    // The subdomain doubles as the tenant's public address, so it has the
    // same uniqueness rules as the username.
    match users
        .filter(dsl::subdomain.eq(&msg.subdomain))
        .first::<User>(conn)
    {
        Err(diesel::result::Error::NotFound) => (),
        Ok(_) => return Err(Error::SubdomainTaken),
        Err(e) => return Err(Error::DbError(e)),
    }

    let mut salt = [0u8; 16];
    rand::thread_rng().fill(&mut salt);

    let p = PerfLog::new();
    let hash = argon2::hash_encoded(&msg.password, &salt, &HASH_CONFIG)?;
    p.log("Hash time");

    let new_user = NewUser {
        username: &username,
        hash: &hash,
        subdomain: &msg.subdomain,
        display_name: msg.display_name.as_ref().unwrap_or(&msg.username),
        theme_color: User::DEFAULT_THEME_COLOR,
    };

    diesel::insert_into(users)
        .values(&new_user)
        .execute(conn)
        .map_err(map_insert_error)?;

    Ok(())
}

/// The pre-insert lookups can race with a concurrent registration on another
/// db thread; the UNIQUE constraints are the final word. A violation naming
/// the subdomain column reports the subdomain as taken, any other violation
/// the username.
fn map_insert_error(e: diesel::result::Error) -> Error {
    use diesel::result::{DatabaseErrorKind, Error::DatabaseError};

    match e {
        DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
            if info.message().contains("subdomain") =>
        {
            Error::SubdomainTaken
        }
        DatabaseError(DatabaseErrorKind::UniqueViolation, _) => Error::UserExists,
        e => Error::DbError(e),
    }
}

pub struct Login {
    pub username: String,
    pub password: Vec<u8>,
}

impl Message for Login {
    type Result = Result<User, Error>;
}

impl Handler<Login> for DbExecutor {
    type Result = Result<User, Error>;

    fn handle(&mut self, msg: Login, _: &mut Self::Context) -> Self::Result {
        login(&self.0, msg)
    }
}

pub fn login(conn: &SqliteConnection, msg: Login) -> Result<User, Error> {
    use super::schema::users::dsl::{self, users};

    let username = normalize_username(&msg.username);

    let user = match users
        .filter(dsl::username.eq(&username))
        .first::<User>(conn)
    {
        Ok(u) => u,
        Err(diesel::result::Error::NotFound) => return Err(Error::InvalidCredentials),
        Err(e) => return Err(Error::DbError(e)),
    };

    if argon2::verify_encoded(&user.hash, &msg.password)? {
        Ok(user)
    } else {
        Err(Error::InvalidCredentials)
    }
}

pub struct ChangePassword {
    pub id: i32,
    pub password: Vec<u8>,
}

impl Message for ChangePassword {
    type Result = Result<(), Error>;
}

impl Handler<ChangePassword> for DbExecutor {
    type Result = Result<(), Error>;

    fn handle(&mut self, msg: ChangePassword, _: &mut Self::Context) -> Self::Result {
        change_password(&self.0, msg)
    }
}

pub fn change_password(conn: &SqliteConnection, msg: ChangePassword) -> Result<(), Error> {
    use super::schema::users::dsl::{hash, id, users};

    let mut salt = [0u8; 16];
    rand::thread_rng().fill(&mut salt);

    let p = PerfLog::new();
    let new_hash = argon2::hash_encoded(&msg.password, &salt, &HASH_CONFIG)?;
    p.log("Hash time");

    diesel::update(users.filter(id.eq(msg.id)))
        .set(hash.eq(new_hash))
        .execute(conn)?;

    Ok(())
}

fn normalize_username(s: &str) -> String {
    s.nfkc().collect::<String>().to_lowercase()
}
