use actix::prelude::*;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use diesel::prelude::*;
use failure_derive::Fail;

use crate::db::models::{NewSong, Song, User};
use crate::db::DbExecutor;

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "Database error: {}", _0)]
    DbError(#[cause] diesel::result::Error),
}

impl ResponseError for Error {
    fn error_response(&self) -> HttpResponse {
        match self {
            Error::DbError(_) => HttpResponse::new(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

impl From<diesel::result::Error> for Error {
    fn from(f: diesel::result::Error) -> Self {
        Error::DbError(f)
    }
}

/// Public song listing, keyed by the subdomain the tenant resolver produced.
/// An unresolvable host or unknown subdomain yields an empty list rather
/// than an error; the public page treats both the same way.
pub struct SongsForTenant {
    pub subdomain: Option<String>,
}

impl Message for SongsForTenant {
    type Result = Result<Vec<Song>, Error>;
}

impl Handler<SongsForTenant> for DbExecutor {
    type Result = Result<Vec<Song>, Error>;

    fn handle(&mut self, msg: SongsForTenant, _: &mut Self::Context) -> Self::Result {
        songs_for_tenant(&self.0, msg)
    }
}

pub fn songs_for_tenant(conn: &SqliteConnection, msg: SongsForTenant) -> Result<Vec<Song>, Error> {
    use super::schema::songs::dsl::{id, owner_id, songs};
    use super::schema::users::dsl::{subdomain, users};

    let sub = match msg.subdomain {
        Some(sub) => sub,
        None => return Ok(Vec::new()),
    };

    let owner = match users.filter(subdomain.eq(&sub)).first::<User>(conn) {
        Ok(user) => user,
        Err(diesel::result::Error::NotFound) => return Ok(Vec::new()),
        Err(e) => return Err(Error::DbError(e)),
    };

    Ok(songs
        .filter(owner_id.eq(owner.id))
        .order(id.desc())
        .load(conn)?)
}

pub struct AddSong {
    pub song: NewSong,
}

impl Message for AddSong {
    type Result = Result<(), Error>;
}

impl Handler<AddSong> for DbExecutor {
    type Result = Result<(), Error>;

    fn handle(&mut self, msg: AddSong, _: &mut Self::Context) -> Self::Result {
        add_song(&self.0, msg)
    }
}

pub fn add_song(conn: &SqliteConnection, msg: AddSong) -> Result<(), Error> {
    use super::schema::songs::dsl::songs;

    diesel::insert_into(songs).values(&msg.song).execute(conn)?;

    Ok(())
}

/// Deletes only when both the row id and the owner match, so one tenant can
/// never delete another tenant's rows. A miss is not an error.
pub struct DeleteSong {
    pub id: i32,
    pub owner_id: i32,
}

impl Message for DeleteSong {
    type Result = Result<(), Error>;
}

impl Handler<DeleteSong> for DbExecutor {
    type Result = Result<(), Error>;

    fn handle(&mut self, msg: DeleteSong, _: &mut Self::Context) -> Self::Result {
        delete_song(&self.0, msg)
    }
}

pub fn delete_song(conn: &SqliteConnection, msg: DeleteSong) -> Result<(), Error> {
    use super::schema::songs::dsl::{id, owner_id, songs};

    diesel::delete(songs.filter(id.eq(msg.id)).filter(owner_id.eq(msg.owner_id)))
        .execute(conn)?;

    Ok(())
}

/// One spreadsheet import batch. All rows land in a single transaction;
/// a failure inserts nothing. Returns how many rows were actually inserted.
pub struct ImportSongs {
    pub songs: Vec<NewSong>,
}

impl Message for ImportSongs {
    type Result = Result<usize, Error>;
}

impl Handler<ImportSongs> for DbExecutor {
    type Result = Result<usize, Error>;

    fn handle(&mut self, msg: ImportSongs, _: &mut Self::Context) -> Self::Result {
        import_songs(&self.0, msg)
    }
}

pub fn import_songs(conn: &SqliteConnection, msg: ImportSongs) -> Result<usize, Error> {
    use super::schema::songs::dsl::songs;

    conn.transaction::<_, diesel::result::Error, _>(|| {
        diesel::insert_into(songs).values(&msg.songs).execute(conn)
    })
    .map_err(Error::DbError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::auth::{create_user, CreateUser};
    use crate::db::models::Song;
    use crate::db::site::{get_site, GetSite, SiteKey};
    use crate::db::test_connection;

    fn seed_tenant(conn: &SqliteConnection, name: &str) -> i32 {
        create_user(
            conn,
            CreateUser {
                username: name.into(),
                password: b"hunter2".to_vec(),
                subdomain: name.into(),
                display_name: None,
            },
        )
        .unwrap();

        get_site(
            conn,
            GetSite {
                key: SiteKey::Subdomain(Some(name.into())),
            },
        )
        .unwrap()
        .id
    }

    fn song(owner_id: i32, title: &str) -> NewSong {
        NewSong {
            owner_id,
            title: title.into(),
            category: Song::DEFAULT_CATEGORY.into(),
            video_url: String::new(),
        }
    }

    #[test]
    fn listing_is_per_tenant_and_newest_first() {
        let conn = test_connection();
        let alice = seed_tenant(&conn, "alice");
        let bob = seed_tenant(&conn, "bob");

        add_song(&conn, AddSong { song: song(alice, "first") }).unwrap();
        add_song(&conn, AddSong { song: song(alice, "second") }).unwrap();
        add_song(&conn, AddSong { song: song(bob, "other") }).unwrap();

        let listed = songs_for_tenant(
            &conn,
            SongsForTenant {
                subdomain: Some("alice".into()),
            },
        )
        .unwrap();
        let titles: Vec<_> = listed.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["second", "first"]);
    }

    #[test]
    fn unknown_tenant_lists_empty() {
        let conn = test_connection();
        seed_tenant(&conn, "alice");

        assert!(songs_for_tenant(
            &conn,
            SongsForTenant {
                subdomain: Some("nobody".into()),
            },
        )
        .unwrap()
        .is_empty());
        assert!(songs_for_tenant(&conn, SongsForTenant { subdomain: None })
            .unwrap()
            .is_empty());
    }

    #[test]
    fn delete_requires_matching_owner() {
        let conn = test_connection();
        let alice = seed_tenant(&conn, "alice");
        let bob = seed_tenant(&conn, "bob");

        add_song(&conn, AddSong { song: song(alice, "keep me") }).unwrap();
        let target = songs_for_tenant(
            &conn,
            SongsForTenant {
                subdomain: Some("alice".into()),
            },
        )
        .unwrap()[0]
            .id;

        // Bob aims at Alice's row: reported as success, row intact.
        delete_song(&conn, DeleteSong { id: target, owner_id: bob }).unwrap();
        assert_eq!(
            songs_for_tenant(
                &conn,
                SongsForTenant {
                    subdomain: Some("alice".into()),
                },
            )
            .unwrap()
            .len(),
            1
        );

        delete_song(&conn, DeleteSong { id: target, owner_id: alice }).unwrap();
        assert!(songs_for_tenant(
            &conn,
            SongsForTenant {
                subdomain: Some("alice".into()),
            },
        )
        .unwrap()
        .is_empty());
    }

    #[test]
    fn import_inserts_all_rows_atomically() {
        let conn = test_connection();
        let alice = seed_tenant(&conn, "alice");

        let inserted = import_songs(
            &conn,
            ImportSongs {
                songs: vec![song(alice, "one"), song(alice, "two"), song(alice, "three")],
            },
        )
        .unwrap();
        assert_eq!(inserted, 3);

        assert_eq!(
            songs_for_tenant(
                &conn,
                SongsForTenant {
                    subdomain: Some("alice".into()),
                },
            )
            .unwrap()
            .len(),
            3
        );
    }
}
