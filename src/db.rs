use actix::prelude::*;
use diesel::sqlite::SqliteConnection;

pub mod auth;
pub mod migrate;
pub mod models;
pub mod schema;
pub mod site;
pub mod songs;

pub struct DbExecutor(pub SqliteConnection);

impl Actor for DbExecutor {
    type Context = SyncContext<Self>;
}

#[cfg(test)]
pub fn test_connection() -> SqliteConnection {
    use diesel::Connection;

    let conn = SqliteConnection::establish(":memory:").expect("in-memory sqlite");
    migrate::run(&conn).expect("migrations");

    conn
}
