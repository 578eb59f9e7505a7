use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_types::{Integer, Text};
use log::info;

/// Ordered, append-only migration list. Never edit an entry that has shipped;
/// add a new version instead. The later ALTERs mirror the order in which the
/// profile columns were introduced.
const MIGRATIONS: &[(i32, &str)] = &[
    (
        1,
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            hash TEXT NOT NULL,
            subdomain TEXT UNIQUE,
            display_name TEXT,
            avatar_url TEXT,
            intro TEXT,
            theme_color TEXT DEFAULT '#fc9ee0'
        )",
    ),
    (
        2,
        "CREATE TABLE songs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT 'default',
            video_url TEXT NOT NULL DEFAULT ''
        )",
    ),
    (3, "ALTER TABLE users ADD COLUMN channel_url TEXT"),
    (4, "ALTER TABLE users ADD COLUMN stream_url TEXT"),
    (5, "ALTER TABLE users ADD COLUMN background_url TEXT"),
    (6, "ALTER TABLE users ADD COLUMN button_color TEXT"),
    (7, "ALTER TABLE users ADD COLUMN back_to_top_url TEXT"),
];

#[derive(QueryableByName)]
struct VersionRow {
    #[sql_type = "Integer"]
    version: i32,
}

/// Applies every migration newer than the recorded version, each inside its
/// own transaction. Safe to run on every startup; returns how many were
/// applied. Any failure aborts startup rather than being swallowed.
pub fn run(conn: &SqliteConnection) -> Result<usize, diesel::result::Error> {
    conn.batch_execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
    )?;

    let current = diesel::sql_query(
        "SELECT COALESCE(MAX(version), 0) AS version FROM schema_migrations",
    )
    .load::<VersionRow>(conn)?
    .pop()
    .map(|row| row.version)
    .unwrap_or(0);

    let mut applied = 0;
    for (version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        conn.transaction::<_, diesel::result::Error, _>(|| {
            diesel::sql_query(*sql).execute(conn)?;
            diesel::sql_query(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)",
            )
            .bind::<Integer, _>(version)
            .bind::<Text, _>(chrono::offset::Utc::now().to_rfc3339())
            .execute(conn)?;

            Ok(())
        })?;

        info!("applied migration {}", version);
        applied += 1;
    }

    Ok(applied)
}
