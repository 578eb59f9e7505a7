//! # Reading the HTTP API documentation
//!
//! Every endpoint handler carries the method and path of its route in the
//! first line of its doc comment. The function arguments tell you what the
//! endpoint consumes: `Json<T>` means a JSON body matching `T`, `Path<T>`
//! a path segment, `Multipart` a file upload. `Data<T>` and `HttpRequest`
//! are server plumbing and can be ignored.
//!
//! An argument wrapped in `Option<T>` is optional; `Option<Auth>` means the
//! endpoint works without a session but behaves differently with one.

#[macro_use]
extern crate diesel;

use actix::{Addr, SyncArbiter};
use actix_files::Files;
use actix_web::{middleware, web, App, HttpServer};
use diesel::prelude::{Connection, SqliteConnection};
use failure::ResultExt;
use log::info;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::Sessions;
use db::DbExecutor;

pub mod auth;
mod db;
pub mod pages;
pub mod routes;
pub mod site;
pub mod songs;
pub mod tenant;
pub mod uploads;
mod utils;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub bind_addr: String,
    pub db_path: String,
    pub db_threads: usize,
    /// Directory with the static pages; the uploads dir lives inside it so
    /// uploaded files are served under `/uploads/…`.
    pub public_dir: PathBuf,
    pub uploads_dir: PathBuf,
    /// Tenant served for a bare loopback host during development.
    pub default_tenant: String,
    pub session_ttl_hours: u64,
    pub max_upload_size: usize,
}

pub struct Actors {
    db: Addr<DbExecutor>,
}

fn main() -> Result<(), failure::Error> {
    env_logger::init();

    let config: Config =
        toml::from_str(&std::fs::read_to_string("config.toml").context("config.toml is missing")?)?;

    let connection = SqliteConnection::establish(&config.db_path)
        .expect("Failed to open connection to db");
    let applied = db::migrate::run(&connection).context("Failed to migrate database")?;
    if applied > 0 {
        info!("applied {} database migration(s)", applied);
    }
    std::mem::drop(connection);

    std::fs::create_dir_all(&config.uploads_dir).context("Failed to create uploads directory")?;

    let _sys = actix::System::new("songboard");

    let sessions: Sessions = Arc::new(Mutex::new(HashMap::new()));

    let database_url = config.db_path.clone();
    let db_addr = SyncArbiter::start(config.db_threads, move || {
        DbExecutor(
            SqliteConnection::establish(&database_url).expect("Failed to open connection to db"),
        )
    });

    let c = config.clone();
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .data(sessions.clone())
            .data(c.clone())
            .data(Actors {
                db: db_addr.clone(),
            })
            .service(web::resource("/api/login").route(web::post().to_async(auth::login)))
            .service(web::resource("/api/register").route(web::post().to_async(auth::register)))
            .service(
                web::resource("/api/change-password")
                    .route(web::post().to_async(auth::change_password)),
            )
            .service(web::resource("/api/logout").route(web::get().to(auth::logout)))
            .service(
                web::resource("/api/site-info")
                    .route(web::get().to_async(site::site_info))
                    .route(web::put().to_async(site::update_site_info)),
            )
            .service(
                web::resource("/api/songs")
                    .route(web::get().to_async(songs::list_songs))
                    .route(web::post().to_async(songs::add_song)),
            )
            .service(
                web::resource("/api/songs/{id}")
                    .route(web::delete().to_async(songs::delete_song)),
            )
            .service(
                web::resource("/api/upload-excel")
                    .route(web::post().to_async(songs::import_songs)),
            )
            .service(
                web::resource("/api/upload-image")
                    .route(web::post().to_async(uploads::upload_image)),
            )
            .service(web::resource("/").route(web::get().to(pages::index)))
            .service(web::resource("/admin.html").route(web::get().to(pages::admin_page)))
            .service(Files::new("/", c.public_dir.clone()))
    })
    .bind(&config.bind_addr)?;

    println!("Listening on:");
    for (addr, scheme) in srv.addrs_with_scheme() {
        println!("{}://{}", scheme, addr);
    }

    srv.run()?;

    Ok(())
}
