use actix_files::NamedFile;
use actix_web::http::header;
use actix_web::web::Data;
use actix_web::{Error, HttpRequest, HttpResponse, Responder};
use std::path::Path;

use crate::auth::Auth;
use crate::tenant::resolve_subdomain;
use crate::Config;

/// `GET /`
///
/// A host that resolves to a tenant gets the public song page; anything
/// else (the apex domain, typically) gets the login page.
pub fn index(req: HttpRequest, config: Data<Config>) -> Result<HttpResponse, Error> {
    let host = req.connection_info().host().to_string();
    let page = if resolve_subdomain(&host, &config.default_tenant).is_some() {
        "index.html"
    } else {
        "login.html"
    };

    serve(&config.public_dir.join(page), &req)
}

/// `GET /admin.html`
///
/// The admin panel is a page, not an API path, so a missing session
/// redirects to the login page instead of answering 401.
pub fn admin_page(
    auth: Option<Auth>,
    req: HttpRequest,
    config: Data<Config>,
) -> Result<HttpResponse, Error> {
    if auth.is_none() {
        return Ok(HttpResponse::Found()
            .header(header::LOCATION, "/login.html")
            .finish());
    }

    serve(&config.public_dir.join("admin.html"), &req)
}

fn serve(path: &Path, req: &HttpRequest) -> Result<HttpResponse, Error> {
    let file = NamedFile::open(path)?;

    file.respond_to(req)
}
