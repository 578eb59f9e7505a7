use actix_multipart::Multipart;
use actix_web::error::{ErrorBadRequest, ErrorInternalServerError};
use actix_web::web::{Data, Json, Path};
use actix_web::{Error, HttpRequest};
use calamine::{DataType, Reader, Xlsx};
use futures::Future;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use crate::auth::Auth;
use crate::db::models::{NewSong, Song};
use crate::db::songs::{AddSong, DeleteSong, ImportSongs, SongsForTenant};
use crate::tenant::resolve_subdomain;
use crate::uploads::read_file_field;
use crate::utils::{PerfLog, Success};
use crate::{Actors, Config};

/// `GET /api/songs`
///
/// The public song list for whichever tenant the Host header resolves to,
/// newest first. A host that resolves to nothing answers an empty array,
/// not an error.
pub fn list_songs(
    req: HttpRequest,
    config: Data<Config>,
    actors: Data<Actors>,
) -> impl Future<Item = Json<Vec<Song>>, Error = Error> {
    let host = req.connection_info().host().to_string();
    let msg = SongsForTenant {
        subdomain: resolve_subdomain(&host, &config.default_tenant),
    };

    actors
        .db
        .send(msg)
        .map_err(ErrorInternalServerError)
        .and_then(|res| res.map_err(Error::from).map(Json))
}

#[derive(Debug, Deserialize)]
pub struct AddSongData {
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
}

/// `POST /api/songs`
///
/// Adds one song to the caller's list. Only the title is required; a blank
/// category falls back to the default label.
pub fn add_song(
    auth: Auth,
    data: Json<AddSongData>,
    actors: Data<Actors>,
) -> impl Future<Item = Json<Success>, Error = Error> {
    let data = data.into_inner();

    if data.title.trim().is_empty() {
        return futures::future::Either::A(futures::future::err(ErrorBadRequest(
            "title is required",
        )));
    }

    let msg = AddSong {
        song: NewSong {
            owner_id: auth.id,
            title: data.title,
            category: data
                .category
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| Song::DEFAULT_CATEGORY.to_string()),
            video_url: data.video_url.unwrap_or_default(),
        },
    };

    futures::future::Either::B(
        actors
            .db
            .send(msg)
            .map_err(ErrorInternalServerError)
            .and_then(|res| res.map_err(Error::from).map(|_| Json(Success::new()))),
    )
}

/// `DELETE /api/songs/{id}`
///
/// Deletes the caller's song. Succeeds even when the id doesn't exist or
/// belongs to someone else; in either case nothing is removed.
pub fn delete_song(
    auth: Auth,
    id: Path<i32>,
    actors: Data<Actors>,
) -> impl Future<Item = Json<Success>, Error = Error> {
    let msg = DeleteSong {
        id: *id,
        owner_id: auth.id,
    };

    actors
        .db
        .send(msg)
        .map_err(ErrorInternalServerError)
        .and_then(|res| res.map_err(Error::from).map(|_| Json(Success::new())))
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    /// Number of data rows in the sheet, not the number inserted. Kept for
    /// compatibility with the admin panel, which displays this figure.
    pub count: usize,
}

/// `POST /api/upload-excel`
///
/// Bulk import from the first worksheet of an uploaded .xlsx file. Rows
/// without a recognizable title column value are skipped; the accepted rows
/// are inserted in one all-or-nothing transaction.
pub fn import_songs(
    auth: Auth,
    multipart: Multipart,
    config: Data<Config>,
    actors: Data<Actors>,
) -> impl Future<Item = Json<ImportResponse>, Error = Error> {
    let owner_id = auth.id;

    read_file_field(multipart, config.max_upload_size)
        .and_then(|(_, data)| {
            let p = PerfLog::new();
            let parsed = parse_sheet(&data).map_err(|e| {
                error!("spreadsheet parse failed: {}", e);

                ErrorInternalServerError("failed to read spreadsheet")
            })?;
            p.log("Sheet parse");

            if parsed.submitted == 0 {
                return Err(ErrorBadRequest("spreadsheet has no rows"));
            }

            Ok(parsed)
        })
        .and_then(move |parsed| {
            let submitted = parsed.submitted;
            let songs = parsed
                .rows
                .into_iter()
                .map(|row| NewSong {
                    owner_id,
                    title: row.title,
                    category: row.category,
                    video_url: row.video_url,
                })
                .collect();

            actors
                .db
                .send(ImportSongs { songs })
                .map_err(ErrorInternalServerError)
                .and_then(move |res| {
                    res.map_err(Error::from).map(move |inserted| {
                        if inserted != submitted {
                            info!(
                                "import: {} of {} rows had a usable title",
                                inserted, submitted
                            );
                        }

                        Json(ImportResponse {
                            success: true,
                            count: submitted,
                        })
                    })
                })
        })
}

// Accepted header spellings, matched case-insensitively against the first
// row of the sheet.
const TITLE_ALIASES: &[&str] = &["title", "song", "name"];
const CATEGORY_ALIASES: &[&str] = &["category", "genre", "type"];
const URL_ALIASES: &[&str] = &["video_url", "url", "link", "clip"];

pub struct ImportRow {
    pub title: String,
    pub category: String,
    pub video_url: String,
}

pub struct ParsedSheet {
    pub rows: Vec<ImportRow>,
    /// Every non-empty data row, including the ones skipped for lacking a
    /// title.
    pub submitted: usize,
}

fn parse_sheet(data: &[u8]) -> Result<ParsedSheet, calamine::XlsxError> {
    let mut workbook = Xlsx::new(Cursor::new(data))?;

    let sheet_name = match workbook.sheet_names().first().cloned() {
        Some(name) => name,
        None => {
            return Ok(ParsedSheet {
                rows: Vec::new(),
                submitted: 0,
            })
        }
    };

    let range = match workbook.worksheet_range(&sheet_name) {
        Some(range) => range?,
        None => {
            return Ok(ParsedSheet {
                rows: Vec::new(),
                submitted: 0,
            })
        }
    };

    Ok(collect_rows(range.rows()))
}

fn collect_rows<'a, I>(mut rows: I) -> ParsedSheet
where
    I: Iterator<Item = &'a [DataType]>,
{
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| cell_text(cell).unwrap_or_default().to_lowercase())
            .collect(),
        None => {
            return ParsedSheet {
                rows: Vec::new(),
                submitted: 0,
            }
        }
    };

    let title_col = column_index(&headers, TITLE_ALIASES);
    let category_col = column_index(&headers, CATEGORY_ALIASES);
    let url_col = column_index(&headers, URL_ALIASES);

    let mut out = Vec::new();
    let mut submitted = 0;

    for row in rows {
        if row.iter().all(|cell| cell_text(cell).is_none()) {
            continue;
        }
        submitted += 1;

        let title = match title_col.and_then(|i| row.get(i)).and_then(cell_text) {
            Some(title) => title,
            None => continue,
        };

        out.push(ImportRow {
            title,
            category: category_col
                .and_then(|i| row.get(i))
                .and_then(cell_text)
                .unwrap_or_else(|| Song::DEFAULT_CATEGORY.to_string()),
            video_url: url_col
                .and_then(|i| row.get(i))
                .and_then(cell_text)
                .unwrap_or_default(),
        });
    }

    ParsedSheet {
        rows: out,
        submitted,
    }
}

fn column_index(headers: &[String], aliases: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|header| aliases.contains(&header.trim()))
}

fn cell_text(cell: &DataType) -> Option<String> {
    let text = match cell {
        DataType::String(s) => s.trim().to_string(),
        DataType::Float(f) => f.to_string(),
        DataType::Int(i) => i.to_string(),
        _ => return None,
    };

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Sessions, SESSION_COOKIE};
    use actix_web::dev::Service;
    use actix_web::http::{header, Cookie, StatusCode};
    use actix_web::{test, web, App};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn empty_sessions() -> Sessions {
        Arc::new(Mutex::new(HashMap::new()))
    }

    #[test]
    fn posting_a_song_without_a_session_is_unauthorized() {
        let mut srv = test::init_service(
            App::new()
                .data(empty_sessions())
                .service(web::resource("/api/songs").route(web::post().to_async(add_song))),
        );

        let req = test::TestRequest::post()
            .uri("/api/songs")
            .header(header::CONTENT_TYPE, "application/json")
            .set_payload(r#"{"title":"Northern lights"}"#)
            .to_request();
        let resp = test::block_on(srv.call(req)).unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn an_oversized_session_cookie_is_unauthorized_not_a_crash() {
        let mut srv = test::init_service(
            App::new()
                .data(empty_sessions())
                .service(web::resource("/api/songs").route(web::post().to_async(add_song))),
        );

        // Decodes to 48 bytes, longer than any real token.
        let req = test::TestRequest::post()
            .uri("/api/songs")
            .cookie(Cookie::new(SESSION_COOKIE, "A".repeat(64)))
            .header(header::CONTENT_TYPE, "application/json")
            .set_payload(r#"{"title":"Northern lights"}"#)
            .to_request();
        let resp = test::block_on(srv.call(req)).unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    fn s(v: &str) -> DataType {
        DataType::String(v.to_string())
    }

    fn sheet(rows: &[Vec<DataType>]) -> ParsedSheet {
        collect_rows(rows.iter().map(|row| row.as_slice()))
    }

    #[test]
    fn headers_match_aliases_case_insensitively() {
        let parsed = sheet(&[
            vec![s("Song"), s("GENRE"), s("Link")],
            vec![s("Northern lights"), s("pop"), s("https://v.example/1")],
        ]);

        assert_eq!(parsed.submitted, 1);
        assert_eq!(parsed.rows.len(), 1);
        let row = &parsed.rows[0];
        assert_eq!(row.title, "Northern lights");
        assert_eq!(row.category, "pop");
        assert_eq!(row.video_url, "https://v.example/1");
    }

    #[test]
    fn rows_without_a_title_are_skipped_but_still_counted() {
        let parsed = sheet(&[
            vec![s("title"), s("category")],
            vec![s("kept"), s("pop")],
            vec![DataType::Empty, s("ballad")],
            vec![s("also kept"), DataType::Empty],
        ]);

        assert_eq!(parsed.submitted, 3);
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[1].category, Song::DEFAULT_CATEGORY);
    }

    #[test]
    fn fully_empty_rows_are_ignored_entirely() {
        let parsed = sheet(&[
            vec![s("title")],
            vec![DataType::Empty],
            vec![s("one")],
        ]);

        assert_eq!(parsed.submitted, 1);
        assert_eq!(parsed.rows.len(), 1);
    }

    #[test]
    fn numeric_titles_are_stringified() {
        let parsed = sheet(&[vec![s("title")], vec![DataType::Float(1999.0)]]);

        assert_eq!(parsed.rows[0].title, "1999");
    }

    #[test]
    fn missing_title_column_accepts_nothing() {
        let parsed = sheet(&[
            vec![s("artist"), s("album")],
            vec![s("someone"), s("something")],
        ]);

        assert_eq!(parsed.submitted, 1);
        assert!(parsed.rows.is_empty());
    }

    #[test]
    fn headerless_sheet_is_empty() {
        let parsed = sheet(&[]);
        assert_eq!(parsed.submitted, 0);
        assert!(parsed.rows.is_empty());
    }
}
