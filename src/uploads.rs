use actix_multipart::Multipart;
use actix_web::error::{ErrorBadRequest, ErrorInternalServerError};
use actix_web::web::{self, Data, Json};
use actix_web::Error;
use futures::future::{self, Either};
use futures::{Future, Stream};
use rand::Rng;
use serde::Serialize;
use std::path::Path;

use crate::auth::Auth;
use crate::Config;

/// Buffers the first file field of a multipart request, returning the
/// client-supplied filename (if any) and the raw bytes. Remaining fields are
/// ignored; both upload endpoints take exactly one file.
///
/// The cap is enforced here, chunk by chunk, while the body streams in.
/// Payload size limits configured on the route don't apply to multipart
/// extractors, so this is the only place the upload size gets checked.
pub fn read_file_field(
    multipart: Multipart,
    limit: usize,
) -> impl Future<Item = (Option<String>, Vec<u8>), Error = Error> {
    multipart
        .map_err(ErrorBadRequest)
        .into_future()
        .map_err(|(e, _)| e)
        .and_then(move |(field, _)| match field {
            Some(field) => {
                let filename = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename().map(String::from));

                Either::A(
                    field
                        .map_err(ErrorBadRequest)
                        .fold(Vec::new(), move |buf, chunk| append_chunk(buf, &chunk, limit))
                        .map(move |data| (filename, data)),
                )
            }
            None => Either::B(future::err(ErrorBadRequest("expected one file field"))),
        })
}

fn append_chunk(mut buf: Vec<u8>, chunk: &[u8], limit: usize) -> Result<Vec<u8>, Error> {
    if buf.len() + chunk.len() > limit {
        return Err(ErrorBadRequest("file is too large"));
    }

    buf.extend_from_slice(chunk);

    Ok(buf)
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

/// `POST /api/upload-image`
///
/// Stores the uploaded file under the uploads directory with a generated
/// name (millisecond timestamp plus random suffix, original extension kept)
/// and returns the relative URL to reference from the profile.
pub fn upload_image(
    _auth: Auth,
    multipart: Multipart,
    config: Data<Config>,
) -> impl Future<Item = Json<UploadResponse>, Error = Error> {
    read_file_field(multipart, config.max_upload_size).and_then(move |(filename, data)| {
        if data.is_empty() {
            return Either::A(future::err(ErrorBadRequest("no file was uploaded")));
        }

        let name = generated_name(filename.as_ref().map(String::as_str));
        let path = config.uploads_dir.join(&name);

        Either::B(
            web::block(move || std::fs::write(&path, &data))
                .map_err(ErrorInternalServerError)
                .map(move |_| {
                    Json(UploadResponse {
                        url: format!("/uploads/{}", name),
                    })
                }),
        )
    })
}

fn generated_name(original: Option<&str>) -> String {
    let ext = original
        .and_then(|name| Path::new(name).extension())
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    format!(
        "file-{}-{}{}",
        chrono::offset::Utc::now().timestamp_millis(),
        rand::thread_rng().gen::<u32>(),
        ext
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_within_the_limit_accumulate() {
        let buf = append_chunk(Vec::new(), b"hello ", 16).unwrap();
        let buf = append_chunk(buf, b"world", 16).unwrap();
        assert_eq!(buf, b"hello world");
    }

    #[test]
    fn a_chunk_may_fill_the_limit_exactly() {
        let buf = append_chunk(Vec::new(), &[0u8; 16], 16).unwrap();
        assert_eq!(buf.len(), 16);
    }

    #[test]
    fn the_chunk_that_crosses_the_limit_is_rejected() {
        let buf = append_chunk(Vec::new(), &[0u8; 10], 16).unwrap();
        let err = append_chunk(buf, &[0u8; 7], 16).unwrap_err();
        assert_eq!(
            actix_web::HttpResponse::from(err).status(),
            actix_web::http::StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn generated_name_keeps_the_extension() {
        let name = generated_name(Some("avatar.PNG"));
        assert!(name.starts_with("file-"));
        assert!(name.ends_with(".PNG"));
    }

    #[test]
    fn generated_name_without_extension() {
        let name = generated_name(None);
        assert!(name.starts_with("file-"));
        assert!(!name.contains('.'));
    }

    #[test]
    fn generated_names_do_not_collide() {
        let a = generated_name(Some("a.png"));
        let b = generated_name(Some("a.png"));
        assert_ne!(a, b);
    }
}
