//! Streaming/artwork HTTP contract: range-capable byte serving at the
//! resolved (possibly transcoded) quality, plus artwork and raw-download
//! endpoints.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::core::Quality;

use super::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    quality: Option<String>,
}

/// `GET /stream/{path:.*}?quality=high|medium|low`. `path` is the raw
/// absolute song path (URL-encoded by the client); Range requests are honored.
pub async fn stream(
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<StreamQuery>,
    state: web::Data<AppState>,
) -> HttpResponse {
    let song_path = std::path::PathBuf::from(path.into_inner());
    let quality = Quality::parse(query.quality.as_deref().unwrap_or("high"));

    let resolved = match state.transcoding.resolve(&song_path, quality).await {
        Ok(p) => p,
        Err(e) => return HttpResponse::InternalServerError().body(format!("{e}")),
    };

    state.transcoding.begin_read(&resolved);
    let response = serve_file_with_ranges(&req, &resolved).await;
    state.transcoding.end_read(&resolved);
    response
}

/// Serve `path` honoring an optional `Range` header, returning 206 with a
/// `Content-Range` when one is present and satisfiable, 200 otherwise.
async fn serve_file_with_ranges(req: &HttpRequest, path: &std::path::Path) -> HttpResponse {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(_) => return HttpResponse::NotFound().finish(),
    };

    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let total = bytes.len() as u64;

    let range = req.headers().get("Range").and_then(|v| v.to_str().ok()).and_then(|v| parse_range(v, total));

    match range {
        Some((start, end)) if start <= end && end < total => {
            let slice = bytes[start as usize..=end as usize].to_vec();
            HttpResponse::PartialContent()
                .content_type(mime.as_ref())
                .insert_header(("Accept-Ranges", "bytes"))
                .insert_header(("Content-Range", format!("bytes {start}-{end}/{total}")))
                .body(slice)
        }
        _ => HttpResponse::Ok()
            .content_type(mime.as_ref())
            .insert_header(("Accept-Ranges", "bytes"))
            .body(bytes),
    }
}

/// Parse a single-range `Range: bytes=start-end` header value. Suffix
/// (`bytes=-500`) and open-ended (`bytes=500-`) forms are both supported.
/// Multi-range requests are not; only the first range is honored.
fn parse_range(header: &str, total: u64) -> Option<(u64, u64)> {
    let spec = header.strip_prefix("bytes=")?;
    let first = spec.split(',').next()?.trim();
    let (start_str, end_str) = first.split_once('-')?;

    if start_str.is_empty() {
        let suffix_len: u64 = end_str.parse().ok()?;
        let start = total.saturating_sub(suffix_len);
        return Some((start, total.saturating_sub(1)));
    }

    let start: u64 = start_str.parse().ok()?;
    let end: u64 = if end_str.is_empty() {
        total.saturating_sub(1)
    } else {
        end_str.parse().ok()?
    };
    Some((start, end))
}

/// `GET /download/{song_id}` — original file bytes, no transcoding.
pub async fn download(song_id: web::Path<String>, state: web::Data<AppState>) -> HttpResponse {
    let path = match state.library.get_song_path(&song_id) {
        Some(p) => p,
        None => return HttpResponse::NotFound().finish(),
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            HttpResponse::Ok().content_type(mime.as_ref()).body(bytes)
        }
        Err(_) => HttpResponse::NotFound().finish(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_range() {
        assert_eq!(parse_range("bytes=0-99", 1000), Some((0, 99)));
    }

    #[test]
    fn parses_open_ended_range() {
        assert_eq!(parse_range("bytes=500-", 1000), Some((500, 999)));
    }

    #[test]
    fn parses_suffix_range() {
        assert_eq!(parse_range("bytes=-100", 1000), Some((900, 999)));
    }

    #[test]
    fn rejects_malformed_header() {
        assert_eq!(parse_range("nonsense", 1000), None);
    }
}
