//! `GET /api/library`, `GET /api/album/{id}`, `GET /api/playlists`.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use super::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LibraryQuery {
    #[serde(default)]
    with_durations: bool,
}

pub async fn get_library(query: web::Query<LibraryQuery>, state: web::Data<AppState>) -> HttpResponse {
    let snapshot = if query.with_durations {
        state.library.to_api_json_with_durations(&state.base_url)
    } else {
        state.library.to_api_json(&state.base_url)
    };
    HttpResponse::Ok().json(snapshot)
}

pub async fn get_album(album_id: web::Path<String>, state: web::Data<AppState>) -> HttpResponse {
    match state.library.get_album_detail(&album_id, &state.base_url) {
        Some(detail) => HttpResponse::Ok().json(detail),
        None => HttpResponse::NotFound().finish(),
    }
}

pub async fn get_playlists(state: web::Data<AppState>) -> HttpResponse {
    let library = state.library.current_library();
    let playlists: Vec<_> = library
        .map(|lib| {
            lib.folder_playlists
                .iter()
                .map(|p| {
                    json!({
                        "id": p.id,
                        "name": p.name,
                        "songIds": p.song_ids,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    HttpResponse::Ok().json(json!({ "playlists": playlists }))
}

pub async fn trigger_rescan(state: web::Data<AppState>) -> HttpResponse {
    let music_folder = match crate::config::UserConfig::global().read().music_folder.clone() {
        Some(f) => f,
        None => return HttpResponse::PreconditionFailed().body("no music folder configured"),
    };

    match state.library.scan(std::path::PathBuf::from(music_folder)) {
        Ok(()) => HttpResponse::Accepted().finish(),
        Err(e) => HttpResponse::Conflict().body(format!("{e}")),
    }
}
