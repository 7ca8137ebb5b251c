//! `GET /artwork/{album_id}` and `GET /song-artwork/{song_id}`.

use actix_web::{web, HttpResponse};

use super::state::AppState;

pub async fn album_artwork(album_id: web::Path<String>, state: web::Data<AppState>) -> HttpResponse {
    match state.library.get_album_artwork(&album_id) {
        Some(bytes) => HttpResponse::Ok().content_type("image/jpeg").body(bytes),
        None => HttpResponse::NotFound().finish(),
    }
}

pub async fn song_artwork(song_id: web::Path<String>, state: web::Data<AppState>) -> HttpResponse {
    match state.library.get_song_artwork(&song_id) {
        Some(bytes) => HttpResponse::Ok().content_type("image/jpeg").body(bytes),
        None => HttpResponse::NotFound().finish(),
    }
}
