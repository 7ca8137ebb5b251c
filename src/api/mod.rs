//! HTTP layer: a thin shell around the library/transcoding core. Routes map
//! directly onto the external interfaces the core exposes; auth is a single
//! bearer-token check per paired device.

mod artwork;
pub mod auth;
mod library;
mod pairing;
mod state;
mod stream;

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::{web, Error, HttpResponse};

pub use state::AppState;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/pair").route(web::post().to(pairing::pair)))
        .service(
            web::scope("")
                .wrap(actix_web::middleware::from_fn(require_auth))
                .route("/stream/{path:.*}", web::get().to(stream::stream))
                .route("/download/{song_id}", web::get().to(stream::download))
                .route("/artwork/{album_id}", web::get().to(artwork::album_artwork))
                .route("/song-artwork/{song_id}", web::get().to(artwork::song_artwork))
                .route("/api/library", web::get().to(library::get_library))
                .route("/api/album/{id}", web::get().to(library::get_album))
                .route("/api/playlists", web::get().to(library::get_playlists))
                .route("/api/rescan", web::post().to(library::trigger_rescan)),
        );
}

async fn require_auth(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let state = req.app_data::<web::Data<AppState>>().cloned();
    let authorized = state
        .as_ref()
        .and_then(|s| {
            req.headers()
                .get("Authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .and_then(|token| s.auth.verify(token))
        })
        .is_some();

    if authorized {
        Ok(next.call(req).await?.map_into_boxed_body())
    } else {
        let response = HttpResponse::Unauthorized().finish();
        Ok(req.into_response(response).map_into_boxed_body())
    }
}
