//! `POST /pair` — the one unauthenticated endpoint. A device presents the
//! QR-scanned payload (validated by the client before it ever gets here) and
//! receives a long-lived bearer token back.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use super::auth::PairingPayload;
use super::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PairRequest {
    #[serde(flatten)]
    pub payload: PairingPayload,
    #[serde(default)]
    pub device_id: Option<String>,
}

pub async fn pair(req: web::Json<PairRequest>, state: web::Data<AppState>) -> HttpResponse {
    let device_id = req.device_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());

    match state.auth.pair_device(&device_id) {
        Ok(token) => HttpResponse::Ok().json(serde_json::json!({
            "deviceId": device_id,
            "token": token,
        })),
        Err(e) => HttpResponse::InternalServerError().body(format!("failed to issue token: {e}")),
    }
}
