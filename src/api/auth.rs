//! Minimal device-pairing auth: a single owner plus a set of paired devices,
//! each holding a long-lived JWT signed with a secret generated on first run.
//! No multi-user accounts (see Non-goals); this exists only to keep the HTTP
//! surface from being wide open on the overlay network.

use std::collections::HashSet;
use std::path::PathBuf;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

const TOKEN_LIFETIME_DAYS: i64 = 365;

pub struct AuthManager {
    secret: Vec<u8>,
    paired_devices_path: PathBuf,
    paired_devices: parking_lot::RwLock<HashSet<String>>,
}

impl AuthManager {
    pub fn load(secret_path: PathBuf, paired_devices_path: PathBuf) -> Self {
        let secret = load_or_create_secret(&secret_path);
        let paired_devices = load_paired_devices(&paired_devices_path);
        Self {
            secret,
            paired_devices_path,
            paired_devices: parking_lot::RwLock::new(paired_devices),
        }
    }

    /// Pair a new device, returning its signed token. Idempotent: re-pairing
    /// an already-known device id just issues a fresh token.
    pub fn pair_device(&self, device_id: &str) -> Result<String, jsonwebtoken::errors::Error> {
        self.paired_devices.write().insert(device_id.to_string());
        self.persist_paired_devices();
        self.issue_token(device_id)
    }

    pub fn issue_token(&self, device_id: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let exp = (chrono::Utc::now() + chrono::Duration::days(TOKEN_LIFETIME_DAYS)).timestamp() as usize;
        let claims = Claims {
            sub: device_id.to_string(),
            exp,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
    }

    /// Verify a bearer token, returning the device id it was issued for.
    /// The device must still be in the paired set (pairing can be revoked).
    pub fn verify(&self, token: &str) -> Option<String> {
        let data = decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &Validation::default()).ok()?;
        if self.paired_devices.read().contains(&data.claims.sub) {
            Some(data.claims.sub)
        } else {
            None
        }
    }

    pub fn revoke(&self, device_id: &str) {
        self.paired_devices.write().remove(device_id);
        self.persist_paired_devices();
    }

    fn persist_paired_devices(&self) {
        let devices: Vec<String> = self.paired_devices.read().iter().cloned().collect();
        if let Ok(json) = serde_json::to_string_pretty(&devices) {
            let _ = std::fs::write(&self.paired_devices_path, json);
        }
    }
}

fn load_or_create_secret(path: &PathBuf) -> Vec<u8> {
    if let Ok(existing) = std::fs::read(path) {
        if !existing.is_empty() {
            return existing;
        }
    }
    let secret: Vec<u8> = (0..32).map(|_| rand::thread_rng().gen()).collect();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(path, &secret);
    secret
}

fn load_paired_devices(path: &PathBuf) -> HashSet<String> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str::<Vec<String>>(&s).ok())
        .map(|v| v.into_iter().collect())
        .unwrap_or_default()
}

/// QR pairing payload accepted by the core. Validation/trust of the
/// server/port is the client's concern; the core just carries the shape.
#[derive(Debug, Serialize, Deserialize)]
pub struct PairingPayload {
    pub server: String,
    pub port: u16,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn paired_device_token_verifies() {
        let dir = TempDir::new().unwrap();
        let auth = AuthManager::load(dir.path().join("secret"), dir.path().join("devices.json"));
        let token = auth.pair_device("device-1").unwrap();
        assert_eq!(auth.verify(&token), Some("device-1".to_string()));
    }

    #[test]
    fn revoked_device_token_fails_verification() {
        let dir = TempDir::new().unwrap();
        let auth = AuthManager::load(dir.path().join("secret"), dir.path().join("devices.json"));
        let token = auth.pair_device("device-1").unwrap();
        auth.revoke("device-1");
        assert_eq!(auth.verify(&token), None);
    }

    #[test]
    fn secret_persists_across_loads() {
        let dir = TempDir::new().unwrap();
        let secret_path = dir.path().join("secret");
        let auth1 = AuthManager::load(secret_path.clone(), dir.path().join("devices.json"));
        let token = auth1.pair_device("device-1").unwrap();

        let auth2 = AuthManager::load(secret_path, dir.path().join("devices2.json"));
        // auth2 doesn't know about device-1's pairing record (separate store)
        // but the secret is stable, so decoding succeeds at the crypto layer.
        assert!(jsonwebtoken::decode::<Claims>(
            &token,
            &DecodingKey::from_secret(&auth2.secret),
            &Validation::default()
        )
        .is_ok());
    }
}
