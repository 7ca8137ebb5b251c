//! Shared application state handed to every HTTP handler via `web::Data`.

use std::sync::Arc;

use crate::api::auth::AuthManager;
use crate::core::{LibraryManager, TranscodingCache};

pub struct AppState {
    pub library: Arc<LibraryManager>,
    pub transcoding: Arc<TranscodingCache>,
    pub auth: Arc<AuthManager>,
    pub base_url: String,
}
