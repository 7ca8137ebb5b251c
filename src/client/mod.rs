//! Client-side download scheduling. Distinct from `core`: this is state a
//! paired mobile/desktop client owns locally, not the server's catalogue.

pub mod downloader;
pub mod media_cache;

pub use downloader::DownloadScheduler;
pub use media_cache::MediaCache;
