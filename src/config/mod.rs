//! Configuration and path management (§6, §10).

mod paths;
mod user_config;

pub use paths::Paths;
pub use user_config::UserConfig;
