//! Storage adapters and HTTP endpoints for `chapter-images`
//!
//! - [`providers`]: Cloudflare R2, Backblaze B2 and plain S3 through the AWS
//!   SDK, Google Drive through its REST API, and a seeded in-memory store
//! - [`http`]: the listing, image, resolve and cache-clear routes
//! - [`config`]: the `[storage]`/`[provider]`/`[listen]` TOML file

pub mod config;
pub mod error;
pub mod http;
pub mod providers;

pub use config::{ListenSettings, ProviderKind, ProviderSettings, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use http::{handle, AppState};
pub use providers::{connect, DriveProvider, S3CompatibleProvider};
