//! # chapter-images - Image Resolution over Object Storage
//!
//! The chapter website references photos by local-looking paths such as
//! `/images/Photos/Tabling/booth.jpg`, but the files live in a remote bucket
//! (Cloudflare R2, Backblaze B2 or Google Drive) whose key layout only
//! roughly follows the site's folders. This crate turns those references
//! into loadable URLs:
//!
//! - **normalize** - canonical form of a path for comparison
//! - **matcher** - exact, filename and parent-folder tie-break matching
//! - **resolver** - signed (cached) or public URLs for a matched key
//! - **lister** - bucket key listing with a cached front
//! - **loader** - the facade presentation code calls; never fails
//!
//! Storage backends plug in through [`StorageProvider`]. The
//! `chapter-images-server` crate ships the R2/B2 and Drive adapters plus
//! the HTTP endpoints.
//!
//! ## Quick Start
//!
//! ```rust
//! use chapter_images::{ImageLoader, InMemoryProvider, StorageConfig};
//! use std::sync::Arc;
//!
//! # tokio_test_block_on(async {
//! let config = StorageConfig {
//!     use_object_storage: true,
//!     bucket_name: "chapter-photos".to_string(),
//!     public_base_url: Some("https://cdn.example.com".to_string()),
//!     ..StorageConfig::default()
//! };
//! let provider = Arc::new(InMemoryProvider::with_keys("chapter-photos", ["ASCELOGO/ASCE.png"]));
//! let loader = ImageLoader::new(&config, provider);
//!
//! let url = loader.load("/images/ASCELOGO/ASCE.png").await;
//! assert_eq!(url, "https://cdn.example.com/ASCELOGO/ASCE.png");
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod lister;
pub mod loader;
pub mod matcher;
pub mod memory;
pub mod normalize;
pub mod provider;
pub mod resolver;

pub use cache::{ImageCaches, TtlCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Credentials, DeployMode, StorageConfig, UrlStrategy};
pub use error::{log_suppressed, ImageError, ProviderError, Result};
pub use lister::{BucketLister, CachedLister};
pub use loader::ImageLoader;
pub use matcher::{find_key, find_match, KeyMatch, MatchKind};
pub use memory::InMemoryProvider;
pub use normalize::normalize;
pub use provider::{ListPage, ObjectBody, ObjectInfo, StorageProvider};
pub use resolver::UrlResolver;
