//! Core types and traits for the tinylink URL shortener.
//!
//! This crate provides shared types and traits used by the shortener,
//! the redirector, the storage backends and the cache backends.

pub mod cache;
pub mod clock;
pub mod error;
pub mod repository;
pub mod shortcode;
pub mod shortener;

pub use cache::UrlCache;
pub use clock::{Clock, SystemClock};
pub use error::{CacheError, ShortenerError, StorageError};
pub use repository::{ReadRepository, Repository, StoredEntity, UrlRecord};
pub use shortcode::ShortCode;
pub use shortener::{Redirector, ShortenParams, Shortener};
