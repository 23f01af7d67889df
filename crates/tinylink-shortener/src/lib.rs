//! URL creation for tinylink.
//!
//! [`ShortCodeMinter`] turns a URL and an optional alias into a stored
//! record under a [`ShortCodePolicy`]; [`ShortenerService`] wraps it with
//! cache population and logical delete.

pub mod generator;
pub mod minter;
pub mod policy;
pub mod service;

pub use generator::{Generator, RandomGenerator};
pub use minter::ShortCodeMinter;
pub use policy::{ShortCodePolicy, RESERVED_PATHS};
pub use service::ShortenerService;
