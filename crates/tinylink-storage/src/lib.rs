//! Authoritative store implementations for tinylink.

pub mod memory;
pub mod mysql;
pub mod timed;

pub use memory::InMemoryRepository;
pub use mysql::MySqlRepository;
pub use timed::{TimedRepository, DEFAULT_STORE_TIMEOUT};
