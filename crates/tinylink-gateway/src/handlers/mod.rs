mod health;
mod url;
mod version;

pub use health::{health_handler, ready_handler};
pub use url::{create_url_handler, delete_url_handler, redirect_handler};
pub use version::version_handler;
