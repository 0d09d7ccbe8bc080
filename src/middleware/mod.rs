mod admin;
mod error_handler;

pub use admin::{ADMIN_KEY_HEADER, ADMIN_KEY_PARAM, admin_guard, admin_key_matches};
pub use error_handler::log_errors;
