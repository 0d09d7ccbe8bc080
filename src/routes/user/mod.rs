mod handler;
pub mod model;

pub use handler::{get_user_profile, list_users};
