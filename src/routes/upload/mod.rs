mod handler;
mod model;

pub use handler::{upload, upload_avatar};
