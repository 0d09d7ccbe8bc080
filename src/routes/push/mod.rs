mod handler;
mod model;

pub use handler::register_token;
