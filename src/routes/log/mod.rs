mod handler;
mod model;

pub use handler::log_error;
