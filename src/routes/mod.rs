pub mod auth;
pub mod geocode;
pub mod log;
pub mod push;
pub mod upload;
pub mod user;
