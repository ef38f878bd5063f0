pub mod content_type;
pub mod error;
pub mod models;
pub mod ports;
