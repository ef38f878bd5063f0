pub mod application;
pub mod batch_service;
pub mod config;
pub mod domain;
pub mod infrastructure;
