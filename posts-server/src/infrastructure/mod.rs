pub mod config;
pub mod database;
pub mod file_store;
pub mod logging;
