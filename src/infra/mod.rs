pub mod config;
pub mod fabric;
pub mod logging;
