//! notype Server: configuration and service wiring for the binary.

pub mod config;
pub mod services;

pub use config::Config;
pub use services::Services;
