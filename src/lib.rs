pub mod config;
pub mod cosign;
pub mod directory;
pub mod error;
pub mod roles;
pub mod server;
