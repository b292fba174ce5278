pub mod config;
pub mod downloader;
pub mod server;

pub use config::RelayConfig;
pub use server::run_server;
