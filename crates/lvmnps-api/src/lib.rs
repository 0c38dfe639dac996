// lvmnps-api: Async Rust client for Digital Loggers style web power switches

pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use client::SwitchClient;
pub use error::Error;
pub use models::Outlet;
pub use transport::{TlsMode, TransportConfig};
