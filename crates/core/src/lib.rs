// Hostmon Core - Activation control plane, connection cache & ports
// NO OS adapters here: process enumeration, spawning and sockets live in infra crates

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
