//! Infrastructure layer: event store backends, command handlers, config,
//! external services.

pub mod command;
pub mod config;
pub mod crypto;
pub mod event_store;


pub use command::{CommandError, CommandSide};
pub use config::WardenConfig;
pub use crypto::{CryptoError, SecretCrypto, Sha256SecretHasher};
