pub mod error;
pub mod types;
pub mod config;
pub mod util;
pub mod gcp;
pub mod secret;
pub mod credentials;
pub mod provider;
pub mod completion;
pub mod channel;
pub mod warehouse;
pub mod service;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
