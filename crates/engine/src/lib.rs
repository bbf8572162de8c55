// coedit-engine library entry point.

pub mod config;
pub mod connection;
pub mod debounce;
pub mod detector;
pub mod error;
pub mod host;
pub mod resolver;
pub mod runtime;
pub mod session;

pub use config::{ConfigError, EngineConfig, EngineOptions};
pub use connection::{StatusLabel, WsConnector};
pub use error::SyncError;
pub use host::{HostEditor, MemoryEditor, Subscription};
pub use runtime::{EngineHandle, SyncPlugin};
pub use session::SessionIdentity;
