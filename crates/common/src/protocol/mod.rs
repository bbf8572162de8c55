pub mod ws;

pub use ws::{decode, encode, MessageKind, ProtocolError, SyncMessage};
