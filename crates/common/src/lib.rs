// coedit-common: wire protocol, identity types, and content normalization
// shared by the coedit crates.

pub mod normalize;
pub mod protocol;
pub mod types;
