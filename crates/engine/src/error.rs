// Error taxonomy for the sync engine. None of these are fatal to the host
// editor: transport errors feed the reconnect loop, everything else drops a
// single frame.

use coedit_common::protocol::ProtocolError;
use thiserror::Error;

use crate::connection::TransportError;
use crate::resolver::Rejection;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("a remote apply is already in progress")]
    ApplyInProgress,
}
