use std::time::Duration;

/// Errors surfaced by [`MprisClient`](crate::MprisClient) operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Player address is not a valid bus name segment
    #[error("Invalid player address {address:?}: {reason}")]
    InvalidAddress {
        /// Address as supplied by the caller
        address: String,
        /// Which rule the address broke
        reason: &'static str,
    },

    /// Track or playlist identifier cannot be sent as an object path
    #[error("Invalid object path {path:?}: {source}")]
    InvalidObjectPath {
        /// Identifier as supplied by the caller
        path: String,
        /// Validation failure
        #[source]
        source: zbus::zvariant::Error,
    },

    /// Operation attempted before a bus session was attached
    #[error("Not connected to a bus session")]
    NotConnected,

    /// The bus or the remote player reported a failure
    #[error("D-Bus operation failed: {0}")]
    RemoteFault(#[from] zbus::Error),

    /// No reply arrived within the configured bound.
    ///
    /// The remote side may still have executed the call.
    #[error("No reply to {member} within {timeout:?}")]
    Timeout {
        /// Method that was called
        member: String,
        /// Bound that expired
        timeout: Duration,
    },

    /// Reply body did not have the shape the operation expects
    #[error("Malformed reply to {member}: {source}")]
    MalformedReply {
        /// Method or signal whose body failed to decode
        member: String,
        /// Decoding failure
        #[source]
        source: zbus::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
