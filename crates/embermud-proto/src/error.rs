//! Error types for the protocol layer.

/// Errors that can occur while decoding client input.
///
/// Per the error-handling contract, none of these are fatal to the
/// session: a malformed GMCP frame is logged by the gateway and dropped,
/// and the connection keeps reading.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A GMCP sub-negotiation block did not contain valid UTF-8.
    #[error("gmcp payload is not valid utf-8")]
    InvalidEncoding(#[from] std::str::Utf8Error),

    /// A GMCP payload parsed as UTF-8 but not as `Package.Message {json}`.
    #[error("malformed gmcp frame: {0}")]
    MalformedGmcp(String),

    /// The JSON body of a GMCP message failed to parse.
    #[error("gmcp json body: {0}")]
    BadJson(#[from] serde_json::Error),
}
