use thiserror::Error;

/// Failure of a JSON-RPC call against the website backend
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("backend error: {0}")]
    Remote(String),

    #[error("response has neither result nor error")]
    MissingResult,
}

/// Failure of one of the room page's REST endpoints
#[derive(Debug, Error)]
pub enum RoomError {
    /// The Spotify identifier has no linked account (HTTP 404)
    #[error("spotify account {0} is not associated")]
    NotAssociated(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("endpoint returned HTTP {0}")]
    Status(reqwest::StatusCode),
}
