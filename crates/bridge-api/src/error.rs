use thiserror::Error;

/// Error kinds surfaced across the bridge, one per failure domain named in
/// the error handling design.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("wallet store corrupt: {0}")]
    WalletStoreCorrupt(String),

    #[error("upstream rpc failed: {0}")]
    UpstreamRpcFailed(String),

    #[error("signing rejected: {0}")]
    SigningRejected(String),

    #[error("capture script fetch failed: {0}")]
    ScriptFetchFailed(String),

    #[error("browser disconnected")]
    BrowserDisconnected,
}

pub type Result<T> = std::result::Result<T, Error>;
