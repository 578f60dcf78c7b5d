use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("received {status} from upstream: {body}")]
    Upstream { status: StatusCode, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode upstream response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("400 Bad Request: {0}")]
    Validation(String),

    #[error("400 Bad Request: unknown transaction type {0}")]
    UnknownRuleType(u32),

    #[error("failed to load token {token_id} from mirror for network {network}")]
    TokenUnavailable { network: String, token_id: String },

    #[error("failed to load liquidity pools: {0}")]
    PoolDirectory(String),
}

impl Error {
    /// Transport failures and 5xx responses above 500 are worth another attempt.
    /// Anything at or below 500 is treated as a definitive answer.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::Upstream { status, .. } => status.as_u16() > 500,
            _ => false,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) | Error::UnknownRuleType(_) => 400,
            _ => 500,
        }
    }
}
