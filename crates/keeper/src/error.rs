use shared::web3::contracts::core::error::ContractError;

/// The registry could not be queried, or answered with something that is not
/// a job batch. Counted against the error budget; never fatal on its own.
#[derive(Debug, thiserror::Error)]
#[error("failed to query next jobs: {0}")]
pub struct QueryError(#[from] pub ContractError);

/// Reasons the gas-price oracle could not produce a tip. Absorbed by the
/// oracle, which falls back to a fixed tip.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("oracle answered with status {0}")]
    Status(reqwest::StatusCode),
    #[error("invalid response body: {0}")]
    Body(#[from] serde_json::Error),
    #[error("response has no {0}")]
    MissingField(&'static str),
    #[error("estimate {0} is not a usable tip")]
    InvalidEstimate(f64),
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkIdError {
    #[error("network id is empty")]
    Empty,
    #[error("network id '{0}' is longer than 32 bytes")]
    TooLong(String),
}
