use alloy::primitives::{Address, TxHash};

#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("unknown ABI artifact: {0}")]
    UnknownArtifact(String),
    #[error("failed to parse ABI artifact {name}: {reason}")]
    Abi { name: String, reason: String },
    #[error("call to {method} on {address} failed: {reason}")]
    Call {
        address: Address,
        method: &'static str,
        reason: String,
    },
    #[error("unexpected response from {method}: {reason}")]
    Decode {
        method: &'static str,
        reason: String,
    },
    /// Gas estimation failed, usually because the call reverts. The node's
    /// message (e.g. `execution reverted: <reason>`) is kept verbatim.
    #[error("gas estimation failed: {0}")]
    Reverted(String),
    #[error("transaction {tx_hash} was mined successfully but generated no single log entry")]
    NoLogEntries { tx_hash: TxHash },
    #[error("transaction failed: {0}")]
    Transaction(String),
    #[error("transaction not mined after {attempts} attempts")]
    NotMined { attempts: u32 },
}
