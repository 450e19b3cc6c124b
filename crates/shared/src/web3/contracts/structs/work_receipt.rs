use alloy::primitives::TxHash;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkReceipt {
    pub tx_hash: TxHash,
    pub successful: bool,
    pub block_number: Option<u64>,
}
