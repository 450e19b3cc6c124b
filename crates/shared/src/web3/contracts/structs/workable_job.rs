use alloy::primitives::{Address, Bytes};

/// One entry of the sequencer's `getNextJobs` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkableJob {
    pub job: Address,
    pub can_work: bool,
    pub args: Bytes,
}
