use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;
use shared::web3::contracts::implementations::sequencer_contract::SequencerContract;
use shared::web3::contracts::structs::workable_job::WorkableJob;

use crate::error::QueryError;
use crate::network::NetworkId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCandidate {
    pub address: Address,
    pub eligible: bool,
    pub call_data: Bytes,
}

impl From<WorkableJob> for JobCandidate {
    fn from(job: WorkableJob) -> Self {
        Self {
            address: job.job,
            eligible: job.can_work,
            call_data: job.args,
        }
    }
}

/// Registry of executable jobs. The batch is returned in registry order and
/// is processed in that order.
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn next_jobs(&self, network: &NetworkId) -> Result<Vec<JobCandidate>, QueryError>;
}

#[async_trait]
impl<P> JobSource for SequencerContract<P>
where
    P: alloy::providers::Provider + Send + Sync,
{
    async fn next_jobs(&self, network: &NetworkId) -> Result<Vec<JobCandidate>, QueryError> {
        let jobs = self.get_next_jobs(network.as_bytes32()).await?;
        Ok(jobs.into_iter().map(JobCandidate::from).collect())
    }
}
