use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;
use log::{error, info};
use shared::web3::contracts::constants::addresses::{FLAP_JOB_ADDRESS, ORACLE_JOB_ADDRESS};
use shared::web3::contracts::core::error::ContractError;
use shared::web3::contracts::helpers::gas::{GeometricGasPrice, DEFAULT_ESCALATION_INTERVAL};
use shared::web3::contracts::implementations::job_contract::JobContract;
use shared::web3::contracts::structs::work_receipt::WorkReceipt;

use crate::job_source::JobCandidate;
use crate::network::NetworkId;
use crate::tip_oracle::TipOracle;

/// Sends `work(network, call_data)` to a job contract and waits for it to be
/// mined.
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    async fn submit_work(
        &self,
        job: Address,
        network: &NetworkId,
        call_data: &Bytes,
        strategy: &GeometricGasPrice,
    ) -> Result<WorkReceipt, ContractError>;
}

/// Submits through the connected wallet's provider.
pub struct ChainSubmitter<P> {
    provider: P,
    from: Address,
}

impl<P> ChainSubmitter<P> {
    pub fn new(provider: P, from: Address) -> Self {
        Self { provider, from }
    }
}

#[async_trait]
impl<P> JobSubmitter for ChainSubmitter<P>
where
    P: alloy::providers::Provider + Clone + Send + Sync,
{
    async fn submit_work(
        &self,
        job: Address,
        network: &NetworkId,
        call_data: &Bytes,
        strategy: &GeometricGasPrice,
    ) -> Result<WorkReceipt, ContractError> {
        let contract = JobContract::new(job, self.provider.clone())?;
        contract
            .work(self.from, network.as_bytes32(), call_data.clone(), strategy)
            .await
    }
}

/// A job known to report "nothing to do" through a failed submission rather
/// than a quiet success.
#[derive(Debug, Clone, Copy)]
pub struct BenignSignature {
    pub contract: Address,
    pub message: &'static str,
}

impl BenignSignature {
    fn matches(&self, job: Address, error: &ContractError) -> bool {
        self.contract == job && error.to_string().contains(self.message)
    }
}

pub const KNOWN_BENIGN: &[BenignSignature] = &[
    BenignSignature {
        contract: ORACLE_JOB_ADDRESS,
        message: "mined successfully but generated no single log entry",
    },
    BenignSignature {
        contract: FLAP_JOB_ADDRESS,
        message: "execution reverted: Vow/insufficient-surplus",
    },
];

/// Whether `error` from `job` matches a [`KNOWN_BENIGN`] entry.
pub fn is_benign(job: Address, error: &ContractError) -> bool {
    KNOWN_BENIGN
        .iter()
        .any(|signature| signature.matches(job, error))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The registry marked the job as not workable.
    Skipped,
    /// The job is not the contract this keeper is bound to.
    AddressMismatch,
    Success(WorkReceipt),
    KnownBenign,
    Failure,
}

impl ExecutionOutcome {
    /// Increment this outcome contributes to the error budget.
    pub fn error_cost(&self) -> u32 {
        match self {
            ExecutionOutcome::Failure => 1,
            _ => 0,
        }
    }
}

pub struct ExecutionEngine<O, S> {
    network: NetworkId,
    expected_target: Option<Address>,
    tip_oracle: O,
    submitter: S,
    max_tip: Option<u128>,
}

impl<O: TipOracle, S: JobSubmitter> ExecutionEngine<O, S> {
    pub fn new(network: NetworkId, tip_oracle: O, submitter: S) -> Self {
        Self {
            network,
            expected_target: None,
            tip_oracle,
            submitter,
            max_tip: None,
        }
    }

    /// Only work candidates whose address is `target`.
    pub fn with_expected_target(mut self, target: Option<Address>) -> Self {
        self.expected_target = target;
        self
    }

    pub fn with_max_tip(mut self, max_tip: Option<u128>) -> Self {
        self.max_tip = max_tip;
        self
    }

    pub async fn execute(&self, candidate: &JobCandidate) -> ExecutionOutcome {
        if !candidate.eligible {
            info!("No update available for job {}", candidate.address);
            return ExecutionOutcome::Skipped;
        }
        if let Some(target) = self.expected_target {
            // Address equality is byte equality, so checksum casing never matters.
            if candidate.address != target {
                info!(
                    "No update available: job {} is not the expected target {target}",
                    candidate.address
                );
                return ExecutionOutcome::AddressMismatch;
            }
        }

        let quote = self.tip_oracle.initial_tip().await;
        let strategy = GeometricGasPrice::new(quote.wei_per_gas, DEFAULT_ESCALATION_INTERVAL)
            .with_max_tip(self.max_tip);

        let result = self
            .submitter
            .submit_work(
                candidate.address,
                &self.network,
                &candidate.call_data,
                &strategy,
            )
            .await;

        self.interpret(candidate, result)
    }

    fn interpret(
        &self,
        candidate: &JobCandidate,
        result: Result<WorkReceipt, ContractError>,
    ) -> ExecutionOutcome {
        match result {
            Ok(receipt) if receipt.successful => {
                info!(
                    "Exec on job {} done in tx {}",
                    candidate.address, receipt.tx_hash
                );
                ExecutionOutcome::Success(receipt)
            }
            Ok(receipt) => {
                error!(
                    "Transaction {} for job {} was mined but failed (calldata {})",
                    receipt.tx_hash, candidate.address, candidate.call_data
                );
                error!("Failed to run exec on job {}!", candidate.address);
                ExecutionOutcome::Failure
            }
            Err(e) if is_benign(candidate.address, &e) => {
                info!(
                    "Exec on job {} finished without effect: {e}",
                    candidate.address
                );
                ExecutionOutcome::KnownBenign
            }
            Err(e) => {
                error!(
                    "Submitting work to job {} with calldata {} failed: {e}",
                    candidate.address, candidate.call_data
                );
                error!("Failed to run exec on job {}!", candidate.address);
                ExecutionOutcome::Failure
            }
        }
    }
}
