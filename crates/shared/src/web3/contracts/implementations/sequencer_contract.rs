use crate::web3::contracts::core::contract::{Contract, SEQUENCER_ABI};
use crate::web3::contracts::core::error::ContractError;
use crate::web3::contracts::structs::workable_job::WorkableJob;
use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, Bytes, B256};

const GET_NEXT_JOBS: &str = "getNextJobs";

#[derive(Clone)]
pub struct SequencerContract<P: alloy_provider::Provider> {
    pub instance: Contract<P>,
}

impl<P: alloy_provider::Provider> SequencerContract<P> {
    pub fn new(address: Address, provider: P) -> Result<Self, ContractError> {
        let instance = Contract::new(address, provider, SEQUENCER_ABI)?;
        Ok(Self { instance })
    }

    pub fn address(&self) -> Address {
        self.instance.address()
    }

    /// Jobs the sequencer considers for `network`, in the order it returns them.
    pub async fn get_next_jobs(&self, network: B256) -> Result<Vec<WorkableJob>, ContractError> {
        let call_error = |err: alloy::contract::Error| ContractError::Call {
            address: self.address(),
            method: GET_NEXT_JOBS,
            reason: err.to_string(),
        };

        let result = self
            .instance
            .instance()
            .function(GET_NEXT_JOBS, &[DynSolValue::FixedBytes(network, 32)])
            .map_err(call_error)?
            .call()
            .await
            .map_err(call_error)?;

        parse_next_jobs(&result)
    }
}

pub(crate) fn parse_next_jobs(result: &[DynSolValue]) -> Result<Vec<WorkableJob>, ContractError> {
    let jobs = result
        .first()
        .and_then(DynSolValue::as_array)
        .ok_or_else(|| decode_error("missing job array in response"))?;

    jobs.iter().map(parse_workable_job).collect()
}

fn parse_workable_job(value: &DynSolValue) -> Result<WorkableJob, ContractError> {
    let fields = value
        .as_tuple()
        .ok_or_else(|| decode_error("job entry is not a tuple"))?;

    let [job, can_work, args] = fields else {
        return Err(decode_error(&format!(
            "job entry has {} fields, expected 3",
            fields.len()
        )));
    };

    Ok(WorkableJob {
        job: job
            .as_address()
            .ok_or_else(|| decode_error("job address is not an address"))?,
        can_work: can_work
            .as_bool()
            .ok_or_else(|| decode_error("canWork is not a bool"))?,
        args: Bytes::copy_from_slice(
            args.as_bytes()
                .ok_or_else(|| decode_error("args is not bytes"))?,
        ),
    })
}

fn decode_error(reason: &str) -> ContractError {
    ContractError::Decode {
        method: GET_NEXT_JOBS,
        reason: reason.to_string(),
    }
}
