use crate::web3::contracts::core::contract::{Contract, JOB_ABI};
use crate::web3::contracts::core::error::ContractError;
use crate::web3::contracts::helpers::gas::GeometricGasPrice;
use crate::web3::contracts::helpers::utils::send_with_gas_strategy;
use crate::web3::contracts::structs::work_receipt::WorkReceipt;
use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, Bytes, B256};

const WORK: &str = "work";

/// A job exposing `work(bytes32 network, bytes args)`.
#[derive(Clone)]
pub struct JobContract<P: alloy_provider::Provider> {
    pub instance: Contract<P>,
}

impl<P: alloy_provider::Provider> JobContract<P> {
    pub fn new(address: Address, provider: P) -> Result<Self, ContractError> {
        let instance = Contract::new(address, provider, JOB_ABI)?;
        Ok(Self { instance })
    }

    pub async fn work(
        &self,
        from: Address,
        network: B256,
        args: Bytes,
        strategy: &GeometricGasPrice,
    ) -> Result<WorkReceipt, ContractError> {
        let call = self
            .instance
            .instance()
            .function(
                WORK,
                &[
                    DynSolValue::FixedBytes(network, 32),
                    DynSolValue::Bytes(args.to_vec()),
                ],
            )
            .map_err(|err| ContractError::Call {
                address: self.instance.address(),
                method: WORK,
                reason: err.to_string(),
            })?;

        send_with_gas_strategy(call, from, strategy, self.instance.provider()).await
    }
}
