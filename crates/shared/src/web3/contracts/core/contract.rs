use alloy::{
    contract::{ContractInstance, Interface},
    json_abi::JsonAbi,
    primitives::Address,
};

use std::include_bytes;

use super::error::ContractError;

macro_rules! include_abi {
    ($path:expr) => {{
        const ABI_BYTES: &[u8] = include_bytes!($path);
        ABI_BYTES
    }};
}

pub const SEQUENCER_ABI: &str = "sequencer.json";
pub const JOB_ABI: &str = "job.json";

#[derive(Clone)]
pub struct Contract<P: alloy_provider::Provider> {
    instance: ContractInstance<P>,
}

impl<P: alloy_provider::Provider> Contract<P> {
    pub fn new(address: Address, provider: P, abi_file_path: &str) -> Result<Self, ContractError> {
        let instance = Self::parse_abi(abi_file_path, provider, address)?;
        Ok(Self { instance })
    }

    fn parse_abi(
        path: &str,
        provider: P,
        address: Address,
    ) -> Result<ContractInstance<P>, ContractError> {
        let artifact = match path {
            SEQUENCER_ABI => include_abi!("../../../../artifacts/abi/sequencer.json"),
            JOB_ABI => include_abi!("../../../../artifacts/abi/job.json"),
            _ => return Err(ContractError::UnknownArtifact(path.to_string())),
        };

        let abi: JsonAbi = serde_json::from_slice(artifact).map_err(|err| ContractError::Abi {
            name: path.to_string(),
            reason: err.to_string(),
        })?;

        Ok(ContractInstance::new(address, provider, Interface::new(abi)))
    }

    pub fn instance(&self) -> &ContractInstance<P> {
        &self.instance
    }

    pub fn address(&self) -> Address {
        *self.instance.address()
    }

    pub fn provider(&self) -> &P {
        self.instance.provider()
    }
}
