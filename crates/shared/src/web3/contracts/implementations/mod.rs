pub mod job_contract;
pub mod sequencer_contract;
