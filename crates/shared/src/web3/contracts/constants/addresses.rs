use alloy::primitives::{address, Address};

/// Sequencer of the generic job network.
pub const SEQUENCER_ADDRESS: Address = address!("0x238b4E35dAed6100C6162fAE4510261f88996EC9");

/// Sequencer of the autoline jobs.
pub const AUTOLINE_SEQUENCER_ADDRESS: Address =
    address!("0x9566eB72e47E3E20643C0b1dfbEe04Da5c7E4732");

/// OracleJob: pokes succeed without emitting any log when nothing changed.
pub const ORACLE_JOB_ADDRESS: Address = address!("0xe717Ec34b2707fc8c226b34be5eae8482d06ED03");

/// FlapJob: reverts with `Vow/insufficient-surplus` until the surplus buffer fills up.
pub const FLAP_JOB_ADDRESS: Address = address!("0xc32506E9bB590971671b649d9B8e18CB6260559F");
