pub mod contracts;
pub mod wallet;

pub use wallet::{ConnectionError, NodeEndpoint, NodeRole, SigningIdentity, Wallet, WalletProvider};
