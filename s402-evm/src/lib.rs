//! EVM concretions for the s402 payment mediation core.
//!
//! - [`networks`] — the catalog of known EIP-155 networks and their USDC
//!   deployments.
//! - [`pricer`] — a [`s402::pricing::Pricer`] that prices invocations in
//!   USDC atomic units across the catalog.
//! - [`wallet`] — a local private-key [`s402::wallet::Wallet`] that signs
//!   ERC-3009 `TransferWithAuthorization` messages with EIP-712.

pub mod networks;
pub mod pricer;
pub mod wallet;

pub use networks::{EVM_NETWORKS, EvmNetwork, network_by_name};
pub use pricer::UsdcPricer;
pub use wallet::PrivateKeyWallet;
