//! Known EVM networks and their USDC deployments.

use alloy_primitives::{Address, address};

use s402::proto::TypedDataDomain;

/// Token decimals of USDC on every supported network.
pub const USDC_DECIMALS: u32 = 6;

/// EIP-712 domain name USDC contracts report from `name()`.
pub const DOMAIN_USD_COIN: &str = "USD Coin";

/// EIP-712 domain version of current USDC deployments.
pub const DOMAIN_VERSION: &str = "2";

/// One supported network: the name used on the wire, its numeric chain id,
/// and the USDC deployment invocations are priced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvmNetwork {
    /// Network name as it appears in payment requirements.
    pub name: &'static str,
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// USDC contract address.
    pub usdc: Address,
    /// Token decimals.
    pub decimals: u32,
    /// EIP-712 domain name of the token contract.
    pub domain_name: &'static str,
    /// EIP-712 domain version of the token contract.
    pub domain_version: &'static str,
}

impl EvmNetwork {
    /// The typed-data domain authorizations on this network are signed
    /// under.
    #[must_use]
    pub fn typed_data_domain(&self) -> TypedDataDomain {
        TypedDataDomain {
            name: self.domain_name.to_owned(),
            version: self.domain_version.to_owned(),
            chain_id: self.chain_id,
            verifying_contract: self.usdc.to_string(),
        }
    }
}

/// All networks this crate knows how to price and sign for.
pub const EVM_NETWORKS: &[EvmNetwork] = &[
    EvmNetwork {
        name: "base",
        chain_id: 8453,
        usdc: address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
        decimals: USDC_DECIMALS,
        domain_name: DOMAIN_USD_COIN,
        domain_version: DOMAIN_VERSION,
    },
    EvmNetwork {
        name: "base-sepolia",
        chain_id: 84532,
        usdc: address!("036CbD53842c5426634e7929541eC2318f3dCF7e"),
        decimals: USDC_DECIMALS,
        // The Base Sepolia deployment reports "USDC" from name(), not "USD Coin".
        domain_name: "USDC",
        domain_version: DOMAIN_VERSION,
    },
    EvmNetwork {
        name: "ethereum",
        chain_id: 1,
        usdc: address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
        decimals: USDC_DECIMALS,
        domain_name: DOMAIN_USD_COIN,
        domain_version: DOMAIN_VERSION,
    },
    EvmNetwork {
        name: "polygon",
        chain_id: 137,
        usdc: address!("3c499c542cEF5E3811e1192ce70d8cC03d5c3359"),
        decimals: USDC_DECIMALS,
        domain_name: DOMAIN_USD_COIN,
        domain_version: DOMAIN_VERSION,
    },
    EvmNetwork {
        name: "polygon-amoy",
        chain_id: 80002,
        usdc: address!("41E94Eb019C0762f9Bfcf9Fb1E58725BfB0e7582"),
        decimals: USDC_DECIMALS,
        domain_name: DOMAIN_USD_COIN,
        domain_version: DOMAIN_VERSION,
    },
    EvmNetwork {
        name: "avalanche",
        chain_id: 43114,
        usdc: address!("B97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E"),
        decimals: USDC_DECIMALS,
        domain_name: DOMAIN_USD_COIN,
        domain_version: DOMAIN_VERSION,
    },
    EvmNetwork {
        name: "avalanche-fuji",
        chain_id: 43113,
        usdc: address!("5425890298aed601595a70AB815c96711a31Bc65"),
        decimals: USDC_DECIMALS,
        domain_name: DOMAIN_USD_COIN,
        domain_version: DOMAIN_VERSION,
    },
];

/// Looks a network up by its wire name.
#[must_use]
pub fn network_by_name(name: &str) -> Option<&'static EvmNetwork> {
    EVM_NETWORKS.iter().find(|network| network.name == name)
}
