//! Well-known EVM networks.
//!
//! Only used to label the chain id the RPC reports; the relayer works on any chain the
//! forwarder is deployed to.

use std::fmt::{Display, Formatter};

/// EVM networks with a recognizable name.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq)]
pub enum KnownNetwork {
    /// Ethereum mainnet (chain ID 1).
    Ethereum,
    /// Ethereum Sepolia testnet (chain ID 11155111).
    Sepolia,
    /// Base mainnet (chain ID 8453).
    Base,
    /// Base Sepolia testnet (chain ID 84532).
    BaseSepolia,
    /// Polygon mainnet (chain ID 137).
    Polygon,
    /// Polygon Amoy testnet (chain ID 80002).
    PolygonAmoy,
    /// Arbitrum One (chain ID 42161).
    Arbitrum,
    /// Arbitrum Sepolia testnet (chain ID 421614).
    ArbitrumSepolia,
    /// OP mainnet (chain ID 10).
    Optimism,
    /// OP Sepolia testnet (chain ID 11155420).
    OptimismSepolia,
    /// Local Hardhat or Anvil node (chain ID 31337).
    Localhost,
}

impl KnownNetwork {
    pub fn variants() -> &'static [KnownNetwork] {
        &[
            KnownNetwork::Ethereum,
            KnownNetwork::Sepolia,
            KnownNetwork::Base,
            KnownNetwork::BaseSepolia,
            KnownNetwork::Polygon,
            KnownNetwork::PolygonAmoy,
            KnownNetwork::Arbitrum,
            KnownNetwork::ArbitrumSepolia,
            KnownNetwork::Optimism,
            KnownNetwork::OptimismSepolia,
            KnownNetwork::Localhost,
        ]
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            KnownNetwork::Ethereum => 1,
            KnownNetwork::Sepolia => 11155111,
            KnownNetwork::Base => 8453,
            KnownNetwork::BaseSepolia => 84532,
            KnownNetwork::Polygon => 137,
            KnownNetwork::PolygonAmoy => 80002,
            KnownNetwork::Arbitrum => 42161,
            KnownNetwork::ArbitrumSepolia => 421614,
            KnownNetwork::Optimism => 10,
            KnownNetwork::OptimismSepolia => 11155420,
            KnownNetwork::Localhost => 31337,
        }
    }

    pub fn from_chain_id(chain_id: u64) -> Option<Self> {
        Self::variants()
            .iter()
            .copied()
            .find(|n| n.chain_id() == chain_id)
    }
}

impl Display for KnownNetwork {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            KnownNetwork::Ethereum => write!(f, "ethereum"),
            KnownNetwork::Sepolia => write!(f, "sepolia"),
            KnownNetwork::Base => write!(f, "base"),
            KnownNetwork::BaseSepolia => write!(f, "base-sepolia"),
            KnownNetwork::Polygon => write!(f, "polygon"),
            KnownNetwork::PolygonAmoy => write!(f, "polygon-amoy"),
            KnownNetwork::Arbitrum => write!(f, "arbitrum"),
            KnownNetwork::ArbitrumSepolia => write!(f, "arbitrum-sepolia"),
            KnownNetwork::Optimism => write!(f, "optimism"),
            KnownNetwork::OptimismSepolia => write!(f, "optimism-sepolia"),
            KnownNetwork::Localhost => write!(f, "localhost"),
        }
    }
}
