//! Network parameters and manager configuration.

use serde::{Deserialize, Serialize};

/// Base units per coin.
pub const COIN: u64 = 100_000_000;

/// Collateral a provider must lock, in coins.
pub const COLLATERAL_COINS: u64 = 1_000;

/// Network the registry runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Network {
    /// Production network.
    #[default]
    Mainnet,
    /// Public test network.
    Testnet,
    /// Local regression-test network.
    Regtest,
}

impl Network {
    /// Get the network name.
    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
        }
    }

    /// Whether service addresses must be reachable from the public internet.
    pub fn requires_routable_addr(&self) -> bool {
        !matches!(self, Network::Regtest)
    }
}

/// Consensus parameters for special-transaction validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParams {
    /// Network.
    pub network: Network,
    /// Exact collateral output value in base units.
    pub collateral_amount: u64,
    /// Lowest protocol version a provider may announce.
    pub min_protocol_version: u32,
    /// Highest protocol version a provider may announce.
    pub max_protocol_version: u32,
}

impl NetworkParams {
    /// Create parameters for a network.
    pub fn new(network: Network) -> Self {
        Self {
            network,
            collateral_amount: COLLATERAL_COINS * COIN,
            min_protocol_version: 70209,
            max_protocol_version: 70210,
        }
    }

    /// Parameters for mainnet.
    pub fn mainnet() -> Self {
        Self::new(Network::Mainnet)
    }

    /// Parameters for testnet.
    pub fn testnet() -> Self {
        Self::new(Network::Testnet)
    }

    /// Parameters for regtest.
    pub fn regtest() -> Self {
        Self::new(Network::Regtest)
    }
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self::mainnet()
    }
}

/// Registry manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// A full snapshot is persisted at every height divisible by this.
    pub snapshot_interval: u32,
    /// Number of recent snapshots kept in memory.
    pub cache_size: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            // One day of blocks at 2.5 minute spacing
            snapshot_interval: 576,
            cache_size: 576,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_names() {
        assert_eq!(Network::Mainnet.name(), "mainnet");
        assert_eq!(Network::Testnet.name(), "testnet");
        assert_eq!(Network::Regtest.name(), "regtest");
    }

    #[test]
    fn test_only_regtest_waives_routable_rule() {
        assert!(Network::Mainnet.requires_routable_addr());
        assert!(Network::Testnet.requires_routable_addr());
        assert!(!Network::Regtest.requires_routable_addr());
    }

    #[test]
    fn test_defaults() {
        let params = NetworkParams::default();
        assert_eq!(params.network, Network::Mainnet);
        assert_eq!(params.collateral_amount, 100_000_000_000);
        assert!(params.min_protocol_version <= params.max_protocol_version);

        let config = ManagerConfig::default();
        assert_eq!(config.snapshot_interval, 576);
        assert_eq!(config.cache_size, 576);
    }

    #[test]
    fn test_named_constructors() {
        assert_eq!(NetworkParams::testnet().network, Network::Testnet);
        assert_eq!(NetworkParams::regtest().network, Network::Regtest);
        assert_eq!(
            NetworkParams::regtest().collateral_amount,
            NetworkParams::mainnet().collateral_amount
        );
    }
}
