//! Chain selection and the provider sets each chain talks to
//!
//! [`NetworkConfig`] is built once and threaded read-only through the
//! engine. The defaults point at public mempool.space, blockstream.info,
//! BlockCypher and blockchain.info endpoints; every set can be replaced for
//! self-hosted indexers or tests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::broadcast::{BroadcastProvider, BroadcastShape};
use crate::error::EngineError;
use crate::fee_estimation::{FeeProvider, FeeShape};
use crate::provider::{Provider, ProviderSet};
use crate::utxo::{UtxoProvider, UtxoShape};

/// Default per-attempt timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Bitcoin chains the engine can operate on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainNetwork {
    Mainnet,
    Testnet,
    Signet,
}

impl ChainNetwork {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainNetwork::Mainnet => "mainnet",
            ChainNetwork::Testnet => "testnet",
            ChainNetwork::Signet => "signet",
        }
    }

    /// The `bitcoin` crate network used for address validation
    pub fn to_bitcoin_network(self) -> bitcoin::Network {
        match self {
            ChainNetwork::Mainnet => bitcoin::Network::Bitcoin,
            ChainNetwork::Testnet => bitcoin::Network::Testnet,
            ChainNetwork::Signet => bitcoin::Network::Signet,
        }
    }

    pub fn default_utxo_providers(self) -> Vec<UtxoProvider> {
        match self {
            ChainNetwork::Mainnet => vec![
                Provider::new(
                    "mempool.space",
                    "https://mempool.space/api/address/{address}/utxo",
                    UtxoShape::Esplora,
                ),
                Provider::new(
                    "blockstream.info",
                    "https://blockstream.info/api/address/{address}/utxo",
                    UtxoShape::Esplora,
                ),
                Provider::new(
                    "blockcypher",
                    "https://api.blockcypher.com/v1/btc/main/addrs/{address}?unspentOnly=true",
                    UtxoShape::BlockCypher,
                ),
                Provider::new(
                    "blockchain.info",
                    "https://blockchain.info/unspent?active={address}",
                    UtxoShape::BlockchainInfo,
                ),
            ],
            ChainNetwork::Testnet => vec![
                Provider::new(
                    "mempool.space",
                    "https://mempool.space/testnet/api/address/{address}/utxo",
                    UtxoShape::Esplora,
                ),
                Provider::new(
                    "blockstream.info",
                    "https://blockstream.info/testnet/api/address/{address}/utxo",
                    UtxoShape::Esplora,
                ),
                Provider::new(
                    "blockcypher",
                    "https://api.blockcypher.com/v1/btc/test3/addrs/{address}?unspentOnly=true",
                    UtxoShape::BlockCypher,
                ),
            ],
            ChainNetwork::Signet => vec![
                Provider::new(
                    "mempool.space",
                    "https://mempool.space/signet/api/address/{address}/utxo",
                    UtxoShape::Esplora,
                ),
                Provider::new(
                    "blockstream.info",
                    "https://blockstream.info/signet/api/address/{address}/utxo",
                    UtxoShape::Esplora,
                ),
            ],
        }
    }

    pub fn default_fee_providers(self) -> Vec<FeeProvider> {
        match self {
            ChainNetwork::Mainnet => vec![
                Provider::new(
                    "mempool.space",
                    "https://mempool.space/api/v1/fees/recommended",
                    FeeShape::FastestFee,
                ),
                Provider::new(
                    "blockstream.info",
                    "https://blockstream.info/api/fee-estimates",
                    FeeShape::TargetMap,
                ),
                Provider::new(
                    "blockcypher",
                    "https://api.blockcypher.com/v1/btc/main",
                    FeeShape::PerKb,
                ),
            ],
            ChainNetwork::Testnet => vec![
                Provider::new(
                    "mempool.space",
                    "https://mempool.space/testnet/api/v1/fees/recommended",
                    FeeShape::FastestFee,
                ),
                Provider::new(
                    "blockstream.info",
                    "https://blockstream.info/testnet/api/fee-estimates",
                    FeeShape::TargetMap,
                ),
                Provider::new(
                    "blockcypher",
                    "https://api.blockcypher.com/v1/btc/test3",
                    FeeShape::PerKb,
                ),
            ],
            ChainNetwork::Signet => vec![
                Provider::new(
                    "mempool.space",
                    "https://mempool.space/signet/api/v1/fees/recommended",
                    FeeShape::FastestFee,
                ),
                Provider::new(
                    "blockstream.info",
                    "https://blockstream.info/signet/api/fee-estimates",
                    FeeShape::TargetMap,
                ),
            ],
        }
    }

    pub fn default_broadcast_providers(self) -> Vec<BroadcastProvider> {
        match self {
            ChainNetwork::Mainnet => vec![
                Provider::new("mempool.space", "https://mempool.space/api/tx", BroadcastShape::RawHex),
                Provider::new("blockstream.info", "https://blockstream.info/api/tx", BroadcastShape::RawHex),
                Provider::new(
                    "blockcypher",
                    "https://api.blockcypher.com/v1/btc/main/txs/push",
                    BroadcastShape::JsonTx,
                ),
            ],
            ChainNetwork::Testnet => vec![
                Provider::new(
                    "mempool.space",
                    "https://mempool.space/testnet/api/tx",
                    BroadcastShape::RawHex,
                ),
                Provider::new(
                    "blockstream.info",
                    "https://blockstream.info/testnet/api/tx",
                    BroadcastShape::RawHex,
                ),
                Provider::new(
                    "blockcypher",
                    "https://api.blockcypher.com/v1/btc/test3/txs/push",
                    BroadcastShape::JsonTx,
                ),
            ],
            ChainNetwork::Signet => vec![
                Provider::new(
                    "mempool.space",
                    "https://mempool.space/signet/api/tx",
                    BroadcastShape::RawHex,
                ),
                Provider::new(
                    "blockstream.info",
                    "https://blockstream.info/signet/api/tx",
                    BroadcastShape::RawHex,
                ),
            ],
        }
    }
}

impl Default for ChainNetwork {
    fn default() -> Self {
        ChainNetwork::Mainnet
    }
}

impl fmt::Display for ChainNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainNetwork {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "bitcoin" => Ok(ChainNetwork::Mainnet),
            "testnet" | "testnet3" => Ok(ChainNetwork::Testnet),
            "signet" => Ok(ChainNetwork::Signet),
            other => Err(EngineError::config(format!("unknown network '{}'", other))),
        }
    }
}

/// Network selection plus the provider sets used for each capability
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    pub network: ChainNetwork,
    pub utxo: ProviderSet<UtxoShape>,
    pub fees: ProviderSet<FeeShape>,
    pub broadcast: ProviderSet<BroadcastShape>,
    /// Applied to every single provider attempt
    pub request_timeout: Duration,
}

impl NetworkConfig {
    /// Default public providers for `network`
    pub fn new(network: ChainNetwork) -> Self {
        Self {
            network,
            utxo: ProviderSet::new(network.default_utxo_providers()),
            fees: ProviderSet::new(network.default_fee_providers()),
            broadcast: ProviderSet::new(network.default_broadcast_providers()),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn mainnet() -> Self {
        Self::new(ChainNetwork::Mainnet)
    }

    pub fn testnet() -> Self {
        Self::new(ChainNetwork::Testnet)
    }

    pub fn signet() -> Self {
        Self::new(ChainNetwork::Signet)
    }

    pub fn with_utxo_providers(mut self, providers: Vec<UtxoProvider>) -> Self {
        self.utxo = ProviderSet::new(providers);
        self
    }

    pub fn with_fee_providers(mut self, providers: Vec<FeeProvider>) -> Self {
        self.fees = ProviderSet::new(providers);
        self
    }

    pub fn with_broadcast_providers(mut self, providers: Vec<BroadcastProvider>) -> Self {
        self.broadcast = ProviderSet::new(providers);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn bitcoin_network(&self) -> bitcoin::Network {
        self.network.to_bitcoin_network()
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::mainnet()
    }
}
