use std::str::FromStr;

use elements::{AddressParams, BlockHash};

use crate::{error::Error, swaps::taproot::TaprootFlavor};

pub mod electrum;

const LIQUID_GENESIS_HASH: &str =
    "1466275836220db2944ca059a3a10ef6fd2ea684b0688d2c379296888a206003";
const LIQUID_TESTNET_GENESIS_HASH: &str =
    "a771da8e52ee6ad581ed1e9a99825e5b3b7992225534eaa2ae23244fe26ab1c1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chain {
    Bitcoin,
    BitcoinTestnet,
    BitcoinRegtest,
    Liquid,
    LiquidTestnet,
    LiquidRegtest,
}

impl Chain {
    pub fn is_liquid(&self) -> bool {
        matches!(
            self,
            Chain::Liquid | Chain::LiquidTestnet | Chain::LiquidRegtest
        )
    }

    pub fn taproot_flavor(&self) -> TaprootFlavor {
        if self.is_liquid() {
            TaprootFlavor::Liquid
        } else {
            TaprootFlavor::Bitcoin
        }
    }

    pub fn bitcoin_network(&self) -> Result<bitcoin::Network, Error> {
        match self {
            Chain::Bitcoin => Ok(bitcoin::Network::Bitcoin),
            Chain::BitcoinTestnet => Ok(bitcoin::Network::Testnet),
            Chain::BitcoinRegtest => Ok(bitcoin::Network::Regtest),
            _ => Err(Error::Validation(
                "Liquid chain used for Bitcoin operations".to_string(),
            )),
        }
    }

    pub fn liquid_address_params(&self) -> Result<&'static AddressParams, Error> {
        match self {
            Chain::Liquid => Ok(&AddressParams::LIQUID),
            Chain::LiquidTestnet => Ok(&AddressParams::LIQUID_TESTNET),
            Chain::LiquidRegtest => Ok(&AddressParams::ELEMENTS),
            _ => Err(Error::Validation(
                "Bitcoin chain used for Liquid operations".to_string(),
            )),
        }
    }

    /// Genesis block hash committed to by every Liquid signature hash.
    /// Regtest genesis depends on the node's chain parameters and has to be fetched.
    pub fn liquid_genesis_hash(&self) -> Result<BlockHash, Error> {
        match self {
            Chain::Liquid => Ok(BlockHash::from_str(LIQUID_GENESIS_HASH)?),
            Chain::LiquidTestnet => Ok(BlockHash::from_str(LIQUID_TESTNET_GENESIS_HASH)?),
            Chain::LiquidRegtest => Err(Error::Validation(
                "Regtest genesis hash has to be fetched from the node".to_string(),
            )),
            _ => Err(Error::Validation(
                "Bitcoin chain has no Liquid genesis hash".to_string(),
            )),
        }
    }
}

/// Minimal view of a chain backend, used by calling code to move
/// transactions built by this crate on and off the chain.
pub trait ChainClient {
    /// Broadcasts a consensus serialized transaction and returns its txid.
    fn broadcast(&self, raw_tx: &[u8]) -> Result<String, Error>;

    /// Fetches the consensus serialized transaction with the given txid.
    fn raw_transaction(&self, txid: &str) -> Result<Vec<u8>, Error>;

    /// Height of the current chain tip.
    fn block_height(&self) -> Result<u32, Error>;
}
