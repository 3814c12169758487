use std::str::FromStr;

use bitcoin::Txid;
use electrum_client::ElectrumApi;

use crate::error::Error;

use super::{Chain, ChainClient};

pub const DEFAULT_TESTNET_NODE: &str = "electrum.bullbitcoin.com:60002";
pub const DEFAULT_LIQUID_TESTNET_NODE: &str = "blockstream.info:465";
pub const DEFAULT_MAINNET_NODE: &str = "electrum.bullbitcoin.com:50002";

#[derive(Debug, Clone)]
enum ElectrumUrl {
    Tls(String, bool), // the bool value indicates if the domain name should be validated
    Plaintext(String),
}

impl ElectrumUrl {
    pub fn build_client(&self, timeout: u8) -> Result<electrum_client::Client, Error> {
        let builder = electrum_client::ConfigBuilder::new();
        let builder = builder.timeout(Some(timeout));
        let (url, builder) = match self {
            ElectrumUrl::Tls(url, validate) => {
                (format!("ssl://{}", url), builder.validate_domain(*validate))
            }
            ElectrumUrl::Plaintext(url) => (format!("tcp://{}", url), builder),
        };
        Ok(electrum_client::Client::from_config(&url, builder.build())?)
    }
}

/// Electrum client configuration.
#[derive(Debug, Clone)]
pub struct ElectrumConfig {
    network: Chain,
    url: ElectrumUrl,
    timeout: u8,
}

impl ElectrumConfig {
    pub fn default_bitcoin() -> Self {
        ElectrumConfig::new(Chain::BitcoinTestnet, DEFAULT_TESTNET_NODE, true, true, 12)
    }

    pub fn default_liquid() -> Self {
        ElectrumConfig::new(
            Chain::LiquidTestnet,
            DEFAULT_LIQUID_TESTNET_NODE,
            true,
            true,
            12,
        )
    }

    pub fn new(
        network: Chain,
        electrum_url: &str,
        tls: bool,
        validate_domain: bool,
        timeout: u8,
    ) -> Self {
        let electrum_url = match tls {
            true => ElectrumUrl::Tls(electrum_url.into(), validate_domain),
            false => ElectrumUrl::Plaintext(electrum_url.into()),
        };
        ElectrumConfig {
            network,
            url: electrum_url,
            timeout,
        }
    }

    pub fn network(&self) -> Chain {
        self.network
    }

    /// Builds an electrum_client::Client which can be used to make calls to electrum api
    pub fn build_client(&self) -> Result<electrum_client::Client, Error> {
        self.url.build_client(self.timeout)
    }
}

impl ChainClient for ElectrumConfig {
    fn broadcast(&self, raw_tx: &[u8]) -> Result<String, Error> {
        let txid = self.build_client()?.transaction_broadcast_raw(raw_tx)?;
        log::info!("Broadcasted transaction {} on {:?}", txid, self.network);
        Ok(txid.to_string())
    }

    fn raw_transaction(&self, txid: &str) -> Result<Vec<u8>, Error> {
        let txid = Txid::from_str(txid)?;
        Ok(self.build_client()?.transaction_get_raw(&txid)?)
    }

    fn block_height(&self) -> Result<u32, Error> {
        let tip = self.build_client()?.block_headers_subscribe_raw()?;
        Ok(tip.height as u32)
    }
}
