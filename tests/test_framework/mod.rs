use std::str::FromStr;

use bitcoind::{
    bitcoincore_rpc::{Client, RpcApi},
    BitcoinD, Conf,
};

use bitcoin::hex::{DisplayHex, FromHex};
use bitcoin::{network::Network, Address, Amount, Script, Transaction, Txid};
use boltz_core::error::Error;
use boltz_core::network::ChainClient;

pub struct BtcTestFramework {
    bitcoind: BitcoinD,
    mining_address: Address,
}

impl BtcTestFramework {
    /// Starts a regtest bitcoind and mines 101 blocks so the mining wallet
    /// has a spendable coinbase. `BITCOIND_EXE` overrides the downloaded
    /// binary.
    pub fn init() -> Self {
        boltz_core::util::setup_logger();

        let mut conf = Conf::default();
        conf.args.push("-txindex=1");
        conf.args.push("-fallbackfee=0.0001");
        let bitcoind = match std::env::var("BITCOIND_EXE") {
            Ok(exe) => BitcoinD::with_conf(exe, &conf).unwrap(),
            Err(_) => BitcoinD::from_downloaded_with_conf(&conf).unwrap(),
        };

        let mining_address = bitcoind
            .client
            .get_new_address(None, None)
            .unwrap()
            .require_network(Network::Regtest)
            .unwrap();
        bitcoind
            .client
            .generate_to_address(101, &mining_address)
            .unwrap();

        Self {
            bitcoind,
            mining_address,
        }
    }

    pub fn generate_blocks(&self, n: u64) {
        self.bitcoind
            .client
            .generate_to_address(n, &self.mining_address)
            .unwrap();
    }

    /// Pays `amount` to `script_pubkey` and confirms the transaction.
    pub fn fund_script(&self, script_pubkey: &Script, amount: Amount) -> Transaction {
        let address = Address::from_script(script_pubkey, Network::Regtest).unwrap();
        let txid = self
            .bitcoind
            .client
            .send_to_address(&address, amount, None, None, None, None, None, None)
            .unwrap();
        self.generate_blocks(1);
        self.bitcoind.client.get_raw_transaction(&txid, None).unwrap()
    }

    pub fn new_address(&self) -> Address {
        self.bitcoind
            .client
            .get_new_address(None, None)
            .unwrap()
            .require_network(Network::Regtest)
            .unwrap()
    }

    pub fn mempool_accepts(&self, tx: &Transaction) -> bool {
        let results = self.bitcoind.client.test_mempool_accept(&[tx]).unwrap();
        if let Some(reason) = &results[0].reject_reason {
            log::info!("Transaction {} rejected: {}", tx.txid(), reason);
        }
        results[0].allowed
    }
}

impl AsRef<Client> for BtcTestFramework {
    fn as_ref(&self) -> &Client {
        &self.bitcoind.client
    }
}

fn rpc_error(e: bitcoind::bitcoincore_rpc::Error) -> Error {
    Error::Generic(e.to_string())
}

impl ChainClient for BtcTestFramework {
    fn broadcast(&self, raw_tx: &[u8]) -> Result<String, Error> {
        let txid = self
            .bitcoind
            .client
            .send_raw_transaction(raw_tx.to_lower_hex_string())
            .map_err(rpc_error)?;
        Ok(txid.to_string())
    }

    fn raw_transaction(&self, txid: &str) -> Result<Vec<u8>, Error> {
        let txid = Txid::from_str(txid)?;
        let hex = self
            .bitcoind
            .client
            .get_raw_transaction_hex(&txid, None)
            .map_err(rpc_error)?;
        Ok(Vec::from_hex(&hex)?)
    }

    fn block_height(&self) -> Result<u32, Error> {
        let height = self.bitcoind.client.get_block_count().map_err(rpc_error)?;
        Ok(height as u32)
    }
}
