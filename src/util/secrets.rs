use bitcoin::hashes::{hash160, ripemd160, sha256, Hash};
use bitcoin::hex::{DisplayHex, FromHex};
use bitcoin::key::rand::{rngs::OsRng, RngCore};
use lightning_invoice::Bolt11Invoice;

use std::str::FromStr;

use crate::error::Error;

/// Internally used rng to generate secure 32 byte preimages
fn rng_32b() -> [u8; 32] {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Helper to work with Preimage & Hashes required for swap scripts.
#[derive(Debug, Clone, PartialEq)]
pub struct Preimage {
    pub bytes: Option<[u8; 32]>,
    pub sha256: sha256::Hash,
    pub hash160: hash160::Hash,
}

impl Default for Preimage {
    fn default() -> Self {
        Self::new()
    }
}

impl Preimage {
    /// Creates a new random preimage
    pub fn new() -> Preimage {
        Preimage::from_bytes(rng_32b())
    }

    pub fn from_bytes(preimage: [u8; 32]) -> Preimage {
        Preimage {
            bytes: Some(preimage),
            sha256: sha256::Hash::hash(&preimage),
            hash160: hash160::Hash::hash(&preimage),
        }
    }

    /// Creates a struct from a preimage string.
    pub fn from_str(preimage: &str) -> Result<Preimage, Error> {
        let decoded = Vec::from_hex(preimage)?;
        let preimage_bytes: [u8; 32] = decoded
            .try_into()
            .map_err(|_| Error::Validation("Decoded Preimage input is not 32 bytes".to_string()))?;
        Ok(Preimage::from_bytes(preimage_bytes))
    }

    /// Creates a Preimage struct without a value and only a hash
    /// Used only in submarine swaps where we do not know the preimage, only the hash
    pub fn from_sha256_str(preimage_sha256: &str) -> Result<Preimage, Error> {
        let sha256 = sha256::Hash::from_str(preimage_sha256)?;
        Ok(Preimage::from_sha256(sha256))
    }

    pub fn from_sha256(sha256: sha256::Hash) -> Preimage {
        let hash160 =
            hash160::Hash::from_byte_array(ripemd160::Hash::hash(sha256.as_byte_array()).to_byte_array());
        Preimage {
            bytes: None,
            sha256,
            hash160,
        }
    }

    /// Extracts the preimage sha256 hash from a lightning invoice
    /// Creates a Preimage struct without a value and only a hash
    pub fn from_invoice_str(invoice_str: &str) -> Result<Preimage, Error> {
        let invoice = Bolt11Invoice::from_str(invoice_str).map_err(|e| {
            log::warn!("Could not parse invoice string: {:?}", e);
            Error::Validation("Could not parse invoice string.".to_string())
        })?;
        Preimage::from_sha256_str(&invoice.payment_hash().to_string())
    }

    /// Converts the preimage value bytes to String
    pub fn to_string(&self) -> Option<String> {
        self.bytes.map(|bytes| bytes.to_lower_hex_string())
    }
}
