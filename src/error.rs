use std::fmt::{Display, Formatter};

use crate::swaps::musig::MusigError;

/// The Global Error enum. Encodes all possible internal library errors
#[derive(Debug)]
pub enum Error {
    Electrum(electrum_client::Error),
    Hex(String),
    Validation(String),
    Key(bitcoin::key::Error),
    Sighash(bitcoin::sighash::Error),
    ElSighash(elements::sighash::Error),
    Secp(bitcoin::secp256k1::Error),
    JSON(serde_json::Error),
    Bolt11(lightning_invoice::ParseOrSemanticError),
    Blind(String),
    ConfidentialTx(elements::ConfidentialTxOutError),
    Hash(bitcoin::hashes::FromSliceError),
    Locktime(String),
    Script(String),
    Taproot(String),
    Musig(MusigError),
    Generic(String),
}

impl From<electrum_client::Error> for Error {
    fn from(value: electrum_client::Error) -> Self {
        Self::Electrum(value)
    }
}

impl From<bitcoin::hex::HexToBytesError> for Error {
    fn from(value: bitcoin::hex::HexToBytesError) -> Self {
        Self::Hex(value.to_string())
    }
}

impl From<bitcoin::hex::HexToArrayError> for Error {
    fn from(value: bitcoin::hex::HexToArrayError) -> Self {
        Self::Hex(value.to_string())
    }
}

impl From<bitcoin::key::Error> for Error {
    fn from(value: bitcoin::key::Error) -> Self {
        Self::Key(value)
    }
}

impl From<bitcoin::sighash::Error> for Error {
    fn from(value: bitcoin::sighash::Error) -> Self {
        Self::Sighash(value)
    }
}

impl From<elements::sighash::Error> for Error {
    fn from(value: elements::sighash::Error) -> Self {
        Self::ElSighash(value)
    }
}

impl From<bitcoin::secp256k1::Error> for Error {
    fn from(value: bitcoin::secp256k1::Error) -> Self {
        Self::Secp(value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::JSON(value)
    }
}

impl From<lightning_invoice::ParseOrSemanticError> for Error {
    fn from(value: lightning_invoice::ParseOrSemanticError) -> Self {
        Self::Bolt11(value)
    }
}

impl From<elements::BlindError> for Error {
    fn from(value: elements::BlindError) -> Self {
        Self::Blind(value.to_string())
    }
}

impl From<elements::UnblindError> for Error {
    fn from(value: elements::UnblindError) -> Self {
        Self::Blind(value.to_string())
    }
}

impl From<elements::ConfidentialTxOutError> for Error {
    fn from(value: elements::ConfidentialTxOutError) -> Self {
        Self::ConfidentialTx(value)
    }
}

impl From<bitcoin::hashes::FromSliceError> for Error {
    fn from(value: bitcoin::hashes::FromSliceError) -> Self {
        Self::Hash(value)
    }
}

impl From<bitcoin::absolute::Error> for Error {
    fn from(value: bitcoin::absolute::Error) -> Self {
        Self::Locktime(value.to_string())
    }
}

impl From<elements::locktime::Error> for Error {
    fn from(value: elements::locktime::Error) -> Self {
        Self::Locktime(value.to_string())
    }
}

impl From<bitcoin::script::PushBytesError> for Error {
    fn from(value: bitcoin::script::PushBytesError) -> Self {
        Self::Script(value.to_string())
    }
}

impl From<bitcoin::taproot::TaprootError> for Error {
    fn from(value: bitcoin::taproot::TaprootError) -> Self {
        Self::Taproot(value.to_string())
    }
}

impl From<elements::taproot::TaprootError> for Error {
    fn from(value: elements::taproot::TaprootError) -> Self {
        Self::Taproot(value.to_string())
    }
}

impl From<MusigError> for Error {
    fn from(value: MusigError) -> Self {
        Self::Musig(value)
    }
}

impl Error {
    // Returns the name of the enum variant as a string
    pub fn name(&self) -> String {
        match self {
            Error::Electrum(_) => "Electrum",
            Error::Hex(_) => "Hex",
            Error::Validation(_) => "Validation",
            Error::Key(_) => "Key",
            Error::Sighash(_) => "Sighash",
            Error::ElSighash(_) => "Elements-Sighash",
            Error::Secp(_) => "Secp",
            Error::JSON(_) => "JSON",
            Error::Bolt11(_) => "Bolt11",
            Error::Blind(_) => "Blind",
            Error::ConfidentialTx(_) => "ConfidentialTx",
            Error::Hash(_) => "Hash",
            Error::Locktime(_) => "Locktime",
            Error::Script(_) => "Script",
            Error::Taproot(_) => "Taproot",
            Error::Musig(_) => "Musig",
            Error::Generic(_) => "Generic",
        }
        .to_string()
    }

    // Returns the error message as a string
    pub fn message(&self) -> String {
        match self {
            Error::Electrum(e) => e.to_string(),
            Error::Hex(e) => e.clone(),
            Error::Validation(e) => e.clone(),
            Error::Key(e) => e.to_string(),
            Error::Sighash(e) => e.to_string(),
            Error::ElSighash(e) => e.to_string(),
            Error::Secp(e) => e.to_string(),
            Error::JSON(e) => e.to_string(),
            Error::Bolt11(e) => e.to_string(),
            Error::Blind(e) => e.clone(),
            Error::ConfidentialTx(e) => e.to_string(),
            Error::Hash(e) => e.to_string(),
            Error::Locktime(e) => e.clone(),
            Error::Script(e) => e.clone(),
            Error::Taproot(e) => e.clone(),
            Error::Musig(e) => e.to_string(),
            Error::Generic(e) => e.clone(),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name(), self.message())
    }
}

impl std::error::Error for Error {}
