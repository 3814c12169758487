//! Transaction construction core for submarine and reverse submarine swaps
//! between Bitcoin, Liquid and Lightning.
//!
//! Covers swap scripts and Taproot trees, MuSig2 signing sessions, swap
//! output detection, claim and refund transactions (plain and confidential)
//! and fee targeting.

pub mod error;
pub mod fees;
pub mod network;
pub mod swaps;
pub mod util;

pub use bitcoin;
pub use elements;

pub use error::Error;
pub use fees::{create_tx_with_fee, estimate_fee, target_fee, Fee};
pub use network::{electrum::ElectrumConfig, Chain, ChainClient};
pub use swaps::detect::{detect_swap, DetectedSwap, SwapLock};
pub use swaps::musig::{Musig, MusigError};
pub use swaps::script::OutputType;
pub use swaps::taproot::{SwapTree, TaprootFlavor};
pub use util::secrets::Preimage;
