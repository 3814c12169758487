use bitcoin::{Amount, ScriptBuf, XOnlyPublicKey};
use elements::confidential;

use crate::swaps::script::{p2sh_output, p2sh_p2wsh_output, p2tr_output, p2wsh_output, OutputType};

/// What a swap output is locked to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapLock {
    /// Redeem script of a P2SH, P2SH-P2WSH or P2WSH swap
    RedeemScript(ScriptBuf),
    /// Tweaked output key of a Taproot swap
    TweakedKey(XOnlyPublicKey),
}

impl SwapLock {
    /// Every output script the lock can appear as, with its output type.
    pub fn candidates(&self) -> Vec<(OutputType, ScriptBuf)> {
        match self {
            SwapLock::RedeemScript(redeem_script) => vec![
                (OutputType::Legacy, p2sh_output(redeem_script)),
                (OutputType::Compatibility, p2sh_p2wsh_output(redeem_script)),
                (OutputType::Bech32, p2wsh_output(redeem_script)),
            ],
            SwapLock::TweakedKey(key) => vec![(OutputType::Taproot, p2tr_output(key))],
        }
    }
}

/// Read access to the outputs of a plain or confidential transaction.
pub trait SwapOutputs {
    type Value: Clone;

    fn output_scripts(&self) -> Vec<&[u8]>;
    fn output_value(&self, vout: usize) -> Option<Self::Value>;
}

impl SwapOutputs for bitcoin::Transaction {
    type Value = Amount;

    fn output_scripts(&self) -> Vec<&[u8]> {
        self.output.iter().map(|o| o.script_pubkey.as_bytes()).collect()
    }

    fn output_value(&self, vout: usize) -> Option<Amount> {
        self.output.get(vout).map(|o| o.value)
    }
}

impl SwapOutputs for elements::Transaction {
    type Value = confidential::Value;

    fn output_scripts(&self) -> Vec<&[u8]> {
        self.output.iter().map(|o| o.script_pubkey.as_bytes()).collect()
    }

    fn output_value(&self, vout: usize) -> Option<confidential::Value> {
        self.output.get(vout).map(|o| o.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedSwap<V> {
    pub vout: u32,
    pub output_type: OutputType,
    pub value: V,
    pub script_pubkey: Vec<u8>,
}

/// Finds the first output of `tx` that pays to `lock`.
pub fn detect_swap<T: SwapOutputs>(lock: &SwapLock, tx: &T) -> Option<DetectedSwap<T::Value>> {
    let candidates = lock.candidates();

    for (vout, script) in tx.output_scripts().into_iter().enumerate() {
        let matched = candidates
            .iter()
            .find(|(_, candidate)| candidate.as_bytes() == script);

        if let Some((output_type, _)) = matched {
            let value = tx.output_value(vout)?;
            log::info!("Found {:?} swap output at vout {}", output_type, vout);
            return Some(DetectedSwap {
                vout: vout as u32,
                output_type: *output_type,
                value,
                script_pubkey: script.to_vec(),
            });
        }
    }

    None
}
