use bitcoin::consensus::encode::VarInt;

use crate::error::Error;
use crate::swaps::script::OutputType;

/// Size of version, locktime and the input and output counts.
const BASE_SIZE: u64 = 10;

/// Outpoint, sequence and the scriptSig length of a native SegWit input.
const SEGWIT_INPUT_BASE: u64 = 41;
/// scriptSig of a nested SegWit input: push of a 34 byte witness program.
const NESTED_SCRIPT_SIG: u64 = 35;
const DER_SIGNATURE: u64 = 72;
const SCHNORR_SIGNATURE: u64 = 64;
/// Control block of a leaf at depth one.
const CONTROL_BLOCK: u64 = 65;
const WITNESS_SCALE_FACTOR: u64 = 4;

/// The capabilities fee targeting needs from a fully built transaction.
pub trait SizedTransaction {
    fn virtual_size(&self) -> usize;
    fn input_count(&self) -> usize;
}

impl SizedTransaction for bitcoin::Transaction {
    fn virtual_size(&self) -> usize {
        self.vsize()
    }

    fn input_count(&self) -> usize {
        self.input.len()
    }
}

impl SizedTransaction for elements::Transaction {
    fn virtual_size(&self) -> usize {
        self.vsize()
    }

    fn input_count(&self) -> usize {
        self.input.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fee {
    /// Absolute fee in satoshis
    Absolute(u64),
    /// Fee rate in sat/vbyte
    Relative(f64),
}

/// Input whose cost should be estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCost {
    /// Single key spend of the given output type
    PubkeyHash(OutputType),
    /// Spend of a swap output through its redeem script or Taproot leaf.
    /// A `preimage_len` of zero means no preimage is pushed.
    Swap {
        output_type: OutputType,
        preimage_len: usize,
        script_len: usize,
    },
}

/// Output whose cost should be estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputCost {
    PubkeyHash(OutputType),
    ScriptHash(OutputType),
}

fn pubkey_hash_input_size(output_type: OutputType) -> u64 {
    match output_type {
        OutputType::Bech32 => 68,
        OutputType::Compatibility => 91,
        OutputType::Legacy => 148,
        OutputType::Taproot => 58,
    }
}

fn output_size(output: OutputCost) -> u64 {
    match output {
        OutputCost::PubkeyHash(OutputType::Bech32) => 31,
        OutputCost::PubkeyHash(OutputType::Compatibility) => 32,
        OutputCost::PubkeyHash(OutputType::Legacy) => 34,
        OutputCost::PubkeyHash(OutputType::Taproot) => 43,
        // P2WSH has a 32 byte program and costs the same as P2TR
        OutputCost::ScriptHash(OutputType::Bech32) => 43,
        OutputCost::ScriptHash(OutputType::Compatibility) => 32,
        OutputCost::ScriptHash(OutputType::Legacy) => 32,
        OutputCost::ScriptHash(OutputType::Taproot) => 43,
    }
}

/// Size of a data push in a script.
fn push_size(len: u64) -> u64 {
    match len {
        0..=75 => 1 + len,
        76..=0xff => 2 + len,
        0x100..=0xffff => 3 + len,
        _ => 5 + len,
    }
}

/// Size of a witness stack element.
fn witness_item_size(len: u64) -> u64 {
    VarInt(len).size() as u64 + len
}

fn swap_input_size(output_type: OutputType, preimage_len: usize, script_len: usize) -> u64 {
    let preimage_len = preimage_len as u64;
    let script_len = script_len as u64;

    if output_type == OutputType::Legacy {
        let script_sig = push_size(DER_SIGNATURE)
            + push_size(preimage_len)
            + push_size(script_len);
        return 40 + VarInt(script_sig).size() as u64 + script_sig;
    }

    let (non_witness, witness) = match output_type {
        OutputType::Taproot => {
            let mut items = 3;
            let mut witness = witness_item_size(SCHNORR_SIGNATURE)
                + witness_item_size(script_len)
                + witness_item_size(CONTROL_BLOCK);
            if preimage_len > 0 {
                items += 1;
                witness += witness_item_size(preimage_len);
            }
            (SEGWIT_INPUT_BASE, VarInt(items).size() as u64 + witness)
        }
        _ => {
            let witness = VarInt(3).size() as u64
                + witness_item_size(DER_SIGNATURE)
                + witness_item_size(preimage_len)
                + witness_item_size(script_len);
            let non_witness = match output_type {
                OutputType::Compatibility => SEGWIT_INPUT_BASE + NESTED_SCRIPT_SIG,
                _ => SEGWIT_INPUT_BASE,
            };
            (non_witness, witness)
        }
    };

    let weight = non_witness * WITNESS_SCALE_FACTOR + witness;
    (weight + WITNESS_SCALE_FACTOR - 1) / WITNESS_SCALE_FACTOR
}

fn input_size(input: InputCost) -> u64 {
    match input {
        InputCost::PubkeyHash(output_type) => pubkey_hash_input_size(output_type),
        InputCost::Swap {
            output_type,
            preimage_len,
            script_len,
        } => swap_input_size(output_type, preimage_len, script_len),
    }
}

/// Predicted virtual size of a transaction before it is signed.
pub fn estimate_size(inputs: &[InputCost], outputs: &[OutputCost]) -> u64 {
    BASE_SIZE
        + inputs.iter().map(|i| input_size(*i)).sum::<u64>()
        + outputs.iter().map(|o| output_size(*o)).sum::<u64>()
}

/// Predicted fee of a transaction before it is signed.
pub fn estimate_fee(sat_per_vbyte: f64, inputs: &[InputCost], outputs: &[OutputCost]) -> u64 {
    (estimate_size(inputs, outputs) as f64 * sat_per_vbyte).ceil() as u64
}

/// Builds the transaction twice: once with a fee of 1 sat to learn its
/// real size, then with the fee that size calls for at `sat_per_vbyte`.
/// One extra vbyte per input absorbs the signature size differences
/// between the two builds.
pub fn target_fee<T, F>(sat_per_vbyte: f64, construct: F) -> Result<T, Error>
where
    T: SizedTransaction,
    F: Fn(u64) -> Result<T, Error>,
{
    if !sat_per_vbyte.is_finite() || sat_per_vbyte <= 0.0 {
        return Err(Error::Validation(format!(
            "invalid fee rate {}",
            sat_per_vbyte
        )));
    }

    let probe = construct(1)?;
    let fee = ((probe.virtual_size() + probe.input_count()) as f64 * sat_per_vbyte).ceil() as u64;
    log::debug!(
        "Probe transaction has {} vbytes and {} inputs, targeting fee of {} sats",
        probe.virtual_size(),
        probe.input_count(),
        fee
    );

    construct(fee)
}

/// Builds a transaction paying either a fixed fee or a fee rate.
pub fn create_tx_with_fee<T, F>(fee: Fee, construct: F) -> Result<T, Error>
where
    T: SizedTransaction,
    F: Fn(u64) -> Result<T, Error>,
{
    match fee {
        Fee::Absolute(fee) => construct(fee),
        Fee::Relative(fee_rate) => target_fee(fee_rate, construct),
    }
}
