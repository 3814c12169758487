use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::secp256k1::{schnorr, All, Keypair, Message, Secp256k1};
use bitcoin::sighash::{Prevouts, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{
    Amount, EcdsaSighashType, OutPoint, Script, ScriptBuf, Sequence, TapLeafHash, TapSighashType,
    Transaction, TxIn, TxOut, Witness, XOnlyPublicKey,
};

use crate::error::Error;
use crate::swaps::script::{p2sh_p2wsh_script_sig, OutputType};
use crate::swaps::taproot::{Leaf, SwapTree, TaprootFlavor};

/// Stands in for the preimage on refund paths of non-Taproot scripts.
pub(crate) const DUMMY_PREIMAGE: [u8; 1] = [0];

/// Placeholder for the MuSig2 signature of a cooperative key path spend.
pub(crate) const COOPERATIVE_PLACEHOLDER: [u8; 64] = [0; 64];

/// A swap output to refund.
#[derive(Debug, Clone)]
pub struct RefundDetails {
    pub outpoint: OutPoint,
    pub tx_out: TxOut,
    pub output_type: OutputType,
    /// Signs script path spends. Not needed for cooperative spends.
    pub keys: Option<Keypair>,
    /// Required for every output type but Taproot
    pub redeem_script: Option<ScriptBuf>,
    /// Required for non-cooperative Taproot spends
    pub swap_tree: Option<SwapTree>,
    /// Required for non-cooperative Taproot spends
    pub internal_key: Option<XOnlyPublicKey>,
    /// Taproot key path spend that gets signed with MuSig2 later on
    pub cooperative: bool,
}

/// A swap output to claim with the preimage.
#[derive(Debug, Clone)]
pub struct ClaimDetails {
    pub outpoint: OutPoint,
    pub tx_out: TxOut,
    pub output_type: OutputType,
    pub keys: Option<Keypair>,
    pub preimage: Vec<u8>,
    pub redeem_script: Option<ScriptBuf>,
    pub swap_tree: Option<SwapTree>,
    pub internal_key: Option<XOnlyPublicKey>,
    pub cooperative: bool,
}

/// Input of a claim or refund, with the preimage resolved.
struct SpendInput<'a> {
    outpoint: OutPoint,
    tx_out: &'a TxOut,
    output_type: OutputType,
    keys: Option<&'a Keypair>,
    preimage: Option<&'a [u8]>,
    redeem_script: Option<&'a ScriptBuf>,
    swap_tree: Option<&'a SwapTree>,
    internal_key: Option<&'a XOnlyPublicKey>,
    cooperative: bool,
}

impl<'a> From<&'a ClaimDetails> for SpendInput<'a> {
    fn from(details: &'a ClaimDetails) -> Self {
        SpendInput {
            outpoint: details.outpoint,
            tx_out: &details.tx_out,
            output_type: details.output_type,
            keys: details.keys.as_ref(),
            preimage: Some(&details.preimage),
            redeem_script: details.redeem_script.as_ref(),
            swap_tree: details.swap_tree.as_ref(),
            internal_key: details.internal_key.as_ref(),
            cooperative: details.cooperative,
        }
    }
}

impl<'a> From<&'a RefundDetails> for SpendInput<'a> {
    fn from(details: &'a RefundDetails) -> Self {
        SpendInput {
            outpoint: details.outpoint,
            tx_out: &details.tx_out,
            output_type: details.output_type,
            keys: details.keys.as_ref(),
            preimage: None,
            redeem_script: details.redeem_script.as_ref(),
            swap_tree: details.swap_tree.as_ref(),
            internal_key: details.internal_key.as_ref(),
            cooperative: details.cooperative,
        }
    }
}

fn is_cooperative_taproot(input: &SpendInput) -> bool {
    input.output_type == OutputType::Taproot && input.cooperative
}

fn validate_inputs(inputs: &[SpendInput]) -> Result<(), Error> {
    if inputs.is_empty() {
        return Err(Error::Validation("no inputs to spend".to_string()));
    }

    let mut errors = vec![];
    if inputs
        .iter()
        .any(|i| i.output_type != OutputType::Taproot && i.redeem_script.is_none())
    {
        errors.push("not all non-Taproot inputs have a redeem script");
    }

    let script_path: Vec<&SpendInput> = inputs
        .iter()
        .filter(|i| i.output_type == OutputType::Taproot && !i.cooperative)
        .collect();
    if script_path.iter().any(|i| i.swap_tree.is_none()) {
        errors.push("not all non-cooperative Taproot inputs have a swap tree");
    }
    if script_path.iter().any(|i| i.internal_key.is_none()) {
        errors.push("not all non-cooperative Taproot inputs have an internal key");
    }
    if inputs
        .iter()
        .any(|i| !is_cooperative_taproot(i) && i.keys.is_none())
    {
        errors.push("not all non-cooperative inputs have keys");
    }

    match errors.first() {
        Some(error) => {
            log::warn!("Rejected swap inputs: {}", errors.join(", "));
            Err(Error::Validation(error.to_string()))
        }
        None => Ok(()),
    }
}

fn missing(what: &str) -> Error {
    Error::Validation(format!("input is missing its {}", what))
}

fn ecdsa_signature(secp: &Secp256k1<All>, digest: [u8; 32], keys: &Keypair) -> Vec<u8> {
    let sig = secp.sign_ecdsa(&Message::from_digest(digest), &keys.secret_key());
    bitcoin::ecdsa::Signature::sighash_all(sig).to_vec()
}

fn push(data: &[u8]) -> Result<PushBytesBuf, Error> {
    Ok(PushBytesBuf::try_from(data.to_vec())?)
}

/// Leaf a script path spend goes through.
fn spend_leaf<'a>(tree: &'a SwapTree, is_refund: bool) -> &'a Leaf {
    if is_refund {
        &tree.refund_leaf
    } else {
        &tree.claim_leaf
    }
}

/// Signs every input of `tx` and returns (scriptSig, witness) per input.
fn sign_inputs(
    secp: &Secp256k1<All>,
    tx: &Transaction,
    inputs: &[SpendInput],
    is_refund: bool,
) -> Result<Vec<(ScriptBuf, Witness)>, Error> {
    let prevouts: Vec<TxOut> = inputs.iter().map(|i| i.tx_out.clone()).collect();
    let mut cache = SighashCache::new(tx);
    let mut signed = Vec::with_capacity(inputs.len());

    for (index, input) in inputs.iter().enumerate() {
        let preimage: &[u8] = input.preimage.unwrap_or(&DUMMY_PREIMAGE);

        if input.output_type == OutputType::Taproot {
            let mut witness = Witness::new();
            if input.cooperative {
                witness.push(COOPERATIVE_PLACEHOLDER);
                signed.push((ScriptBuf::new(), witness));
                continue;
            }

            let tree = input.swap_tree.ok_or_else(|| missing("swap tree"))?;
            let internal_key = input.internal_key.ok_or_else(|| missing("internal key"))?;
            let keys = input.keys.ok_or_else(|| missing("keys"))?;
            let leaf = spend_leaf(tree, is_refund);

            let leaf_hash = TapLeafHash::from_byte_array(leaf.hash(TaprootFlavor::Bitcoin)?);
            let sighash = cache.taproot_script_spend_signature_hash(
                index,
                &Prevouts::All(&prevouts),
                leaf_hash,
                TapSighashType::Default,
            )?;
            let sig = secp.sign_schnorr(&Message::from_digest(sighash.to_byte_array()), keys);
            let signature = bitcoin::taproot::Signature {
                sig,
                hash_ty: TapSighashType::Default,
            };

            witness.push(signature.to_vec());
            if !is_refund {
                witness.push(preimage);
            }
            witness.push(&leaf.output);
            witness.push(tree.control_block(secp, internal_key, leaf)?);
            signed.push((ScriptBuf::new(), witness));
            continue;
        }

        let redeem_script = input.redeem_script.ok_or_else(|| missing("redeem script"))?;
        let keys = input.keys.ok_or_else(|| missing("keys"))?;

        match input.output_type {
            OutputType::Taproot => {
                return Err(Error::Validation(
                    "Taproot inputs have no redeem script".to_string(),
                ))
            }
            OutputType::Legacy => {
                let sighash = cache.legacy_signature_hash(
                    index,
                    redeem_script,
                    EcdsaSighashType::All.to_u32(),
                )?;
                let signature = ecdsa_signature(secp, sighash.to_byte_array(), keys);
                let script_sig = Builder::new()
                    .push_slice(push(&signature)?)
                    .push_slice(push(preimage)?)
                    .push_slice(push(redeem_script.as_bytes())?)
                    .into_script();
                signed.push((script_sig, Witness::new()));
            }
            OutputType::Compatibility | OutputType::Bech32 => {
                let sighash = cache.segwit_signature_hash(
                    index,
                    redeem_script,
                    input.tx_out.value,
                    EcdsaSighashType::All,
                )?;
                let signature = ecdsa_signature(secp, sighash.to_byte_array(), keys);

                let mut witness = Witness::new();
                witness.push(signature);
                witness.push(preimage);
                witness.push(redeem_script.as_bytes());

                let script_sig = match input.output_type {
                    OutputType::Compatibility => p2sh_p2wsh_script_sig(redeem_script)?,
                    _ => ScriptBuf::new(),
                };
                signed.push((script_sig, witness));
            }
        }
    }

    Ok(signed)
}

fn construct_transaction(
    secp: &Secp256k1<All>,
    inputs: &[SpendInput],
    destination_script: &Script,
    fee: u64,
    is_rbf: bool,
    timeout_block_height: Option<LockTime>,
    is_refund: bool,
) -> Result<Transaction, Error> {
    validate_inputs(inputs)?;

    let input_sum: u64 = inputs.iter().map(|i| i.tx_out.value.to_sat()).sum();
    if fee >= input_sum {
        return Err(Error::Validation(format!(
            "fee of {} sats exceeds the input sum of {} sats",
            fee, input_sum
        )));
    }

    let sequence = match (is_rbf, is_refund) {
        (true, _) => Sequence::ENABLE_RBF_NO_LOCKTIME,
        (false, true) => Sequence::ENABLE_LOCKTIME_NO_RBF,
        (false, false) => Sequence::MAX,
    };

    let lock_time = match (is_refund, timeout_block_height) {
        (true, Some(timeout)) => timeout,
        (true, None) => {
            return Err(Error::Validation(
                "refunds require a timeout block height".to_string(),
            ))
        }
        (false, _) => LockTime::ZERO,
    };

    let mut tx = Transaction {
        version: Version::TWO,
        lock_time,
        input: inputs
            .iter()
            .map(|i| TxIn {
                previous_output: i.outpoint,
                script_sig: ScriptBuf::new(),
                sequence,
                witness: Witness::new(),
            })
            .collect(),
        output: vec![TxOut {
            script_pubkey: destination_script.to_owned(),
            value: Amount::from_sat(input_sum - fee),
        }],
    };

    let signed = sign_inputs(secp, &tx, inputs, is_refund)?;
    for (input, (script_sig, witness)) in tx.input.iter_mut().zip(signed) {
        input.script_sig = script_sig;
        input.witness = witness;
    }

    log::info!(
        "Constructed {} transaction {} spending {} inputs with a fee of {} sats",
        if is_refund { "refund" } else { "claim" },
        tx.txid(),
        inputs.len(),
        fee
    );
    Ok(tx)
}

/// Claims swap outputs with their preimages to `destination_script`.
pub fn construct_claim_transaction(
    secp: &Secp256k1<All>,
    utxos: &[ClaimDetails],
    destination_script: &Script,
    fee: u64,
    is_rbf: bool,
) -> Result<Transaction, Error> {
    let inputs: Vec<SpendInput> = utxos.iter().map(SpendInput::from).collect();
    construct_transaction(secp, &inputs, destination_script, fee, is_rbf, None, false)
}

/// Refunds timed out swap outputs to `destination_script`.
pub fn construct_refund_transaction(
    secp: &Secp256k1<All>,
    utxos: &[RefundDetails],
    destination_script: &Script,
    timeout_block_height: LockTime,
    fee: u64,
    is_rbf: bool,
) -> Result<Transaction, Error> {
    let inputs: Vec<SpendInput> = utxos.iter().map(SpendInput::from).collect();
    construct_transaction(
        secp,
        &inputs,
        destination_script,
        fee,
        is_rbf,
        Some(timeout_block_height),
        true,
    )
}

/// Key path sighash of a cooperative input. This is the message the
/// MuSig2 session has to sign.
pub fn cooperative_sighash(
    tx: &Transaction,
    input_index: usize,
    prevouts: &[TxOut],
) -> Result<[u8; 32], Error> {
    let sighash = SighashCache::new(tx).taproot_key_spend_signature_hash(
        input_index,
        &Prevouts::All(prevouts),
        TapSighashType::Default,
    )?;
    Ok(sighash.to_byte_array())
}

/// Replaces the placeholder of a cooperative input with the aggregated signature.
pub fn set_cooperative_signature(
    tx: &mut Transaction,
    input_index: usize,
    signature: &schnorr::Signature,
) -> Result<(), Error> {
    let input = tx
        .input
        .get_mut(input_index)
        .ok_or_else(|| Error::Validation(format!("no input at index {}", input_index)))?;
    let signature = bitcoin::taproot::Signature {
        sig: *signature,
        hash_ty: TapSighashType::Default,
    };
    input.witness = Witness::from_slice(&[signature.to_vec()]);
    Ok(())
}
