use bitcoin::hashes::Hash;
use bitcoin::key::rand::thread_rng;
use bitcoin::XOnlyPublicKey;
use elements::confidential::{Asset, AssetBlindingFactor, Nonce, Value, ValueBlindingFactor};
use elements::secp256k1_zkp::{schnorr, All, Keypair, Message, PublicKey, Secp256k1, SecretKey};
use elements::sighash::{Prevouts, SighashCache};
use elements::taproot::TapLeafHash;
use elements::{
    AssetId, AssetIssuance, BlockHash, EcdsaSighashType, LockTime, OutPoint, RangeProofMessage,
    SchnorrSig, SchnorrSighashType, Script, Sequence, Transaction, TxIn, TxInWitness, TxOut,
    TxOutSecrets, TxOutWitness,
};

use crate::error::Error;
use crate::swaps::bitcoin::{COOPERATIVE_PLACEHOLDER, DUMMY_PREIMAGE};
use crate::swaps::script::OutputType;
use crate::swaps::taproot::{Leaf, SwapTree, TaprootFlavor};

/// Value of the OP_RETURN output that makes sure at least one output is
/// blinded. Range proofs can not prove a value of zero.
const ANCHOR_VALUE: u64 = 1;

/// Non-final sequence without RBF signaling, so the locktime is enforced.
const LOCKTIME_SEQUENCE: u32 = 0xffff_fffe;

/// A Liquid swap output to refund.
#[derive(Debug, Clone)]
pub struct RefundDetails {
    pub outpoint: OutPoint,
    pub tx_out: TxOut,
    pub output_type: OutputType,
    pub keys: Option<Keypair>,
    /// Unblinds the output. Only required when it is confidential.
    pub blinding_key: Option<SecretKey>,
    pub redeem_script: Option<Script>,
    pub swap_tree: Option<SwapTree>,
    pub internal_key: Option<XOnlyPublicKey>,
    pub cooperative: bool,
}

/// A Liquid swap output to claim. Without keys, the covenant leaf of the
/// swap tree is used.
#[derive(Debug, Clone)]
pub struct ClaimDetails {
    pub outpoint: OutPoint,
    pub tx_out: TxOut,
    pub output_type: OutputType,
    pub keys: Option<Keypair>,
    pub preimage: Vec<u8>,
    pub blinding_key: Option<SecretKey>,
    pub redeem_script: Option<Script>,
    pub swap_tree: Option<SwapTree>,
    pub internal_key: Option<XOnlyPublicKey>,
    pub cooperative: bool,
}

struct SpendInput<'a> {
    outpoint: OutPoint,
    tx_out: &'a TxOut,
    output_type: OutputType,
    keys: Option<&'a Keypair>,
    preimage: Option<&'a [u8]>,
    blinding_key: Option<&'a SecretKey>,
    redeem_script: Option<&'a Script>,
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
            blinding_key: details.blinding_key.as_ref(),
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
            blinding_key: details.blinding_key.as_ref(),
            redeem_script: details.redeem_script.as_ref(),
            swap_tree: details.swap_tree.as_ref(),
            internal_key: details.internal_key.as_ref(),
            cooperative: details.cooperative,
        }
    }
}

impl SpendInput<'_> {
    fn is_blinded(&self) -> bool {
        self.tx_out.value.is_confidential()
    }

    fn is_cooperative_taproot(&self) -> bool {
        self.output_type == OutputType::Taproot && self.cooperative
    }

    /// Claims through the covenant leaf do not need a signature.
    fn is_covenant_claim(&self, is_refund: bool) -> bool {
        !is_refund
            && self.output_type == OutputType::Taproot
            && !self.cooperative
            && self.keys.is_none()
            && self
                .swap_tree
                .map(|tree| tree.covenant_claim_leaf.is_some())
                .unwrap_or(false)
    }
}

fn validate_inputs(inputs: &[SpendInput], is_refund: bool) -> Result<(), Error> {
    if inputs.is_empty() {
        return Err(Error::Validation("no inputs to spend".to_string()));
    }

    if inputs
        .iter()
        .any(|i| !matches!(i.output_type, OutputType::Taproot | OutputType::Bech32))
    {
        return Err(Error::Validation(
            "only Taproot or native SegWit inputs supported".to_string(),
        ));
    }

    let blinded = inputs.iter().filter(|i| i.is_blinded()).count();
    if blinded != 0 && blinded != inputs.len() {
        return Err(Error::Validation(
            "all or none inputs have to be blinded".to_string(),
        ));
    }

    if inputs
        .iter()
        .any(|i| i.output_type != OutputType::Taproot && i.redeem_script.is_none())
    {
        return Err(Error::Validation(
            "not all non-Taproot inputs have a redeem script".to_string(),
        ));
    }

    let script_path = || {
        inputs
            .iter()
            .filter(|i| i.output_type == OutputType::Taproot && !i.cooperative)
    };
    if script_path().any(|i| i.swap_tree.is_none()) {
        return Err(Error::Validation(
            "not all non-cooperative Taproot inputs have a swap tree".to_string(),
        ));
    }
    if script_path().any(|i| i.internal_key.is_none()) {
        return Err(Error::Validation(
            "not all non-cooperative Taproot inputs have an internal key".to_string(),
        ));
    }

    if inputs.iter().any(|i| {
        !i.is_cooperative_taproot() && !i.is_covenant_claim(is_refund) && i.keys.is_none()
    }) {
        return Err(Error::Validation(
            "not all non-cooperative inputs have keys".to_string(),
        ));
    }

    Ok(())
}

/// Asset, value and blinding factors of every input.
fn input_secrets(secp: &Secp256k1<All>, inputs: &[SpendInput]) -> Result<Vec<TxOutSecrets>, Error> {
    inputs
        .iter()
        .map(|input| {
            if input.is_blinded() {
                let blinding_key = input.blinding_key.ok_or_else(|| {
                    Error::Validation("blinded input is missing its blinding key".to_string())
                })?;
                return Ok(input.tx_out.unblind(secp, *blinding_key)?);
            }

            match (input.tx_out.asset, input.tx_out.value) {
                (Asset::Explicit(asset), Value::Explicit(value)) => Ok(TxOutSecrets::new(
                    asset,
                    AssetBlindingFactor::zero(),
                    value,
                    ValueBlindingFactor::zero(),
                )),
                _ => Err(Error::Validation(format!(
                    "input {} has a confidential asset but an explicit value",
                    input.outpoint
                ))),
            }
        })
        .collect()
}

/// An output before blinding.
struct PlannedOutput {
    script_pubkey: Script,
    value: u64,
    blinding_key: Option<PublicKey>,
}

fn explicit_output(asset: AssetId, output: &PlannedOutput) -> TxOut {
    TxOut {
        asset: Asset::Explicit(asset),
        value: Value::Explicit(output.value),
        nonce: Nonce::Null,
        script_pubkey: output.script_pubkey.clone(),
        witness: TxOutWitness::default(),
    }
}

fn blind_output(
    secp: &Secp256k1<All>,
    asset: AssetId,
    output: &PlannedOutput,
    receiver: PublicKey,
    abf: AssetBlindingFactor,
    vbf: ValueBlindingFactor,
    spent_utxo_secrets: &[TxOutSecrets],
) -> Result<TxOut, Error> {
    let (blinded_asset, surjection_proof) =
        Asset::Explicit(asset).blind(&mut thread_rng(), secp, abf, spent_utxo_secrets)?;

    let ephemeral_sk = SecretKey::new(&mut thread_rng());
    let msg = RangeProofMessage { asset, bf: abf };
    let (blinded_value, nonce, rangeproof) = Value::Explicit(output.value).blind(
        secp,
        vbf,
        receiver,
        ephemeral_sk,
        &output.script_pubkey,
        &msg,
    )?;

    Ok(TxOut {
        asset: blinded_asset,
        value: blinded_value,
        nonce,
        script_pubkey: output.script_pubkey.clone(),
        witness: TxOutWitness {
            surjection_proof: Some(Box::new(surjection_proof)),
            rangeproof: Some(Box::new(rangeproof)),
        },
    })
}

/// Blinds every output that has a blinding key. The value blinding factor
/// of the last blinded output balances the commitments of inputs and outputs.
fn blind_outputs(
    secp: &Secp256k1<All>,
    asset: AssetId,
    outputs: &[PlannedOutput],
    secrets: &[TxOutSecrets],
) -> Result<Vec<TxOut>, Error> {
    let last_blinded = outputs.iter().rposition(|o| o.blinding_key.is_some());

    let mut factors: Vec<(u64, AssetBlindingFactor, ValueBlindingFactor)> = outputs
        .iter()
        .map(|output| match output.blinding_key {
            Some(_) => (
                output.value,
                AssetBlindingFactor::new(&mut thread_rng()),
                ValueBlindingFactor::new(&mut thread_rng()),
            ),
            None => (
                output.value,
                AssetBlindingFactor::zero(),
                ValueBlindingFactor::zero(),
            ),
        })
        .collect();

    if let Some(last) = last_blinded {
        let input_factors: Vec<(u64, AssetBlindingFactor, ValueBlindingFactor)> = secrets
            .iter()
            .map(|s| (s.value, s.asset_bf, s.value_bf))
            .collect();
        let other_outputs: Vec<(u64, AssetBlindingFactor, ValueBlindingFactor)> = factors
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != last)
            .map(|(_, f)| *f)
            .collect();
        let (value, abf, _) = factors[last];
        factors[last].2 =
            ValueBlindingFactor::last(secp, value, abf, &input_factors, &other_outputs);
    }

    outputs
        .iter()
        .zip(factors)
        .map(|(output, (_, abf, vbf))| match output.blinding_key {
            Some(receiver) => blind_output(secp, asset, output, receiver, abf, vbf, secrets),
            None => Ok(explicit_output(asset, output)),
        })
        .collect()
}

fn missing(what: &str) -> Error {
    Error::Validation(format!("input is missing its {}", what))
}

fn ecdsa_signature(secp: &Secp256k1<All>, digest: [u8; 32], keys: &Keypair) -> Vec<u8> {
    let sig = secp.sign_ecdsa(&Message::from_digest(digest), &keys.secret_key());
    let mut signature = sig.serialize_der().to_vec();
    signature.push(EcdsaSighashType::All.as_u32() as u8);
    signature
}

fn script_witness(script_witness: Vec<Vec<u8>>) -> TxInWitness {
    TxInWitness {
        amount_rangeproof: None,
        inflation_keys_rangeproof: None,
        script_witness,
        pegin_witness: vec![],
    }
}

/// Leaf a script path spend goes through.
fn spend_leaf<'a>(tree: &'a SwapTree, is_refund: bool, covenant: bool) -> Result<&'a Leaf, Error> {
    if is_refund {
        return Ok(&tree.refund_leaf);
    }
    if covenant {
        return tree
            .covenant_claim_leaf
            .as_ref()
            .ok_or_else(|| missing("covenant claim leaf"));
    }
    Ok(&tree.claim_leaf)
}

fn sign_inputs(
    secp: &Secp256k1<All>,
    tx: &Transaction,
    inputs: &[SpendInput],
    is_refund: bool,
    genesis_hash: BlockHash,
) -> Result<Vec<TxInWitness>, Error> {
    let prevouts: Vec<&TxOut> = inputs.iter().map(|i| i.tx_out).collect();
    let mut cache = SighashCache::new(tx);
    let mut witnesses = Vec::with_capacity(inputs.len());

    for (index, input) in inputs.iter().enumerate() {
        let preimage: &[u8] = input.preimage.unwrap_or(&DUMMY_PREIMAGE);

        if input.output_type == OutputType::Bech32 {
            let redeem_script = input.redeem_script.ok_or_else(|| missing("redeem script"))?;
            let keys = input.keys.ok_or_else(|| missing("keys"))?;
            let sighash = cache.segwitv0_sighash(
                index,
                redeem_script,
                input.tx_out.value,
                EcdsaSighashType::All,
            );
            witnesses.push(script_witness(vec![
                ecdsa_signature(secp, sighash.to_byte_array(), keys),
                preimage.to_vec(),
                redeem_script.to_bytes(),
            ]));
            continue;
        }

        if input.cooperative {
            witnesses.push(script_witness(vec![COOPERATIVE_PLACEHOLDER.to_vec()]));
            continue;
        }

        let tree = input.swap_tree.ok_or_else(|| missing("swap tree"))?;
        let internal_key = input.internal_key.ok_or_else(|| missing("internal key"))?;
        let covenant = input.is_covenant_claim(is_refund);
        let leaf = spend_leaf(tree, is_refund, covenant)?;

        let mut witness = vec![];
        if !covenant {
            let keys = input.keys.ok_or_else(|| missing("keys"))?;
            let leaf_hash = TapLeafHash::from_byte_array(leaf.hash(TaprootFlavor::Liquid)?);
            let sighash = cache.taproot_script_spend_signature_hash(
                index,
                &Prevouts::All(&prevouts),
                leaf_hash,
                SchnorrSighashType::Default,
                genesis_hash,
            )?;
            let sig = secp.sign_schnorr(&Message::from_digest(sighash.to_byte_array()), keys);
            witness.push(
                SchnorrSig {
                    sig,
                    hash_ty: SchnorrSighashType::Default,
                }
                .to_vec(),
            );
        }
        if !is_refund {
            witness.push(preimage.to_vec());
        }
        witness.push(leaf.output.clone());
        witness.push(tree.control_block(secp, internal_key, leaf)?);
        witnesses.push(script_witness(witness));
    }

    Ok(witnesses)
}

#[allow(clippy::too_many_arguments)]
fn construct_transaction(
    secp: &Secp256k1<All>,
    inputs: &[SpendInput],
    destination_script: &Script,
    destination_blinding_key: Option<PublicKey>,
    fee: u64,
    is_rbf: bool,
    timeout_block_height: Option<LockTime>,
    is_refund: bool,
    genesis_hash: BlockHash,
) -> Result<Transaction, Error> {
    validate_inputs(inputs, is_refund).map_err(|e| {
        log::warn!("Rejected Liquid swap inputs: {}", e);
        e
    })?;

    let secrets = input_secrets(secp, inputs)?;
    let asset = secrets[0].asset;
    if secrets.iter().any(|s| s.asset != asset) {
        return Err(Error::Validation("inputs have different assets".to_string()));
    }

    let is_blinded = inputs[0].is_blinded();
    let needs_anchor = is_blinded && destination_blinding_key.is_none();
    let input_sum: u64 = secrets.iter().map(|s| s.value).sum();
    let spent = fee
        .checked_add(if needs_anchor { ANCHOR_VALUE } else { 0 })
        .filter(|spent| *spent < input_sum)
        .ok_or_else(|| {
            Error::Validation(format!(
                "fee of {} sats exceeds the input sum of {} sats",
                fee, input_sum
            ))
        })?;

    let mut planned = vec![PlannedOutput {
        script_pubkey: destination_script.clone(),
        value: input_sum - spent,
        blinding_key: destination_blinding_key,
    }];
    if needs_anchor {
        planned.push(PlannedOutput {
            script_pubkey: Script::new_op_return(&[]),
            value: ANCHOR_VALUE,
            blinding_key: Some(SecretKey::new(&mut thread_rng()).public_key(secp)),
        });
    }
    let mut output = blind_outputs(secp, asset, &planned, &secrets)?;
    output.push(TxOut::new_fee(fee, asset));

    let sequence = match (is_rbf, is_refund) {
        (true, _) => Sequence::ENABLE_RBF_NO_LOCKTIME,
        (false, true) => Sequence::from_consensus(LOCKTIME_SEQUENCE),
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
        version: 2,
        lock_time,
        input: inputs
            .iter()
            .map(|i| TxIn {
                previous_output: i.outpoint,
                is_pegin: false,
                script_sig: Script::new(),
                sequence,
                asset_issuance: AssetIssuance::default(),
                witness: TxInWitness::default(),
            })
            .collect(),
        output,
    };

    let witnesses = sign_inputs(secp, &tx, inputs, is_refund, genesis_hash)?;
    for (input, witness) in tx.input.iter_mut().zip(witnesses) {
        input.witness = witness;
    }

    log::info!(
        "Constructed {} {} transaction {} spending {} inputs with a fee of {} sats",
        if is_blinded { "blinded" } else { "explicit" },
        if is_refund { "refund" } else { "claim" },
        tx.txid(),
        inputs.len(),
        fee
    );
    Ok(tx)
}

/// Claims Liquid swap outputs to `destination_script`, blinding the
/// destination when `destination_blinding_key` is set.
pub fn construct_claim_transaction(
    secp: &Secp256k1<All>,
    utxos: &[ClaimDetails],
    destination_script: &Script,
    destination_blinding_key: Option<PublicKey>,
    fee: u64,
    is_rbf: bool,
    genesis_hash: BlockHash,
) -> Result<Transaction, Error> {
    let inputs: Vec<SpendInput> = utxos.iter().map(SpendInput::from).collect();
    construct_transaction(
        secp,
        &inputs,
        destination_script,
        destination_blinding_key,
        fee,
        is_rbf,
        None,
        false,
        genesis_hash,
    )
}

/// Refunds timed out Liquid swap outputs to `destination_script`.
#[allow(clippy::too_many_arguments)]
pub fn construct_refund_transaction(
    secp: &Secp256k1<All>,
    utxos: &[RefundDetails],
    destination_script: &Script,
    destination_blinding_key: Option<PublicKey>,
    timeout_block_height: LockTime,
    fee: u64,
    is_rbf: bool,
    genesis_hash: BlockHash,
) -> Result<Transaction, Error> {
    let inputs: Vec<SpendInput> = utxos.iter().map(SpendInput::from).collect();
    construct_transaction(
        secp,
        &inputs,
        destination_script,
        destination_blinding_key,
        fee,
        is_rbf,
        Some(timeout_block_height),
        true,
        genesis_hash,
    )
}

/// Key path sighash of a cooperative input, committing to `genesis_hash`.
pub fn cooperative_sighash(
    tx: &Transaction,
    input_index: usize,
    prevouts: &[TxOut],
    genesis_hash: BlockHash,
) -> Result<[u8; 32], Error> {
    let sighash = SighashCache::new(tx).taproot_key_spend_signature_hash(
        input_index,
        &Prevouts::All(prevouts),
        SchnorrSighashType::Default,
        genesis_hash,
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
    let signature = SchnorrSig {
        sig: *signature,
        hash_ty: SchnorrSighashType::Default,
    };
    input.witness = script_witness(vec![signature.to_vec()]);
    Ok(())
}
