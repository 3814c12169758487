use bitcoin::absolute::LockTime;
use bitcoin::hashes::{ripemd160, sha256, Hash};
use bitcoin::key::TweakedPublicKey;
use bitcoin::opcodes::all::*;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::{PublicKey, Script, ScriptBuf, XOnlyPublicKey};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The kind of output a swap is locked in. Determines the script shape
/// as well as the spending path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputType {
    /// Native SegWit, P2WSH for scripts and P2WPKH for keys
    Bech32,
    /// Nested SegWit, P2SH-P2WSH for scripts and P2SH-P2WPKH for keys
    Compatibility,
    /// P2SH for scripts and P2PKH for keys
    Legacy,
    /// SegWit v1
    Taproot,
}

/// ripemd160 of the preimage sha256, which equals HASH160(preimage).
fn hash160_of_sha256(preimage_hash: &sha256::Hash) -> [u8; 20] {
    ripemd160::Hash::hash(preimage_hash.as_byte_array()).to_byte_array()
}

/// Redeem script of a submarine swap.
///
/// ```text
/// HASH160 <ripemd160(preimage_hash)> EQUAL
/// IF <claim_pubkey>
/// ELSE <timeout> CHECKLOCKTIMEVERIFY DROP <refund_pubkey>
/// ENDIF CHECKSIG
/// ```
pub fn swap_script(
    preimage_hash: &sha256::Hash,
    claim_pubkey: &PublicKey,
    refund_pubkey: &PublicKey,
    timeout: LockTime,
) -> ScriptBuf {
    Builder::new()
        .push_opcode(OP_HASH160)
        .push_slice(hash160_of_sha256(preimage_hash))
        .push_opcode(OP_EQUAL)
        .push_opcode(OP_IF)
        .push_key(claim_pubkey)
        .push_opcode(OP_ELSE)
        .push_lock_time(timeout)
        .push_opcode(OP_CLTV)
        .push_opcode(OP_DROP)
        .push_key(refund_pubkey)
        .push_opcode(OP_ENDIF)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

/// Redeem script of a reverse swap. The claim branch is gated on a
/// 32 byte witness item so a refund can never reveal a preimage.
///
/// ```text
/// SIZE 32 EQUAL
/// IF HASH160 <ripemd160(preimage_hash)> EQUALVERIFY <claim_pubkey>
/// ELSE DROP <timeout> CHECKLOCKTIMEVERIFY DROP <refund_pubkey>
/// ENDIF CHECKSIG
/// ```
pub fn reverse_swap_script(
    preimage_hash: &sha256::Hash,
    claim_pubkey: &PublicKey,
    refund_pubkey: &PublicKey,
    timeout: LockTime,
) -> ScriptBuf {
    Builder::new()
        .push_opcode(OP_SIZE)
        .push_int(32)
        .push_opcode(OP_EQUAL)
        .push_opcode(OP_IF)
        .push_opcode(OP_HASH160)
        .push_slice(hash160_of_sha256(preimage_hash))
        .push_opcode(OP_EQUALVERIFY)
        .push_key(claim_pubkey)
        .push_opcode(OP_ELSE)
        .push_opcode(OP_DROP)
        .push_lock_time(timeout)
        .push_opcode(OP_CLTV)
        .push_opcode(OP_DROP)
        .push_key(refund_pubkey)
        .push_opcode(OP_ENDIF)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

pub fn p2wpkh_output(pubkey: &PublicKey) -> Result<ScriptBuf, Error> {
    let wpubkey_hash = pubkey.wpubkey_hash().ok_or_else(|| {
        Error::Validation("uncompressed keys can not be used in SegWit outputs".to_string())
    })?;
    Ok(ScriptBuf::new_v0_p2wpkh(&wpubkey_hash))
}

pub fn p2wsh_output(redeem_script: &Script) -> ScriptBuf {
    redeem_script.to_v0_p2wsh()
}

pub fn p2pkh_output(pubkey: &PublicKey) -> ScriptBuf {
    ScriptBuf::new_p2pkh(&pubkey.pubkey_hash())
}

pub fn p2sh_output(redeem_script: &Script) -> ScriptBuf {
    redeem_script.to_p2sh()
}

pub fn p2sh_p2wpkh_output(pubkey: &PublicKey) -> Result<ScriptBuf, Error> {
    Ok(p2wpkh_output(pubkey)?.to_p2sh())
}

pub fn p2sh_p2wsh_output(redeem_script: &Script) -> ScriptBuf {
    p2wsh_output(redeem_script).to_p2sh()
}

/// SegWit v1 output paying to an already tweaked x-only key.
pub fn p2tr_output(tweaked_key: &XOnlyPublicKey) -> ScriptBuf {
    ScriptBuf::new_v1_p2tr_tweaked(TweakedPublicKey::dangerous_assume_tweaked(*tweaked_key))
}

/// The witness program that goes into the scriptSig of a nested SegWit input.
pub fn p2sh_p2wsh_script_sig(redeem_script: &Script) -> Result<ScriptBuf, Error> {
    let witness_program = PushBytesBuf::try_from(p2wsh_output(redeem_script).into_bytes())?;
    Ok(Builder::new().push_slice(witness_program).into_script())
}

/// Output script that locks funds to a redeem script for the given output type.
pub fn script_hash_output(output_type: OutputType, redeem_script: &Script) -> Result<ScriptBuf, Error> {
    match output_type {
        OutputType::Bech32 => Ok(p2wsh_output(redeem_script)),
        OutputType::Compatibility => Ok(p2sh_p2wsh_output(redeem_script)),
        OutputType::Legacy => Ok(p2sh_output(redeem_script)),
        OutputType::Taproot => Err(Error::Validation(
            "Taproot outputs are not derived from a redeem script".to_string(),
        )),
    }
}

/// Output script that pays to a single public key for the given output type.
pub fn pubkey_hash_output(output_type: OutputType, pubkey: &PublicKey) -> Result<ScriptBuf, Error> {
    match output_type {
        OutputType::Bech32 => p2wpkh_output(pubkey),
        OutputType::Compatibility => p2sh_p2wpkh_output(pubkey),
        OutputType::Legacy => Ok(p2pkh_output(pubkey)),
        OutputType::Taproot => Ok(p2tr_output(&pubkey.inner.x_only_public_key().0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hex::DisplayHex;
    use bitcoin::script::Instruction;
    use bitcoin::secp256k1::{Secp256k1, SecretKey};

    fn keys() -> (PublicKey, PublicKey) {
        let secp = Secp256k1::new();
        let claim = SecretKey::from_slice(&[0x11; 32]).unwrap();
        let refund = SecretKey::from_slice(&[0x22; 32]).unwrap();
        (
            PublicKey::new(claim.public_key(&secp)),
            PublicKey::new(refund.public_key(&secp)),
        )
    }

    #[test]
    fn test_swap_script_layout() {
        let (claim, refund) = keys();
        let preimage_hash = sha256::Hash::hash(&[1u8; 32]);
        let timeout = LockTime::from_height(500).unwrap();

        let script = swap_script(&preimage_hash, &claim, &refund, timeout);
        let again = swap_script(&preimage_hash, &claim, &refund, timeout);
        assert_eq!(script, again);

        let instructions: Vec<Instruction> = script.instructions().map(|i| i.unwrap()).collect();
        assert_eq!(instructions[0], Instruction::Op(OP_HASH160));
        assert_eq!(
            instructions[1].push_bytes().unwrap().as_bytes(),
            bitcoin::hashes::hash160::Hash::hash(&[1u8; 32]).as_byte_array()
        );
        assert_eq!(instructions[2], Instruction::Op(OP_EQUAL));
        assert_eq!(
            instructions[4].push_bytes().unwrap().as_bytes(),
            claim.to_bytes().as_slice()
        );
        assert_eq!(instructions[7], Instruction::Op(OP_CLTV));
        assert_eq!(
            instructions[9].push_bytes().unwrap().as_bytes(),
            refund.to_bytes().as_slice()
        );
        assert_eq!(*instructions.last().unwrap(), Instruction::Op(OP_CHECKSIG));
    }

    #[test]
    fn test_reverse_swap_script_layout() {
        let (claim, refund) = keys();
        let preimage_hash = sha256::Hash::hash(&[2u8; 32]);
        let timeout = LockTime::from_height(123).unwrap();

        let script = reverse_swap_script(&preimage_hash, &claim, &refund, timeout);
        let hex = script.as_bytes().to_lower_hex_string();
        // SIZE <32> EQUAL IF HASH160 <20 bytes>
        assert!(hex.starts_with("8201208763a914"));
        assert!(hex.ends_with("68ac"));
        assert_ne!(
            script,
            swap_script(&preimage_hash, &claim, &refund, timeout)
        );
    }

    #[test]
    fn test_output_scripts() {
        let (claim, refund) = keys();
        let preimage_hash = sha256::Hash::hash(&[3u8; 32]);
        let redeem = swap_script(
            &preimage_hash,
            &claim,
            &refund,
            LockTime::from_height(100).unwrap(),
        );

        assert!(p2wsh_output(&redeem).is_v0_p2wsh());
        assert!(p2sh_output(&redeem).is_p2sh());
        assert!(p2sh_p2wsh_output(&redeem).is_p2sh());
        assert!(p2pkh_output(&claim).is_p2pkh());
        assert!(p2wpkh_output(&claim).unwrap().is_v0_p2wpkh());
        assert!(p2sh_p2wpkh_output(&claim).unwrap().is_p2sh());
        assert!(p2tr_output(&claim.inner.x_only_public_key().0).is_v1_p2tr());

        assert_eq!(
            script_hash_output(OutputType::Compatibility, &redeem).unwrap(),
            p2sh_p2wsh_output(&redeem)
        );
        assert!(script_hash_output(OutputType::Taproot, &redeem).is_err());

        let script_sig = p2sh_p2wsh_script_sig(&redeem).unwrap();
        assert_eq!(script_sig.len(), 35);
        assert_eq!(&script_sig.as_bytes()[1..], p2wsh_output(&redeem).as_bytes());
    }
}
