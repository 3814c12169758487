use bitcoin::absolute::LockTime;
use bitcoin::consensus::{deserialize, serialize};
use bitcoin::key::rand::thread_rng;
use bitcoin::secp256k1::{All, Keypair, Secp256k1};
use bitcoin::{Amount, OutPoint, PublicKey, ScriptBuf, Transaction, TxOut};
use boltz_core::fees::target_fee;
use boltz_core::network::ChainClient;
use boltz_core::swaps::bitcoin::{
    construct_claim_transaction, construct_refund_transaction, cooperative_sighash,
    set_cooperative_signature, ClaimDetails, RefundDetails,
};
use boltz_core::swaps::detect::{detect_swap, SwapLock};
use boltz_core::swaps::musig::Musig;
use boltz_core::swaps::script::{p2tr_output, reverse_swap_script, script_hash_output, OutputType};
use boltz_core::swaps::taproot::{reverse_swap_tree, SwapTree, TaprootFlavor};
use boltz_core::util::secrets::Preimage;
mod test_framework;
use test_framework::BtcTestFramework;

const SWAP_AMOUNT: Amount = Amount::from_sat(100_000);
const FEE_RATE: f64 = 2.0;

/// Funds `lock` and finds the swap output in the funding transaction
/// fetched back from the node.
fn fund_swap(tf: &BtcTestFramework, lock: &SwapLock, output_type: OutputType) -> (OutPoint, TxOut) {
    let script_pubkey = lock
        .candidates()
        .into_iter()
        .find(|(t, _)| *t == output_type)
        .map(|(_, script)| script)
        .unwrap();
    let funding = tf.fund_script(&script_pubkey, SWAP_AMOUNT);

    let raw = tf.raw_transaction(&funding.txid().to_string()).unwrap();
    let tx: Transaction = deserialize(&raw).unwrap();
    let detected = detect_swap(lock, &tx).unwrap();
    assert_eq!(detected.output_type, output_type);
    assert_eq!(detected.value, SWAP_AMOUNT);

    (
        OutPoint::new(tx.txid(), detected.vout),
        TxOut {
            value: detected.value,
            script_pubkey: ScriptBuf::from_bytes(detected.script_pubkey),
        },
    )
}

struct TaprootSwap {
    claim_keys: Keypair,
    refund_keys: Keypair,
    internal_key: bitcoin::XOnlyPublicKey,
    tree: SwapTree,
}

fn taproot_swap(secp: &Secp256k1<All>, preimage: &Preimage, timeout: LockTime) -> TaprootSwap {
    let claim_keys = Keypair::new(secp, &mut thread_rng());
    let refund_keys = Keypair::new(secp, &mut thread_rng());
    let internal_key = Musig::from_public_keys(
        secp,
        claim_keys,
        &[claim_keys.public_key(), refund_keys.public_key()],
    )
    .unwrap()
    .agg_pk();
    let tree = reverse_swap_tree(
        TaprootFlavor::Bitcoin,
        &preimage.sha256,
        &claim_keys.x_only_public_key().0,
        &refund_keys.x_only_public_key().0,
        timeout,
        None,
    )
    .unwrap();
    TaprootSwap {
        claim_keys,
        refund_keys,
        internal_key,
        tree,
    }
}

#[test]
fn test_claim_script_hash_outputs() {
    let tf = BtcTestFramework::init();
    let secp = Secp256k1::new();
    let destination = tf.new_address().script_pubkey();

    for output_type in [OutputType::Legacy, OutputType::Compatibility, OutputType::Bech32] {
        let preimage = Preimage::new();
        let claim_keys = Keypair::new(&secp, &mut thread_rng());
        let refund_keys = Keypair::new(&secp, &mut thread_rng());
        let redeem_script = reverse_swap_script(
            &preimage.sha256,
            &PublicKey::new(claim_keys.public_key()),
            &PublicKey::new(refund_keys.public_key()),
            LockTime::from_height(tf.block_height().unwrap() + 100).unwrap(),
        );
        let (outpoint, tx_out) = fund_swap(
            &tf,
            &SwapLock::RedeemScript(redeem_script.clone()),
            output_type,
        );
        assert_eq!(
            tx_out.script_pubkey,
            script_hash_output(output_type, &redeem_script).unwrap()
        );

        let claim = ClaimDetails {
            outpoint,
            tx_out,
            output_type,
            keys: Some(claim_keys),
            preimage: preimage.bytes.unwrap().to_vec(),
            redeem_script: Some(redeem_script),
            swap_tree: None,
            internal_key: None,
            cooperative: false,
        };

        let mut wrong_preimage = claim.clone();
        wrong_preimage.preimage = vec![0u8; 32];
        let invalid = construct_claim_transaction(&secp, &[wrong_preimage], &destination, 1_000, false)
            .unwrap();
        assert!(!tf.mempool_accepts(&invalid));

        let tx = target_fee(FEE_RATE, |fee| {
            construct_claim_transaction(&secp, &[claim.clone()], &destination, fee, false)
        })
        .unwrap();
        assert!(tf.mempool_accepts(&tx));

        tf.broadcast(&serialize(&tx)).unwrap();
        tf.generate_blocks(1);
    }
}

#[test]
fn test_taproot_script_path() {
    let tf = BtcTestFramework::init();
    let secp = Secp256k1::new();
    let destination = tf.new_address().script_pubkey();
    let preimage = Preimage::new();

    let height = tf.block_height().unwrap();
    let swap = taproot_swap(&secp, &preimage, LockTime::from_height(height).unwrap());
    let output_key = swap.tree.output_key(&secp, &swap.internal_key).unwrap();
    let lock = SwapLock::TweakedKey(output_key);
    assert_eq!(lock.candidates()[0].1, p2tr_output(&output_key));

    let (outpoint, tx_out) = fund_swap(&tf, &lock, OutputType::Taproot);
    let claim = ClaimDetails {
        outpoint,
        tx_out: tx_out.clone(),
        output_type: OutputType::Taproot,
        keys: Some(swap.claim_keys),
        preimage: preimage.bytes.unwrap().to_vec(),
        redeem_script: None,
        swap_tree: Some(swap.tree.clone()),
        internal_key: Some(swap.internal_key),
        cooperative: false,
    };
    let claim_tx = target_fee(FEE_RATE, |fee| {
        construct_claim_transaction(&secp, &[claim.clone()], &destination, fee, true)
    })
    .unwrap();
    assert!(tf.mempool_accepts(&claim_tx));

    let refund = RefundDetails {
        outpoint,
        tx_out,
        output_type: OutputType::Taproot,
        keys: Some(swap.refund_keys),
        redeem_script: None,
        swap_tree: Some(swap.tree.clone()),
        internal_key: Some(swap.internal_key),
        cooperative: false,
    };
    let refund_tx = target_fee(FEE_RATE, |fee| {
        construct_refund_transaction(
            &secp,
            &[refund.clone()],
            &destination,
            LockTime::from_height(height).unwrap(),
            fee,
            false,
        )
    })
    .unwrap();
    assert!(tf.mempool_accepts(&refund_tx));

    // locked until a later block
    let early = construct_refund_transaction(
        &secp,
        &[refund],
        &destination,
        LockTime::from_height(height + 10).unwrap(),
        1_000,
        false,
    )
    .unwrap();
    assert!(!tf.mempool_accepts(&early));
}

#[test]
fn test_cooperative_key_path() {
    let tf = BtcTestFramework::init();
    let secp = Secp256k1::new();
    let destination = tf.new_address().script_pubkey();
    let preimage = Preimage::new();

    let timeout = LockTime::from_height(tf.block_height().unwrap() + 100).unwrap();
    let swap = taproot_swap(&secp, &preimage, timeout);
    let output_key = swap.tree.output_key(&secp, &swap.internal_key).unwrap();
    let (outpoint, tx_out) = fund_swap(&tf, &SwapLock::TweakedKey(output_key), OutputType::Taproot);

    let claim = ClaimDetails {
        outpoint,
        tx_out: tx_out.clone(),
        output_type: OutputType::Taproot,
        keys: None,
        preimage: vec![],
        redeem_script: None,
        swap_tree: None,
        internal_key: None,
        cooperative: true,
    };
    let mut tx = target_fee(FEE_RATE, |fee| {
        construct_claim_transaction(&secp, &[claim.clone()], &destination, fee, false)
    })
    .unwrap();
    assert!(!tf.mempool_accepts(&tx));

    let sighash = cooperative_sighash(&tx, 0, &[tx_out]).unwrap();
    let tweak = swap.tree.tap_tweak(&swap.internal_key).unwrap();
    let keys = [swap.claim_keys.public_key(), swap.refund_keys.public_key()];

    let ours = Musig::from_public_keys(&secp, swap.claim_keys, &keys)
        .unwrap()
        .tweak(&tweak)
        .unwrap()
        .message(sighash)
        .generate_nonce()
        .unwrap();
    let theirs = Musig::from_public_keys(&secp, swap.refund_keys, &keys)
        .unwrap()
        .tweak(&tweak)
        .unwrap()
        .message(sighash)
        .generate_nonce()
        .unwrap();

    let our_nonce = (
        swap.claim_keys.public_key().serialize().to_vec(),
        ours.public_nonce(),
    );
    let their_nonce = (
        swap.refund_keys.public_key().serialize().to_vec(),
        theirs.public_nonce(),
    );

    let their_partial = theirs
        .aggregate_nonces(vec![our_nonce])
        .unwrap()
        .initialize_session()
        .sign_partial()
        .unwrap()
        .our_partial_signature()
        .unwrap();
    let signed = ours
        .aggregate_nonces(vec![their_nonce])
        .unwrap()
        .initialize_session()
        .sign_partial()
        .unwrap()
        .add_partial(&swap.refund_keys.public_key().serialize(), their_partial)
        .unwrap();

    set_cooperative_signature(&mut tx, 0, &signed.aggregate_partials().unwrap()).unwrap();
    assert!(tf.mempool_accepts(&tx));

    let txid = tf.broadcast(&serialize(&tx)).unwrap();
    assert_eq!(txid, tx.txid().to_string());
}
