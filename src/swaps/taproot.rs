use bitcoin::absolute::LockTime;
use bitcoin::hashes::{ripemd160, sha256, Hash, HashEngine};
use bitcoin::hex::{DisplayHex, FromHex};
use bitcoin::opcodes::all::*;
use bitcoin::opcodes::Opcode;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::secp256k1::{All, Parity, Scalar, Secp256k1};
use bitcoin::XOnlyPublicKey;
use serde::{Deserialize, Serialize};

use crate::error::Error;

const OP_INSPECTOUTPUTASSET: u8 = 0xce;
const OP_INSPECTOUTPUTVALUE: u8 = 0xcf;
const OP_INSPECTOUTPUTSCRIPTPUBKEY: u8 = 0xd1;

/// Prefix the introspection opcodes push for explicit assets and values.
const EXPLICIT_PREFIX: i64 = 1;

const CLAIM_WEIGHT: u32 = 51;
const REFUND_WEIGHT: u32 = 49;
const COVENANT_WEIGHTS: (u32, u32, u32) = (51, 25, 24);

/// Which chain's taproot rules apply. Liquid uses its own leaf version
/// and `/elements` tagged hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaprootFlavor {
    Bitcoin,
    Liquid,
}

impl TaprootFlavor {
    pub const BITCOIN_LEAF_VERSION: u8 = 0xc0;
    pub const LIQUID_LEAF_VERSION: u8 = 0xc4;

    pub fn leaf_version(&self) -> u8 {
        match self {
            TaprootFlavor::Bitcoin => Self::BITCOIN_LEAF_VERSION,
            TaprootFlavor::Liquid => Self::LIQUID_LEAF_VERSION,
        }
    }

    pub fn from_leaf_version(version: u8) -> Result<Self, Error> {
        match version {
            Self::BITCOIN_LEAF_VERSION => Ok(TaprootFlavor::Bitcoin),
            Self::LIQUID_LEAF_VERSION => Ok(TaprootFlavor::Liquid),
            _ => Err(Error::Taproot(format!("unknown leaf version {:#04x}", version))),
        }
    }
}

/// A versioned tapscript.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Leaf {
    pub version: u8,
    pub output: Vec<u8>,
}

impl Leaf {
    pub fn new(version: u8, output: Vec<u8>) -> Self {
        Leaf { version, output }
    }

    pub fn hash(&self, flavor: TaprootFlavor) -> Result<[u8; 32], Error> {
        Ok(match flavor {
            TaprootFlavor::Bitcoin => bitcoin::taproot::TapLeafHash::from_script(
                bitcoin::Script::from_bytes(&self.output),
                bitcoin::taproot::LeafVersion::from_consensus(self.version)?,
            )
            .to_byte_array(),
            TaprootFlavor::Liquid => elements::taproot::TapLeafHash::from_script(
                &elements::Script::from(self.output.clone()),
                elements::taproot::LeafVersion::from_u8(self.version)?,
            )
            .to_byte_array(),
        })
    }
}

pub fn branch_hash(flavor: TaprootFlavor, a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    match flavor {
        TaprootFlavor::Bitcoin => bitcoin::taproot::TapNodeHash::from_node_hashes(
            bitcoin::taproot::TapNodeHash::from_byte_array(*a),
            bitcoin::taproot::TapNodeHash::from_byte_array(*b),
        )
        .to_byte_array(),
        TaprootFlavor::Liquid => {
            let (first, second) = if a <= b { (a, b) } else { (b, a) };
            let mut engine = elements::taproot::TapNodeHash::engine();
            engine.input(first);
            engine.input(second);
            elements::taproot::TapNodeHash::from_engine(engine).to_byte_array()
        }
    }
}

/// Binary script tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapTree {
    Leaf(Leaf),
    Branch(Box<TapTree>, Box<TapTree>),
}

impl TapTree {
    /// Builds a tree that gives likelier leaves shorter merkle paths.
    ///
    /// Leaves are sorted by descending weight and split where the running
    /// weight first reaches half of the total, then each side recurses.
    pub fn balanced(mut weighted: Vec<(u32, Leaf)>) -> Result<TapTree, Error> {
        if weighted.is_empty() {
            return Err(Error::Taproot("can not build a tree without leaves".to_string()));
        }
        weighted.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(Self::split(&weighted))
    }

    fn split(leaves: &[(u32, Leaf)]) -> TapTree {
        if leaves.len() == 1 {
            return TapTree::Leaf(leaves[0].1.clone());
        }

        let total: u64 = leaves.iter().map(|(weight, _)| *weight as u64).sum();
        let mut running = 0u64;
        let mut split_at = leaves.len() - 1;
        for (i, (weight, _)) in leaves.iter().enumerate() {
            running += *weight as u64;
            if running * 2 >= total {
                split_at = (i + 1).min(leaves.len() - 1);
                break;
            }
        }

        TapTree::Branch(
            Box::new(Self::split(&leaves[..split_at])),
            Box::new(Self::split(&leaves[split_at..])),
        )
    }

    pub fn leaves(&self) -> Vec<&Leaf> {
        match self {
            TapTree::Leaf(leaf) => vec![leaf],
            TapTree::Branch(left, right) => {
                let mut leaves = left.leaves();
                leaves.extend(right.leaves());
                leaves
            }
        }
    }

    pub fn hashed(&self, flavor: TaprootFlavor) -> Result<HashedTree, Error> {
        Ok(match self {
            TapTree::Leaf(leaf) => HashedTree::Leaf {
                hash: leaf.hash(flavor)?,
                leaf: leaf.clone(),
            },
            TapTree::Branch(left, right) => {
                let left = left.hashed(flavor)?;
                let right = right.hashed(flavor)?;
                HashedTree::Branch {
                    hash: branch_hash(flavor, &left.hash(), &right.hash()),
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
        })
    }
}

/// A script tree with the hash of every node computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashedTree {
    Leaf {
        leaf: Leaf,
        hash: [u8; 32],
    },
    Branch {
        left: Box<HashedTree>,
        right: Box<HashedTree>,
        hash: [u8; 32],
    },
}

impl HashedTree {
    pub fn hash(&self) -> [u8; 32] {
        match self {
            HashedTree::Leaf { hash, .. } | HashedTree::Branch { hash, .. } => *hash,
        }
    }

    pub fn root(&self) -> [u8; 32] {
        self.hash()
    }

    /// Sibling hashes from the leaf up to the root, or None when the
    /// leaf is not part of the tree.
    pub fn merkle_path(&self, leaf_hash: &[u8; 32]) -> Option<Vec<[u8; 32]>> {
        match self {
            HashedTree::Leaf { hash, .. } => (hash == leaf_hash).then(Vec::new),
            HashedTree::Branch { left, right, .. } => {
                if let Some(mut path) = left.merkle_path(leaf_hash) {
                    path.push(right.hash());
                    Some(path)
                } else if let Some(mut path) = right.merkle_path(leaf_hash) {
                    path.push(left.hash());
                    Some(path)
                } else {
                    None
                }
            }
        }
    }
}

/// Tagged hash that tweaks the internal key into the output key.
pub fn tap_tweak(
    flavor: TaprootFlavor,
    internal_key: &XOnlyPublicKey,
    tree: &TapTree,
) -> Result<[u8; 32], Error> {
    let root = tree.hashed(flavor)?.root();
    Ok(match flavor {
        TaprootFlavor::Bitcoin => bitcoin::taproot::TapTweakHash::from_key_and_tweak(
            *internal_key,
            Some(bitcoin::taproot::TapNodeHash::from_byte_array(root)),
        )
        .to_byte_array(),
        TaprootFlavor::Liquid => elements::taproot::TapTweakHash::from_key_and_tweak(
            *internal_key,
            Some(elements::taproot::TapNodeHash::from_byte_array(root)),
        )
        .to_byte_array(),
    })
}

/// Output key and its parity for an internal key committing to a tree.
pub fn tweak_key(
    secp: &Secp256k1<All>,
    flavor: TaprootFlavor,
    internal_key: &XOnlyPublicKey,
    tree: &TapTree,
) -> Result<(XOnlyPublicKey, Parity), Error> {
    let tweak = tap_tweak(flavor, internal_key, tree)?;
    let scalar = Scalar::from_be_bytes(tweak)
        .map_err(|e| Error::Taproot(format!("tweak out of range: {}", e)))?;
    let tweaked = internal_key.add_tweak(secp, &scalar)?;
    log::debug!(
        "Tweaked internal key {} with {} into {}",
        internal_key,
        tweak.to_lower_hex_string(),
        tweaked.0
    );
    Ok(tweaked)
}

/// Serialized control block proving that `leaf` is part of `tree`.
pub fn control_block(
    secp: &Secp256k1<All>,
    flavor: TaprootFlavor,
    tree: &TapTree,
    internal_key: &XOnlyPublicKey,
    leaf: &Leaf,
) -> Result<Vec<u8>, Error> {
    let path = tree
        .hashed(flavor)?
        .merkle_path(&leaf.hash(flavor)?)
        .ok_or_else(|| Error::Taproot("leaf not in tree".to_string()))?;
    let (_, parity) = tweak_key(secp, flavor, internal_key, tree)?;

    Ok(match flavor {
        TaprootFlavor::Bitcoin => {
            let path: Vec<bitcoin::taproot::TapNodeHash> = path
                .into_iter()
                .map(bitcoin::taproot::TapNodeHash::from_byte_array)
                .collect();
            bitcoin::taproot::ControlBlock {
                leaf_version: bitcoin::taproot::LeafVersion::from_consensus(leaf.version)?,
                output_key_parity: parity,
                internal_key: *internal_key,
                merkle_branch: bitcoin::taproot::TaprootMerkleBranch::try_from(path)?,
            }
            .serialize()
        }
        TaprootFlavor::Liquid => elements::taproot::ControlBlock {
            leaf_version: elements::taproot::LeafVersion::from_u8(leaf.version)?,
            output_key_parity: parity,
            internal_key: *internal_key,
            merkle_branch: elements::taproot::TaprootMerkleBranch::from_inner(
                path.into_iter().map(sha256::Hash::from_byte_array).collect(),
            )?,
        }
        .serialize(),
    })
}

/// Claim, refund and optional covenant claim leaves of a swap plus the tree built from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapTree {
    pub claim_leaf: Leaf,
    pub refund_leaf: Leaf,
    pub covenant_claim_leaf: Option<Leaf>,
    pub tree: TapTree,
}

impl SwapTree {
    pub fn new(
        claim_leaf: Leaf,
        refund_leaf: Leaf,
        covenant_claim_leaf: Option<Leaf>,
    ) -> Result<SwapTree, Error> {
        let weighted = match &covenant_claim_leaf {
            Some(covenant) => vec![
                (COVENANT_WEIGHTS.0, covenant.clone()),
                (COVENANT_WEIGHTS.1, claim_leaf.clone()),
                (COVENANT_WEIGHTS.2, refund_leaf.clone()),
            ],
            None => vec![
                (CLAIM_WEIGHT, claim_leaf.clone()),
                (REFUND_WEIGHT, refund_leaf.clone()),
            ],
        };

        Ok(SwapTree {
            tree: TapTree::balanced(weighted)?,
            claim_leaf,
            refund_leaf,
            covenant_claim_leaf,
        })
    }

    pub fn leaves(&self) -> Vec<&Leaf> {
        self.tree.leaves()
    }

    pub fn flavor(&self) -> Result<TaprootFlavor, Error> {
        TaprootFlavor::from_leaf_version(self.claim_leaf.version)
    }

    pub fn hashed(&self) -> Result<HashedTree, Error> {
        self.tree.hashed(self.flavor()?)
    }

    pub fn tap_tweak(&self, internal_key: &XOnlyPublicKey) -> Result<[u8; 32], Error> {
        tap_tweak(self.flavor()?, internal_key, &self.tree)
    }

    pub fn output_key(
        &self,
        secp: &Secp256k1<All>,
        internal_key: &XOnlyPublicKey,
    ) -> Result<XOnlyPublicKey, Error> {
        Ok(tweak_key(secp, self.flavor()?, internal_key, &self.tree)?.0)
    }

    pub fn control_block(
        &self,
        secp: &Secp256k1<All>,
        internal_key: &XOnlyPublicKey,
        leaf: &Leaf,
    ) -> Result<Vec<u8>, Error> {
        control_block(secp, self.flavor()?, &self.tree, internal_key, leaf)
    }
}

/// Persisted form of a leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedLeaf {
    pub version: u8,
    pub output: String,
}

/// Persisted form of a swap tree. The tree shape is not stored since
/// it is fully determined by the leaves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedSwapTree {
    pub claim_leaf: SerializedLeaf,
    pub refund_leaf: SerializedLeaf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub covenant_claim_leaf: Option<SerializedLeaf>,
}

impl From<&Leaf> for SerializedLeaf {
    fn from(leaf: &Leaf) -> Self {
        SerializedLeaf {
            version: leaf.version,
            output: leaf.output.to_lower_hex_string(),
        }
    }
}

impl TryFrom<&SerializedLeaf> for Leaf {
    type Error = Error;

    fn try_from(leaf: &SerializedLeaf) -> Result<Self, Self::Error> {
        Ok(Leaf::new(leaf.version, Vec::from_hex(&leaf.output)?))
    }
}

pub fn serialize_swap_tree(tree: &SwapTree) -> SerializedSwapTree {
    SerializedSwapTree {
        claim_leaf: (&tree.claim_leaf).into(),
        refund_leaf: (&tree.refund_leaf).into(),
        covenant_claim_leaf: tree.covenant_claim_leaf.as_ref().map(SerializedLeaf::from),
    }
}

pub fn deserialize_swap_tree(serialized: &SerializedSwapTree) -> Result<SwapTree, Error> {
    let covenant_claim_leaf = match &serialized.covenant_claim_leaf {
        Some(leaf) => Some(Leaf::try_from(leaf)?),
        None => None,
    };
    SwapTree::new(
        Leaf::try_from(&serialized.claim_leaf)?,
        Leaf::try_from(&serialized.refund_leaf)?,
        covenant_claim_leaf,
    )
}

impl SwapTree {
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(&serialize_swap_tree(self))?)
    }

    pub fn from_json(json: &str) -> Result<SwapTree, Error> {
        deserialize_swap_tree(&serde_json::from_str(json)?)
    }
}

/// Output that a covenant claim leaf forces the first output of the
/// spending transaction to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CovenantClaim {
    pub witness_version: u8,
    pub witness_program: Vec<u8>,
    /// Asset id in consensus byte order.
    pub asset: [u8; 32],
    pub amount: u64,
}

fn hash160_of_sha256(preimage_hash: &sha256::Hash) -> [u8; 20] {
    ripemd160::Hash::hash(preimage_hash.as_byte_array()).to_byte_array()
}

fn claim_leaf_script(preimage_hash: &sha256::Hash, claim_key: &XOnlyPublicKey) -> Builder {
    Builder::new()
        .push_opcode(OP_HASH160)
        .push_slice(hash160_of_sha256(preimage_hash))
        .push_opcode(OP_EQUALVERIFY)
        .push_x_only_key(claim_key)
        .push_opcode(OP_CHECKSIG)
}

fn reverse_claim_leaf_script(preimage_hash: &sha256::Hash, claim_key: &XOnlyPublicKey) -> Builder {
    Builder::new()
        .push_opcode(OP_SIZE)
        .push_int(32)
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_HASH160)
        .push_slice(hash160_of_sha256(preimage_hash))
        .push_opcode(OP_EQUALVERIFY)
        .push_x_only_key(claim_key)
        .push_opcode(OP_CHECKSIG)
}

fn refund_leaf_script(refund_key: &XOnlyPublicKey, timeout: LockTime) -> Builder {
    Builder::new()
        .push_x_only_key(refund_key)
        .push_opcode(OP_CHECKSIGVERIFY)
        .push_lock_time(timeout)
        .push_opcode(OP_CLTV)
}

/// Liquid only leaf that lets anyone holding the preimage claim, as long
/// as the first output pays the committed amount of the committed asset
/// to the committed script.
pub fn covenant_claim_leaf(
    preimage_hash: &sha256::Hash,
    covenant: &CovenantClaim,
) -> Result<Leaf, Error> {
    let program = PushBytesBuf::try_from(covenant.witness_program.clone())?;
    let script = Builder::new()
        .push_opcode(OP_SIZE)
        .push_int(32)
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_HASH160)
        .push_slice(hash160_of_sha256(preimage_hash))
        .push_opcode(OP_EQUALVERIFY)
        .push_int(0)
        .push_opcode(Opcode::from(OP_INSPECTOUTPUTSCRIPTPUBKEY))
        .push_int(covenant.witness_version as i64)
        .push_opcode(OP_EQUALVERIFY)
        .push_slice(program)
        .push_opcode(OP_EQUALVERIFY)
        .push_int(0)
        .push_opcode(Opcode::from(OP_INSPECTOUTPUTASSET))
        .push_int(EXPLICIT_PREFIX)
        .push_opcode(OP_EQUALVERIFY)
        .push_slice(covenant.asset)
        .push_opcode(OP_EQUALVERIFY)
        .push_int(0)
        .push_opcode(Opcode::from(OP_INSPECTOUTPUTVALUE))
        .push_int(EXPLICIT_PREFIX)
        .push_opcode(OP_EQUALVERIFY)
        .push_slice(covenant.amount.to_le_bytes())
        .push_opcode(OP_EQUAL)
        .into_script();

    Ok(Leaf::new(TaprootFlavor::LIQUID_LEAF_VERSION, script.into_bytes()))
}

/// Taproot tree of a submarine swap.
pub fn swap_tree(
    flavor: TaprootFlavor,
    preimage_hash: &sha256::Hash,
    claim_key: &XOnlyPublicKey,
    refund_key: &XOnlyPublicKey,
    timeout: LockTime,
) -> Result<SwapTree, Error> {
    SwapTree::new(
        Leaf::new(
            flavor.leaf_version(),
            claim_leaf_script(preimage_hash, claim_key).into_script().into_bytes(),
        ),
        Leaf::new(
            flavor.leaf_version(),
            refund_leaf_script(refund_key, timeout).into_script().into_bytes(),
        ),
        None,
    )
}

/// Taproot tree of a reverse swap, optionally with a covenant claim leaf.
pub fn reverse_swap_tree(
    flavor: TaprootFlavor,
    preimage_hash: &sha256::Hash,
    claim_key: &XOnlyPublicKey,
    refund_key: &XOnlyPublicKey,
    timeout: LockTime,
    covenant: Option<&CovenantClaim>,
) -> Result<SwapTree, Error> {
    let covenant_claim_leaf = match covenant {
        Some(covenant) => {
            if flavor != TaprootFlavor::Liquid {
                return Err(Error::Taproot(
                    "covenant claims are only possible on Liquid".to_string(),
                ));
            }
            Some(covenant_claim_leaf(preimage_hash, covenant)?)
        }
        None => None,
    };

    SwapTree::new(
        Leaf::new(
            flavor.leaf_version(),
            reverse_claim_leaf_script(preimage_hash, claim_key)
                .into_script()
                .into_bytes(),
        ),
        Leaf::new(
            flavor.leaf_version(),
            refund_leaf_script(refund_key, timeout).into_script().into_bytes(),
        ),
        covenant_claim_leaf,
    )
}
