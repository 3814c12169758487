//! MuSig2 signing sessions as a chain of states.
//!
//! Every transition consumes the previous state, so a secret nonce can only
//! be generated once per message and is dropped the moment it signs:
//!
//! ```text
//! Musig<KeyAgg> -(tweak)-> Musig<KeyAgg>
//!     -> Musig<WithMessage> -> Musig<WithNonce> -> Musig<WithAggregatedNonce>
//!     -> Musig<InSession> -> Musig<Signed> -> schnorr::Signature
//! ```

use std::fmt::{Display, Formatter};

use bitcoin::hex::DisplayHex;
use bitcoin::key::rand::thread_rng;
use bitcoin::secp256k1::{schnorr, All, Keypair, Message, PublicKey, Secp256k1, SecretKey};
use bitcoin::XOnlyPublicKey;
use elements::secp256k1_zkp::{
    MusigAggNonce, MusigKeyAggCache, MusigPartialSignature, MusigPubNonce, MusigSecNonce,
    MusigSession, MusigSessionId,
};

const PUBLIC_KEY_LENGTH: usize = 33;
const MIN_PARTICIPANTS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MusigError {
    IndexOutOfRange(usize),
    InvalidPublicKeyLength(usize),
    InvalidPublicKey(String),
    DuplicatePublicKey(String),
    OwnKeyNotFound,
    NotEnoughKeys(usize),
    AlreadyTweaked,
    InvalidTweak(String),
    NonceCountMismatch { expected: usize, actual: usize },
    OwnNonceMismatch,
    DuplicateNonce(String),
    MissingNonce(String),
    UnknownPublicKey(String),
    NonceGeneration(String),
    Signing(String),
    InvalidPartialSignature,
    IncompletePartialSignatures,
}

impl Display for MusigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MusigError::IndexOutOfRange(i) => write!(f, "index {} out of range", i),
            MusigError::InvalidPublicKeyLength(len) => {
                write!(f, "public key has {} bytes instead of 33", len)
            }
            MusigError::InvalidPublicKey(e) => write!(f, "invalid public key: {}", e),
            MusigError::DuplicatePublicKey(key) => write!(f, "duplicate public key {}", key),
            MusigError::OwnKeyNotFound => write!(f, "our public key is not in the key list"),
            MusigError::NotEnoughKeys(n) => {
                write!(f, "at least 2 public keys are required, got {}", n)
            }
            MusigError::AlreadyTweaked => write!(f, "aggregated key is already tweaked"),
            MusigError::InvalidTweak(e) => write!(f, "invalid tweak: {}", e),
            MusigError::NonceCountMismatch { expected, actual } => {
                write!(f, "expected {} nonces, got {}", expected, actual)
            }
            MusigError::OwnNonceMismatch => {
                write!(f, "our nonce is missing, changed or not at our index")
            }
            MusigError::DuplicateNonce(key) => write!(f, "duplicate nonce for key {}", key),
            MusigError::MissingNonce(key) => write!(f, "missing nonce for key {}", key),
            MusigError::UnknownPublicKey(key) => write!(f, "unknown public key {}", key),
            MusigError::NonceGeneration(e) => write!(f, "could not generate nonce: {}", e),
            MusigError::Signing(e) => write!(f, "could not create partial signature: {}", e),
            MusigError::InvalidPartialSignature => write!(f, "invalid partial signature"),
            MusigError::IncompletePartialSignatures => {
                write!(f, "not all partial signatures are set")
            }
        }
    }
}

impl std::error::Error for MusigError {}

/// Key aggregation done, optionally tweaked.
pub struct KeyAgg;

pub struct WithMessage {
    msg: Message,
}

pub struct WithNonce {
    msg: Message,
    sec_nonce: MusigSecNonce,
    pub_nonce: MusigPubNonce,
}

pub struct WithAggregatedNonce {
    msg: Message,
    sec_nonce: MusigSecNonce,
    pub_nonce: MusigPubNonce,
    pub_nonces: Vec<MusigPubNonce>,
    agg_nonce: MusigAggNonce,
}

pub struct InSession {
    sec_nonce: MusigSecNonce,
    pub_nonces: Vec<MusigPubNonce>,
    session: MusigSession,
    partials: Vec<Option<MusigPartialSignature>>,
}

/// Our partial signature is created and stored.
pub struct Signed {
    pub_nonces: Vec<MusigPubNonce>,
    session: MusigSession,
    partials: Vec<Option<MusigPartialSignature>>,
}

/// A MuSig2 signing session in state `S`.
pub struct Musig<'a, S> {
    secp: &'a Secp256k1<All>,
    keypair: Keypair,
    public_keys: Vec<PublicKey>,
    my_index: usize,
    key_agg_cache: MusigKeyAggCache,
    tweaked: bool,
    state: S,
}

impl<'a, S> Musig<'a, S> {
    fn transition<T>(self, state: T) -> Musig<'a, T> {
        Musig {
            secp: self.secp,
            keypair: self.keypair,
            public_keys: self.public_keys,
            my_index: self.my_index,
            key_agg_cache: self.key_agg_cache,
            tweaked: self.tweaked,
            state,
        }
    }

    /// Splits off the current state so it can be destructured before
    /// moving on with `transition`.
    fn take_state(self) -> (Musig<'a, ()>, S) {
        let Musig {
            secp,
            keypair,
            public_keys,
            my_index,
            key_agg_cache,
            tweaked,
            state,
        } = self;
        let shell = Musig {
            secp,
            keypair,
            public_keys,
            my_index,
            key_agg_cache,
            tweaked,
            state: (),
        };
        (shell, state)
    }

    pub fn my_index(&self) -> usize {
        self.my_index
    }

    pub fn public_keys(&self) -> &[PublicKey] {
        &self.public_keys
    }

    /// The aggregated key, tweaked if `tweak` was applied.
    pub fn agg_pk(&self) -> XOnlyPublicKey {
        self.key_agg_cache.agg_pk()
    }

    pub fn is_tweaked(&self) -> bool {
        self.tweaked
    }

    fn index_of(&self, public_key: &[u8]) -> Result<usize, MusigError> {
        self.public_keys
            .iter()
            .position(|key| key.serialize().as_slice() == public_key)
            .ok_or_else(|| MusigError::UnknownPublicKey(public_key.to_lower_hex_string()))
    }
}

impl<'a> Musig<'a, KeyAgg> {
    /// Aggregates `public_keys` in the given order. Our own key has to be one of them.
    pub fn new(
        secp: &'a Secp256k1<All>,
        keypair: Keypair,
        public_keys: &[Vec<u8>],
    ) -> Result<Self, MusigError> {
        if public_keys.len() < MIN_PARTICIPANTS {
            return Err(MusigError::NotEnoughKeys(public_keys.len()));
        }

        let mut parsed: Vec<PublicKey> = Vec::with_capacity(public_keys.len());
        for key in public_keys {
            if key.len() != PUBLIC_KEY_LENGTH {
                return Err(MusigError::InvalidPublicKeyLength(key.len()));
            }
            let key = PublicKey::from_slice(key)
                .map_err(|e| MusigError::InvalidPublicKey(e.to_string()))?;
            if parsed.contains(&key) {
                return Err(MusigError::DuplicatePublicKey(key.to_string()));
            }
            parsed.push(key);
        }

        let my_index = parsed
            .iter()
            .position(|key| *key == keypair.public_key())
            .ok_or(MusigError::OwnKeyNotFound)?;

        let key_agg_cache = MusigKeyAggCache::new(secp, &parsed);
        log::debug!(
            "Aggregated {} keys into {} as participant {}",
            parsed.len(),
            key_agg_cache.agg_pk(),
            my_index
        );

        Ok(Musig {
            secp,
            keypair,
            public_keys: parsed,
            my_index,
            key_agg_cache,
            tweaked: false,
            state: KeyAgg,
        })
    }

    pub fn from_public_keys(
        secp: &'a Secp256k1<All>,
        keypair: Keypair,
        public_keys: &[PublicKey],
    ) -> Result<Self, MusigError> {
        let serialized: Vec<Vec<u8>> = public_keys.iter().map(|k| k.serialize().to_vec()).collect();
        Self::new(secp, keypair, &serialized)
    }

    /// Applies an x-only tweak to the aggregated key. Can only be done once.
    pub fn tweak(mut self, tweak: &[u8; 32]) -> Result<Self, MusigError> {
        if self.tweaked {
            return Err(MusigError::AlreadyTweaked);
        }
        let tweak =
            SecretKey::from_slice(tweak).map_err(|e| MusigError::InvalidTweak(e.to_string()))?;
        self.key_agg_cache
            .pubkey_xonly_tweak_add(self.secp, tweak)
            .map_err(|e| MusigError::InvalidTweak(e.to_string()))?;
        self.tweaked = true;
        Ok(self)
    }

    /// Binds the 32 byte digest that will be signed.
    pub fn message(self, msg: [u8; 32]) -> Musig<'a, WithMessage> {
        let msg = Message::from_digest(msg);
        self.transition(WithMessage { msg })
    }
}

impl<'a> Musig<'a, WithMessage> {
    pub fn generate_nonce(self) -> Result<Musig<'a, WithNonce>, MusigError> {
        let session_id = MusigSessionId::new(&mut thread_rng());
        let (sec_nonce, pub_nonce) = self
            .key_agg_cache
            .nonce_gen(
                self.secp,
                session_id,
                self.keypair.public_key(),
                self.state.msg,
                Some(self.keypair.secret_bytes()),
            )
            .map_err(|e| MusigError::NonceGeneration(e.to_string()))?;

        let msg = self.state.msg;
        Ok(self.transition(WithNonce {
            msg,
            sec_nonce,
            pub_nonce,
        }))
    }
}

impl<'a> Musig<'a, WithNonce> {
    pub fn public_nonce(&self) -> MusigPubNonce {
        self.state.pub_nonce
    }

    /// Aggregates nonces keyed by the serialized public key of their owner.
    /// Our own nonce is added when absent.
    pub fn aggregate_nonces(
        self,
        nonces: Vec<(Vec<u8>, MusigPubNonce)>,
    ) -> Result<Musig<'a, WithAggregatedNonce>, MusigError> {
        let mut ordered: Vec<Option<MusigPubNonce>> = vec![None; self.public_keys.len()];
        for (key, nonce) in nonces {
            if key.len() != PUBLIC_KEY_LENGTH {
                return Err(MusigError::InvalidPublicKeyLength(key.len()));
            }
            let index = self.index_of(&key)?;
            if ordered[index].is_some() {
                return Err(MusigError::DuplicateNonce(key.to_lower_hex_string()));
            }
            ordered[index] = Some(nonce);
        }

        match ordered[self.my_index] {
            Some(nonce) if nonce.serialize() != self.state.pub_nonce.serialize() => {
                return Err(MusigError::OwnNonceMismatch)
            }
            Some(_) => {}
            None => ordered[self.my_index] = Some(self.state.pub_nonce),
        }

        let mut complete = Vec::with_capacity(ordered.len());
        for (index, nonce) in ordered.into_iter().enumerate() {
            match nonce {
                Some(nonce) => complete.push(nonce),
                None => {
                    return Err(MusigError::MissingNonce(
                        self.public_keys[index].to_string(),
                    ))
                }
            }
        }

        self.aggregate_nonces_ordered(complete)
    }

    /// Aggregates nonces given in the order of the public keys.
    pub fn aggregate_nonces_ordered(
        self,
        nonces: Vec<MusigPubNonce>,
    ) -> Result<Musig<'a, WithAggregatedNonce>, MusigError> {
        if nonces.len() != self.public_keys.len() {
            return Err(MusigError::NonceCountMismatch {
                expected: self.public_keys.len(),
                actual: nonces.len(),
            });
        }

        let own = self.state.pub_nonce.serialize();
        if nonces[self.my_index].serialize() != own {
            return Err(MusigError::OwnNonceMismatch);
        }

        let serialized: Vec<[u8; 66]> = nonces.iter().map(|n| n.serialize()).collect();
        for (i, nonce) in serialized.iter().enumerate() {
            if serialized[..i].contains(nonce) {
                return Err(MusigError::DuplicateNonce(self.public_keys[i].to_string()));
            }
        }

        let agg_nonce = MusigAggNonce::new(self.secp, &nonces);
        let (musig, state) = self.take_state();
        let WithNonce {
            msg,
            sec_nonce,
            pub_nonce,
        } = state;
        Ok(musig.transition(WithAggregatedNonce {
            msg,
            sec_nonce,
            pub_nonce,
            pub_nonces: nonces,
            agg_nonce,
        }))
    }
}

impl<'a> Musig<'a, WithAggregatedNonce> {
    pub fn public_nonce(&self) -> MusigPubNonce {
        self.state.pub_nonce
    }

    pub fn initialize_session(self) -> Musig<'a, InSession> {
        let (musig, state) = self.take_state();
        let WithAggregatedNonce {
            msg,
            sec_nonce,
            pub_nonces,
            agg_nonce,
            ..
        } = state;
        let session = MusigSession::new(musig.secp, &musig.key_agg_cache, agg_nonce, msg);
        let partials = vec![None; musig.public_keys.len()];
        musig.transition(InSession {
            sec_nonce,
            pub_nonces,
            session,
            partials,
        })
    }
}

/// States in which a signing session exists and peer partial signatures can be collected.
pub trait SessionState {
    fn session(&self) -> &MusigSession;
    fn pub_nonces(&self) -> &[MusigPubNonce];
    fn partials_mut(&mut self) -> &mut Vec<Option<MusigPartialSignature>>;
}

impl SessionState for InSession {
    fn session(&self) -> &MusigSession {
        &self.session
    }
    fn pub_nonces(&self) -> &[MusigPubNonce] {
        &self.pub_nonces
    }
    fn partials_mut(&mut self) -> &mut Vec<Option<MusigPartialSignature>> {
        &mut self.partials
    }
}

impl SessionState for Signed {
    fn session(&self) -> &MusigSession {
        &self.session
    }
    fn pub_nonces(&self) -> &[MusigPubNonce] {
        &self.pub_nonces
    }
    fn partials_mut(&mut self) -> &mut Vec<Option<MusigPartialSignature>> {
        &mut self.partials
    }
}

impl<'a, S: SessionState> Musig<'a, S> {
    /// Verifies the partial signature of the participant at `index`.
    pub fn verify_partial_at(
        &self,
        index: usize,
        partial: MusigPartialSignature,
    ) -> Result<bool, MusigError> {
        let public_key = *self
            .public_keys
            .get(index)
            .ok_or(MusigError::IndexOutOfRange(index))?;
        Ok(self.state.session().partial_verify(
            self.secp,
            &self.key_agg_cache,
            partial,
            self.state.pub_nonces()[index],
            public_key,
        ))
    }

    pub fn verify_partial(
        &self,
        public_key: &[u8],
        partial: MusigPartialSignature,
    ) -> Result<bool, MusigError> {
        self.verify_partial_at(self.index_of(public_key)?, partial)
    }

    /// Verifies and stores the partial signature of the participant at `index`.
    pub fn add_partial_at(
        mut self,
        index: usize,
        partial: MusigPartialSignature,
    ) -> Result<Self, MusigError> {
        if !self.verify_partial_at(index, partial)? {
            log::warn!("Rejected partial signature of participant {}", index);
            return Err(MusigError::InvalidPartialSignature);
        }
        self.state.partials_mut()[index] = Some(partial);
        Ok(self)
    }

    pub fn add_partial(
        self,
        public_key: &[u8],
        partial: MusigPartialSignature,
    ) -> Result<Self, MusigError> {
        let index = self.index_of(public_key)?;
        self.add_partial_at(index, partial)
    }

    pub fn add_partials(
        self,
        partials: Vec<(Vec<u8>, MusigPartialSignature)>,
    ) -> Result<Self, MusigError> {
        partials
            .into_iter()
            .try_fold(self, |musig, (key, partial)| musig.add_partial(&key, partial))
    }
}

impl<'a> Musig<'a, InSession> {
    /// Creates our partial signature, consuming the secret nonce.
    pub fn sign_partial(self) -> Result<Musig<'a, Signed>, MusigError> {
        let (musig, state) = self.take_state();
        let InSession {
            sec_nonce,
            pub_nonces,
            session,
            mut partials,
        } = state;

        let partial = session
            .partial_sign(musig.secp, sec_nonce, &musig.keypair, &musig.key_agg_cache)
            .map_err(|e| MusigError::Signing(e.to_string()))?;
        partials[musig.my_index] = Some(partial);

        Ok(musig.transition(Signed {
            pub_nonces,
            session,
            partials,
        }))
    }
}

impl<'a> Musig<'a, Signed> {
    pub fn our_partial_signature(&self) -> Result<MusigPartialSignature, MusigError> {
        self.state.partials[self.my_index].ok_or(MusigError::IncompletePartialSignatures)
    }

    /// Aggregates all partial signatures into the final Schnorr signature.
    pub fn aggregate_partials(&self) -> Result<schnorr::Signature, MusigError> {
        let partials: Option<Vec<MusigPartialSignature>> =
            self.state.partials.iter().copied().collect();
        let partials = partials.ok_or(MusigError::IncompletePartialSignatures)?;
        Ok(self.state.session.partial_sig_agg(&partials))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::{sha256, Hash};

    fn keypair(secp: &Secp256k1<All>, byte: u8) -> Keypair {
        Keypair::from_secret_key(secp, &SecretKey::from_slice(&[byte; 32]).unwrap())
    }

    fn digest() -> [u8; 32] {
        sha256::Hash::hash(b"sighash").to_byte_array()
    }

    #[test]
    fn test_key_validation() {
        let secp = Secp256k1::new();
        let ours = keypair(&secp, 1);
        let theirs = keypair(&secp, 2);
        let our_key = ours.public_key().serialize().to_vec();
        let their_key = theirs.public_key().serialize().to_vec();

        assert_eq!(
            Musig::new(&secp, ours, &[our_key.clone()]).err(),
            Some(MusigError::NotEnoughKeys(1))
        );
        assert_eq!(
            Musig::new(&secp, ours, &[our_key.clone(), our_key[1..].to_vec()]).err(),
            Some(MusigError::InvalidPublicKeyLength(32))
        );
        assert!(matches!(
            Musig::new(&secp, ours, &[our_key.clone(), our_key.clone()]).err(),
            Some(MusigError::DuplicatePublicKey(_))
        ));
        let third = keypair(&secp, 3).public_key().serialize().to_vec();
        assert_eq!(
            Musig::new(&secp, ours, &[their_key.clone(), third]).err(),
            Some(MusigError::OwnKeyNotFound)
        );

        let musig = Musig::new(&secp, ours, &[their_key, our_key]).unwrap();
        assert_eq!(musig.my_index(), 1);
    }

    #[test]
    fn test_tweak_only_once() {
        let secp = Secp256k1::new();
        let ours = keypair(&secp, 1);
        let keys = [ours.public_key(), keypair(&secp, 2).public_key()];
        let musig = Musig::from_public_keys(&secp, ours, &keys).unwrap();
        let untweaked = musig.agg_pk();

        let tweaked = musig.tweak(&[7u8; 32]).unwrap();
        assert!(tweaked.is_tweaked());
        assert_ne!(tweaked.agg_pk(), untweaked);
        assert_eq!(tweaked.tweak(&[7u8; 32]).err(), Some(MusigError::AlreadyTweaked));
    }

    #[test]
    fn test_two_party_signing() {
        let secp = Secp256k1::new();
        let alice = keypair(&secp, 1);
        let bob = keypair(&secp, 2);
        let keys = [alice.public_key(), bob.public_key()];

        let alice_session = Musig::from_public_keys(&secp, alice, &keys)
            .unwrap()
            .tweak(&[5u8; 32])
            .unwrap()
            .message(digest())
            .generate_nonce()
            .unwrap();
        let bob_session = Musig::from_public_keys(&secp, bob, &keys)
            .unwrap()
            .tweak(&[5u8; 32])
            .unwrap()
            .message(digest())
            .generate_nonce()
            .unwrap();

        let alice_nonce = alice_session.public_nonce();
        let bob_nonce = bob_session.public_nonce();

        let alice_signed = alice_session
            .aggregate_nonces(vec![(bob.public_key().serialize().to_vec(), bob_nonce)])
            .unwrap()
            .initialize_session()
            .sign_partial()
            .unwrap();
        let bob_signed = bob_session
            .aggregate_nonces_ordered(vec![alice_nonce, bob_nonce])
            .unwrap()
            .initialize_session()
            .sign_partial()
            .unwrap();

        assert_eq!(
            alice_signed.aggregate_partials().err(),
            Some(MusigError::IncompletePartialSignatures)
        );

        let bob_partial = bob_signed.our_partial_signature().unwrap();
        let alice_signed = alice_signed
            .add_partial(&bob.public_key().serialize(), bob_partial)
            .unwrap();
        let signature = alice_signed.aggregate_partials().unwrap();

        let msg = Message::from_digest(digest());
        assert!(secp
            .verify_schnorr(&signature, &msg, &alice_signed.agg_pk())
            .is_ok());
        assert_eq!(alice_signed.agg_pk(), bob_signed.agg_pk());
    }

    #[test]
    fn test_three_party_with_invalid_partial() {
        let secp = Secp256k1::new();
        let parties: Vec<Keypair> = (1..=3).map(|i| keypair(&secp, i)).collect();
        let keys: Vec<PublicKey> = parties.iter().map(|k| k.public_key()).collect();

        let nonced: Vec<Musig<WithNonce>> = parties
            .iter()
            .map(|k| {
                Musig::from_public_keys(&secp, *k, &keys)
                    .unwrap()
                    .message(digest())
                    .generate_nonce()
                    .unwrap()
            })
            .collect();
        let nonces: Vec<MusigPubNonce> = nonced.iter().map(|m| m.public_nonce()).collect();

        let signed: Vec<Musig<Signed>> = nonced
            .into_iter()
            .map(|m| {
                m.aggregate_nonces_ordered(nonces.clone())
                    .unwrap()
                    .initialize_session()
                    .sign_partial()
                    .unwrap()
            })
            .collect();
        let partials: Vec<MusigPartialSignature> = signed
            .iter()
            .map(|m| m.our_partial_signature().unwrap())
            .collect();

        let mut signed = signed.into_iter();

        // participant 2 signed, but it is claimed to be from participant 3
        let first = signed.next().unwrap();
        assert!(matches!(
            first.add_partial_at(2, partials[1]).err(),
            Some(MusigError::InvalidPartialSignature)
        ));

        let second = signed.next().unwrap();
        assert!(matches!(
            second.add_partial_at(3, partials[0]).err(),
            Some(MusigError::IndexOutOfRange(3))
        ));

        let third = signed.next().unwrap();
        let complete = third
            .add_partials(vec![
                (keys[0].serialize().to_vec(), partials[0]),
                (keys[1].serialize().to_vec(), partials[1]),
            ])
            .unwrap();
        let signature = complete.aggregate_partials().unwrap();
        assert!(secp
            .verify_schnorr(&signature, &Message::from_digest(digest()), &complete.agg_pk())
            .is_ok());

        // adding a valid partial again at the same index replaces it
        let complete = complete.add_partial_at(1, partials[1]).unwrap();
        assert_eq!(complete.aggregate_partials().unwrap(), signature);
        assert!(matches!(
            complete.add_partial_at(1, partials[0]).err(),
            Some(MusigError::InvalidPartialSignature)
        ));
    }

    #[test]
    fn test_nonce_validation() {
        let secp = Secp256k1::new();
        let alice = keypair(&secp, 1);
        let bob = keypair(&secp, 2);
        let keys = [alice.public_key(), bob.public_key()];

        let nonced = || {
            Musig::from_public_keys(&secp, alice, &keys)
                .unwrap()
                .message(digest())
                .generate_nonce()
                .unwrap()
        };
        let bob_nonce = Musig::from_public_keys(&secp, bob, &keys)
            .unwrap()
            .message(digest())
            .generate_nonce()
            .unwrap()
            .public_nonce();

        let session = nonced();
        let own = session.public_nonce();
        assert!(matches!(
            session.aggregate_nonces_ordered(vec![own]).err(),
            Some(MusigError::NonceCountMismatch {
                expected: 2,
                actual: 1
            })
        ));

        let session = nonced();
        let own = session.public_nonce();
        assert_eq!(
            session.aggregate_nonces_ordered(vec![bob_nonce, own]).err(),
            Some(MusigError::OwnNonceMismatch)
        );

        let session = nonced();
        let own = session.public_nonce();
        assert!(matches!(
            session.aggregate_nonces_ordered(vec![own, own]).err(),
            Some(MusigError::DuplicateNonce(_))
        ));

        let session = nonced();
        assert!(matches!(
            session.aggregate_nonces(vec![]).err(),
            Some(MusigError::MissingNonce(_))
        ));

        let session = nonced();
        let bob_key = bob.public_key().serialize().to_vec();
        assert!(matches!(
            session
                .aggregate_nonces(vec![(bob_key.clone(), bob_nonce), (bob_key, bob_nonce)])
                .err(),
            Some(MusigError::DuplicateNonce(_))
        ));

        let session = nonced();
        assert_eq!(
            session
                .aggregate_nonces(vec![(alice.public_key().serialize().to_vec(), bob_nonce)])
                .err(),
            Some(MusigError::OwnNonceMismatch)
        );
    }
}
