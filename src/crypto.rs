//! secp256k1 identities, recoverable signatures and the canonical message hashes
//! that admins and players sign off-system.

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Prefix applied to every 32-byte payload before recovery, so a signature made
/// through a "sign message" flow can never be replayed as a raw-hash signature.
pub const SIGNED_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Tag mixed into read proofs; lifecycle messages carry no tag.
pub const READ_MESSAGE_TAG: &[u8] = b"ledger.read";

pub const WRITE_MESSAGE_TAG: &[u8] = b"ledger.write";

pub type Bytes32 = [u8; 32];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CryptoError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    #[error("expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },
    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("invalid secret key: {0}")]
    InvalidKey(String),
}

pub fn keccak256(data: &[u8]) -> Bytes32 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Left-pads `value` into a 256-bit big-endian word.
pub fn uint256_word(value: u64) -> Bytes32 {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

fn decode_hex(s: &str) -> Result<Vec<u8>, CryptoError> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(trimmed).map_err(|e| CryptoError::InvalidHex(e.to_string()))
}

/// Parses a hex string into a 32-byte word. Shorter inputs are treated as
/// numbers and left-padded, so `0x01` is the word with only its last byte set.
pub fn parse_bytes32(s: &str) -> Result<Bytes32, CryptoError> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    let padded = if trimmed.len() % 2 == 1 {
        format!("0{}", trimmed)
    } else {
        trimmed.to_string()
    };
    let bytes = decode_hex(&padded)?;
    if bytes.len() > 32 {
        return Err(CryptoError::InvalidLength { expected: 32, got: bytes.len() });
    }
    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(word)
}

pub fn bytes32_hex(word: &Bytes32) -> String {
    format!("0x{}", hex::encode(word))
}

/// 20-byte account identity derived from a secp256k1 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = key.to_encoded_point(false);
        // Skip the 0x04 SEC1 tag; the address is the last 20 bytes of the hash.
        let hash = keccak256(&point.as_bytes()[1..]);
        let mut out = [0u8; 20];
        out.copy_from_slice(&hash[12..]);
        Address(out)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = decode_hex(s)?;
        if bytes.len() != 20 {
            return Err(CryptoError::InvalidLength { expected: 20, got: bytes.len() });
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Address(out))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// 65-byte `r || s || v` signature. `v` may be 0/1 or 27/28.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature(pub [u8; 65]);

impl RecoverableSignature {
    pub fn from_parts(signature: &Signature, recovery_id: RecoveryId) -> Self {
        let mut bytes = [0u8; 65];
        bytes[..64].copy_from_slice(&signature.to_bytes());
        bytes[64] = recovery_id.to_byte() + 27;
        RecoverableSignature(bytes)
    }

    fn split(&self) -> Result<(Signature, RecoveryId), CryptoError> {
        let v = self.0[64];
        let normalized = if v >= 27 { v - 27 } else { v };
        let recovery_id = match normalized {
            0 | 1 => RecoveryId::from_byte(normalized).ok_or(CryptoError::InvalidRecoveryId(v))?,
            _ => return Err(CryptoError::InvalidRecoveryId(v)),
        };
        let signature = Signature::from_slice(&self.0[..64])
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        Ok((signature, recovery_id))
    }
}

impl fmt::Display for RecoverableSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for RecoverableSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for RecoverableSignature {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = decode_hex(s)?;
        if bytes.len() != 65 {
            return Err(CryptoError::InvalidLength { expected: 65, got: bytes.len() });
        }
        let mut out = [0u8; 65];
        out.copy_from_slice(&bytes);
        Ok(RecoverableSignature(out))
    }
}

impl Serialize for RecoverableSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RecoverableSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// `keccak256(account || salt || timestamp)`, tightly packed. Creation and
/// deletion both authorize against this same shape.
pub fn hash_lifecycle_message(account: &Address, salt: &Bytes32, timestamp: u64) -> Bytes32 {
    let mut packed = Vec::with_capacity(20 + 32 + 32);
    packed.extend_from_slice(account.as_bytes());
    packed.extend_from_slice(salt);
    packed.extend_from_slice(&uint256_word(timestamp));
    keccak256(&packed)
}

/// Payload a network caller signs to prove who is reading `account`.
pub fn hash_read_message(account: &Address, timestamp: u64) -> Bytes32 {
    let mut packed = Vec::with_capacity(READ_MESSAGE_TAG.len() + 20 + 32);
    packed.extend_from_slice(READ_MESSAGE_TAG);
    packed.extend_from_slice(account.as_bytes());
    packed.extend_from_slice(&uint256_word(timestamp));
    keccak256(&packed)
}

/// Payload an admin signs to apply one encoded write to `account`.
pub fn hash_write_message(account: &Address, write: &[u8], timestamp: u64) -> Bytes32 {
    let mut packed = Vec::with_capacity(WRITE_MESSAGE_TAG.len() + 20 + write.len() + 32);
    packed.extend_from_slice(WRITE_MESSAGE_TAG);
    packed.extend_from_slice(account.as_bytes());
    packed.extend_from_slice(write);
    packed.extend_from_slice(&uint256_word(timestamp));
    keccak256(&packed)
}

pub fn to_signed_message_hash(message: &Bytes32) -> Bytes32 {
    let mut packed = Vec::with_capacity(SIGNED_MESSAGE_PREFIX.len() + 32);
    packed.extend_from_slice(SIGNED_MESSAGE_PREFIX);
    packed.extend_from_slice(message);
    keccak256(&packed)
}

/// Recovers the address that signed the prefixed form of `message`.
/// High-`s` signatures fail here because k256 verification rejects them.
pub fn recover_signer(message: &Bytes32, signature: &RecoverableSignature) -> Result<Address, CryptoError> {
    let (sig, recovery_id) = signature.split()?;
    let digest = to_signed_message_hash(message);
    let key = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)
        .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
    Ok(Address::from_verifying_key(&key))
}

pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a new secp256k1 keypair
    pub fn new() -> Self {
        KeyPair { signing_key: SigningKey::random(&mut OsRng) }
    }

    pub fn from_secret_hex(secret: &str) -> Result<Self, CryptoError> {
        let bytes = decode_hex(secret)?;
        let signing_key = SigningKey::from_slice(&bytes)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(KeyPair { signing_key })
    }

    pub fn secret_hex(&self) -> String {
        format!("0x{}", hex::encode(self.signing_key.to_bytes()))
    }

    pub fn address(&self) -> Address {
        Address::from_verifying_key(self.signing_key.verifying_key())
    }

    /// Sign the prefixed form of a 32-byte message.
    pub fn sign_message(&self, message: &Bytes32) -> Result<RecoverableSignature, CryptoError> {
        let digest = to_signed_message_hash(message);
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        Ok(RecoverableSignature::from_parts(&signature, recovery_id))
    }
}

impl Default for KeyPair {
    fn default() -> Self {
        Self::new()
    }
}
