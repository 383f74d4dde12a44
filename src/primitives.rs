//! Fixed-width wire primitives shared by every consensus component.
//!
//! All integers are little-endian on the wire except where a field is
//! documented otherwise (the 256-bit difficulty target is big-endian,
//! see [`crate::difficulty`]). `Height`, `Epoch`, `Nonce`, `Amount` and
//! `Difficulty` are signed 64-bit integers per spec; callers enforce the
//! non-negativity/positivity constraints documented on each field, the
//! type itself does not.

use crate::error::{ArgumentError, ConsensusError};
use serde::{Deserialize, Serialize};
use serde_big_array::BigArray;
use std::fmt;

pub type Height = i64;
pub type Epoch = i64;
pub type Nonce = i64;
pub type Amount = i64;
pub type Difficulty = i64;

/// 32-byte digest. The hash function behind every `Hash32` in this crate
/// is SHA-256 (see [`crate::hashing`]).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    pub const ZERO: Hash32 = Hash32([0u8; 32]);
    pub const LEN: usize = 32;

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArgumentError> {
        if bytes.len() != Self::LEN {
            return Err(ArgumentError::InvalidArgument(format!(
                "expected {} bytes for Hash32, got {}",
                Self::LEN,
                bytes.len()
            )));
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(bytes);
        Ok(Hash32(out))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash32({})", self.to_hex())
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for Hash32 {
    fn from(bytes: [u8; 32]) -> Self {
        Hash32(bytes)
    }
}

/// 33-byte compressed secp256k1 public key identifying an account / miner.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "BigArray")] pub [u8; 33]);

impl PublicKey {
    pub const LEN: usize = 33;

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArgumentError> {
        if bytes.len() != Self::LEN {
            return Err(ArgumentError::InvalidArgument(format!(
                "expected {} bytes for PublicKey, got {}",
                Self::LEN,
                bytes.len()
            )));
        }
        let mut out = [0u8; 33];
        out.copy_from_slice(bytes);
        Ok(PublicKey(out))
    }

    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// 8 leading bytes, used as the stable partial hash for address-keyed
    /// maps per the design note against keying by full `Vec<u8>`/string
    /// encodings.
    pub fn short_hash(&self) -> u64 {
        u64::from_le_bytes(self.0[..8].try_into().unwrap())
    }

    /// Short human-facing address for CLI output, never used as a map
    /// key. SHA-256 of the compressed public key, truncated to 20 bytes
    /// and prefixed, in place of the teacher's BLAKE3+RIPEMD160 scheme.
    pub fn display_address(&self) -> String {
        let digest = crate::hashing::sha256(&self.0);
        format!("stc1{}", hex::encode(&digest.as_bytes()[..20]))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}...)", &self.to_hex()[..8])
    }
}

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_u64(self.short_hash());
    }
}

impl Ord for PublicKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}
impl PartialOrd for PublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// 64-byte signature (secp256k1 ECDSA compact form by default, see
/// [`crate::signing`]). `None` at the type level represents the wire's
/// all-zero "empty" sentinel.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "BigArray")] pub [u8; 64]);

impl Signature {
    pub const LEN: usize = 64;

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArgumentError> {
        if bytes.len() != Self::LEN {
            return Err(ArgumentError::InvalidArgument(format!(
                "expected {} bytes for Signature, got {}",
                Self::LEN,
                bytes.len()
            )));
        }
        let mut out = [0u8; 64];
        out.copy_from_slice(bytes);
        Ok(Signature(out))
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; 64]
    }

    pub fn empty() -> Self {
        Signature([0u8; 64])
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", &hex::encode(&self.0[..8]))
    }
}

/// Minimal cursor used to assemble/parse the exact-width records defined
/// in spec's external-interfaces section. Kept local and dependency-free
/// rather than reaching for a general serialization crate, since these
/// byte layouts are part of the consensus-critical hash preimage and must
/// not vary with a library's encoding choices.
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn with_capacity(cap: usize) -> Self {
        Self { buf: Vec::with_capacity(cap) }
    }
    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }
    pub fn i64(&mut self, v: i64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }
    pub fn i32(&mut self, v: i32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }
    pub fn bytes(&mut self, v: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(v);
        self
    }
    pub fn bool(&mut self, v: bool) -> &mut Self {
        self.buf.push(if v { 1 } else { 0 });
        self
    }
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn need(&self, n: usize) -> Result<(), ConsensusError> {
        if self.pos + n > self.buf.len() {
            return Err(ArgumentError::InvalidArgument("unexpected end of buffer".into()).into());
        }
        Ok(())
    }

    pub fn u8(&mut self) -> Result<u8, ConsensusError> {
        self.need(1)?;
        let v = self.buf[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn i64(&mut self) -> Result<i64, ConsensusError> {
        self.need(8)?;
        let v = i64::from_le_bytes(self.buf[self.pos..self.pos + 8].try_into().unwrap());
        self.pos += 8;
        Ok(v)
    }

    pub fn i32(&mut self) -> Result<i32, ConsensusError> {
        self.need(4)?;
        let v = i32::from_le_bytes(self.buf[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8], ConsensusError> {
        self.need(n)?;
        let v = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(v)
    }

    pub fn bool(&mut self) -> Result<bool, ConsensusError> {
        Ok(self.u8()? != 0)
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash32_round_trips_through_bytes() {
        let h = Hash32([7u8; 32]);
        let again = Hash32::from_bytes(h.as_bytes()).unwrap();
        assert_eq!(h, again);
    }

    #[test]
    fn hash32_rejects_wrong_length() {
        assert!(Hash32::from_bytes(&[0u8; 31]).is_err());
    }

    #[test]
    fn public_key_short_hash_is_stable_prefix() {
        let mut bytes = [0u8; 33];
        bytes[0] = 0x02;
        for i in 0..32 {
            bytes[i + 1] = i as u8;
        }
        let pk = PublicKey(bytes);
        let pk2 = PublicKey(bytes);
        assert_eq!(pk.short_hash(), pk2.short_hash());
    }

    #[test]
    fn display_address_is_deterministic_and_prefixed() {
        let mut bytes = [0u8; 33];
        bytes[0] = 0x02;
        for i in 0..32 {
            bytes[i + 1] = i as u8;
        }
        let pk = PublicKey(bytes);
        let addr = pk.display_address();
        assert!(addr.starts_with("stc1"));
        assert_eq!(addr, pk.display_address());
    }

    #[test]
    fn signature_empty_round_trip() {
        let sig = Signature::empty();
        assert!(sig.is_empty());
    }

    #[test]
    fn byte_cursor_round_trips_mixed_fields() {
        let mut w = ByteWriter::with_capacity(64);
        w.u8(3).i64(-42).i32(7).bool(true).bytes(&[1, 2, 3]);
        let bytes = w.into_vec();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.u8().unwrap(), 3);
        assert_eq!(r.i64().unwrap(), -42);
        assert_eq!(r.i32().unwrap(), 7);
        assert!(r.bool().unwrap());
        assert_eq!(r.bytes(3).unwrap(), &[1, 2, 3]);
        assert_eq!(r.remaining(), 0);
    }
}
