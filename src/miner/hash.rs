// src/miner/hash.rs
//! Proof-of-work digest adapter
//!
//! Everything the search loop needs from a hashing algorithm sits behind
//! [`PowHash`]: a pure function from a fixed-size block candidate to a
//! 32-byte digest. The bundled [`MixedSha256`] is a stand-in for a real
//! mixing algorithm (SHA-256, a 64-round FNV mix, SHA-256 again); a
//! production algorithm replaces it without touching the search engine,
//! the orchestrator or the distributor.

use crate::types::{HASH_SIZE, NONCE_SIZE};
use sha2::{Digest, Sha256};

/// Length of the serialized block candidate
///
/// `header_hash(32) || nonce(8, LE) || timestamp(4) || bits(4) || merkle_root(4)`
pub const CANDIDATE_LEN: usize = HASH_SIZE + NONCE_SIZE + 12;

const NONCE_OFFSET: usize = HASH_SIZE;

const MIX_ROUNDS: u32 = 64;
const FNV_PRIME: u32 = 16_777_619;
const FNV_OFFSET_BASIS: u32 = 2_166_136_261;

/// Common interface for proof-of-work digest functions
///
/// Implementations must be deterministic: the same candidate always
/// yields the same digest. The candidate length is fixed by the type, so
/// a malformed candidate cannot reach an implementation.
pub trait PowHash: Send + Sync {
    /// Computes the digest of a serialized block candidate
    fn digest(&self, candidate: &[u8; CANDIDATE_LEN]) -> [u8; HASH_SIZE];

    /// Short name used in logs and benchmark output
    fn name(&self) -> &'static str;
}

/// Reusable serialization buffer for block candidates
///
/// The header portion is written once per job; only the nonce bytes
/// change between attempts, so the search loop never allocates.
#[derive(Clone)]
pub struct CandidateBuffer {
    bytes: [u8; CANDIDATE_LEN],
}

impl CandidateBuffer {
    /// Creates a candidate for `header_hash` with nonce zero
    ///
    /// The timestamp, bits and merkle root fields stay zero-filled. A
    /// real chain must source them from the job.
    pub fn new(header_hash: &[u8; HASH_SIZE]) -> Self {
        let mut bytes = [0u8; CANDIDATE_LEN];
        bytes[..HASH_SIZE].copy_from_slice(header_hash);
        CandidateBuffer { bytes }
    }

    /// Overwrites the nonce field with `nonce` in little-endian order
    #[inline]
    pub fn set_nonce(&mut self, nonce: u64) {
        self.bytes[NONCE_OFFSET..NONCE_OFFSET + NONCE_SIZE].copy_from_slice(&nonce.to_le_bytes());
    }

    /// The serialized candidate
    #[inline]
    pub fn as_bytes(&self) -> &[u8; CANDIDATE_LEN] {
        &self.bytes
    }
}

/// Two SHA-256 stages around a 64-round FNV mixing step
#[derive(Debug, Clone, Copy, Default)]
pub struct MixedSha256;

impl MixedSha256 {
    /// Creates the digest function (it carries no state)
    pub fn new() -> Self {
        MixedSha256
    }
}

impl PowHash for MixedSha256 {
    fn digest(&self, candidate: &[u8; CANDIDATE_LEN]) -> [u8; HASH_SIZE] {
        let first = sha256(candidate);
        let mixed = mix(&first);
        sha256(&mixed)
    }

    fn name(&self) -> &'static str {
        "mixed-sha256"
    }
}

fn sha256(data: &[u8]) -> [u8; HASH_SIZE] {
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

/// Scrambles a 32-byte buffer in place over 64 rounds
///
/// Round `i` reads the little-endian word at offset `i % 32` (wrapping past
/// the end of the buffer), rotates it left by `i % 32`, xors in `i`, runs it
/// through an FNV-1a style step keyed by `i` and writes it back at the same
/// offset. Words overlap, so each round sees the previous round's output.
pub fn mix(input: &[u8; HASH_SIZE]) -> [u8; HASH_SIZE] {
    let mut state = *input;

    for i in 0..MIX_ROUNDS {
        let offset = (i as usize) % HASH_SIZE;
        let word = read_word(&state, offset);
        let word = word.rotate_left(i % 32) ^ i;
        write_word(&mut state, offset, fnv_step(word, i));
    }

    state
}

#[inline]
fn read_word(state: &[u8; HASH_SIZE], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    for (k, byte) in word.iter_mut().enumerate() {
        *byte = state[(offset + k) % HASH_SIZE];
    }
    u32::from_le_bytes(word)
}

#[inline]
fn write_word(state: &mut [u8; HASH_SIZE], offset: usize, value: u32) {
    for (k, byte) in value.to_le_bytes().into_iter().enumerate() {
        state[(offset + k) % HASH_SIZE] = byte;
    }
}

#[inline]
fn fnv_step(value: u32, key: u32) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    hash ^= value;
    hash = hash.wrapping_mul(FNV_PRIME);
    hash ^= key;
    hash.wrapping_mul(FNV_PRIME)
}

/// Checks a digest against a big-endian target
///
/// The digest is read in reverse byte order and compared most significant
/// byte first; the first differing byte decides. A digest equal to the
/// target counts as a match.
pub fn meets_target(hash: &[u8; HASH_SIZE], target: &[u8; HASH_SIZE]) -> bool {
    for (h, t) in hash.iter().rev().zip(target.iter()) {
        if h < t {
            return true;
        }
        if h > t {
            return false;
        }
    }
    true
}
