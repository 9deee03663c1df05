//! Bloom filter over server tags.
//!
//! Sizing for `n` inserted tags at per-query rate `p`:
//! - `k = ceil(-log2 p)` hash functions
//! - `m = ceil(n * -log2 p / ln 2)` bits, rounded up to a whole byte
//!
//! Bit positions use double hashing over a single SHA-512 digest of the tag:
//! `pos_i = (h1 + i * h2) mod m`.

use super::{check_structure_bits, security_bits, SetEncoding, MAX_STRUCTURE_BITS};
use crate::codec::{Reader, Writer};
use crate::crypto::Tag;
use crate::error::{PsiError, Result};
use sha2::{Digest, Sha512};
use std::f64::consts::LN_2;

/// Maximum number of hash functions accepted on either side.
const MAX_HASH_FUNCTIONS: u32 = 128;

const BLOOM_DOMAIN: &[u8] = b"psi-engine/v1/bloom";

/// Bit array with `k` probe positions per tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomFilter {
    num_hash_functions: u32,
    num_bits: u64,
    bits: Vec<u8>,
    num_inserted: u64,
}

impl BloomFilter {
    /// Number of probe positions per tag, `k`.
    pub fn num_hash_functions(&self) -> u32 {
        self.num_hash_functions
    }

    /// Length of the bit array, `m`; always a multiple of 8.
    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    fn positions(&self, tag: &Tag) -> impl Iterator<Item = u64> {
        let digest = Sha512::new()
            .chain_update(BLOOM_DOMAIN)
            .chain_update(tag)
            .finalize();
        let mut h1 = [0u8; 8];
        h1.copy_from_slice(&digest[..8]);
        let mut h2 = [0u8; 8];
        h2.copy_from_slice(&digest[8..16]);
        let h1 = u64::from_le_bytes(h1);
        // Odd step so consecutive probes never collapse onto one position
        let h2 = u64::from_le_bytes(h2) | 1;
        let num_bits = self.num_bits;
        (0..u64::from(self.num_hash_functions))
            .map(move |i| h1.wrapping_add(i.wrapping_mul(h2)) % num_bits)
    }

    fn is_set(&self, pos: u64) -> bool {
        let byte = (pos / 8) as usize;
        (self.bits[byte] >> (pos % 8)) & 1 == 1
    }

    fn set(&mut self, pos: u64) {
        let byte = (pos / 8) as usize;
        self.bits[byte] |= 1 << (pos % 8);
    }
}

impl SetEncoding for BloomFilter {
    fn build(sorted_tags: &[Tag], per_query_fpr: f64) -> Result<Self> {
        let k = security_bits(per_query_fpr);
        if k > f64::from(MAX_HASH_FUNCTIONS) {
            return Err(PsiError::invalid_parameter(
                "fpr",
                format!(
                    "per-query rate {:e} needs {} hash functions, limit is {}",
                    per_query_fpr, k, MAX_HASH_FUNCTIONS
                ),
            ));
        }

        let n = sorted_tags.len().max(1) as f64;
        let bits = (n * -per_query_fpr.log2() / LN_2).ceil();
        if !bits.is_finite() || bits > MAX_STRUCTURE_BITS as f64 {
            return Err(PsiError::invalid_parameter(
                "server_inputs",
                format!("bloom filter of {} bits exceeds the size limit", bits),
            ));
        }
        let num_bits = ((bits as u64).max(8) + 7) / 8 * 8;

        let mut filter = Self {
            num_hash_functions: k as u32,
            num_bits,
            bits: vec![0u8; (num_bits / 8) as usize],
            num_inserted: sorted_tags.len() as u64,
        };
        for tag in sorted_tags {
            for pos in filter.positions(tag) {
                filter.set(pos);
            }
        }
        Ok(filter)
    }

    fn contains(&self, tag: &Tag) -> bool {
        self.positions(tag).all(|pos| self.is_set(pos))
    }

    fn num_inserted(&self) -> u64 {
        self.num_inserted
    }

    fn encode(&self, writer: &mut Writer) {
        writer.put_u32(self.num_hash_functions);
        writer.put_u64(self.num_bits);
        writer.put_bytes(&self.bits);
    }

    fn decode(reader: &mut Reader<'_>, num_inserted: u64) -> Result<Self> {
        let num_hash_functions = reader.u32("bloom hash function count")?;
        if num_hash_functions == 0 || num_hash_functions > MAX_HASH_FUNCTIONS {
            return Err(PsiError::malformed(format!(
                "bloom hash function count {} out of range",
                num_hash_functions
            )));
        }
        let num_bits = reader.u64("bloom bit length")?;
        if num_bits == 0 || num_bits % 8 != 0 {
            return Err(PsiError::malformed(format!(
                "bloom bit length {} is not a positive multiple of 8",
                num_bits
            )));
        }
        check_structure_bits(num_bits, "bloom filter")?;
        let bits = reader.take((num_bits / 8) as usize, "bloom bits")?.to_vec();
        Ok(Self {
            num_hash_functions,
            num_bits,
            bits,
            num_inserted,
        })
    }
}
