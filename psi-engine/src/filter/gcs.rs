//! Golomb-compressed set.
//!
//! Each tag is hashed uniformly into `[0, n * 2^P)` where `P = ceil(-log2 p)`:
//! a bucket in `[0, n)` from one digest word, followed by `P` low bits from a
//! second word. The range is a `u128`, so it never limits `n` or `P`.
//! The sorted hashes are delta-encoded with Golomb-Rice coding (divisor
//! `2^P`): the quotient in unary (ones terminated by a zero), then the low `P`
//! bits, most significant bit first. A probe is a false positive when its hash
//! lands on one of the `n` stored values, which happens with probability about
//! `2^-P <= p`.

use super::{check_structure_bits, security_bits, SetEncoding, MAX_STRUCTURE_BITS};
use crate::codec::{Reader, Writer};
use crate::crypto::Tag;
use crate::error::{PsiError, Result};
use sha2::{Digest, Sha512};

const MAX_RICE_PARAMETER: u8 = 48;

const GCS_DOMAIN: &[u8] = b"psi-engine/v1/gcs";

/// Sorted tag hashes, Golomb-Rice coded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GolombCompressedSet {
    rice_parameter: u8,
    hash_range: u128,
    num_values: u64,
    body: Vec<u8>,
}

impl GolombCompressedSet {
    /// `P`, the number of fixed low bits per coded gap.
    pub fn rice_parameter(&self) -> u8 {
        self.rice_parameter
    }

    /// Size of the value space, `max(n, 1) * 2^P`.
    pub fn hash_range(&self) -> u128 {
        self.hash_range
    }

    fn values(&self) -> GapDecoder<'_> {
        GapDecoder::new(&self.body, self.rice_parameter, self.num_values)
    }

    fn hash_to_range(&self, tag: &Tag) -> u128 {
        hash_to_range(tag, self.num_values.max(1), self.rice_parameter)
    }
}

fn hash_to_range(tag: &Tag, num_buckets: u64, rice_parameter: u8) -> u128 {
    let digest = Sha512::new()
        .chain_update(GCS_DOMAIN)
        .chain_update(tag)
        .finalize();
    let mut high = [0u8; 8];
    high.copy_from_slice(&digest[..8]);
    let mut low = [0u8; 8];
    low.copy_from_slice(&digest[8..16]);
    // Multiply-shift reduction of the first word into [0, num_buckets)
    let bucket = (u128::from(u64::from_le_bytes(high)) * u128::from(num_buckets)) >> 64;
    let offset = u64::from_le_bytes(low) & low_mask(rice_parameter);
    (bucket << rice_parameter) | u128::from(offset)
}

fn low_mask(bits: u8) -> u64 {
    (1u64 << bits) - 1
}

/// `max(n, 1) * 2^P`. Fits since `n < 2^64` and `P <= 48`.
fn hash_range_for(num_values: u64, rice_parameter: u8) -> u128 {
    u128::from(num_values.max(1)) << rice_parameter
}

impl SetEncoding for GolombCompressedSet {
    fn build(sorted_tags: &[Tag], per_query_fpr: f64) -> Result<Self> {
        let bits = security_bits(per_query_fpr);
        if bits > f64::from(MAX_RICE_PARAMETER) {
            return Err(PsiError::invalid_parameter(
                "fpr",
                format!(
                    "per-query rate {:e} needs a Rice parameter of {}, limit is {}",
                    per_query_fpr, bits, MAX_RICE_PARAMETER
                ),
            ));
        }
        let rice_parameter = bits as u8;
        let num_values = sorted_tags.len() as u64;

        let too_large = || {
            PsiError::invalid_parameter(
                "server_inputs",
                format!(
                    "{} values with Rice parameter {} exceed the size limit",
                    num_values, rice_parameter
                ),
            )
        };
        let estimated_bits = num_values
            .checked_mul(u64::from(rice_parameter) + 2)
            .ok_or_else(too_large)?;
        if estimated_bits > MAX_STRUCTURE_BITS {
            return Err(too_large());
        }
        let hash_range = hash_range_for(num_values, rice_parameter);
        let num_buckets = num_values.max(1);

        let mut values: Vec<u128> = sorted_tags
            .iter()
            .map(|tag| hash_to_range(tag, num_buckets, rice_parameter))
            .collect();
        values.sort_unstable();

        // Quotients sum to at most the last bucket index, so the unary part
        // adds at most n bits in total
        let mut writer = BitWriter::default();
        let mut previous = 0u128;
        for value in values {
            let delta = value - previous;
            for _ in 0..(delta >> rice_parameter) {
                writer.push_bit(true);
            }
            writer.push_bit(false);
            writer.push_bits(delta as u64 & low_mask(rice_parameter), rice_parameter);
            previous = value;
        }

        Ok(Self {
            rice_parameter,
            hash_range,
            num_values,
            body: writer.into_bytes(),
        })
    }

    fn contains(&self, tag: &Tag) -> bool {
        let probe = self.hash_to_range(tag);
        self.values()
            .take_while(|&value| value <= probe)
            .any(|value| value == probe)
    }

    /// Sort the probes once and walk the gap stream a single time.
    fn contains_all(&self, tags: &[Tag]) -> Vec<bool> {
        let mut probes: Vec<(u128, usize)> = tags
            .iter()
            .enumerate()
            .map(|(index, tag)| (self.hash_to_range(tag), index))
            .collect();
        probes.sort_unstable();

        let mut result = vec![false; tags.len()];
        let mut values = self.values();
        let mut current = values.next();
        for (probe, index) in probes {
            while let Some(value) = current {
                if value >= probe {
                    break;
                }
                current = values.next();
            }
            if current == Some(probe) {
                result[index] = true;
            }
        }
        result
    }

    fn num_inserted(&self) -> u64 {
        self.num_values
    }

    fn encode(&self, writer: &mut Writer) {
        writer.put_u8(self.rice_parameter);
        writer.put_u128(self.hash_range);
        // Bounded by MAX_STRUCTURE_BITS / 8 at build time
        writer.put_u32(self.body.len() as u32);
        writer.put_bytes(&self.body);
    }

    fn decode(reader: &mut Reader<'_>, num_inserted: u64) -> Result<Self> {
        let rice_parameter = reader.u8("gcs rice parameter")?;
        if rice_parameter == 0 || rice_parameter > MAX_RICE_PARAMETER {
            return Err(PsiError::malformed(format!(
                "gcs rice parameter {} out of range",
                rice_parameter
            )));
        }
        let hash_range = reader.u128("gcs hash range")?;
        if hash_range_for(num_inserted, rice_parameter) != hash_range {
            return Err(PsiError::malformed(format!(
                "gcs hash range {} does not match {} values at parameter {}",
                hash_range, num_inserted, rice_parameter
            )));
        }
        let body_len = reader.u32("gcs body length")?;
        check_structure_bits(u64::from(body_len) * 8, "gcs body")?;
        let body = reader.take(body_len as usize, "gcs body")?.to_vec();

        let set = Self {
            rice_parameter,
            hash_range,
            num_values: num_inserted,
            body,
        };
        set.validate()?;
        Ok(set)
    }
}

impl GolombCompressedSet {
    /// Decode the whole stream once so later queries never see a short or
    /// out-of-range stream.
    fn validate(&self) -> Result<()> {
        let mut decoder = self.values();
        let mut decoded = 0u64;
        while let Some(value) = decoder.next() {
            if value >= self.hash_range {
                return Err(PsiError::malformed(format!(
                    "gcs value {} outside hash range {}",
                    value, self.hash_range
                )));
            }
            decoded += 1;
        }
        if decoded != self.num_values {
            return Err(PsiError::malformed(format!(
                "gcs stream holds {} values, header declares {}",
                decoded, self.num_values
            )));
        }
        let used_bytes = (decoder.bits.position + 7) / 8;
        if used_bytes != self.body.len() {
            return Err(PsiError::malformed(format!(
                "gcs stream uses {} bytes but body has {}",
                used_bytes,
                self.body.len()
            )));
        }
        Ok(())
    }
}

/// Iterator over the running sums of a Golomb-Rice gap stream.
struct GapDecoder<'a> {
    bits: BitReader<'a>,
    rice_parameter: u8,
    remaining: u64,
    current: u128,
}

impl<'a> GapDecoder<'a> {
    fn new(body: &'a [u8], rice_parameter: u8, num_values: u64) -> Self {
        Self {
            bits: BitReader::new(body),
            rice_parameter,
            remaining: num_values,
            current: 0,
        }
    }
}

impl Iterator for GapDecoder<'_> {
    type Item = u128;

    /// Yields `None` at the end, and also on a stream that ends early or
    /// overflows. `validate` rules the latter out for decoded sets.
    fn next(&mut self) -> Option<u128> {
        if self.remaining == 0 {
            return None;
        }
        let mut quotient = 0u64;
        while self.bits.read_bit()? {
            quotient += 1;
        }
        let remainder = self.bits.read_bits(self.rice_parameter)?;
        // Cannot overflow: quotient < 2^64 and the parameter is at most 48
        let delta = (u128::from(quotient) << self.rice_parameter) | u128::from(remainder);
        self.current = self.current.checked_add(delta)?;
        self.remaining -= 1;
        Some(self.current)
    }
}

#[derive(Debug, Default)]
struct BitWriter {
    bytes: Vec<u8>,
    len: usize,
}

impl BitWriter {
    fn push_bit(&mut self, bit: bool) {
        if self.len % 8 == 0 {
            self.bytes.push(0);
        }
        if bit {
            let last = self.bytes.len() - 1;
            self.bytes[last] |= 0x80 >> (self.len % 8);
        }
        self.len += 1;
    }

    /// Push the low `count` bits of `value`, most significant first.
    fn push_bits(&mut self, value: u64, count: u8) {
        for shift in (0..count).rev() {
            self.push_bit((value >> shift) & 1 == 1);
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[derive(Debug)]
struct BitReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn read_bit(&mut self) -> Option<bool> {
        let byte = self.bytes.get(self.position / 8)?;
        let bit = (byte << (self.position % 8)) & 0x80 != 0;
        self.position += 1;
        Some(bit)
    }

    fn read_bits(&mut self, count: u8) -> Option<u64> {
        let mut value = 0u64;
        for _ in 0..count {
            value = (value << 1) | u64::from(self.read_bit()?);
        }
        Some(value)
    }
}
