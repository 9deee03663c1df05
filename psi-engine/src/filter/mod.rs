//! Probabilistic set encodings for the server's encrypted tags.
//!
//! A [`ProbabilisticSet`] is built once by the server and shipped inside the
//! setup message. The client only ever queries it. Which encoding is used is
//! recorded in the setup header, so the client dispatches on that tag at
//! decode time.
//!
//! All encodings are built from the sorted, deduplicated tag list, so the same
//! set of tags always produces the same bytes regardless of input order.

mod bloom;
mod gcs;
mod raw;

pub use bloom::BloomFilter;
pub use gcs::GolombCompressedSet;
pub use raw::RawSet;

use crate::codec::{Reader, Writer};
use crate::config::{per_query_fpr, validate_fpr, DataStructure};
use crate::crypto::Tag;
use crate::error::{PsiError, Result};
use log::trace;

/// Upper bound on the size of any encoded structure.
pub(crate) const MAX_STRUCTURE_BITS: u64 = 1 << 34;

/// Build / query / serialize, shared by every encoding.
pub(crate) trait SetEncoding: Sized {
    /// Build from tags that are already sorted and free of duplicates.
    fn build(sorted_tags: &[Tag], per_query_fpr: f64) -> Result<Self>;

    fn contains(&self, tag: &Tag) -> bool;

    fn contains_all(&self, tags: &[Tag]) -> Vec<bool> {
        tags.iter().map(|tag| self.contains(tag)).collect()
    }

    fn num_inserted(&self) -> u64;

    /// Write the encoding-specific parameters and body.
    fn encode(&self, writer: &mut Writer);

    /// Inverse of [`SetEncoding::encode`]; `num_inserted` comes from the
    /// common setup header.
    fn decode(reader: &mut Reader<'_>, num_inserted: u64) -> Result<Self>;
}

/// `ceil(-log2(p))`, the number of bits of filtering a per-query rate needs.
pub(crate) fn security_bits(per_query_fpr: f64) -> f64 {
    (-per_query_fpr.log2()).ceil().max(1.0)
}

/// Immutable membership structure over server tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbabilisticSet {
    /// See [`BloomFilter`].
    BloomFilter(BloomFilter),
    /// See [`GolombCompressedSet`].
    Gcs(GolombCompressedSet),
    /// See [`RawSet`].
    Raw(RawSet),
}

impl ProbabilisticSet {
    /// Build a set over `tags` such that a non-member probe tests positive
    /// with probability at most `fpr / expected_queries`.
    ///
    /// # Errors
    /// Returns `PsiError::InvalidParameter` if `fpr` is outside `(0, 1)` or the
    /// resulting structure would be unreasonably large.
    pub fn build(
        data_structure: DataStructure,
        tags: &[Tag],
        fpr: f64,
        expected_queries: usize,
    ) -> Result<Self> {
        validate_fpr(fpr)?;
        let mut sorted = tags.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let per_query = per_query_fpr(fpr, expected_queries);
        trace!(
            "building {} over {} distinct tags, per-query fpr {:e}",
            data_structure,
            sorted.len(),
            per_query
        );

        Ok(match data_structure {
            DataStructure::BloomFilter => {
                ProbabilisticSet::BloomFilter(BloomFilter::build(&sorted, per_query)?)
            }
            DataStructure::Gcs => ProbabilisticSet::Gcs(GolombCompressedSet::build(&sorted, per_query)?),
            DataStructure::Raw => ProbabilisticSet::Raw(RawSet::build(&sorted, per_query)?),
        })
    }

    /// The encoding tag written to the setup header.
    pub fn data_structure(&self) -> DataStructure {
        match self {
            ProbabilisticSet::BloomFilter(_) => DataStructure::BloomFilter,
            ProbabilisticSet::Gcs(_) => DataStructure::Gcs,
            ProbabilisticSet::Raw(_) => DataStructure::Raw,
        }
    }

    /// Membership test. Never false for an inserted tag.
    pub fn contains(&self, tag: &Tag) -> bool {
        match self {
            ProbabilisticSet::BloomFilter(inner) => inner.contains(tag),
            ProbabilisticSet::Gcs(inner) => inner.contains(tag),
            ProbabilisticSet::Raw(inner) => inner.contains(tag),
        }
    }

    /// Membership test for a batch of tags, in input order.
    pub fn contains_all(&self, tags: &[Tag]) -> Vec<bool> {
        match self {
            ProbabilisticSet::BloomFilter(inner) => inner.contains_all(tags),
            ProbabilisticSet::Gcs(inner) => inner.contains_all(tags),
            ProbabilisticSet::Raw(inner) => inner.contains_all(tags),
        }
    }

    /// Number of distinct tags the set was built from.
    pub fn num_inserted(&self) -> u64 {
        match self {
            ProbabilisticSet::BloomFilter(inner) => inner.num_inserted(),
            ProbabilisticSet::Gcs(inner) => inner.num_inserted(),
            ProbabilisticSet::Raw(inner) => inner.num_inserted(),
        }
    }

    pub(crate) fn encode(&self, writer: &mut Writer) {
        match self {
            ProbabilisticSet::BloomFilter(inner) => inner.encode(writer),
            ProbabilisticSet::Gcs(inner) => inner.encode(writer),
            ProbabilisticSet::Raw(inner) => inner.encode(writer),
        }
    }

    pub(crate) fn decode(
        data_structure: DataStructure,
        reader: &mut Reader<'_>,
        num_inserted: u64,
    ) -> Result<Self> {
        Ok(match data_structure {
            DataStructure::BloomFilter => {
                ProbabilisticSet::BloomFilter(BloomFilter::decode(reader, num_inserted)?)
            }
            DataStructure::Gcs => {
                ProbabilisticSet::Gcs(GolombCompressedSet::decode(reader, num_inserted)?)
            }
            DataStructure::Raw => ProbabilisticSet::Raw(RawSet::decode(reader, num_inserted)?),
        })
    }
}

/// Shared check that a decoded size parameter is within bounds.
pub(crate) fn check_structure_bits(bits: u64, what: &str) -> Result<()> {
    if bits > MAX_STRUCTURE_BITS {
        return Err(PsiError::malformed(format!(
            "{} of {} bits exceeds the limit of {}",
            what, bits, MAX_STRUCTURE_BITS
        )));
    }
    Ok(())
}
