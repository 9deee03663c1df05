//! Uncompressed sorted tag list.

use super::{check_structure_bits, SetEncoding};
use crate::codec::{Reader, Writer};
use crate::crypto::{Tag, TAG_LEN};
use crate::error::{PsiError, Result};

/// The distinct tags in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSet {
    tags: Vec<Tag>,
}

impl SetEncoding for RawSet {
    fn build(sorted_tags: &[Tag], _per_query_fpr: f64) -> Result<Self> {
        Ok(Self {
            tags: sorted_tags.to_vec(),
        })
    }

    fn contains(&self, tag: &Tag) -> bool {
        self.tags.binary_search(tag).is_ok()
    }

    fn num_inserted(&self) -> u64 {
        self.tags.len() as u64
    }

    fn encode(&self, writer: &mut Writer) {
        for tag in &self.tags {
            writer.put_bytes(tag);
        }
    }

    fn decode(reader: &mut Reader<'_>, num_inserted: u64) -> Result<Self> {
        let bits = num_inserted
            .checked_mul(TAG_LEN as u64 * 8)
            .ok_or_else(|| PsiError::malformed("raw tag count overflows"))?;
        check_structure_bits(bits, "raw set")?;
        let tags = reader.fixed_items::<TAG_LEN>(num_inserted as usize, "raw tags")?;
        if tags.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(PsiError::malformed(
                "raw tags are not strictly increasing",
            ));
        }
        Ok(Self { tags })
    }
}
