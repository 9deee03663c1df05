//! Setup-message configuration.

use crate::error::{PsiError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Encoding used for the server's set in a setup message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataStructure {
    /// Bit array probed by `k` hash functions. Constant-time queries.
    BloomFilter,
    /// Golomb-Rice coded sorted hashes. Smaller, queried by a merge scan.
    #[default]
    Gcs,
    /// The sorted encrypted tags themselves. Exact but reveals the whole
    /// encrypted server set to the client.
    Raw,
}

impl DataStructure {
    /// Tag written in the setup message header.
    pub(crate) fn wire_tag(self) -> u8 {
        match self {
            DataStructure::BloomFilter => 1,
            DataStructure::Gcs => 2,
            DataStructure::Raw => 3,
        }
    }

    pub(crate) fn from_wire_tag(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(DataStructure::BloomFilter),
            2 => Ok(DataStructure::Gcs),
            3 => Ok(DataStructure::Raw),
            other => Err(PsiError::malformed(format!(
                "unknown data structure tag {}",
                other
            ))),
        }
    }
}

impl fmt::Display for DataStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataStructure::BloomFilter => "bloom_filter",
            DataStructure::Gcs => "gcs",
            DataStructure::Raw => "raw",
        };
        f.write_str(name)
    }
}

/// Parameters for building a setup message.
///
/// `fpr` bounds the probability that *any* of up to `num_client_inputs`
/// non-member queries comes back positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupParams {
    /// Target false-positive probability over a whole client query set, in
    /// `(0, 1)`.
    pub fpr: f64,
    /// Client set size the structure is sized for. Zero is treated as one.
    pub num_client_inputs: usize,
    /// Encoding of the server's set.
    pub data_structure: DataStructure,
}

impl SetupParams {
    /// Create validated parameters.
    ///
    /// # Errors
    /// Returns `PsiError::InvalidParameter` if `fpr` is not strictly between 0
    /// and 1.
    pub fn new(fpr: f64, num_client_inputs: usize, data_structure: DataStructure) -> Result<Self> {
        let params = Self {
            fpr,
            num_client_inputs,
            data_structure,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check the ranges of parameters that may have come from a config file.
    pub fn validate(&self) -> Result<()> {
        validate_fpr(self.fpr)
    }

    /// False-positive probability each individual query must meet.
    pub fn per_query_fpr(&self) -> f64 {
        per_query_fpr(self.fpr, self.num_client_inputs)
    }
}

impl Default for SetupParams {
    fn default() -> Self {
        Self {
            fpr: 1e-6,
            num_client_inputs: 10_000,
            data_structure: DataStructure::default(),
        }
    }
}

pub(crate) fn validate_fpr(fpr: f64) -> Result<()> {
    // Written so that NaN is rejected too
    if !(fpr > 0.0 && fpr < 1.0) {
        return Err(PsiError::invalid_parameter(
            "fpr",
            format!("{} is not in the open interval (0, 1)", fpr),
        ));
    }
    Ok(())
}

pub(crate) fn per_query_fpr(fpr: f64, num_client_inputs: usize) -> f64 {
    fpr / num_client_inputs.max(1) as f64
}
