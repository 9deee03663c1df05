//! Commutative cipher over the Ristretto group.
//!
//! Elements are hashed onto the curve and "encrypted" by scalar
//! multiplication. Because scalar multiplication commutes, a point encrypted
//! under the client key and then the server key equals the same point
//! encrypted in the opposite order, which is what lets the client strip its own
//! key off a server response.

use crate::error::{PsiError, Result};
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::Scalar;
use rand::rngs::OsRng;
use sha2::{Digest, Sha512};
use std::fmt;
use zeroize::Zeroize;

/// Width in bytes of a compressed Ristretto point.
pub const POINT_LEN: usize = 32;

/// Width in bytes of a [`Tag`].
pub const TAG_LEN: usize = 32;

/// Width in bytes of a serialized [`PrivateKey`].
pub const KEY_LEN: usize = 32;

/// Fixed-width digest of a server-encrypted point; the unit stored in a
/// probabilistic set.
pub type Tag = [u8; TAG_LEN];

const HASH_TO_CURVE_DOMAIN: &[u8] = b"psi-engine/v1/hash-to-curve";
const TAG_DOMAIN: &[u8] = b"psi-engine/v1/tag";

/// Map arbitrary bytes onto a Ristretto point.
///
/// Deterministic: identical input always yields the identical point.
pub fn hash_to_point(input: &[u8]) -> RistrettoPoint {
    let hasher = Sha512::new()
        .chain_update(HASH_TO_CURVE_DOMAIN)
        .chain_update(input);
    RistrettoPoint::from_hash(hasher)
}

/// Reduce a point to the fixed-width tag inserted into the setup structure.
pub fn point_to_tag(point: &RistrettoPoint) -> Tag {
    let digest = Sha512::new()
        .chain_update(TAG_DOMAIN)
        .chain_update(point.compress().as_bytes())
        .finalize();
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&digest[..TAG_LEN]);
    tag
}

/// Decompress a compressed Ristretto point.
///
/// # Errors
/// Returns `PsiError::InvalidEncoding` if the bytes are not a valid group
/// element.
pub fn decompress_point(compressed: &CompressedRistretto) -> Result<RistrettoPoint> {
    compressed.decompress().ok_or_else(|| {
        PsiError::InvalidEncoding("Failed to decompress Ristretto point".to_string())
    })
}

/// A secret scalar held by one protocol party.
///
/// The scalar is never zero, is wiped on drop and is not printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(Scalar);

impl PrivateKey {
    /// Generate a fresh key from the operating system RNG.
    pub fn generate() -> Self {
        let mut rng = OsRng;
        loop {
            let scalar = Scalar::random(&mut rng);
            if scalar != Scalar::ZERO {
                return Self(scalar);
            }
        }
    }

    /// Load a key from its 32-byte little-endian canonical encoding.
    ///
    /// # Errors
    /// Returns `PsiError::InvalidParameter` if the slice is not 32 bytes, is
    /// not a canonical scalar, or encodes zero.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let array: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            PsiError::invalid_parameter(
                "key",
                format!("expected {} bytes, got {}", KEY_LEN, bytes.len()),
            )
        })?;
        let scalar: Option<Scalar> = Scalar::from_canonical_bytes(array).into();
        match scalar {
            Some(scalar) if scalar != Scalar::ZERO => Ok(Self(scalar)),
            Some(_) => Err(PsiError::invalid_parameter("key", "key must be non-zero")),
            None => Err(PsiError::invalid_parameter(
                "key",
                "not a canonical scalar encoding",
            )),
        }
    }

    /// The 32-byte little-endian encoding of this key.
    pub fn to_bytes(&self) -> [u8; KEY_LEN] {
        self.0.to_bytes()
    }

    /// Scale `point` by this key.
    pub fn encrypt(&self, point: &RistrettoPoint) -> RistrettoPoint {
        self.0 * point
    }

    /// Undo [`PrivateKey::encrypt`] by scaling with the inverse of this key.
    pub fn decrypt(&self, point: &RistrettoPoint) -> RistrettoPoint {
        self.0.invert() * point
    }

    /// Decrypt many points, inverting the key only once.
    pub fn decrypt_all<'a, I>(&self, points: I) -> Vec<RistrettoPoint>
    where
        I: IntoIterator<Item = &'a RistrettoPoint>,
    {
        let inverse = self.0.invert();
        points.into_iter().map(|point| inverse * point).collect()
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}
