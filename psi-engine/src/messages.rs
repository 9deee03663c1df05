//! Message types exchanged between client and server, and their wire format.
//!
//! Request / response:
//!
//! ```text
//! version: u8 | kind: u8 | count: u32 | count x 32-byte compressed points
//! ```
//!
//! Setup:
//!
//! ```text
//! version: u8 | kind: u8 | data structure: u8 | fpr: f64
//!   | num_client_inputs: u64 | insertion count: u64 | structure parameters and body
//! ```
//!
//! All integers are little-endian.

use crate::codec::{MessageKind, Reader, Writer};
use crate::config::{validate_fpr, DataStructure};
use crate::crypto::POINT_LEN;
use crate::error::{PsiError, Result};
use crate::filter::ProbabilisticSet;
use curve25519_dalek::ristretto::CompressedRistretto;

fn encode_points(kind: MessageKind, points: &[CompressedRistretto]) -> Vec<u8> {
    let mut writer = Writer::with_capacity(6 + points.len() * POINT_LEN);
    writer.header(kind);
    // Callers cap element counts at u32::MAX when the message is built
    writer.put_u32(points.len() as u32);
    for point in points {
        writer.put_bytes(point.as_bytes());
    }
    writer.into_bytes()
}

fn decode_points(kind: MessageKind, bytes: &[u8]) -> Result<Vec<CompressedRistretto>> {
    let mut reader = Reader::new(bytes);
    reader.header(kind)?;
    let count = reader.u32("element count")? as usize;
    let points = reader
        .fixed_items::<POINT_LEN>(count, "points")?
        .into_iter()
        .map(CompressedRistretto)
        .collect();
    reader.finish()?;
    Ok(points)
}

fn check_count(len: usize) -> Result<()> {
    if u32::try_from(len).is_err() {
        return Err(PsiError::invalid_parameter(
            "inputs",
            format!("{} elements exceed the wire limit of {}", len, u32::MAX),
        ));
    }
    Ok(())
}

/// Client's blinded elements, in the client's input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    elements: Vec<CompressedRistretto>,
}

impl Request {
    /// Create a request from already-blinded points.
    ///
    /// # Errors
    /// Returns `PsiError::InvalidParameter` if there are more points than the
    /// wire format can count.
    pub fn new(elements: Vec<CompressedRistretto>) -> Result<Self> {
        check_count(elements.len())?;
        Ok(Self { elements })
    }

    /// The blinded points, in the client's input order.
    pub fn elements(&self) -> &[CompressedRistretto] {
        &self.elements
    }

    /// Returns the number of elements in this request.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true if this request contains no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Serialize for transport to the server.
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_points(MessageKind::Request, &self.elements)
    }

    /// Parse a request produced by [`Request::to_bytes`].
    ///
    /// # Errors
    /// Returns `PsiError::MalformedMessage` on a bad version or kind tag, a
    /// truncated buffer, or a count that does not match the payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            elements: decode_points(MessageKind::Request, bytes)?,
        })
    }
}

/// Server's re-encrypted elements, in the same order as the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    elements: Vec<CompressedRistretto>,
}

impl Response {
    /// Create a response from double-encrypted points.
    ///
    /// # Errors
    /// Returns `PsiError::InvalidParameter` if there are more points than the
    /// wire format can count.
    pub fn new(elements: Vec<CompressedRistretto>) -> Result<Self> {
        check_count(elements.len())?;
        Ok(Self { elements })
    }

    /// The double-encrypted points, in request order.
    pub fn elements(&self) -> &[CompressedRistretto] {
        &self.elements
    }

    /// Returns the number of elements in this response.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true if this response contains no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Serialize for transport back to the client.
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_points(MessageKind::Response, &self.elements)
    }

    /// Parse a response produced by [`Response::to_bytes`].
    ///
    /// # Errors
    /// Returns `PsiError::MalformedMessage` on a bad version or kind tag, a
    /// truncated buffer, or a count that does not match the payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self {
            elements: decode_points(MessageKind::Response, bytes)?,
        })
    }
}

/// The server's encoded set plus the parameters it was built with.
///
/// Independent of any client session; one setup message can serve many
/// clients.
#[derive(Debug, Clone, PartialEq)]
pub struct SetupMessage {
    fpr: f64,
    num_client_inputs: u64,
    set: ProbabilisticSet,
}

impl SetupMessage {
    pub(crate) fn new(fpr: f64, num_client_inputs: usize, set: ProbabilisticSet) -> Self {
        Self {
            fpr,
            num_client_inputs: num_client_inputs as u64,
            set,
        }
    }

    /// The configured false-positive rate over a full client query set.
    pub fn fpr(&self) -> f64 {
        self.fpr
    }

    /// The client query-set size the structure was sized for.
    pub fn num_client_inputs(&self) -> u64 {
        self.num_client_inputs
    }

    /// Which encoding the server chose for its set.
    pub fn data_structure(&self) -> DataStructure {
        self.set.data_structure()
    }

    /// Number of distinct server elements encoded.
    pub fn num_inserted(&self) -> u64 {
        self.set.num_inserted()
    }

    /// The decoded membership structure.
    pub fn set(&self) -> &ProbabilisticSet {
        &self.set
    }

    /// Serialize for distribution to clients. The same bytes can be served
    /// to every client.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = Writer::default();
        writer.header(MessageKind::Setup);
        writer.put_u8(self.set.data_structure().wire_tag());
        writer.put_f64(self.fpr);
        writer.put_u64(self.num_client_inputs);
        writer.put_u64(self.set.num_inserted());
        self.set.encode(&mut writer);
        writer.into_bytes()
    }

    /// Parse a setup message produced by [`SetupMessage::to_bytes`],
    /// validating the encoded structure.
    ///
    /// # Errors
    /// Returns `PsiError::MalformedMessage` if the header or the encoded
    /// structure is invalid, the buffer is truncated, or bytes are left over.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        reader.header(MessageKind::Setup)?;
        let data_structure = DataStructure::from_wire_tag(reader.u8("data structure")?)?;
        let fpr = reader.f64("fpr")?;
        validate_fpr(fpr).map_err(|e| PsiError::malformed(e.to_string()))?;
        let num_client_inputs = reader.u64("num_client_inputs")?;
        let num_inserted = reader.u64("insertion count")?;
        let set = ProbabilisticSet::decode(data_structure, &mut reader, num_inserted)?;
        reader.finish()?;
        Ok(Self {
            fpr,
            num_client_inputs,
            set,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FORMAT_VERSION;
    use crate::crypto::hash_to_point;
    use proptest::prelude::*;

    fn points(count: usize) -> Vec<CompressedRistretto> {
        (0..count)
            .map(|i| hash_to_point(format!("item {}", i).as_bytes()).compress())
            .collect()
    }

    #[test]
    fn test_request_layout() {
        let request = Request::new(points(2)).unwrap();
        let bytes = request.to_bytes();
        assert_eq!(bytes.len(), 2 + 4 + 2 * POINT_LEN);
        assert_eq!(bytes[0], FORMAT_VERSION);
        assert_eq!(bytes[1], MessageKind::Request as u8);
        assert_eq!(&bytes[2..6], &2u32.to_le_bytes());
        assert_eq!(Request::from_bytes(&bytes).unwrap(), request);
    }

    #[test]
    fn test_response_roundtrip() {
        let response = Response::new(points(3)).unwrap();
        assert_eq!(response.len(), 3);
        assert!(!response.is_empty());
        assert_eq!(Response::from_bytes(&response.to_bytes()).unwrap(), response);
    }

    #[test]
    fn test_kinds_are_not_interchangeable() {
        let request = Request::new(points(1)).unwrap();
        assert!(matches!(
            Response::from_bytes(&request.to_bytes()),
            Err(PsiError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_truncated_and_padded_requests() {
        let bytes = Request::new(points(3)).unwrap().to_bytes();
        for len in 0..bytes.len() {
            assert!(
                matches!(Request::from_bytes(&bytes[..len]), Err(PsiError::MalformedMessage(_))),
                "prefix of {} bytes should be rejected",
                len
            );
        }
        let mut padded = bytes.clone();
        padded.push(0);
        assert!(Request::from_bytes(&padded).is_err());
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = Request::new(points(1)).unwrap().to_bytes();
        bytes[0] = FORMAT_VERSION + 1;
        assert!(matches!(
            Request::from_bytes(&bytes),
            Err(PsiError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_huge_declared_count() {
        let mut writer = Writer::default();
        writer.header(MessageKind::Request);
        writer.put_u32(u32::MAX);
        writer.put_bytes(&[0u8; 32]);
        assert!(Request::from_bytes(&writer.into_bytes()).is_err());
    }

    #[test]
    fn test_setup_roundtrip_all_structures() {
        let tags: Vec<_> = (0..20u8).map(|i| [i; 32]).collect();
        for ds in [DataStructure::BloomFilter, DataStructure::Gcs, DataStructure::Raw] {
            let set = ProbabilisticSet::build(ds, &tags, 0.001, 5).unwrap();
            let setup = SetupMessage::new(0.001, 5, set);
            let bytes = setup.to_bytes();
            let decoded = SetupMessage::from_bytes(&bytes).unwrap();
            assert_eq!(decoded, setup);
            assert_eq!(decoded.data_structure(), ds);
            assert_eq!(decoded.num_inserted(), 20);
            assert_eq!(decoded.num_client_inputs(), 5);
            assert_eq!(decoded.fpr(), 0.001);
        }
    }

    #[test]
    fn test_setup_rejects_bad_header() {
        let set = ProbabilisticSet::build(DataStructure::Gcs, &[[1u8; 32]], 0.01, 1).unwrap();
        let good = SetupMessage::new(0.01, 1, set).to_bytes();

        let mut unknown_structure = good.clone();
        unknown_structure[2] = 9;
        assert!(SetupMessage::from_bytes(&unknown_structure).is_err());

        let mut bad_fpr = good.clone();
        bad_fpr[3..11].copy_from_slice(&1.5f64.to_le_bytes());
        assert!(matches!(
            SetupMessage::from_bytes(&bad_fpr),
            Err(PsiError::MalformedMessage(_))
        ));

        assert!(SetupMessage::from_bytes(&good[..good.len() - 1]).is_err());
        assert!(SetupMessage::from_bytes(b"invalid").is_err());
    }

    proptest! {
        #[test]
        fn prop_request_bytes_roundtrip(raw in proptest::collection::vec(proptest::array::uniform32(any::<u8>()), 0..16)) {
            // The codec does not validate points, so arbitrary bytes round-trip
            let request = Request::new(raw.into_iter().map(CompressedRistretto).collect()).unwrap();
            prop_assert_eq!(Request::from_bytes(&request.to_bytes()).unwrap(), request);
        }
    }
}
