//! Server side of the protocol.

use crate::config::{DataStructure, SetupParams};
use crate::crypto::{decompress_point, hash_to_point, point_to_tag, PrivateKey, Tag, KEY_LEN};
use crate::error::{PsiError, Result};
use crate::filter::ProbabilisticSet;
use crate::messages::{Request, Response, SetupMessage};
use log::debug;

/// Long-lived server party.
///
/// The key is fixed at construction and only read afterwards, so one server
/// can build setup messages and answer requests from many threads at once.
#[derive(Debug, Clone)]
pub struct PsiServer {
    key: PrivateKey,
}

impl PsiServer {
    /// Create a server with a fresh random key.
    pub fn new() -> Self {
        Self {
            key: PrivateKey::generate(),
        }
    }

    /// Restore a server from a key previously obtained with
    /// [`private_key_bytes`](Self::private_key_bytes).
    ///
    /// # Errors
    /// Returns `PsiError::InvalidParameter` if `key` is not a valid non-zero
    /// 32-byte scalar.
    pub fn from_key(key: &[u8]) -> Result<Self> {
        Ok(Self {
            key: PrivateKey::from_bytes(key)?,
        })
    }

    /// The server key, for persisting across restarts.
    pub fn private_key_bytes(&self) -> [u8; KEY_LEN] {
        self.key.to_bytes()
    }

    /// Encode the server's set for clients.
    ///
    /// `fpr` bounds the chance of any false positive across a client query
    /// set of up to `num_client_inputs` elements. The result depends only on
    /// the key and the set of inputs (not their order), so it can be cached and
    /// reused across clients.
    ///
    /// # Arguments
    /// * `fpr` - Target false-positive probability, in `(0, 1)`
    /// * `num_client_inputs` - Client set size to size the structure for
    /// * `server_inputs` - The server's elements; order and duplicates do not matter
    /// * `data_structure` - Encoding of the set
    ///
    /// # Errors
    /// Returns `PsiError::InvalidParameter` if `fpr` is outside `(0, 1)` or the
    /// structure would be too large.
    pub fn create_setup_message<I: AsRef<[u8]>>(
        &self,
        fpr: f64,
        num_client_inputs: usize,
        server_inputs: &[I],
        data_structure: DataStructure,
    ) -> Result<SetupMessage> {
        let params = SetupParams::new(fpr, num_client_inputs, data_structure)?;
        self.create_setup_message_with(&params, server_inputs)
    }

    /// [`create_setup_message`](Self::create_setup_message) taking its
    /// parameters from a [`SetupParams`].
    pub fn create_setup_message_with<I: AsRef<[u8]>>(
        &self,
        params: &SetupParams,
        server_inputs: &[I],
    ) -> Result<SetupMessage> {
        params.validate()?;
        let tags: Vec<Tag> = server_inputs
            .iter()
            .map(|input| point_to_tag(&self.key.encrypt(&hash_to_point(input.as_ref()))))
            .collect();
        let set = ProbabilisticSet::build(
            params.data_structure,
            &tags,
            params.fpr,
            params.num_client_inputs,
        )?;
        debug!(
            "server built {} setup over {} elements (fpr {}, sized for {} client inputs)",
            params.data_structure,
            set.num_inserted(),
            params.fpr,
            params.num_client_inputs
        );
        Ok(SetupMessage::new(params.fpr, params.num_client_inputs, set))
    }

    /// Apply the server key to every blinded element, keeping request order.
    ///
    /// # Returns
    /// A `Response` whose element `i` answers request element `i`
    ///
    /// # Errors
    /// Returns `PsiError::InvalidEncoding` if a request element is not a valid
    /// point.
    pub fn process_request(&self, request: &Request) -> Result<Response> {
        let encrypted = request
            .elements()
            .iter()
            .enumerate()
            .map(|(index, compressed)| {
                let point = decompress_point(compressed).map_err(|_| {
                    PsiError::InvalidEncoding(format!(
                        "request element {} is not a valid point",
                        index
                    ))
                })?;
                Ok(self.key.encrypt(&point).compress())
            })
            .collect::<Result<Vec<_>>>()?;
        debug!("server processed request with {} elements", encrypted.len());
        Response::new(encrypted)
    }

    /// [`process_request`](Self::process_request) on serialized buffers.
    ///
    /// # Errors
    /// Returns `PsiError::MalformedMessage` if `request` does not deserialize,
    /// or `PsiError::InvalidEncoding` as for `process_request`.
    pub fn process_request_bytes(&self, request: &[u8]) -> Result<Vec<u8>> {
        let request = Request::from_bytes(request)?;
        Ok(self.process_request(&request)?.to_bytes())
    }
}

impl Default for PsiServer {
    fn default() -> Self {
        Self::new()
    }
}
