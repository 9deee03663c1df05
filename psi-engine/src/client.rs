//! Client side of the protocol.

use crate::crypto::{decompress_point, hash_to_point, point_to_tag, PrivateKey, Tag, KEY_LEN};
use crate::error::{PsiError, Result};
use crate::messages::{Request, Response, SetupMessage};
use crate::state::ClientState;
use log::debug;

/// One client session.
///
/// Holds an ephemeral key for the lifetime of the session. The flow is
/// [`create_request`](Self::create_request), send the request, then feed the
/// server's setup message and response to
/// [`get_intersection`](Self::get_intersection) or
/// [`get_intersection_size`](Self::get_intersection_size).
///
/// Methods take `&mut self`; share a session across threads only behind a
/// lock.
#[derive(Debug)]
pub struct PsiClient {
    key: PrivateKey,
    reveal_intersection: bool,
    state: ClientState,
}

impl PsiClient {
    /// Create a session with a fresh random key.
    ///
    /// `reveal_intersection` only decides whether
    /// [`get_intersection`](Self::get_intersection) is allowed; the exchange
    /// with the server is identical either way.
    pub fn new(reveal_intersection: bool) -> Self {
        Self {
            key: PrivateKey::generate(),
            reveal_intersection,
            state: ClientState::Created,
        }
    }

    /// Create a session with a caller-supplied key, e.g. for reproducible
    /// fixtures.
    ///
    /// # Errors
    /// Returns `PsiError::InvalidParameter` if `key` is not a valid non-zero
    /// 32-byte scalar.
    pub fn from_key(key: &[u8], reveal_intersection: bool) -> Result<Self> {
        Ok(Self {
            key: PrivateKey::from_bytes(key)?,
            reveal_intersection,
            state: ClientState::Created,
        })
    }

    /// Whether [`get_intersection`](Self::get_intersection) may reveal
    /// indices, as chosen at construction.
    pub fn reveal_intersection(&self) -> bool {
        self.reveal_intersection
    }

    /// Current position of this session in the protocol.
    ///
    /// ```
    /// use psi_engine::{ClientState, PsiClient};
    ///
    /// let mut client = PsiClient::new(true);
    /// assert_eq!(client.state().name(), "created");
    /// client.create_request(&["alice"])?;
    /// assert_eq!(client.state(), ClientState::RequestBuilt { request_len: 1 });
    /// # Ok::<(), psi_engine::PsiError>(())
    /// ```
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// This session's key, for callers that persist it.
    pub fn private_key_bytes(&self) -> [u8; KEY_LEN] {
        self.key.to_bytes()
    }

    /// Hash and blind every input, preserving order.
    ///
    /// This is the first step of the protocol; the returned request goes to
    /// the server's [`PsiServer::process_request`](crate::PsiServer::process_request).
    ///
    /// # Arguments
    /// * `inputs` - The client's elements, in the order later indices refer to
    ///
    /// # Errors
    /// - `PsiError::EmptyInput` if `inputs` is empty
    /// - `PsiError::SessionState` if a request was already built
    pub fn create_request<I: AsRef<[u8]>>(&mut self, inputs: &[I]) -> Result<Request> {
        if self.state != ClientState::Created {
            return Err(self.state.reject("create_request"));
        }
        if inputs.is_empty() {
            return Err(PsiError::EmptyInput);
        }

        let blinded = inputs
            .iter()
            .map(|input| self.key.encrypt(&hash_to_point(input.as_ref())).compress())
            .collect();
        let request = Request::new(blinded)?;

        self.state = ClientState::RequestBuilt {
            request_len: request.len(),
        };
        debug!("client built request with {} elements", request.len());
        Ok(request)
    }

    /// Indices (into the request's inputs) of the elements the server also
    /// holds, in ascending order.
    ///
    /// # Arguments
    /// * `setup` - The server's setup message
    /// * `response` - The server's answer to this session's request
    ///
    /// # Returns
    /// Ascending indices into the inputs passed to
    /// [`create_request`](Self::create_request)
    ///
    /// # Errors
    /// Checked in this order:
    /// - `PsiError::SessionState` if no request is outstanding
    /// - `PsiError::RevealDisabled` if the client was created count-only
    /// - `PsiError::MismatchedLength` if `response` does not match the request
    /// - `PsiError::InvalidEncoding` if a response element is not a point
    pub fn get_intersection(
        &mut self,
        setup: &SetupMessage,
        response: &Response,
    ) -> Result<Vec<usize>> {
        if !matches!(self.state, ClientState::RequestBuilt { .. }) {
            return Err(self.state.reject("get_intersection"));
        }
        if !self.reveal_intersection {
            return Err(PsiError::RevealDisabled);
        }
        let membership = self.evaluate_membership("get_intersection", setup, response)?;
        Ok(membership
            .into_iter()
            .enumerate()
            .filter_map(|(index, hit)| hit.then_some(index))
            .collect())
    }

    /// Number of request elements the server also holds.
    ///
    /// Available in both reveal modes.
    ///
    /// # Errors
    /// Same as [`get_intersection`](Self::get_intersection), except that it
    /// never returns `PsiError::RevealDisabled`.
    pub fn get_intersection_size(
        &mut self,
        setup: &SetupMessage,
        response: &Response,
    ) -> Result<usize> {
        let membership = self.evaluate_membership("get_intersection_size", setup, response)?;
        Ok(membership.into_iter().filter(|hit| *hit).count())
    }

    /// Per-element membership of the response in the setup set. Moves the
    /// session to `IntersectionComputed` only on success.
    fn evaluate_membership(
        &mut self,
        operation: &'static str,
        setup: &SetupMessage,
        response: &Response,
    ) -> Result<Vec<bool>> {
        let request_len = match self.state {
            ClientState::RequestBuilt { request_len } => request_len,
            other => return Err(other.reject(operation)),
        };
        if response.len() != request_len {
            return Err(PsiError::MismatchedLength {
                expected: request_len,
                actual: response.len(),
            });
        }

        let points = response
            .elements()
            .iter()
            .enumerate()
            .map(|(index, compressed)| {
                decompress_point(compressed).map_err(|_| {
                    PsiError::InvalidEncoding(format!(
                        "response element {} is not a valid point",
                        index
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // Stripping our key leaves H(x) * server_key, the value the server
        // tagged its own set with
        let tags: Vec<Tag> = self
            .key
            .decrypt_all(&points)
            .iter()
            .map(point_to_tag)
            .collect();
        let membership = setup.set().contains_all(&tags);

        self.state = ClientState::IntersectionComputed;
        debug!(
            "client evaluated {} response elements against a {} setup of {} elements",
            request_len,
            setup.data_structure(),
            setup.num_inserted()
        );
        Ok(membership)
    }
}
