//! # Private Set Intersection (PSI) Engine
//!
//! A client with a small private set and a server with a large private set
//! learn the intersection (or only its size) using commutative encryption on
//! the Ristretto group (curve25519-dalek) plus a compact probabilistic encoding
//! of the server's set.
//!
//! ## Features
//!
//! - **Transport Agnostic**: every message serializes to a plain byte buffer;
//!   moving it between parties is left to the caller.
//! - **Reusable Setup**: the server's setup message depends only on its key and
//!   set, so it can be built once and served to many clients.
//! - **Selectable Encoding**: Bloom filter, Golomb-compressed set, or the raw
//!   sorted tags, chosen per setup message via [`DataStructure`].
//! - **Reveal or Count**: a client either learns which of its inputs matched or
//!   only how many did.
//!
//! ## Protocol Overview
//!
//! 1. **Setup** (server, offline): hash each element to the curve, multiply by
//!    the server key, and insert the resulting tags into a
//!    [`ProbabilisticSet`], shipped as a [`SetupMessage`].
//! 2. **Request** (client): hash each element to the curve and multiply by a
//!    fresh client key. The [`Request`] preserves input order.
//! 3. **Response** (server): multiply each request element by the server key.
//! 4. **Intersection** (client): remove the client key, derive the tag and
//!    query the setup set.
//!
//! ## Example Usage
//!
//! ```
//! use psi_engine::{DataStructure, PsiClient, PsiServer, Request, Response, SetupMessage};
//!
//! let server = PsiServer::new();
//! let setup = server
//!     .create_setup_message(0.0001, 3, &["bob", "dave"], DataStructure::Gcs)?
//!     .to_bytes();
//!
//! let mut client = PsiClient::new(true);
//! let request = client.create_request(&["alice", "bob", "carol"])?.to_bytes();
//!
//! // request travels to the server, the response travels back
//! let response = server.process_request_bytes(&request)?;
//!
//! let intersection = client.get_intersection(
//!     &SetupMessage::from_bytes(&setup)?,
//!     &Response::from_bytes(&response)?,
//! )?;
//! assert_eq!(intersection, vec![1]);
//! # Ok::<(), psi_engine::PsiError>(())
//! ```
//!
//! ## Security Considerations
//!
//! - Semi-honest security only. Set sizes are not hidden.
//! - The server never sees unblinded client elements; the client learns nothing
//!   about server elements outside the intersection beyond the configured
//!   false-positive rate.
//! - [`DataStructure::Raw`] hands the client every encrypted server tag.
//!
//! ## Modules
//!
//! - [`crypto`] - Hash-to-curve and the commutative cipher
//! - [`filter`] - Probabilistic set encodings
//! - `messages` - Wire messages
//! - `client` / `server` - The two protocol roles

pub use client::PsiClient;
pub use config::{DataStructure, SetupParams};
pub use error::{PsiError, Result};
pub use filter::ProbabilisticSet;
pub use messages::{Request, Response, SetupMessage};
pub use server::PsiServer;
pub use state::ClientState;

mod client;
mod codec;
mod config;
pub mod crypto;
mod error;
pub mod filter;
mod messages;
mod server;
mod state;

/// Version of this crate, shared by client and server.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Integration tests for the full PSI protocol.
#[cfg(test)]
mod integration_tests {
    use super::*;

    const ALL: [DataStructure; 3] = [
        DataStructure::BloomFilter,
        DataStructure::Gcs,
        DataStructure::Raw,
    ];

    const CLIENT_KEY: [u8; 32] = [
        0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
        25, 26, 27, 28, 29, 30, 7,
    ];
    const SERVER_KEY: [u8; 32] = [
        1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25,
        26, 27, 28, 29, 30, 31, 15,
    ];

    /// Run every step, passing each message through its byte encoding.
    fn run_protocol(
        server: &PsiServer,
        client: &mut PsiClient,
        client_inputs: &[String],
        server_inputs: &[String],
        fpr: f64,
        ds: DataStructure,
    ) -> (SetupMessage, Response) {
        let setup = server
            .create_setup_message(fpr, client_inputs.len(), server_inputs, ds)
            .unwrap();
        let setup = SetupMessage::from_bytes(&setup.to_bytes()).unwrap();

        let request = client.create_request(client_inputs).unwrap();
        let request = Request::from_bytes(&request.to_bytes()).unwrap();

        let response = server.process_request(&request).unwrap();
        let response = Response::from_bytes(&response.to_bytes()).unwrap();
        (setup, response)
    }

    fn elements(prefix: &str, range: std::ops::Range<usize>) -> Vec<String> {
        range.map(|i| format!("{} {}", prefix, i)).collect()
    }

    #[test]
    fn test_version_format() {
        let parts: Vec<&str> = version().split('.').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|part| part.parse::<u32>().is_ok()));
    }

    #[test]
    fn test_reveal_and_count_alice_bob_carol() {
        let client_inputs = vec!["alice".to_string(), "bob".to_string(), "carol".to_string()];
        let server_inputs = vec!["bob".to_string(), "dave".to_string()];
        for ds in ALL {
            let server = PsiServer::new();

            let mut client = PsiClient::new(true);
            let (setup, response) =
                run_protocol(&server, &mut client, &client_inputs, &server_inputs, 0.0001, ds);
            assert_eq!(client.get_intersection(&setup, &response).unwrap(), vec![1]);
            assert_eq!(client.state(), ClientState::IntersectionComputed);

            let mut counter = PsiClient::new(false);
            let (setup, response) =
                run_protocol(&server, &mut counter, &client_inputs, &server_inputs, 0.0001, ds);
            assert_eq!(counter.get_intersection_size(&setup, &response).unwrap(), 1);
        }
    }

    #[test]
    fn test_empty_request_rejected() {
        let mut client = PsiClient::new(true);
        let inputs: Vec<String> = Vec::new();
        assert_eq!(client.create_request(&inputs), Err(PsiError::EmptyInput));
    }

    #[test]
    fn test_intersection_before_request_rejected() {
        let server = PsiServer::new();
        let setup = server
            .create_setup_message(0.01, 1, &["x"], DataStructure::Gcs)
            .unwrap();
        let response = Response::new(Vec::new()).unwrap();

        let mut client = PsiClient::new(true);
        assert_eq!(
            client.get_intersection(&setup, &response),
            Err(PsiError::SessionState {
                operation: "get_intersection",
                state: "created",
            })
        );
        assert!(matches!(
            client.get_intersection_size(&setup, &response),
            Err(PsiError::SessionState { .. })
        ));
    }

    #[test]
    fn test_short_response_rejected() {
        let server = PsiServer::new();
        let mut client = PsiClient::new(true);
        let inputs = elements("Element", 0..4);
        let (setup, response) =
            run_protocol(&server, &mut client, &inputs, &inputs, 0.01, DataStructure::Gcs);

        let short = Response::new(response.elements()[..3].to_vec()).unwrap();
        assert_eq!(
            client.get_intersection(&setup, &short),
            Err(PsiError::MismatchedLength {
                expected: 4,
                actual: 3,
            })
        );
        // The full response still works afterwards
        assert_eq!(
            client.get_intersection(&setup, &response).unwrap(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn test_setup_deterministic_and_sized_by_fpr() {
        let inputs = elements("Element", 0..100);
        let mut reversed = inputs.clone();
        reversed.reverse();
        for ds in [DataStructure::BloomFilter, DataStructure::Gcs] {
            let first = PsiServer::from_key(&SERVER_KEY).unwrap();
            let second = PsiServer::from_key(&SERVER_KEY).unwrap();
            let a = first.create_setup_message(0.001, 10, &inputs, ds).unwrap().to_bytes();
            let b = second.create_setup_message(0.001, 10, &reversed, ds).unwrap().to_bytes();
            assert_eq!(a, b, "{} setup is not deterministic", ds);

            let c = first.create_setup_message(0.000001, 10, &inputs, ds).unwrap().to_bytes();
            assert_ne!(a.len(), c.len(), "{} size ignores fpr", ds);
        }
    }

    #[test]
    fn test_intersection_after_completion_is_rejected() {
        let server = PsiServer::new();
        let mut client = PsiClient::new(true);
        let inputs = elements("Element", 0..2);
        let (setup, response) =
            run_protocol(&server, &mut client, &inputs, &inputs, 0.01, DataStructure::Raw);
        client.get_intersection(&setup, &response).unwrap();
        assert!(matches!(
            client.get_intersection(&setup, &response),
            Err(PsiError::SessionState {
                state: "intersection_computed",
                ..
            })
        ));
    }

    #[test]
    fn test_count_only_client_cannot_reveal() {
        let server = PsiServer::new();
        let mut client = PsiClient::new(false);
        let inputs = elements("Element", 0..2);
        let (setup, response) =
            run_protocol(&server, &mut client, &inputs, &inputs, 0.01, DataStructure::Gcs);
        assert_eq!(
            client.get_intersection(&setup, &response),
            Err(PsiError::RevealDisabled)
        );
        // The refusal leaves the session usable for the size
        assert_eq!(client.get_intersection_size(&setup, &response).unwrap(), 2);
    }

    /// 10 client elements against 100 server elements holding every even
    /// index, with fixed keys on both sides.
    #[test]
    fn test_fixed_keys_half_intersection() {
        let client_inputs = elements("Element", 0..10);
        let server_inputs: Vec<String> = (0..100).map(|i| format!("Element {}", i * 2)).collect();
        for ds in ALL {
            let server = PsiServer::from_key(&SERVER_KEY).unwrap();
            let mut client = PsiClient::from_key(&CLIENT_KEY, true).unwrap();
            let (setup, response) =
                run_protocol(&server, &mut client, &client_inputs, &server_inputs, 0.001, ds);
            assert_eq!(
                client.get_intersection(&setup, &response).unwrap(),
                vec![0, 2, 4, 6, 8],
                "{}",
                ds
            );
        }
    }

    #[test]
    fn test_no_false_negatives_large_overlap() {
        let client_inputs = elements("shared", 0..60);
        let mut server_inputs = elements("server", 0..300);
        server_inputs.extend(elements("shared", 0..60).into_iter().step_by(3));
        let expected: Vec<usize> = (0..60).step_by(3).collect();
        for ds in ALL {
            let server = PsiServer::new();
            let mut client = PsiClient::new(true);
            let (setup, response) =
                run_protocol(&server, &mut client, &client_inputs, &server_inputs, 1e-6, ds);
            assert_eq!(client.get_intersection(&setup, &response).unwrap(), expected);
        }
    }

    #[test]
    fn test_empty_server_set() {
        for ds in ALL {
            let server = PsiServer::new();
            let mut client = PsiClient::new(true);
            let client_inputs = elements("Element", 0..5);
            let (setup, response) =
                run_protocol(&server, &mut client, &client_inputs, &[], 0.001, ds);
            assert!(client.get_intersection(&setup, &response).unwrap().is_empty());
        }
    }

    #[test]
    fn test_setup_reused_across_clients() {
        let server = PsiServer::new();
        let server_inputs = elements("Element", 0..20);
        let setup = server
            .create_setup_message(0.001, 5, &server_inputs, DataStructure::BloomFilter)
            .unwrap();
        for start in [0, 18, 40] {
            let mut client = PsiClient::new(false);
            let request = client.create_request(&elements("Element", start..start + 5)).unwrap();
            let response = server.process_request(&request).unwrap();
            let expected = 20usize.saturating_sub(start).min(5);
            assert_eq!(client.get_intersection_size(&setup, &response).unwrap(), expected);
        }
    }

    /// A disjoint client set of `n` elements against a setup built for
    /// `fpr = p`, `num_client_inputs = n` should average well under `p * n`
    /// false positives.
    #[test]
    fn test_false_positive_count_over_trials() {
        const TRIALS: usize = 20;
        const N: usize = 50;
        const FPR: f64 = 0.5;
        let server_inputs = elements("server", 0..100);
        for ds in [DataStructure::BloomFilter, DataStructure::Gcs] {
            let server = PsiServer::new();
            let setup = server.create_setup_message(FPR, N, &server_inputs, ds).unwrap();
            let mut false_positives = 0;
            for trial in 0..TRIALS {
                let mut client = PsiClient::new(false);
                let request = client
                    .create_request(&elements(&format!("client {}", trial), 0..N))
                    .unwrap();
                let response = server.process_request(&request).unwrap();
                false_positives += client.get_intersection_size(&setup, &response).unwrap();
            }
            // Expected total is about FPR * TRIALS = 10
            assert!(
                false_positives <= 30,
                "{}: {} false positives over {} trials",
                ds,
                false_positives,
                TRIALS
            );
            assert!((false_positives as f64) < FPR * N as f64 * TRIALS as f64);
        }
    }

    #[test]
    fn test_independent_sessions_in_parallel() {
        let server = std::sync::Arc::new(PsiServer::new());
        let server_inputs = elements("Element", 0..10);
        let setup = std::sync::Arc::new(
            server
                .create_setup_message(0.001, 4, &server_inputs, DataStructure::Gcs)
                .unwrap(),
        );
        let handles: Vec<_> = (0..4)
            .map(|offset| {
                let server = server.clone();
                let setup = setup.clone();
                std::thread::spawn(move || {
                    let mut client = PsiClient::new(true);
                    let inputs = elements("Element", offset * 5..offset * 5 + 4);
                    let request = client.create_request(&inputs).unwrap();
                    let response = server.process_request(&request).unwrap();
                    client.get_intersection(&setup, &response).unwrap()
                })
            })
            .collect();
        let results: Vec<Vec<usize>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results[0], vec![0, 1, 2, 3]);
        assert_eq!(results[1], vec![0, 1, 2, 3]);
        assert!(results[2].is_empty());
        assert!(results[3].is_empty());
    }
}
