//! Client session state.

use crate::error::PsiError;

/// Where a [`PsiClient`](crate::PsiClient) session is in the protocol.
///
/// Sessions only move forward: `Created -> RequestBuilt -> IntersectionComputed`.
/// A new session needs a new client (and with it a new key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientState {
    /// Key generated, no request yet.
    #[default]
    Created,
    /// A request of `request_len` elements has been handed out.
    RequestBuilt { request_len: usize },
    /// The response has been evaluated.
    IntersectionComputed,
}

impl ClientState {
    /// Stable snake_case name, as reported in `PsiError::SessionState`.
    pub fn name(&self) -> &'static str {
        match self {
            ClientState::Created => "created",
            ClientState::RequestBuilt { .. } => "request_built",
            ClientState::IntersectionComputed => "intersection_computed",
        }
    }

    /// Error for `operation` attempted in this state.
    pub(crate) fn reject(&self, operation: &'static str) -> PsiError {
        PsiError::SessionState {
            operation,
            state: self.name(),
        }
    }
}
