use thiserror::Error;

use crate::EnvelopeKind;

/// Errors that can occur when reshaping envelopes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// Attempted to readdress an envelope that carries no node/lane address
    #[error("{kind} envelopes carry no node or lane address and cannot be readdressed")]
    NotLaneAddressed { kind: EnvelopeKind },

    /// Envelope was not of the kind the caller required
    #[error("Expected a {expected} envelope, found {found}")]
    UnexpectedKind {
        expected: EnvelopeKind,
        found: EnvelopeKind,
    },
}
