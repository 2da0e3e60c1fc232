//! The error taxonomy for the transition log engine.
//!
//! One flat enum covers every fallible public operation except
//! [`crate::signing::verify_chain`], whose "invalid proof at index N"
//! outcome is not exceptional — it's the expected result of auditing a
//! tampered chain — and is reported through
//! [`crate::signing::ChainVerification`]'s `failed_at`/`reason` fields
//! instead of this enum.

use thiserror::Error;

/// Errors raised across the proof engine, policy, state machine, and sinks.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Malformed states, policy, or key material at construction time.
    /// Fatal to the machine being constructed.
    #[error("invalid machine configuration: {0}")]
    Config(String),

    /// A requested transition is not permitted by the policy graph.
    /// No side effects occur: the log, current state, and sinks are
    /// untouched.
    #[error("transition from {from:?} to {to:?} is not permitted by policy")]
    InvalidTransition {
        /// The state the machine was in when the transition was attempted.
        from: String,
        /// The state that was requested and rejected.
        to: String,
    },

    /// `params` or tree payload data could not be serialized deterministically.
    #[error("canonicalization failed: {0}")]
    Canonicalization(String),

    /// Key material could not be parsed.
    #[error("crypto key error: {0}")]
    CryptoKey(String),

    /// A signing or verification operation failed.
    #[error("crypto operation failed: {0}")]
    CryptoOp(String),

    /// A sink failed to accept a proof. Not fatal: the in-memory log is
    /// already authoritative once this is raised, since sink emission only
    /// ever happens after the log append (see `machine::StateMachine::transition`).
    #[error("sink {sink} failed: {reason}")]
    Sink {
        /// Name of the sink that failed.
        sink: String,
        /// Reason reported by the sink.
        reason: String,
    },
}
