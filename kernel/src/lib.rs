//! A verifiable transition log engine: a generic, policy-driven state
//! machine that emits a cryptographic proof for every transition —
//! deterministic canonical hashing, a Merkle accumulator over the proof
//! chain, and a per-entry RSA signature — plus an independent versioned
//! branching tree for recording an agent's evolving payload data.
//!
//! The proof engine ([`hashing`], [`canonical`], [`merkle`], [`signing`]) is
//! generic over nothing but bytes; the state machine ([`machine`], [`policy`],
//! [`sink`]) is generic over the caller's own `StateId` type. The history
//! tree ([`history`]) is independent of both and does not require a
//! [`machine::StateMachine`] to exist.

pub mod canonical;
pub mod clock;
pub mod config;
pub mod error;
pub mod hashing;
pub mod history;
pub mod machine;
pub mod merkle;
pub mod policy;
pub mod signing;
pub mod sink;
pub mod value;

pub use error::KernelError;
pub use history::{HistoryNode, HistoryTree};
pub use machine::{LogEntry, StateMachine};
pub use merkle::MerkleProof;
pub use policy::{Policy, StateId};
pub use signing::{verify_chain, ChainVerification, Proof};
pub use sink::{DurableStoreSink, Sink, StructuredLoggerSink};
pub use value::Value;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn end_to_end_chain_verifies_and_tamper_is_detected() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let (sk, pk) = signing::generate_keypair(2048).unwrap();
        let policy = Policy::agent_lifecycle();
        let states = policy.states();
        let logger = Arc::new(StructuredLoggerSink::new());
        let durable = Arc::new(DurableStoreSink::new());

        let mut machine = StateMachine::new(
            "agent-42",
            "session-1",
            sk,
            states,
            policy,
            StateId::new("IDLE"),
            vec![logger.clone(), durable.clone()],
        )
        .unwrap();

        machine
            .transition(StateId::new("INIT"), "start", Value::NULL)
            .unwrap();
        machine
            .transition(
                StateId::new("GOAL_PARSE"),
                "parse",
                Value(serde_json::json!({"g": "x"})),
            )
            .unwrap();
        machine
            .transition(StateId::new("PLANNING"), "plan", Value::NULL)
            .unwrap();

        let proofs: Vec<Proof> = machine.log().iter().map(|e| e.proof.clone()).collect();
        let result = verify_chain(&proofs, &pk);
        assert!(result.ok);

        assert_eq!(durable.records().len(), 3);
        assert!(machine.logs().contains("session-1"));

        let mut tampered = proofs.clone();
        let mut bytes = hashing::from_hex(&tampered[1].state_hash).unwrap();
        bytes[0] ^= 0xFF;
        tampered[1].state_hash = hashing::to_hex(&bytes);
        let tampered_result = verify_chain(&tampered, &pk);
        assert!(!tampered_result.ok);
        assert!(tampered_result.failed_at.unwrap() <= 2);
    }

    #[test]
    fn invalid_transition_touches_nothing() {
        let (sk, _pk) = signing::generate_keypair(2048).unwrap();
        let policy = Policy::agent_lifecycle();
        let states = policy.states();
        let mut machine = StateMachine::new(
            "agent-1",
            "session-1",
            sk,
            states,
            policy,
            StateId::new("IDLE"),
            vec![],
        )
        .unwrap();

        let result = machine.transition(StateId::new("EXECUTING"), "skip", Value::NULL);
        assert!(matches!(result, Err(KernelError::InvalidTransition { .. })));
        assert!(machine.log().is_empty());
        assert_eq!(machine.current_state(), &StateId::new("IDLE"));
    }
}
