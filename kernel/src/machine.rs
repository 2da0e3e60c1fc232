//! The state machine: current-state tracking, transition execution, proof
//! emission, log append, and sink fan-out.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use rsa::RsaPrivateKey;

use crate::canonical;
use crate::config::KernelLimits;
use crate::error::KernelError;
use crate::hashing::{self, Digest};
use crate::merkle;
use crate::policy::Policy;
use crate::signing::{self, Proof};
use crate::sink::{Sink, StructuredLoggerSink};
use crate::value::Value;

/// One accepted transition as recorded in the in-memory log: the descriptor
/// fields alongside the proof that committed to them.
#[derive(Clone, Debug)]
pub struct LogEntry<S> {
    pub from: S,
    pub to: S,
    pub action: String,
    pub params: Value,
    pub proof: Proof,
}

/// A generic, policy-driven state machine. Owned by one logical actor for
/// the lifetime of one session; never reused across private keys.
pub struct StateMachine<S: Clone + Eq + Ord + Hash + fmt::Debug> {
    agent_id: String,
    session_id: String,
    private_key: RsaPrivateKey,
    states: BTreeSet<S>,
    policy: Policy<S>,
    current: S,
    log: Vec<LogEntry<S>>,
    leaves: Vec<Digest>,
    logger: Arc<StructuredLoggerSink>,
    sinks: Vec<Arc<dyn Sink>>,
    limits: KernelLimits,
}

impl<S: Clone + Eq + Ord + Hash + fmt::Debug> StateMachine<S> {
    /// Construct a machine. Fails with `Config` if `initial_state` is not in
    /// `states`, or if `policy` mentions a state outside `states`.
    pub fn new(
        agent_id: impl Into<String>,
        session_id: impl Into<String>,
        private_key: RsaPrivateKey,
        states: BTreeSet<S>,
        policy: Policy<S>,
        initial_state: S,
        sinks: Vec<Arc<dyn Sink>>,
    ) -> Result<Self, KernelError> {
        if !states.contains(&initial_state) {
            return Err(KernelError::Config(format!(
                "initial state {initial_state:?} is not among the declared states"
            )));
        }
        for policy_state in policy.states() {
            if !states.contains(&policy_state) {
                return Err(KernelError::Config(format!(
                    "policy references state {policy_state:?} outside the declared states"
                )));
            }
        }

        Ok(StateMachine {
            agent_id: agent_id.into(),
            session_id: session_id.into(),
            private_key,
            states,
            policy,
            current: initial_state,
            log: Vec::new(),
            leaves: Vec::new(),
            logger: Arc::new(StructuredLoggerSink::new()),
            sinks,
            limits: KernelLimits::default(),
        })
    }

    /// Override the default `KernelLimits` used to bound `params` shape
    /// before every transition's descriptor is canonicalized.
    pub fn with_limits(mut self, limits: KernelLimits) -> Self {
        self.limits = limits;
        self
    }

    /// The states this machine was constructed with.
    pub fn states(&self) -> &BTreeSet<S> {
        &self.states
    }

    /// The state the machine is currently in.
    pub fn current_state(&self) -> &S {
        &self.current
    }

    /// States reachable from the current state in one step.
    pub fn available(&self) -> BTreeSet<S> {
        self.policy.allowed(&self.current)
    }

    /// The full in-memory log, oldest first.
    pub fn log(&self) -> &[LogEntry<S>] {
        &self.log
    }

    /// The structured logger's rendered banner and lines for this session.
    pub fn logs(&self) -> String {
        self.logger.get_logs(&self.session_id)
    }

    /// Attempt a transition to `to` with the given `action` label and
    /// `params`. On success: builds a canonical descriptor, asks the proof
    /// engine for a signed, Merkle-anchored [`Proof`], appends it to the log
    /// and the Merkle leaf accumulator, fans the proof out to every
    /// configured sink, advances `current`, and returns the proof.
    ///
    /// A policy rejection leaves everything — the log, `current`, and every
    /// sink — untouched. A canonicalization or signing failure aborts before
    /// anything is appended. Once the log append succeeds the transition is
    /// considered to have happened: sink failures are reported (via
    /// `tracing::warn!`, since the proof is already committed and there is
    /// nothing left to roll back) but do not change the return value.
    pub fn transition(
        &mut self,
        to: S,
        action: impl Into<String>,
        params: Value,
    ) -> Result<Proof, KernelError> {
        let from = self.current.clone();
        let action = action.into();

        if !self.policy.can_transition(&from, &to) {
            return Err(KernelError::InvalidTransition {
                from: format!("{from:?}"),
                to: format!("{to:?}"),
            });
        }

        let timestamp = crate::clock::now_millis();
        let descriptor = Value::object([
            (
                "timestamp".to_string(),
                Value(serde_json::Value::Number(timestamp.into())),
            ),
            ("from".to_string(), Value(serde_json::Value::String(format!("{from:?}")))),
            ("to".to_string(), Value(serde_json::Value::String(format!("{to:?}")))),
            ("action".to_string(), Value(serde_json::Value::String(action.clone()))),
            ("params".to_string(), params.clone()),
        ]);

        let canonical_bytes = canonical::canonicalize_checked(&descriptor, &self.limits)?;
        let state_hash_digest = hashing::sha256(&canonical_bytes);
        let state_hash = hashing::to_hex(&state_hash_digest);

        let prev_hash = self
            .log
            .last()
            .map(|entry| entry.proof.state_hash.clone())
            .unwrap_or_default();

        let mut candidate_leaves = self.leaves.clone();
        candidate_leaves.push(state_hash_digest);
        let root = merkle::compute_root(&candidate_leaves);
        let merkle_proof = merkle::build_proof(&candidate_leaves, candidate_leaves.len() - 1)
            .expect("just-pushed leaf index is in range");

        let signature = signing::sign(&self.private_key, &state_hash)?;

        let proof = Proof {
            state_hash,
            prev_hash,
            merkle_root: hashing::to_hex(&root),
            merkle_proof: merkle_proof.to_hex_vec(),
            signature,
            timestamp,
        };

        tracing::debug!(
            agent_id = %self.agent_id,
            session_id = %self.session_id,
            from = ?from,
            to = ?to,
            action = %action,
            "transition accepted"
        );

        self.leaves = candidate_leaves;
        self.log.push(LogEntry {
            from: from.clone(),
            to: to.clone(),
            action: action.clone(),
            params,
            proof: proof.clone(),
        });

        let from_label = format!("{from:?}");
        let to_label = format!("{to:?}");

        if let Err(e) = self.logger.on_transition(
            &self.agent_id,
            &self.session_id,
            &from_label,
            &to_label,
            &action,
            &proof,
        ) {
            tracing::warn!(sink = self.logger.name(), error = %e, "sink failed");
        }
        for sink in &self.sinks {
            if let Err(e) = sink.on_transition(
                &self.agent_id,
                &self.session_id,
                &from_label,
                &to_label,
                &action,
                &proof,
            ) {
                tracing::warn!(sink = sink.name(), error = %e, "sink failed");
            }
        }

        self.current = to;
        Ok(proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::StateId;
    use crate::signing::generate_keypair;
    use crate::sink::DurableStoreSink;

    fn machine_with(sinks: Vec<Arc<dyn Sink>>) -> StateMachine<StateId> {
        let (sk, _pk) = generate_keypair(2048).unwrap();
        let policy = Policy::agent_lifecycle();
        let states = policy.states();
        StateMachine::new(
            "agent-1",
            "session-1",
            sk,
            states,
            policy,
            StateId::new("IDLE"),
            sinks,
        )
        .unwrap()
    }

    #[test]
    fn single_transition_produces_valid_proof() {
        let mut machine = machine_with(vec![]);
        let proof = machine
            .transition(StateId::new("INIT"), "start", Value(serde_json::json!({"foo": 1})))
            .unwrap();
        assert_eq!(proof.prev_hash, "");
        assert_eq!(machine.current_state(), &StateId::new("INIT"));
        let leaf = hashing::from_hex(&proof.state_hash).unwrap();
        assert_eq!(proof.merkle_root, hashing::to_hex(&merkle::compute_root(&[leaf])));
    }

    #[test]
    fn chain_of_three_links_prev_hash() {
        let mut machine = machine_with(vec![]);
        let p0 = machine
            .transition(StateId::new("INIT"), "start", Value::NULL)
            .unwrap();
        let p1 = machine
            .transition(StateId::new("GOAL_PARSE"), "parse", Value::NULL)
            .unwrap();
        let p2 = machine
            .transition(StateId::new("PLANNING"), "plan", Value::NULL)
            .unwrap();
        assert_eq!(p1.prev_hash, p0.state_hash);
        assert_eq!(p2.prev_hash, p1.state_hash);
    }

    #[test]
    fn invalid_transition_leaves_state_untouched() {
        let mut machine = machine_with(vec![]);
        let before_len = machine.log().len();
        let result = machine.transition(StateId::new("EXECUTING"), "skip", Value::NULL);
        assert!(matches!(result, Err(KernelError::InvalidTransition { .. })));
        assert_eq!(machine.log().len(), before_len);
        assert_eq!(machine.current_state(), &StateId::new("IDLE"));
    }

    #[test]
    fn terminal_state_rejects_everything() {
        let (sk, _pk) = generate_keypair(2048).unwrap();
        let policy = Policy::agent_lifecycle();
        let states = policy.states();
        let mut machine = StateMachine::new(
            "agent-1",
            "session-1",
            sk,
            states,
            policy,
            StateId::new("TERMINATED"),
            vec![],
        )
        .unwrap();
        assert!(machine.available().is_empty());
        assert!(machine
            .transition(StateId::new("IDLE"), "resurrect", Value::NULL)
            .is_err());
    }

    #[test]
    fn sinks_receive_every_transition_in_order() {
        let store = Arc::new(DurableStoreSink::new());
        let mut machine = machine_with(vec![store.clone()]);
        machine
            .transition(StateId::new("INIT"), "start", Value::NULL)
            .unwrap();
        machine
            .transition(StateId::new("GOAL_PARSE"), "parse", Value::NULL)
            .unwrap();
        let records = store.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].action, "start");
        assert_eq!(records[1].action, "parse");
    }

    #[test]
    fn construction_rejects_initial_state_outside_declared_states() {
        let (sk, _pk) = generate_keypair(2048).unwrap();
        let policy = Policy::agent_lifecycle();
        let states: BTreeSet<StateId> = [StateId::new("IDLE")].into_iter().collect();
        let result = StateMachine::new(
            "agent-1",
            "session-1",
            sk,
            states,
            policy,
            StateId::new("IDLE"),
            vec![],
        );
        assert!(result.is_err());
    }

    #[test]
    fn logs_reflects_transitions() {
        let mut machine = machine_with(vec![]);
        machine
            .transition(StateId::new("INIT"), "start", Value::NULL)
            .unwrap();
        let logs = machine.logs();
        assert!(logs.contains("session-1"));
        assert!(logs.contains("IDLE->INIT"));
        assert!(logs.contains("start"));
    }
}
