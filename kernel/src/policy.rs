//! The transition policy: an immutable, generic directed graph of allowed
//! `StateId` transitions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::Hash;

/// An adjacency map built once at construction and never mutated afterward.
/// Lookup is amortized constant time; the policy holds no references to any
/// running state machine, it is pure data.
#[derive(Clone, Debug)]
pub struct Policy<S: Clone + Eq + Ord + Hash + fmt::Debug> {
    edges: BTreeMap<S, BTreeSet<S>>,
}

impl<S: Clone + Eq + Ord + Hash + fmt::Debug> Policy<S> {
    /// Build a policy from an explicit edge list. States that only ever
    /// appear as a destination still need their own (possibly empty) entry
    /// if they are to be considered known to the policy; see
    /// [`Policy::states`].
    pub fn new(edges: impl IntoIterator<Item = (S, Vec<S>)>) -> Self {
        let mut map = BTreeMap::new();
        for (from, tos) in edges {
            map.entry(from).or_insert_with(BTreeSet::new).extend(tos);
        }
        Policy { edges: map }
    }

    /// All states the policy knows about, whether or not they have outgoing edges.
    pub fn states(&self) -> BTreeSet<S> {
        let mut all: BTreeSet<S> = self.edges.keys().cloned().collect();
        for tos in self.edges.values() {
            all.extend(tos.iter().cloned());
        }
        all
    }

    /// Whether `from -> to` is a permitted edge.
    pub fn can_transition(&self, from: &S, to: &S) -> bool {
        self.edges.get(from).is_some_and(|tos| tos.contains(to))
    }

    /// The set of states reachable from `from` in one step. A state with an
    /// empty (or absent) outgoing set is terminal.
    pub fn allowed(&self, from: &S) -> BTreeSet<S> {
        self.edges.get(from).cloned().unwrap_or_default()
    }

    /// Whether `state` has no outgoing edges.
    pub fn is_terminal(&self, state: &S) -> bool {
        self.allowed(state).is_empty()
    }
}

/// A `StateId` newtype backed by a cheaply cloned `Arc<str>`, the default
/// concrete state type so callers can use plain string labels without
/// defining a per-domain enum.
#[derive(Clone, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct StateId(std::sync::Arc<str>);

impl StateId {
    /// Build a `StateId` from any string-like value.
    pub fn new(label: impl AsRef<str>) -> Self {
        StateId(std::sync::Arc::from(label.as_ref()))
    }

    /// Borrow the underlying label.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StateId {
    fn from(s: &str) -> Self {
        StateId::new(s)
    }
}

impl Policy<StateId> {
    /// The reference agent-lifecycle policy, shipped as a convenience
    /// constructor so the graph is exercised directly by tests and
    /// available to embedders without hand-transcribing it.
    pub fn agent_lifecycle() -> Self {
        fn s(label: &str) -> StateId {
            StateId::new(label)
        }
        fn edge(from: &str, to: &[&str]) -> (StateId, Vec<StateId>) {
            (s(from), to.iter().map(|t| s(t)).collect())
        }

        Policy::new([
            edge("IDLE", &["INIT", "ERROR", "TERMINATED"]),
            edge("INIT", &["GOAL_PARSE", "ERROR", "TERMINATED", "IDLE"]),
            edge("GOAL_PARSE", &["PLANNING", "ERROR", "TERMINATED", "IDLE"]),
            edge(
                "PLANNING",
                &["PLANNING", "EXECUTING", "ERROR", "TERMINATED", "IDLE"],
            ),
            edge(
                "EXECUTING",
                &[
                    "EXECUTING",
                    "VALIDATING",
                    "REPORTING",
                    "ERROR",
                    "TERMINATED",
                    "IDLE",
                ],
            ),
            edge(
                "VALIDATING",
                &[
                    "VALIDATING",
                    "COMPLETED",
                    "REPORTING",
                    "EXECUTING",
                    "ERROR",
                    "TERMINATED",
                    "IDLE",
                ],
            ),
            edge(
                "REPORTING",
                &["VALIDATING", "REPORTING", "COMPLETED", "ERROR", "TERMINATED", "IDLE"],
            ),
            edge("COMPLETED", &["TERMINATED", "IDLE"]),
            edge("ERROR", &["TERMINATED", "IDLE"]),
            edge("TERMINATED", &[]),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_policy_allows_declared_edges() {
        let policy = Policy::new([("a", vec!["b", "c"]), ("b", vec![])]);
        assert!(policy.can_transition(&"a", &"b"));
        assert!(policy.can_transition(&"a", &"c"));
        assert!(!policy.can_transition(&"a", &"z"));
        assert!(!policy.can_transition(&"b", &"a"));
    }

    #[test]
    fn terminal_state_has_no_allowed_transitions() {
        let policy = Policy::new([("a", vec!["b"]), ("b", vec![])]);
        assert!(policy.is_terminal(&"b"));
        assert!(policy.allowed(&"b").is_empty());
    }

    #[test]
    fn unknown_state_is_treated_as_terminal() {
        let policy: Policy<&str> = Policy::new([("a", vec!["b"])]);
        assert!(policy.allowed(&"zzz").is_empty());
        assert!(!policy.can_transition(&"zzz", &"a"));
    }

    #[test]
    fn agent_lifecycle_matches_reference_table() {
        let policy = Policy::agent_lifecycle();
        let idle = StateId::new("IDLE");
        let init = StateId::new("INIT");
        let executing = StateId::new("EXECUTING");
        let terminated = StateId::new("TERMINATED");

        assert!(policy.can_transition(&idle, &init));
        assert!(!policy.can_transition(&idle, &executing));
        assert!(policy.is_terminal(&terminated));
        assert!(policy.allowed(&terminated).is_empty());
    }

    #[test]
    fn self_loops_are_permitted() {
        let policy = Policy::agent_lifecycle();
        let planning = StateId::new("PLANNING");
        assert!(policy.can_transition(&planning, &planning));
    }
}
