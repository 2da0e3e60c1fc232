//! Sinks receive each finished [`Proof`](crate::signing::Proof) as it is
//! appended to the log. A sink must be idempotent with
//! respect to `(agent_id, session_id, proof.state_hash)` and must never
//! reorder; it may deduplicate.

use std::sync::Mutex;

use crate::error::KernelError;
use crate::signing::Proof;

/// A consumer of finished proofs. Object-safe so a [`crate::machine::StateMachine`]
/// can hold a heterogeneous `Vec<Arc<dyn Sink>>` and fan a proof out to all of them.
/// `Send + Sync` so `Arc<dyn Sink>`, and therefore `StateMachine<S>` itself, can
/// cross threads — the "one mutex per machine" sharing model spec.md §5 prescribes
/// needs `StateMachine<S>: Send` to put it behind a `Mutex` shared across threads.
pub trait Sink: Send + Sync {
    /// Receive one finished transition. Implementations must not reorder
    /// calls relative to the order they were invoked in.
    fn on_transition(
        &self,
        agent_id: &str,
        session_id: &str,
        from: &str,
        to: &str,
        action: &str,
        proof: &Proof,
    ) -> Result<(), KernelError>;

    /// A short name used in `SinkError` and diagnostic tracing.
    fn name(&self) -> &str;
}

/// One recorded log line, kept structured so `getLogs` can filter by session
/// without re-parsing the rendered banner.
struct LogEntry {
    session_id: String,
    line: String,
}

/// The reference structured logger sink: an in-memory, queryable buffer of
/// human-oriented lines, not a substitute for the crate's own `tracing`
/// diagnostics (see `crate::machine`).
pub struct StructuredLoggerSink {
    entries: Mutex<Vec<LogEntry>>,
}

impl StructuredLoggerSink {
    /// Create an empty logger sink.
    pub fn new() -> Self {
        StructuredLoggerSink {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Render the truncated signature form used in log lines: first 8 and
    /// last 8 hex characters, with the full length in parentheses. A
    /// signature shorter than 16 characters is shown in full.
    fn truncate_signature(signature: &str) -> String {
        let len = signature.len();
        if len <= 16 {
            format!("{signature} ({len})")
        } else {
            let prefix = &signature[..8];
            let suffix = &signature[len - 8..];
            format!("{prefix}...{suffix} ({len})")
        }
    }

    /// Return the header banner followed by the joined log lines recorded
    /// for `session_id`. The banner is decorative and must not be parsed.
    pub fn get_logs(&self, session_id: &str) -> String {
        let entries = self.entries.lock().expect("log mutex poisoned");
        let mut out = format!("=== transition log: session {session_id} ===\n");
        let lines: Vec<&str> = entries
            .iter()
            .filter(|e| e.session_id == session_id)
            .map(|e| e.line.as_str())
            .collect();
        out.push_str(&lines.join("\n"));
        out
    }
}

impl Default for StructuredLoggerSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for StructuredLoggerSink {
    fn on_transition(
        &self,
        agent_id: &str,
        session_id: &str,
        from: &str,
        to: &str,
        action: &str,
        proof: &Proof,
    ) -> Result<(), KernelError> {
        let sig = Self::truncate_signature(&proof.signature);
        let line = format!(
            "[{}] {} {} {}->{}: {}; sig({})",
            proof.timestamp, agent_id, session_id, from, to, action, sig
        );
        self.entries
            .lock()
            .map_err(|e| KernelError::Sink {
                sink: self.name().to_string(),
                reason: e.to_string(),
            })?
            .push(LogEntry {
                session_id: session_id.to_string(),
                line,
            });
        Ok(())
    }

    fn name(&self) -> &str {
        "structured_logger"
    }
}

/// One durable-store record: `(agent_id, session_id, from, to, action, proof_json)`
/// keyed by a monotonic identifier assigned by the store.
#[derive(Clone, Debug)]
pub struct DurableRecord {
    /// Monotonic identifier assigned by the store, starting at 0.
    pub id: u64,
    pub agent_id: String,
    pub session_id: String,
    pub from: String,
    pub to: String,
    pub action: String,
    pub proof_json: crate::value::Value,
}

/// An in-memory stand-in for a durable broadcast store. Real deployments
/// would swap this for a network client; the append-only contract and
/// monotonic id assignment are what the engine actually depends on.
pub struct DurableStoreSink {
    records: Mutex<Vec<DurableRecord>>,
}

impl DurableStoreSink {
    /// Create an empty durable store.
    pub fn new() -> Self {
        DurableStoreSink {
            records: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot every record persisted so far, in append order.
    pub fn records(&self) -> Vec<DurableRecord> {
        self.records.lock().expect("durable store mutex poisoned").clone()
    }
}

impl Default for DurableStoreSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for DurableStoreSink {
    fn on_transition(
        &self,
        agent_id: &str,
        session_id: &str,
        from: &str,
        to: &str,
        action: &str,
        proof: &Proof,
    ) -> Result<(), KernelError> {
        let mut records = self.records.lock().map_err(|e| KernelError::Sink {
            sink: self.name().to_string(),
            reason: e.to_string(),
        })?;
        let id = records.len() as u64;
        records.push(DurableRecord {
            id,
            agent_id: agent_id.to_string(),
            session_id: session_id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            action: action.to_string(),
            proof_json: proof.to_value(),
        });
        Ok(())
    }

    fn name(&self) -> &str {
        "durable_store"
    }
}
