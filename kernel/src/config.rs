//! Tunable ceilings for the engine, as a plain `Default`-impl struct rather
//! than a layered file-based config loader — this crate is embedded into a
//! host process, not run as a standalone service.

/// Limits an embedder can use to bound the cost of hashing and
/// canonicalizing attacker-influenced `params`/snapshot payloads.
///
/// `max_canonical_depth`, `max_object_fields`, and `max_canonical_bytes` are
/// enforced directly by [`crate::canonical::canonicalize_checked`], which
/// `StateMachine::transition` calls on every descriptor. `max_merkle_leaves`
/// and `max_log_line_len` are not enforced internally — the accumulator and
/// logger sink have no fixed ceiling of their own — but are exposed here so
/// an embedder can check them against `log().len()` / a rendered log line
/// before they become a problem.
#[derive(Debug, Clone)]
pub struct KernelLimits {
    /// Maximum nesting depth accepted by `canonical::canonicalize_checked`.
    pub max_canonical_depth: usize,

    /// Maximum number of fields in any single JSON object encountered
    /// while canonicalizing.
    pub max_object_fields: usize,

    /// Maximum size, in bytes, of a canonicalized value.
    pub max_canonical_bytes: usize,

    /// Maximum number of leaves the Merkle accumulator will build a tree
    /// over in one call. Exceeding this does not corrupt anything; it
    /// exists to keep `O(n)` rebuild-on-append bounded.
    pub max_merkle_leaves: usize,

    /// Maximum length, in bytes, of a single structured-logger line before
    /// it is truncated with an ellipsis.
    pub max_log_line_len: usize,
}

impl Default for KernelLimits {
    fn default() -> Self {
        Self {
            max_canonical_depth: 32,
            max_object_fields: 4096,
            max_canonical_bytes: 1 << 20,
            max_merkle_leaves: 10_000,
            max_log_line_len: 2048,
        }
    }
}

impl KernelLimits {
    /// Override `max_canonical_depth`.
    pub fn with_max_canonical_depth(mut self, depth: usize) -> Self {
        self.max_canonical_depth = depth;
        self
    }

    /// Override `max_object_fields`.
    pub fn with_max_object_fields(mut self, fields: usize) -> Self {
        self.max_object_fields = fields;
        self
    }

    /// Override `max_canonical_bytes`.
    pub fn with_max_canonical_bytes(mut self, bytes: usize) -> Self {
        self.max_canonical_bytes = bytes;
        self
    }

    /// Override `max_merkle_leaves`.
    pub fn with_max_merkle_leaves(mut self, leaves: usize) -> Self {
        self.max_merkle_leaves = leaves;
        self
    }

    /// Loosened limits for tests that intentionally exercise large inputs.
    pub fn permissive() -> Self {
        Self {
            max_canonical_depth: usize::MAX,
            max_object_fields: usize::MAX,
            max_canonical_bytes: usize::MAX,
            max_merkle_leaves: usize::MAX,
            max_log_line_len: usize::MAX,
        }
    }
}
