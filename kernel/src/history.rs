//! The versioned branching history tree: independent of
//! the proof log, used by higher layers to record an agent's evolving
//! payload (for example persona snapshots) as a tree where every edge is a
//! deliberate branch event and every node's identifier is stable.

use rand::Rng;

use crate::error::KernelError;
use crate::value::Value;

/// One node in the tree: a stable `"L@V"` version identifier, the level it
/// was created at, its payload, and its children in sibling order.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryNode {
    pub version: String,
    pub level: u32,
    pub data: Value,
    pub children: Vec<HistoryNode>,
}

impl HistoryNode {
    fn to_value(&self) -> Value {
        Value::object([
            (
                "version".to_string(),
                Value(serde_json::Value::String(self.version.clone())),
            ),
            (
                "level".to_string(),
                Value(serde_json::Value::Number(self.level.into())),
            ),
            ("data".to_string(), self.data.clone()),
            (
                "children".to_string(),
                Value(serde_json::Value::Array(
                    self.children.iter().map(|c| c.to_value().0).collect(),
                )),
            ),
        ])
    }

    fn from_json(value: &serde_json::Value) -> Result<Self, KernelError> {
        let obj = value
            .as_object()
            .ok_or_else(|| KernelError::Canonicalization("node is not an object".to_string()))?;
        let version = obj
            .get("version")
            .and_then(|v| v.as_str())
            .ok_or_else(|| KernelError::Canonicalization("node missing version".to_string()))?
            .to_string();
        let level = obj
            .get("level")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| KernelError::Canonicalization("node missing level".to_string()))?
            as u32;
        let data = Value(
            obj.get("data")
                .cloned()
                .ok_or_else(|| KernelError::Canonicalization("node missing data".to_string()))?,
        );
        let children = obj
            .get("children")
            .and_then(|v| v.as_array())
            .ok_or_else(|| KernelError::Canonicalization("node missing children".to_string()))?
            .iter()
            .map(HistoryNode::from_json)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(HistoryNode {
            version,
            level,
            data,
            children,
        })
    }
}

fn collect_versions_at_level(node: &HistoryNode, level: u32, out: &mut Vec<String>) {
    if node.level == level {
        out.push(node.version.clone());
    }
    for child in &node.children {
        collect_versions_at_level(child, level, out);
    }
}

fn find_node<'a>(node: &'a HistoryNode, version: &str) -> Option<&'a HistoryNode> {
    if node.version == version {
        return Some(node);
    }
    node.children.iter().find_map(|c| find_node(c, version))
}

fn find_node_mut<'a>(node: &'a mut HistoryNode, version: &str) -> Option<&'a mut HistoryNode> {
    if node.version == version {
        return Some(node);
    }
    node.children
        .iter_mut()
        .find_map(|c| find_node_mut(c, version))
}

/// A branching tree of payload snapshots. Levels only ever grow; the tree
/// owns a current pointer and a max-level cache.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryTree {
    root: HistoryNode,
    max_level: u32,
    current: String,
}

impl HistoryTree {
    /// Create a tree with a single root node, version `"0@1"`, level 0,
    /// current pointer at the root.
    pub fn new(initial_data: Value) -> Self {
        let root = HistoryNode {
            version: "0@1".to_string(),
            level: 0,
            data: initial_data,
            children: Vec::new(),
        };
        HistoryTree {
            root,
            max_level: 0,
            current: "0@1".to_string(),
        }
    }

    /// The node the current pointer refers to.
    pub fn current(&self) -> &HistoryNode {
        find_node(&self.root, &self.current).expect("current always names an existing node")
    }

    /// The greatest level among all nodes in the tree.
    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    /// Look up any node by its version string.
    pub fn get(&self, version: &str) -> Option<&HistoryNode> {
        find_node(&self.root, version)
    }

    /// Replace the current node's payload in place. This weakens version
    /// stability (the node keeps its identity but its data changes under
    /// it) — a deliberate choice over switching to copy-on-write
    /// versioning; see `DESIGN.md`.
    pub fn update_current(&mut self, data: Value) {
        let current_version = self.current.clone();
        let node =
            find_node_mut(&mut self.root, &current_version).expect("current always exists");
        node.data = data;
    }

    /// Branch from a uniformly random node at `max_level`: choose a parent,
    /// choose a child count `n` uniformly in `1..=4`, build the `n`
    /// candidate version strings `"(max_level+1)@1" .. "(max_level+1)@n"`,
    /// hand them to `produce` alongside `n`, attach whatever `produce`
    /// returns under the chosen parent in order, then move the current
    /// pointer to one of the newly attached children chosen uniformly at
    /// random.
    ///
    /// If `produce` returns fewer than `n` entries, only those are attached
    /// and the current-pointer choice is taken modulo the actual attached
    /// count, rather than validated against `n` (see `DESIGN.md`). If
    /// `produce` returns zero entries, nothing is attached: `max_level` and
    /// the current pointer are left unchanged, since
    /// incrementing `max_level` with no node actually created at the new
    /// level would violate the tree's own invariant that `max_level` equals
    /// the greatest level among all nodes.
    pub fn branch_random<R, F>(&mut self, rng: &mut R, produce: F) -> String
    where
        R: Rng + ?Sized,
        F: FnOnce(usize, &[String]) -> Vec<(Value, String)>,
    {
        let mut candidates = Vec::new();
        collect_versions_at_level(&self.root, self.max_level, &mut candidates);
        let parent_version = candidates[rng.gen_range(0..candidates.len())].clone();

        let n = rng.gen_range(1..=4usize);
        let new_level = self.max_level + 1;
        let versions: Vec<String> = (1..=n).map(|k| format!("{new_level}@{k}")).collect();

        let produced = produce(n, &versions);
        let attached: Vec<HistoryNode> = produced
            .into_iter()
            .map(|(data, version)| HistoryNode {
                version,
                level: new_level,
                data,
                children: Vec::new(),
            })
            .collect();

        if attached.is_empty() {
            return self.current.clone();
        }

        let chosen_index = rng.gen_range(0..n) % attached.len();
        let new_current = attached[chosen_index].version.clone();

        let parent = find_node_mut(&mut self.root, &parent_version).expect("parent exists");
        parent.children.extend(attached);

        self.max_level = new_level;
        self.current = new_current;
        self.current.clone()
    }

    /// Branch using the system-seeded default RNG; the RNG is pluggable for
    /// deterministic tests via `branch_random` directly.
    pub fn branch_random_default<F>(&mut self, produce: F) -> String
    where
        F: FnOnce(usize, &[String]) -> Vec<(Value, String)>,
    {
        let mut rng = rand::thread_rng();
        self.branch_random(&mut rng, produce)
    }

    /// Serialize to the normative wire format: `{ "root", "maxLevel",
    /// "currentNode" }`.
    pub fn save(&self) -> Result<String, KernelError> {
        let value = Value::object([
            ("root".to_string(), self.root.to_value()),
            (
                "maxLevel".to_string(),
                Value(serde_json::Value::Number(self.max_level.into())),
            ),
            (
                "currentNode".to_string(),
                Value(serde_json::Value::String(self.current.clone())),
            ),
        ]);
        serde_json::to_string(value.as_json())
            .map_err(|e| KernelError::Canonicalization(e.to_string()))
    }

    /// Restore a tree from its `save()` output.
    pub fn load(s: &str) -> Result<Self, KernelError> {
        let parsed: serde_json::Value =
            serde_json::from_str(s).map_err(|e| KernelError::Canonicalization(e.to_string()))?;
        let obj = parsed
            .as_object()
            .ok_or_else(|| KernelError::Canonicalization("tree is not an object".to_string()))?;
        let root = obj
            .get("root")
            .ok_or_else(|| KernelError::Canonicalization("tree missing root".to_string()))?;
        let root = HistoryNode::from_json(root)?;
        let max_level = obj
            .get("maxLevel")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| KernelError::Canonicalization("tree missing maxLevel".to_string()))?
            as u32;
        let current = obj
            .get("currentNode")
            .and_then(|v| v.as_str())
            .ok_or_else(|| KernelError::Canonicalization("tree missing currentNode".to_string()))?
            .to_string();
        Ok(HistoryTree {
            root,
            max_level,
            current,
        })
    }

    /// Indented ASCII rendering, with `*` marking the current node.
    pub fn print(&self) -> String {
        let mut out = String::new();
        fn walk(node: &HistoryNode, depth: usize, current: &str, out: &mut String) {
            let marker = if node.version == current { "*" } else { " " };
            out.push_str(&"  ".repeat(depth));
            out.push_str(marker);
            out.push(' ');
            out.push_str(&node.version);
            out.push('\n');
            for child in &node.children {
                walk(child, depth + 1, current, out);
            }
        }
        walk(&self.root, 0, &self.current, &mut out);
        out
    }

    /// One-line-per-node compact rendering, in depth-first order.
    pub fn print_minimal(&self) -> String {
        let mut versions = Vec::new();
        fn walk(node: &HistoryNode, out: &mut Vec<String>) {
            out.push(node.version.clone());
            for child in &node.children {
                walk(child, out);
            }
        }
        walk(&self.root, &mut versions);
        versions.join(" ")
    }
}
