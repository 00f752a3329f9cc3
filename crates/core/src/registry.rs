//! The authoritative conflict set and its derived groupings.
//!
//! A full analysis run replaces the entire set; there is no incremental
//! merge. Consumers read an immutable [`ConflictSnapshot`] behind an `Arc`,
//! so a replacement is atomic from their perspective -- a half-updated view
//! is never observable. Iteration order of branches and files equals
//! first-seen order in the source sequence, keeping the presentation stable
//! across repeated identical analyses.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, info};

use crate::models::Conflict;

/// Ordered grouping: key to the conflicts under it, in first-seen order.
pub type Grouped = Vec<(String, Vec<Conflict>)>;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Immutable point-in-time view of the conflict set and its branch index.
#[derive(Debug, Default)]
pub struct ConflictSnapshot {
    generation: u64,
    conflicts: Vec<Conflict>,
    /// Branch -> conflicts. A conflict touching `branch1` and `branch2`
    /// appears under both. First-seen order.
    branch_index: Grouped,
}

impl ConflictSnapshot {
    fn build(generation: u64, mut conflicts: Vec<Conflict>) -> Self {
        for conflict in &mut conflicts {
            conflict.ensure_id();
        }

        // Single pass; positions keep first-seen order without relying on
        // hash iteration.
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut branch_index: Grouped = Vec::new();
        for conflict in &conflicts {
            for branch in [&conflict.branch1, &conflict.branch2] {
                let idx = *positions.entry(branch.clone()).or_insert_with(|| {
                    branch_index.push((branch.clone(), Vec::new()));
                    branch_index.len() - 1
                });
                branch_index[idx].1.push(conflict.clone());
            }
        }

        Self {
            generation,
            conflicts,
            branch_index,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn by_branch(&self) -> &Grouped {
        &self.branch_index
    }

    /// Conflicts involving `branch`, or an empty slice.
    pub fn branch_conflicts(&self, branch: &str) -> &[Conflict] {
        self.branch_index
            .iter()
            .find(|(name, _)| name == branch)
            .map(|(_, conflicts)| conflicts.as_slice())
            .unwrap_or(&[])
    }

    /// Look up a conflict by ID.
    pub fn get(&self, conflict_id: &str) -> Option<&Conflict> {
        self.conflicts.iter().find(|c| c.id == conflict_id)
    }

    /// All conflicts in one file, in source order.
    pub fn by_file(&self, file: &str) -> Vec<Conflict> {
        self.conflicts
            .iter()
            .filter(|c| c.file == file)
            .cloned()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds the current snapshot and a lazily-built per-branch file grouping.
///
/// `replace` is the only mutator. The file grouping for a branch is computed
/// on first access and cached until the next `replace` (the snapshot
/// generation invalidates the cache).
pub struct ConflictRegistry {
    snapshot: RwLock<Arc<ConflictSnapshot>>,
    file_cache: Mutex<FileCache>,
}

#[derive(Default)]
struct FileCache {
    generation: u64,
    per_branch: HashMap<String, Arc<Grouped>>,
}

impl Default for ConflictRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConflictRegistry {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(ConflictSnapshot::default())),
            file_cache: Mutex::new(FileCache::default()),
        }
    }

    /// Atomically replace the entire conflict set.
    pub fn replace(&self, conflicts: Vec<Conflict>) {
        let next_generation = self.snapshot().generation() + 1;
        let next = Arc::new(ConflictSnapshot::build(next_generation, conflicts));
        info!(
            generation = next.generation(),
            conflicts = next.conflicts().len(),
            branches = next.by_branch().len(),
            "replaced conflict registry"
        );
        *self.snapshot.write().expect("registry lock poisoned") = next;
    }

    /// The current immutable snapshot.
    pub fn snapshot(&self) -> Arc<ConflictSnapshot> {
        self.snapshot
            .read()
            .expect("registry lock poisoned")
            .clone()
    }

    /// Branch -> conflicts, first-seen order.
    pub fn by_branch(&self) -> Grouped {
        self.snapshot().by_branch().clone()
    }

    /// File -> conflicts for one branch, first-seen order. Cached per branch
    /// until the next `replace`.
    pub fn by_branch_and_file(&self, branch: &str) -> Arc<Grouped> {
        let snapshot = self.snapshot();
        let mut cache = self.file_cache.lock().expect("registry cache poisoned");
        if cache.generation != snapshot.generation() {
            cache.generation = snapshot.generation();
            cache.per_branch.clear();
        }
        if let Some(grouped) = cache.per_branch.get(branch) {
            return grouped.clone();
        }

        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut grouped: Grouped = Vec::new();
        for conflict in snapshot.branch_conflicts(branch) {
            let idx = *positions.entry(conflict.file.clone()).or_insert_with(|| {
                grouped.push((conflict.file.clone(), Vec::new()));
                grouped.len() - 1
            });
            grouped[idx].1.push(conflict.clone());
        }

        debug!(branch, files = grouped.len(), "built file grouping");
        let grouped = Arc::new(grouped);
        cache.per_branch.insert(branch.to_string(), grouped.clone());
        grouped
    }

    /// All conflicts in one file.
    pub fn by_file(&self, file: &str) -> Vec<Conflict> {
        self.snapshot().by_file(file)
    }

    /// Look up a conflict by ID in the current snapshot.
    pub fn get(&self, conflict_id: &str) -> Option<Conflict> {
        self.snapshot().get(conflict_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot().conflicts().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
