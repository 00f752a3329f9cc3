//! Toolkit-neutral rows for the conflict tree view.
//!
//! The hierarchy is branch -> file -> conflict, derived entirely from the
//! registry's current snapshot. The host UI renders these rows however it
//! likes; nothing here knows about a widget toolkit.

use std::sync::Arc;

use crate::models::Conflict;
use crate::registry::ConflictRegistry;

/// One row in the conflict tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    Branch {
        name: String,
        conflict_count: usize,
    },
    File {
        branch: String,
        path: String,
        conflict_count: usize,
    },
    Conflict {
        id: String,
        file: String,
        branch1: String,
        branch2: String,
        line_start: u32,
        line_end: u32,
    },
}

impl TreeNode {
    fn conflict(c: &Conflict) -> Self {
        Self::Conflict {
            id: c.id.clone(),
            file: c.file.clone(),
            branch1: c.branch1.clone(),
            branch2: c.branch2.clone(),
            line_start: c.line_start,
            line_end: c.line_end,
        }
    }

    /// Primary display text.
    pub fn label(&self) -> String {
        match self {
            Self::Branch { name, .. } => name.clone(),
            Self::File { path, .. } => path.clone(),
            Self::Conflict {
                line_start,
                line_end,
                ..
            } => format!("lines {line_start}-{line_end}"),
        }
    }

    /// Secondary display text.
    pub fn description(&self) -> String {
        match self {
            Self::Branch { conflict_count, .. } | Self::File { conflict_count, .. } => {
                format!(
                    "{conflict_count} conflict{}",
                    if *conflict_count == 1 { "" } else { "s" }
                )
            }
            Self::Conflict {
                branch1, branch2, ..
            } => format!("{branch1} vs {branch2}"),
        }
    }
}

/// Top-level rows: every branch with at least one conflict, first-seen order.
pub fn branch_rows(registry: &ConflictRegistry) -> Vec<TreeNode> {
    registry
        .by_branch()
        .iter()
        .map(|(name, conflicts)| TreeNode::Branch {
            name: name.clone(),
            conflict_count: conflicts.len(),
        })
        .collect()
}

/// Children of a branch row: its files, first-seen order.
pub fn file_rows(registry: &ConflictRegistry, branch: &str) -> Vec<TreeNode> {
    registry
        .by_branch_and_file(branch)
        .iter()
        .map(|(path, conflicts)| TreeNode::File {
            branch: branch.to_string(),
            path: path.clone(),
            conflict_count: conflicts.len(),
        })
        .collect()
}

/// Children of a file row: its conflicts, source order.
pub fn conflict_rows(registry: &ConflictRegistry, branch: &str, file: &str) -> Vec<TreeNode> {
    let grouped: Arc<_> = registry.by_branch_and_file(branch);
    grouped
        .iter()
        .find(|(path, _)| path == file)
        .map(|(_, conflicts)| conflicts.iter().map(TreeNode::conflict).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_registry() -> ConflictRegistry {
        let registry = ConflictRegistry::new();
        registry.replace(vec![
            Conflict::new("a.ts", "main", "feature-x", 5, 7, "l", "r"),
            Conflict::new("a.ts", "main", "feature-x", 20, 21, "l", "r"),
            Conflict::new("b.ts", "main", "dev", 1, 1, "l", "r"),
        ]);
        registry
    }

    #[test]
    fn test_branch_rows_order_and_counts() {
        let registry = sample_registry();
        let rows = branch_rows(&registry);
        assert_eq!(
            rows,
            vec![
                TreeNode::Branch {
                    name: "main".into(),
                    conflict_count: 3,
                },
                TreeNode::Branch {
                    name: "feature-x".into(),
                    conflict_count: 2,
                },
                TreeNode::Branch {
                    name: "dev".into(),
                    conflict_count: 1,
                },
            ]
        );
    }

    #[test]
    fn test_file_rows_group_within_branch() {
        let registry = sample_registry();
        let rows = file_rows(&registry, "main");
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            TreeNode::File {
                branch: "main".into(),
                path: "a.ts".into(),
                conflict_count: 2,
            }
        );
        assert_eq!(rows[1].label(), "b.ts");
    }

    #[test]
    fn test_conflict_rows_and_labels() {
        let registry = sample_registry();
        let rows = conflict_rows(&registry, "feature-x", "a.ts");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label(), "lines 5-7");
        assert_eq!(rows[0].description(), "main vs feature-x");
        assert!(matches!(
            &rows[0],
            TreeNode::Conflict { id, .. } if id == "a.ts:main:feature-x:5:7"
        ));
    }

    #[test]
    fn test_unknown_branch_or_file_yields_no_rows() {
        let registry = sample_registry();
        assert!(file_rows(&registry, "missing").is_empty());
        assert!(conflict_rows(&registry, "main", "missing.ts").is_empty());
    }

    #[test]
    fn test_description_pluralization() {
        let row = TreeNode::Branch {
            name: "main".into(),
            conflict_count: 1,
        };
        assert_eq!(row.description(), "1 conflict");
    }
}
