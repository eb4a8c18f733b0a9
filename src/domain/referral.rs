//! Level-by-level traversal of the referral forests.
//!
//! Both relations are stored as parent pointers on `Member`; traversal works off
//! a "children of X" lookup so no member ever owns its downline.

use super::member::MemberId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::LedgerError;

/// Depth bound of the manually chosen referral tree.
pub const MANUAL_MAX_DEPTH: usize = 7;
/// Depth bound of the auto-fill tree.
pub const AUTO_FILL_MAX_DEPTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralRelation {
    Manual,
    AutoFill,
}

impl ReferralRelation {
    pub const ALL: [ReferralRelation; 2] = [ReferralRelation::Manual, ReferralRelation::AutoFill];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralRelation::Manual => "manual",
            ReferralRelation::AutoFill => "auto_fill",
        }
    }
}

impl fmt::Display for ReferralRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferralRelation {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "manual" | "matrix" => Ok(ReferralRelation::Manual),
            "auto_fill" | "autofill" | "auto" => Ok(ReferralRelation::AutoFill),
            other => Err(LedgerError::not_found(format!("referral relation '{other}'"))),
        }
    }
}

/// The downline of `root`, one entry per level starting at level 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferralLevels {
    pub root: MemberId,
    pub relation: ReferralRelation,
    pub levels: Vec<Vec<MemberId>>,
    /// Set when the node cap stopped the walk early.
    pub truncated: bool,
}

impl ReferralLevels {
    /// Members at `level` (1-based). Out of range levels are empty.
    pub fn level(&self, level: usize) -> &[MemberId] {
        level
            .checked_sub(1)
            .and_then(|i| self.levels.get(i))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn total(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }
}

/// Breadth-first walk state.
///
/// Callers feed the children of the current frontier one level at a time; the
/// walker drops anything already seen (including the root) so malformed cyclic
/// data can neither loop nor emit a member twice, and stops admitting members
/// once `max_visited` is reached.
#[derive(Debug)]
pub struct LevelWalker {
    visited: HashSet<MemberId>,
    max_visited: usize,
    truncated: bool,
}

impl LevelWalker {
    pub fn new(root: MemberId, max_visited: usize) -> Self {
        let mut visited = HashSet::new();
        visited.insert(root);
        Self {
            visited,
            max_visited,
            truncated: false,
        }
    }

    /// Filters one level worth of candidates, preserving their order.
    pub fn admit(&mut self, candidates: impl IntoIterator<Item = MemberId>) -> Vec<MemberId> {
        let mut level = Vec::new();
        for id in candidates {
            if self.visited.len() > self.max_visited {
                self.truncated = true;
                break;
            }
            if self.visited.insert(id) {
                level.push(id);
            }
        }
        level
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

/// Parent id to ordered children ids for one relation.
#[derive(Debug, Clone, Default)]
pub struct ChildIndex {
    children: HashMap<MemberId, Vec<MemberId>>,
}

impl ChildIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link(&mut self, parent: MemberId, child: MemberId) {
        let entry = self.children.entry(parent).or_default();
        if !entry.contains(&child) {
            entry.push(child);
            entry.sort();
        }
    }

    pub fn unlink(&mut self, parent: MemberId, child: MemberId) {
        if let Some(entry) = self.children.get_mut(&parent) {
            entry.retain(|c| *c != child);
        }
    }

    pub fn children(&self, parent: MemberId) -> &[MemberId] {
        self.children
            .get(&parent)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> Vec<MemberId> {
        raw.iter().copied().map(MemberId).collect()
    }

    fn index(edges: &[(u64, u64)]) -> ChildIndex {
        let mut index = ChildIndex::new();
        for (parent, child) in edges {
            index.link(MemberId(*parent), MemberId(*child));
        }
        index
    }

    fn enumerate_levels(
        index: &ChildIndex,
        root: MemberId,
        relation: ReferralRelation,
        depth: usize,
        max_visited: usize,
    ) -> ReferralLevels {
        let mut walker = LevelWalker::new(root, max_visited);
        let mut levels = Vec::new();
        let mut frontier = vec![root];
        for _ in 0..depth {
            let candidates = frontier
                .iter()
                .flat_map(|parent| index.children(*parent).iter().copied());
            let level = walker.admit(candidates);
            frontier = level.clone();
            levels.push(level);
        }
        ReferralLevels {
            root,
            relation,
            levels,
            truncated: walker.is_truncated(),
        }
    }

    #[test]
    fn test_levels_follow_parent_then_child_order() {
        let index = index(&[(1, 2), (1, 3), (2, 4), (3, 5), (2, 6), (4, 7)]);
        let levels = enumerate_levels(&index, MemberId(1), ReferralRelation::Manual, 4, 1000);
        assert_eq!(levels.levels.len(), 4);
        assert_eq!(levels.level(1), ids(&[2, 3]).as_slice());
        assert_eq!(levels.level(2), ids(&[4, 6, 5]).as_slice());
        assert_eq!(levels.level(3), ids(&[7]).as_slice());
        assert!(levels.level(4).is_empty());
        assert_eq!(levels.total(), 6);
        assert!(!levels.truncated);
    }

    #[test]
    fn test_leaf_member_yields_empty_levels() {
        let index = index(&[(1, 2)]);
        let levels = enumerate_levels(&index, MemberId(2), ReferralRelation::AutoFill, 10, 1000);
        assert_eq!(levels.levels.len(), 10);
        assert!(levels.levels.iter().all(Vec::is_empty));
    }

    #[test]
    fn test_cycle_does_not_revisit() {
        // 1 -> 2 -> 3 -> 1 is corrupt data
        let index = index(&[(1, 2), (2, 3), (3, 1), (3, 2)]);
        let levels = enumerate_levels(&index, MemberId(1), ReferralRelation::Manual, 7, 1000);
        assert_eq!(levels.level(1), ids(&[2]).as_slice());
        assert_eq!(levels.level(2), ids(&[3]).as_slice());
        assert!(levels.levels[2..].iter().all(Vec::is_empty));
        assert_eq!(levels.total(), 2);
    }

    #[test]
    fn test_node_cap_truncates() {
        let edges: Vec<(u64, u64)> = (2..=50).map(|child| (1, child)).collect();
        let index = index(&edges);
        let levels = enumerate_levels(&index, MemberId(1), ReferralRelation::Manual, 2, 10);
        assert!(levels.truncated);
        assert_eq!(levels.level(1).len(), 10);
    }

    #[test]
    fn test_level_out_of_range_is_empty() {
        let levels = enumerate_levels(&ChildIndex::new(), MemberId(1), ReferralRelation::Manual, 3, 10);
        assert!(levels.level(0).is_empty());
        assert!(levels.level(99).is_empty());
    }

    #[test]
    fn test_unlink_moves_child() {
        let mut index = index(&[(1, 3), (1, 2)]);
        assert_eq!(index.children(MemberId(1)), ids(&[2, 3]).as_slice());
        index.unlink(MemberId(1), MemberId(3));
        index.link(MemberId(2), MemberId(3));
        index.link(MemberId(2), MemberId(3));
        assert_eq!(index.children(MemberId(1)), ids(&[2]).as_slice());
        assert_eq!(index.children(MemberId(2)), ids(&[3]).as_slice());
        assert!(index.children(MemberId(9)).is_empty());
    }

    #[test]
    fn test_relation_parsing() {
        assert_eq!("auto-fill".parse::<ReferralRelation>().unwrap(), ReferralRelation::AutoFill);
        assert_eq!("Manual".parse::<ReferralRelation>().unwrap(), ReferralRelation::Manual);
        assert!("sideways".parse::<ReferralRelation>().is_err());
    }
}
