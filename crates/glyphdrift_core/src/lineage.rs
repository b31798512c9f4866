//! Branch lineage resolution.
//!
//! # Responsibility
//! - Walk `parent_branch_id` links into root-to-tip ancestor chains.
//! - Find the lowest common ancestor of two chains.
//!
//! # Invariants
//! - Walks stop at a missing parent row or a revisited id; neither is an
//!   error, the chain collected so far is returned.
//! - Walk length is bounded by the number of distinct branches.

use std::collections::HashSet;

use crate::model::branch::{Branch, BranchId};

/// Builds the root-to-tip lineage ending at `tip`, inclusive.
///
/// `fetch` loads a branch by id; `Ok(None)` means the parent row is gone
/// and ends the walk.
pub fn resolve_lineage<E>(
    tip: Branch,
    mut fetch: impl FnMut(BranchId) -> Result<Option<Branch>, E>,
) -> Result<Vec<Branch>, E> {
    let mut visited = HashSet::from([tip.id]);
    let mut cursor = tip.parent_branch_id;
    let mut chain = vec![tip];

    while let Some(parent_id) = cursor {
        if !visited.insert(parent_id) {
            break;
        }
        let Some(parent) = fetch(parent_id)? else {
            break;
        };
        cursor = parent.parent_branch_id;
        chain.push(parent);
    }

    chain.reverse();
    Ok(chain)
}

/// Deepest branch present in both lineages, or `None` when they share no
/// ancestor.
///
/// Both slices are root-to-tip. The right lineage is scanned in order and
/// the last id also present on the left wins.
pub fn find_lca(left: &[Branch], right: &[Branch]) -> Option<BranchId> {
    let left_ids: HashSet<BranchId> = left.iter().map(|branch| branch.id).collect();
    right
        .iter()
        .rev()
        .find(|branch| left_ids.contains(&branch.id))
        .map(|branch| branch.id)
}
