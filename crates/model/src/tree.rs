//! Folder hierarchy builder.
//!
//! The backend's `get_folder_tree` procedure returns folders as a flat,
//! unordered list. [`build_folder_tree`] converts that list into a forest of
//! [`FolderTreeNode`]s with deterministic ordering, suitable for indented
//! rendering. The builder is a pure, total function: it performs no I/O and
//! cannot fail.
//!
//! # Policies
//! - A folder whose parent does not resolve to any input record (dangling
//!   reference, e.g. the parent was deleted concurrently) becomes a root.
//! - Cycles are not detected. The builder only ever descends through the
//!   children lists it populated, so it cannot loop; folders that are only
//!   reachable through a cycle are simply not reachable from any root.
//! - No depth limit is enforced.

use crate::{Folder, FolderId};
use std::collections::{HashMap, HashSet};

/// A [`Folder`] with its ordered children and a UI-only expansion flag.
///
/// Trees are rebuilt from scratch after every folder-affecting action rather
/// than patched in place; use [`expanded_ids`] and [`restore_expanded`] to
/// carry the user's expansion state across a rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderTreeNode {
    pub folder: Folder,
    /// Sorted by folder name (ordinal, case-sensitive).
    pub children: Vec<FolderTreeNode>,
    /// Not persisted. Always `false` straight out of the builder.
    pub expanded: bool,
}
impl FolderTreeNode {
    fn new(folder: Folder) -> Self {
        Self { folder, children: Vec::new(), expanded: false }
    }

    pub fn id(&self) -> FolderId {
        self.folder.id
    }

    pub fn name(&self) -> &str {
        self.folder.name.as_str()
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(FolderTreeNode::len).sum::<usize>()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Converts a flat sequence of folders into an ordered forest.
///
/// Roots are the folders without a parent, or whose parent is not present in
/// the input. Siblings at every level are sorted by name using ordinal string
/// comparison; the sort is stable, so exact-name duplicates keep their input
/// order.
///
/// ```
/// # use docshelf_model::{Folder, FolderName, build_folder_tree};
/// # fn folder(id: u128, name: &str, parent: Option<u128>) -> Folder {
/// #     let now = time::OffsetDateTime::UNIX_EPOCH;
/// #     Folder {
/// #         id: uuid::Uuid::from_u128(id).into(),
/// #         user_id: uuid::Uuid::nil().into(),
/// #         name: FolderName::new(name).unwrap(),
/// #         parent_id: parent.map(|p| uuid::Uuid::from_u128(p).into()),
/// #         document_count: 0,
/// #         created_at: now,
/// #         updated_at: now,
/// #         is_deleted: false,
/// #     }
/// # }
/// let tree = build_folder_tree([
///     folder(1, "Bills", None),
///     folder(2, "Archive", None),
///     folder(3, "Current", Some(1)),
/// ]);
/// let names: Vec<_> = tree.iter().map(|node| node.name()).collect();
/// assert_eq!(names, ["Archive", "Bills"]);
/// assert_eq!(tree[1].children[0].name(), "Current");
/// ```
pub fn build_folder_tree(folders: impl IntoIterator<Item = Folder>) -> Vec<FolderTreeNode> {
    let mut slots: Vec<Option<FolderTreeNode>> = folders.into_iter().map(|f| Some(FolderTreeNode::new(f))).collect();
    // Pass one: id -> position. Indices stand in for the node references so
    // nothing is linked before every record has been seen.
    let lookup: HashMap<FolderId, usize> =
        slots.iter().enumerate().filter_map(|(i, node)| node.as_ref().map(|n| (n.id(), i))).collect();
    // Pass two: attach each record to its parent, or to the roots.
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); slots.len()];
    let mut roots = Vec::new();
    for (i, node) in slots.iter().enumerate() {
        let parent = node.as_ref().and_then(|n| n.folder.parent_id).and_then(|p| lookup.get(&p));
        match parent {
            Some(&parent) => children[parent].push(i),
            None => roots.push(i),
        }
    }
    let mut forest: Vec<FolderTreeNode> = roots.into_iter().filter_map(|i| assemble(i, &mut slots, &children)).collect();
    sort_siblings(&mut forest);
    forest
}

fn assemble(index: usize, slots: &mut [Option<FolderTreeNode>], children: &[Vec<usize>]) -> Option<FolderTreeNode> {
    // Each slot is taken exactly once, so a record can never be duplicated.
    let mut node = slots[index].take()?;
    node.children = children[index].iter().filter_map(|&child| assemble(child, slots, children)).collect();
    Some(node)
}

fn sort_siblings(nodes: &mut [FolderTreeNode]) {
    nodes.sort_by(|a, b| a.name().cmp(b.name()));
    for node in nodes {
        sort_siblings(&mut node.children);
    }
}

/// Total number of nodes in the forest.
pub fn count(forest: &[FolderTreeNode]) -> usize {
    forest.iter().map(FolderTreeNode::len).sum()
}

/// Depth-first, pre-order flattening of the whole forest with each node's
/// depth (roots are at depth zero).
pub fn flatten(forest: &[FolderTreeNode]) -> Vec<(usize, &FolderTreeNode)> {
    fn walk<'a>(nodes: &'a [FolderTreeNode], depth: usize, out: &mut Vec<(usize, &'a FolderTreeNode)>) {
        for node in nodes {
            out.push((depth, node));
            walk(&node.children, depth + 1, out);
        }
    }
    let mut out = Vec::new();
    walk(forest, 0, &mut out);
    out
}

/// Like [`flatten`], but only descends into expanded nodes. This is the list
/// a sidebar renders.
pub fn visible(forest: &[FolderTreeNode]) -> Vec<(usize, &FolderTreeNode)> {
    fn walk<'a>(nodes: &'a [FolderTreeNode], depth: usize, out: &mut Vec<(usize, &'a FolderTreeNode)>) {
        for node in nodes {
            out.push((depth, node));
            if node.expanded {
                walk(&node.children, depth + 1, out);
            }
        }
    }
    let mut out = Vec::new();
    walk(forest, 0, &mut out);
    out
}

pub fn find(forest: &[FolderTreeNode], id: FolderId) -> Option<&FolderTreeNode> {
    forest.iter().find_map(|node| if node.id() == id { Some(node) } else { find(&node.children, id) })
}

pub fn find_mut(forest: &mut [FolderTreeNode], id: FolderId) -> Option<&mut FolderTreeNode> {
    for node in forest {
        if node.id() == id {
            return Some(node);
        }
        if let Some(found) = find_mut(&mut node.children, id) {
            return Some(found);
        }
    }
    None
}

/// Returns `true` if `candidate` is `ancestor` itself or sits anywhere below
/// it. Used to refuse moving a folder underneath itself.
pub fn is_within(forest: &[FolderTreeNode], ancestor: FolderId, candidate: FolderId) -> bool {
    find(forest, ancestor).is_some_and(|node| find(std::slice::from_ref(node), candidate).is_some())
}

/// Folders from the root down to (and including) `id`.
pub fn path_to(forest: &[FolderTreeNode], id: FolderId) -> Vec<&Folder> {
    fn walk<'a>(nodes: &'a [FolderTreeNode], id: FolderId, path: &mut Vec<&'a Folder>) -> bool {
        for node in nodes {
            path.push(&node.folder);
            if node.id() == id || walk(&node.children, id, path) {
                return true;
            }
            path.pop();
        }
        false
    }
    let mut path = Vec::new();
    walk(forest, id, &mut path);
    path
}

/// Flips the expansion flag of one node. Returns the new state, or `None` if
/// the folder isn't in the forest.
pub fn toggle(forest: &mut [FolderTreeNode], id: FolderId) -> Option<bool> {
    find_mut(forest, id).map(|node| {
        node.expanded = !node.expanded;
        node.expanded
    })
}

pub fn expanded_ids(forest: &[FolderTreeNode]) -> HashSet<FolderId> {
    flatten(forest).into_iter().filter(|(_, node)| node.expanded).map(|(_, node)| node.id()).collect()
}

/// Re-applies expansion state captured by [`expanded_ids`] to a freshly
/// rebuilt forest. Ids that no longer exist are ignored.
pub fn restore_expanded(forest: &mut [FolderTreeNode], expanded: &HashSet<FolderId>) {
    for node in forest {
        node.expanded = expanded.contains(&node.id());
        restore_expanded(&mut node.children, expanded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FolderName;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn id(n: u128) -> FolderId {
        Uuid::from_u128(n).into()
    }

    fn folder(n: u128, name: &str, parent: Option<u128>) -> Folder {
        Folder {
            id: id(n),
            user_id: Uuid::nil().into(),
            name: FolderName::new(name).unwrap(),
            parent_id: parent.map(id),
            document_count: 0,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
            is_deleted: false,
        }
    }

    fn names(nodes: &[FolderTreeNode]) -> Vec<&str> {
        nodes.iter().map(FolderTreeNode::name).collect()
    }

    /// Checks every structural property the builder promises for acyclic input.
    fn assert_well_formed(input: &[Folder], forest: &[FolderTreeNode]) {
        assert_eq!(count(forest), input.len(), "every record appears exactly once");
        let present: HashSet<FolderId> = input.iter().map(|f| f.id).collect();
        for root in forest {
            assert!(
                root.folder.parent_id.is_none_or(|p| !present.contains(&p)),
                "{} has a resolvable parent but was placed at the root",
                root.name()
            );
        }
        for (_, node) in flatten(forest) {
            for child in &node.children {
                assert_eq!(child.folder.parent_id, Some(node.id()));
            }
            assert!(node.children.windows(2).all(|w| w[0].name() <= w[1].name()));
            assert!(!node.expanded);
        }
        assert!(forest.windows(2).all(|w| w[0].name() <= w[1].name()));
    }

    #[test]
    fn test_empty_input() {
        assert!(build_folder_tree(Vec::new()).is_empty());
    }

    #[test]
    fn test_single_root() {
        let forest = build_folder_tree([folder(1, "Only", None)]);
        assert_eq!(forest.len(), 1);
        assert!(forest[0].is_leaf());
        assert!(!forest[0].expanded);
    }

    #[test]
    fn test_sorted_roots_with_child() {
        let forest = build_folder_tree([folder(1, "B", None), folder(2, "A", None), folder(3, "C", Some(1))]);
        assert_eq!(names(&forest), ["A", "B"]);
        assert!(forest[0].is_leaf());
        assert_eq!(names(&forest[1].children), ["C"]);
    }

    #[test]
    fn test_children_before_parents() {
        let input = vec![
            folder(4, "Deep", Some(3)),
            folder(3, "Middle", Some(1)),
            folder(2, "Sibling", Some(1)),
            folder(1, "Top", None),
        ];
        let forest = build_folder_tree(input.clone());
        assert_well_formed(&input, &forest);
        assert_eq!(names(&forest), ["Top"]);
        assert_eq!(names(&forest[0].children), ["Middle", "Sibling"]);
        assert_eq!(names(&forest[0].children[0].children), ["Deep"]);
    }

    #[test]
    fn test_dangling_parent_becomes_root() {
        let input = vec![folder(1, "Kept", None), folder(2, "Orphan", Some(99)), folder(3, "Under Orphan", Some(2))];
        let forest = build_folder_tree(input.clone());
        assert_well_formed(&input, &forest);
        assert_eq!(names(&forest), ["Kept", "Orphan"]);
        assert_eq!(names(&forest[1].children), ["Under Orphan"]);
    }

    #[test]
    fn test_ordinal_case_sensitive_sort() {
        let forest = build_folder_tree([folder(1, "beta", None), folder(2, "Zulu", None), folder(3, "alpha", None)]);
        // Uppercase sorts before lowercase under ordinal comparison.
        assert_eq!(names(&forest), ["Zulu", "alpha", "beta"]);
    }

    #[test]
    fn test_duplicate_names_keep_input_order() {
        let forest = build_folder_tree([folder(1, "Same", None), folder(2, "Same", None), folder(3, "Same", None)]);
        let ids: Vec<_> = forest.iter().map(FolderTreeNode::id).collect();
        assert_eq!(ids, [id(1), id(2), id(3)]);
    }

    #[test]
    fn test_cycle_terminates_without_duplicates() {
        let forest =
            build_folder_tree([folder(1, "Cycle A", Some(2)), folder(2, "Cycle B", Some(1)), folder(3, "Fine", None)]);
        assert_eq!(names(&forest), ["Fine"]);
        assert_eq!(count(&forest), 1);
        let forest = build_folder_tree([folder(1, "Self", Some(1))]);
        assert!(forest.is_empty());
    }

    #[test]
    fn test_generated_inputs_are_well_formed() {
        // Deterministic pseudo-random forests in shuffled order; parents are
        // always chosen from earlier ids so the input is acyclic.
        let mut seed: u64 = 0x5eed;
        let mut next = move |bound: u64| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) % bound
        };
        for size in [1u64, 2, 5, 17, 64, 200] {
            let mut input: Vec<Folder> = (1..=size)
                .map(|n| {
                    let parent = match next(4) {
                        0 => None,
                        1 => Some(u128::from(size + 1000)),
                        _ if n > 1 => Some(u128::from(next(n - 1) + 1)),
                        _ => None,
                    };
                    folder(u128::from(n), &format!("Folder {:03}", next(50)), parent)
                })
                .collect();
            for i in (1..input.len()).rev() {
                let j = usize::try_from(next(i as u64 + 1)).unwrap();
                input.swap(i, j);
            }
            let forest = build_folder_tree(input.clone());
            assert_well_formed(&input, &forest);
        }
    }

    #[test]
    fn test_flatten_and_visible() {
        let mut forest = build_folder_tree([folder(1, "Root", None), folder(2, "Child", Some(1))]);
        let flat: Vec<_> = flatten(&forest).into_iter().map(|(depth, node)| (depth, node.name())).collect();
        assert_eq!(flat, [(0, "Root"), (1, "Child")]);
        assert_eq!(visible(&forest).len(), 1);
        assert_eq!(toggle(&mut forest, id(1)), Some(true));
        assert_eq!(visible(&forest).len(), 2);
        assert_eq!(toggle(&mut forest, id(42)), None);
    }

    #[test]
    fn test_expansion_survives_rebuild() {
        let input = vec![folder(1, "Root", None), folder(2, "Child", Some(1)), folder(3, "Leaf", Some(2))];
        let mut forest = build_folder_tree(input.clone());
        toggle(&mut forest, id(1));
        toggle(&mut forest, id(2));
        let expanded = expanded_ids(&forest);
        let mut rebuilt = build_folder_tree(input);
        restore_expanded(&mut rebuilt, &expanded);
        assert_eq!(expanded_ids(&rebuilt), expanded);
    }

    #[test]
    fn test_is_within_and_path() {
        let forest =
            build_folder_tree([folder(1, "Root", None), folder(2, "Child", Some(1)), folder(3, "Other", None)]);
        assert!(is_within(&forest, id(1), id(2)));
        assert!(is_within(&forest, id(1), id(1)));
        assert!(!is_within(&forest, id(2), id(1)));
        assert!(!is_within(&forest, id(3), id(2)));
        let path: Vec<_> = path_to(&forest, id(2)).into_iter().map(|f| f.name.as_str()).collect();
        assert_eq!(path, ["Root", "Child"]);
        assert!(path_to(&forest, id(99)).is_empty());
    }
}
