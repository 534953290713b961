//! Breadth-first walk-and-commit over the page tree.
//!
//! Every mutation goes through [`traverse`]: the committed tree is copied
//! into a scratch tree, the visitor mutates the scratch copy while the walk
//! proceeds level by level, and [`Visit::commit`] publishes the scratch
//! state to the [`TreeStore`]. Scratch mutations that are never committed
//! are dropped with the scratch tree.

use core::fmt;
use std::collections::VecDeque;

use thunderdome::Index;
use tracing::trace;

use crate::node::{PageId, PageNode, TreeNode};
use crate::tree::PageTree;

/// Called after every commit with the new tree and its version.
pub type CommitObserver = Box<dyn FnMut(&PageTree, u64) + Send>;

/// Owner of the committed page tree.
///
/// The store is the only write path to shared tree state. Hosts register
/// observers to re-render after each commit.
pub struct TreeStore {
    tree: PageTree,
    version: u64,
    observers: Vec<CommitObserver>,
}

impl fmt::Debug for TreeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeStore")
            .field("tree", &self.tree)
            .field("version", &self.version)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for TreeStore {
    fn default() -> Self {
        Self::new(PageTree::new())
    }
}

impl TreeStore {
    pub fn new(tree: PageTree) -> Self {
        Self {
            tree,
            version: 0,
            observers: Vec::new(),
        }
    }

    pub fn from_nodes(nodes: impl IntoIterator<Item = PageNode>) -> Self {
        Self::new(PageTree::from_nodes(nodes))
    }

    /// The last committed tree.
    pub fn tree(&self) -> &PageTree {
        &self.tree
    }

    /// Number of commits since the store was created.
    pub const fn version(&self) -> u64 {
        self.version
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&PageTree, u64) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Replaces the committed tree and notifies observers.
    pub fn commit(&mut self, tree: PageTree) {
        self.tree = tree;
        self.version = self.version.saturating_add(1);

        for observer in &mut self.observers {
            observer(&self.tree, self.version);
        }
    }

    /// Discards the current tree in favor of a freshly fetched root sequence.
    pub fn reload(&mut self, roots: Vec<PageNode>) {
        self.commit(PageTree::from_nodes(roots));
    }

    /// Clones the committed tree, lets `f` mutate the copy and commits it.
    ///
    /// Used for splices on the root sequence, which has no owning node to
    /// visit.
    pub fn commit_with<R>(&mut self, f: impl FnOnce(&mut PageTree) -> R) -> R {
        let mut scratch = self.tree.clone();
        let result = f(&mut scratch);
        self.commit(scratch);
        result
    }
}

/// Handle passed to the visitor for one node of the walk.
pub struct Visit<'a> {
    index: Index,
    id: PageId,
    parent_id: PageId,
    scratch: &'a mut PageTree,
    store: &'a mut TreeStore,
    commits: &'a mut usize,
    commit_on_finish: &'a mut bool,
}

impl fmt::Debug for Visit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Visit")
            .field("index", &self.index)
            .field("id", &self.id)
            .field("parent_id", &self.parent_id)
            .finish_non_exhaustive()
    }
}

impl Visit<'_> {
    /// Arena index of the visited node in the scratch tree.
    pub const fn index(&self) -> Index {
        self.index
    }

    /// Id of the visited node, captured before the visitor ran.
    pub const fn id(&self) -> PageId {
        self.id
    }

    /// Parent id of the visited node, captured before the visitor ran.
    pub const fn parent_id(&self) -> PageId {
        self.parent_id
    }

    /// The visited node, unless the visitor already removed it.
    pub fn node(&self) -> Option<&TreeNode> {
        self.scratch.get(self.index)
    }

    pub fn node_mut(&mut self) -> Option<&mut TreeNode> {
        self.scratch.get_mut(self.index)
    }

    /// The full scratch tree.
    pub fn tree(&self) -> &PageTree {
        self.scratch
    }

    pub fn tree_mut(&mut self) -> &mut PageTree {
        self.scratch
    }

    /// Publishes the current scratch state to the store.
    pub fn commit(&mut self) {
        self.store.commit(self.scratch.clone());
        *self.commits = self.commits.saturating_add(1);
    }

    /// Asks the walk to commit once after the last node has been visited.
    ///
    /// Walks that touch many nodes use this instead of committing per node.
    pub fn commit_on_finish(&mut self) {
        *self.commit_on_finish = true;
    }
}

/// What a walk did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraverseReport {
    pub visited: usize,
    pub commits: usize,
}

/// Visits every node breadth-first, one full sibling level at a time.
///
/// Each level is a snapshot of sibling indices taken when it was queued;
/// nodes removed by an earlier visit of the same walk are skipped. After a
/// node is visited its loaded child list, as it stands after the visit, is
/// queued as a new level.
pub fn traverse<F>(store: &mut TreeStore, mut visitor: F) -> TraverseReport
where
    F: FnMut(&mut Visit<'_>),
{
    let mut scratch = store.tree().clone();
    let mut levels = VecDeque::new();
    levels.push_back(scratch.roots().to_vec());

    let mut report = TraverseReport::default();
    let mut commit_on_finish = false;

    while let Some(level) = levels.pop_front() {
        for index in level {
            let Some(node) = scratch.get(index) else {
                continue;
            };
            let (id, parent_id) = (node.id, node.parent_id);

            let mut visit = Visit {
                index,
                id,
                parent_id,
                scratch: &mut scratch,
                store: &mut *store,
                commits: &mut report.commits,
                commit_on_finish: &mut commit_on_finish,
            };
            visitor(&mut visit);

            report.visited = report.visited.saturating_add(1);

            if let Some(children) = scratch.children_of(index) {
                levels.push_back(children.to_vec());
            }
        }
    }

    if commit_on_finish {
        store.commit(scratch);
        report.commits = report.commits.saturating_add(1);
    }

    trace!(
        visited = report.visited,
        commits = report.commits,
        version = store.version(),
        "Page tree walk finished"
    );

    report
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::node::ROOT_PARENT_ID;

    fn three_levels() -> TreeStore {
        TreeStore::from_nodes(vec![
            PageNode::new(1, ROOT_PARENT_ID, "a").with_children(vec![
                PageNode::new(3, 1, "c").with_children(vec![PageNode::new(5, 3, "e")]),
            ]),
            PageNode::new(2, ROOT_PARENT_ID, "b")
                .with_children(vec![PageNode::new(4, 2, "d")]),
        ])
    }

    #[test]
    fn test_walk_is_breadth_first() {
        let mut store = three_levels();
        let mut order = Vec::new();

        let report = traverse(&mut store, |visit| order.push(visit.id()));

        assert_eq!(order, vec![1, 2, 3, 4, 5]);
        assert_eq!(report.visited, 5);
        assert_eq!(report.commits, 0);
    }

    #[test]
    fn test_uncommitted_mutations_are_discarded() {
        let mut store = three_levels();

        let _report = traverse(&mut store, |visit| {
            if let Some(node) = visit.node_mut() {
                node.name = "changed".to_owned();
            }
        });

        assert_eq!(store.version(), 0);
        assert!(store.tree().iter().all(|(_, node)| node.name != "changed"));
    }

    #[test]
    fn test_each_commit_publishes_scratch_state() {
        let mut store = three_levels();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let observed = Arc::clone(&seen);
        store.subscribe(move |tree, version| {
            let opened = tree.iter().filter(|(_, node)| node.is_open).count();
            observed.lock().unwrap().push((version, opened));
        });

        let report = traverse(&mut store, |visit| {
            if visit.id() == 1 || visit.id() == 4 {
                if let Some(node) = visit.node_mut() {
                    node.is_open = true;
                }
                visit.commit();
            }
        });

        assert_eq!(report.commits, 2);
        assert_eq!(store.version(), 2);
        assert_eq!(*seen.lock().unwrap(), vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn test_children_added_during_visit_are_walked() {
        let mut store = TreeStore::from_nodes(vec![PageNode::new(1, ROOT_PARENT_ID, "a")]);
        let mut order = Vec::new();

        let _report = traverse(&mut store, |visit| {
            order.push(visit.id());
            if visit.id() == 1 {
                let child = visit.tree_mut().insert_subtree(PageNode::new(2, 1, "b"));
                if let Some(node) = visit.node_mut() {
                    node.children.push(child);
                }
            }
        });

        assert_eq!(order, vec![1, 2]);
    }

    #[test]
    fn test_removed_siblings_are_skipped() {
        let mut store = three_levels();
        let mut order = Vec::new();

        let _report = traverse(&mut store, |visit| {
            order.push(visit.id());
            if visit.id() == 1 {
                let tree = visit.tree_mut();
                if let Some(index) = tree.find(2) {
                    tree.roots_mut().retain(|&root| root != index);
                    let _removed = tree.take_subtree(index);
                }
            }
        });

        assert_eq!(order, vec![1, 3, 5]);
    }

    #[test]
    fn test_commit_on_finish_commits_once() {
        let mut store = three_levels();

        let report = traverse(&mut store, |visit| {
            if let Some(node) = visit.node_mut() {
                node.is_open = true;
            }
            visit.commit_on_finish();
        });

        assert_eq!(report.commits, 1);
        assert_eq!(store.version(), 1);
        assert!(store.tree().iter().all(|(_, node)| node.is_open));
    }

    #[test]
    fn test_commit_with_on_empty_tree() {
        let mut store = TreeStore::default();

        store.commit_with(|tree| {
            let index = tree.insert_subtree(PageNode::new(1, ROOT_PARENT_ID, "a"));
            tree.roots_mut().push(index);
        });

        assert_eq!(store.tree().root_ids(), vec![1]);
        assert_eq!(store.version(), 1);
    }
}
