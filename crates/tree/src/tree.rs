//! Arena-backed page tree.
//!
//! Every page lives in a [`thunderdome::Arena`]; parents refer to their
//! children by [`Index`]. Cloning the tree is a flat copy of the arena, which
//! is what the traversal engine relies on for its scratch copy.

use thunderdome::{Arena, Index};

use crate::node::{ChildList, PageId, PageNode, TreeNode, ROOT_PARENT_ID};

/// Ordered root sequence plus the arena holding every loaded page.
#[derive(Clone, Debug, Default)]
pub struct PageTree {
    arena: Arena<TreeNode>,
    roots: Vec<Index>,
}

impl PageTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Imports top-level pages, including any nested `child_list_items`.
    ///
    /// Every imported page is placed in the root sequence, so its
    /// `parent_id` is reset to [`ROOT_PARENT_ID`].
    pub fn from_nodes(nodes: impl IntoIterator<Item = PageNode>) -> Self {
        let mut tree = Self::new();

        for mut node in nodes {
            node.parent_id = ROOT_PARENT_ID;
            let index = tree.insert_subtree(node);
            tree.roots.push(index);
        }

        tree
    }

    /// Exports the whole tree back to the nested wire shape.
    pub fn to_nodes(&self) -> Vec<PageNode> {
        self.roots
            .iter()
            .filter_map(|&index| self.export(index))
            .collect()
    }

    /// Exports the subtree rooted at `index`.
    pub fn export(&self, index: Index) -> Option<PageNode> {
        let node = self.arena.get(index)?;

        let children = node.children.as_slice().map(|children| {
            children
                .iter()
                .filter_map(|&child| self.export(child))
                .collect()
        });

        Some(node.to_page(children))
    }

    /// Inserts `page` and its loaded descendants into the arena.
    ///
    /// The returned index is not linked anywhere; the caller places it in the
    /// root sequence or in a parent's child list. Children get their
    /// `parent_id` aligned with `page.id`.
    pub fn insert_subtree(&mut self, mut page: PageNode) -> Index {
        let children = page.child_list_items.take();
        let index = self.arena.insert(TreeNode::from_page(&page));

        if let Some(children) = children {
            let linked = children
                .into_iter()
                .map(|mut child| {
                    child.parent_id = page.id;
                    self.insert_subtree(child)
                })
                .collect();

            if let Some(node) = self.arena.get_mut(index) {
                node.children = ChildList::Loaded(linked);
            }
        }

        index
    }

    /// Removes the subtree rooted at `index` from the arena and returns it.
    ///
    /// The caller is responsible for unlinking `index` from its parent list
    /// or from the root sequence.
    pub fn take_subtree(&mut self, index: Index) -> Option<PageNode> {
        let page = self.export(index)?;

        let mut pending = vec![index];
        while let Some(next) = pending.pop() {
            if let Some(TreeNode {
                children: ChildList::Loaded(children),
                ..
            }) = self.arena.remove(next)
            {
                pending.extend(children);
            }
        }

        Some(page)
    }

    pub fn roots(&self) -> &[Index] {
        &self.roots
    }

    pub fn roots_mut(&mut self) -> &mut Vec<Index> {
        &mut self.roots
    }

    pub fn get(&self, index: Index) -> Option<&TreeNode> {
        self.arena.get(index)
    }

    pub fn get_mut(&mut self, index: Index) -> Option<&mut TreeNode> {
        self.arena.get_mut(index)
    }

    /// Looks a page up by id. Linear in the number of loaded pages.
    pub fn find(&self, id: PageId) -> Option<Index> {
        self.arena
            .iter()
            .find(|(_, node)| node.id == id)
            .map(|(index, _)| index)
    }

    pub fn node(&self, id: PageId) -> Option<&TreeNode> {
        self.find(id).and_then(|index| self.arena.get(index))
    }

    pub fn node_mut(&mut self, id: PageId) -> Option<&mut TreeNode> {
        self.find(id).and_then(|index| self.arena.get_mut(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Index, &TreeNode)> {
        self.arena.iter()
    }

    /// Number of loaded pages.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn children_of(&self, index: Index) -> Option<&[Index]> {
        self.arena.get(index)?.children.as_slice()
    }

    /// The sequence `id` sits in: the root sequence or its parent's list.
    pub fn siblings_of(&self, id: PageId) -> Option<&[Index]> {
        let node = self.node(id)?;

        if node.is_top_level() {
            return Some(&self.roots);
        }

        self.node(node.parent_id)?.children.as_slice()
    }

    /// Position of `id` within [`Self::siblings_of`].
    pub fn position_of(&self, id: PageId) -> Option<usize> {
        self.siblings_of(id)?
            .iter()
            .position(|&index| self.arena.get(index).is_some_and(|node| node.id == id))
    }

    /// Ids of the given indices, skipping dead slots.
    pub fn ids_of(&self, indices: &[Index]) -> Vec<PageId> {
        indices
            .iter()
            .filter_map(|&index| self.arena.get(index).map(|node| node.id))
            .collect()
    }

    pub fn root_ids(&self) -> Vec<PageId> {
        self.ids_of(&self.roots)
    }

    /// Ids of the loaded children of `id`; `None` while unloaded.
    pub fn child_ids(&self, id: PageId) -> Option<Vec<PageId>> {
        let children = self.node(id)?.children.as_slice()?;
        Some(self.ids_of(children))
    }

    /// Ids from the top-level ancestor down to `id`, inclusive.
    ///
    /// Stops at the highest loaded ancestor and returns `None` if the parent
    /// chain loops.
    pub fn hierarchy(&self, id: PageId) -> Option<Vec<PageId>> {
        let mut current = self.node(id)?;
        let mut path = vec![current.id];

        while !current.is_top_level() {
            let Some(parent) = self.node(current.parent_id) else {
                break;
            };

            if path.len() > self.len() {
                return None;
            }

            path.push(parent.id);
            current = parent;
        }

        path.reverse();
        Some(path)
    }

    /// True if `candidate` is `ancestor` itself or sits below it.
    pub fn is_descendant(&self, ancestor: PageId, candidate: PageId) -> bool {
        self.hierarchy(candidate)
            .is_some_and(|path| path.contains(&ancestor))
    }

    pub fn selected(&self) -> Option<PageId> {
        self.arena
            .iter()
            .find(|(_, node)| node.selected)
            .map(|(_, node)| node.id)
    }

    pub fn drag_over(&self) -> Option<PageId> {
        self.arena
            .iter()
            .find(|(_, node)| node.on_drag_over_state)
            .map(|(_, node)| node.id)
    }
}
