//! Mutation operations over a [`TreeStore`].
//!
//! Each operation is one or more [`traverse`] walks with a purpose-built
//! visitor. Operations that touch a single node commit as soon as they find
//! it; operations that touch many nodes commit once when the walk ends.
//! Splices on the root sequence go through [`TreeStore::commit_with`]
//! since no node owns that sequence.

use thunderdome::Index;
use tracing::{debug, warn};

use crate::node::{ChildList, MoveAction, MoveRequest, PageId, PageNode, ROOT_PARENT_ID};
use crate::traverse::{traverse, TreeStore};
use crate::tree::PageTree;
use crate::TreeError;

/// Inserts `item` as the last child of `item.parent_id` and opens the parent.
///
/// The parent's load state decides the path taken:
/// - children reported but never fetched: `fetched_children` is spliced in
///   first (required, see [`TreeError::ChildrenRequired`]);
/// - no children and nothing loaded: the list becomes `[item]`;
/// - list already loaded: `item` is appended.
///
/// The parent's `child_count` goes up by one in every case. If the fetched
/// list already carries `item` (the server created it first), the local copy
/// takes the server's position instead of being appended twice.
pub fn add_to_new_parent(
    store: &mut TreeStore,
    item: PageNode,
    fetched_children: Option<Vec<PageNode>>,
) -> Result<(), TreeError> {
    let page_id = item.id;
    let parent_id = item.parent_id;

    if store.tree().find(page_id).is_some() {
        return Err(TreeError::DuplicatePage(page_id));
    }

    if parent_id == ROOT_PARENT_ID {
        store.commit_with(|tree| {
            let index = tree.insert_subtree(item);
            tree.roots_mut().push(index);
        });

        debug!(page_id, "Appended page to the root sequence");
        return Ok(());
    }

    ensure_insertable(store.tree(), parent_id, fetched_children.is_some())?;

    let mut pending = Some((item, fetched_children));
    let _report = traverse(store, |visit| {
        if visit.id() != parent_id {
            return;
        }

        let Some((item, fetched)) = pending.take() else {
            return;
        };

        let parent = visit.index();
        insert_child(visit.tree_mut(), parent, item, fetched);
        visit.commit();
    });

    debug!(page_id, parent_id, "Inserted page under new parent");

    Ok(())
}

/// Detaches `page_id` from the root sequence or from its parent's list.
///
/// A nested page decrements its parent's `child_count`. The removed subtree
/// is returned so the caller can carry it to a new position.
pub fn remove_from_old_parent(
    store: &mut TreeStore,
    page_id: PageId,
) -> Result<PageNode, TreeError> {
    let tree = store.tree();
    let index = tree.find(page_id).ok_or(TreeError::NodeNotFound(page_id))?;
    let parent_id = tree
        .get(index)
        .map_or(ROOT_PARENT_ID, |node| node.parent_id);

    if parent_id == ROOT_PARENT_ID {
        if !tree.roots().contains(&index) {
            return Err(TreeError::NodeNotFound(page_id));
        }

        let removed = store.commit_with(|tree| {
            tree.roots_mut().retain(|&root| root != index);
            tree.take_subtree(index)
        });

        debug!(page_id, "Removed page from the root sequence");
        return removed.ok_or(TreeError::NodeNotFound(page_id));
    }

    let mut removed = None;
    let _report = traverse(store, |visit| {
        if visit.id() != parent_id || removed.is_some() {
            return;
        }

        let parent = visit.index();
        removed = detach_child(visit.tree_mut(), parent, page_id);

        if removed.is_some() {
            visit.commit();
        }
    });

    debug!(page_id, parent_id, "Removed page from its parent");

    removed.ok_or(TreeError::NodeNotFound(page_id))
}

/// Drops a page the host reports as deleted.
pub fn remove_deleted(store: &mut TreeStore, page_id: PageId) -> Result<PageNode, TreeError> {
    remove_from_old_parent(store, page_id)
}

/// Moves `page_id` to the end of `new_parent_id`'s children.
///
/// Runs as a removal walk followed by an insertion walk, carrying the
/// removed subtree between them. All preconditions are checked before the
/// removal so a failed insertion can't lose the page.
pub fn reparent(
    store: &mut TreeStore,
    page_id: PageId,
    new_parent_id: PageId,
    fetched_children: Option<Vec<PageNode>>,
) -> Result<(), TreeError> {
    let tree = store.tree();

    if tree.find(page_id).is_none() {
        return Err(TreeError::NodeNotFound(page_id));
    }

    if new_parent_id != ROOT_PARENT_ID {
        if tree.is_descendant(page_id, new_parent_id) {
            return Err(TreeError::CyclicMove {
                page_id,
                target_id: new_parent_id,
            });
        }

        ensure_insertable(tree, new_parent_id, fetched_children.is_some())?;
    }

    let mut page = remove_from_old_parent(store, page_id)?;
    page.parent_id = new_parent_id;

    add_to_new_parent(store, page, fetched_children)
}

/// Places `page_id` right before or after `related_page_id`.
///
/// The page is spliced out of its current position in one walk and spliced
/// back next to the related page in a second walk, adopting the related
/// page's parent. Moving a page next to itself is a no-op. If the second
/// walk can't place the page, it goes back where it was.
pub fn reorder(store: &mut TreeStore, request: &MoveRequest) -> Result<(), TreeError> {
    let MoveRequest {
        action,
        page_id,
        related_page_id,
        ..
    } = *request;

    if action == MoveAction::Parent {
        return Err(TreeError::UnsupportedAction(action));
    }

    let tree = store.tree();

    if tree.find(page_id).is_none() {
        return Err(TreeError::NodeNotFound(page_id));
    }

    let target_parent = tree
        .node(related_page_id)
        .ok_or(TreeError::RelatedNotFound(related_page_id))?
        .parent_id;

    if related_page_id == page_id {
        return Ok(());
    }

    if target_parent != ROOT_PARENT_ID && tree.is_descendant(page_id, target_parent) {
        return Err(TreeError::CyclicMove {
            page_id,
            target_id: related_page_id,
        });
    }

    if tree.position_of(related_page_id).is_none() {
        return Err(TreeError::RelatedNotFound(related_page_id));
    }

    let origin = (
        tree.node(page_id).map_or(ROOT_PARENT_ID, |node| node.parent_id),
        tree.position_of(page_id).unwrap_or(0),
    );

    let mut cached = remove_from_old_parent(store, page_id)?;
    cached.parent_id = target_parent;
    let mut cached = Some(cached);

    let _report = traverse(store, |visit| {
        if cached.is_none() {
            return;
        }

        if target_parent == ROOT_PARENT_ID {
            if visit.id() != related_page_id || visit.parent_id() != ROOT_PARENT_ID {
                return;
            }

            let tree = visit.tree_mut();
            let Some(position) = tree.position_of(related_page_id) else {
                return;
            };
            let Some(page) = cached.take() else {
                return;
            };

            let index = tree.insert_subtree(page);
            tree.roots_mut()
                .insert(insertion_index(action, position), index);
            visit.commit();
        } else if visit.id() == target_parent {
            let parent = visit.index();
            let tree = visit.tree_mut();
            let Some(position) = tree.position_of(related_page_id) else {
                return;
            };
            let Some(page) = cached.take() else {
                return;
            };

            let index = tree.insert_subtree(page);
            if let Some(node) = tree.get_mut(parent) {
                if let Some(children) = node.children.as_mut_vec() {
                    children.insert(insertion_index(action, position), index);
                }
                node.child_count = node.child_count.saturating_add(1);
            }
            visit.commit();
        }
    });

    if let Some(page) = cached {
        let (parent_id, position) = origin;
        restore(store, page, parent_id, position);

        warn!(page_id, related_page_id, "Reorder target vanished, page restored");
        return Err(TreeError::RelatedNotFound(related_page_id));
    }

    debug!(page_id, related_page_id, ?action, "Reordered page");

    Ok(())
}

/// Flips `is_open` on every node with a loaded, non-empty child list.
///
/// Nodes whose children were never fetched stay as they are. Returns the
/// number of nodes flipped.
pub fn toggle_expand_all(store: &mut TreeStore) -> usize {
    let mut toggled = 0_usize;

    let _report = traverse(store, |visit| {
        let flipped = match visit.node_mut() {
            Some(node) if node.children.has_loaded_children() => {
                node.is_open = !node.is_open;
                true
            }
            _ => false,
        };

        if flipped {
            toggled = toggled.saturating_add(1);
            visit.commit_on_finish();
        }
    });

    toggled
}

/// Flips `is_open` on one node and returns its new state.
pub fn toggle_open(store: &mut TreeStore, page_id: PageId) -> Result<bool, TreeError> {
    let mut state = None;

    let _report = traverse(store, |visit| {
        if visit.id() != page_id || state.is_some() {
            return;
        }

        if let Some(node) = visit.node_mut() {
            node.is_open = !node.is_open;
            state = Some(node.is_open);
        }
        visit.commit();
    });

    state.ok_or(TreeError::NodeNotFound(page_id))
}

/// Selects `page_id` and deselects everything else.
///
/// The page is only selected if it may be viewed. `on_select` fires on every
/// successful select, including one that re-selects the current page.
/// Returns the selected page, if any.
pub fn select(
    store: &mut TreeStore,
    page_id: PageId,
    mut on_select: impl FnMut(PageId),
) -> Option<PageId> {
    let mut selected = None;

    let _report = traverse(store, |visit| {
        let changed = match visit.node_mut() {
            Some(node) => {
                let wanted = node.id == page_id && node.can_view_page;
                let changed = node.selected != wanted;
                node.selected = wanted;

                if wanted && selected.is_none() {
                    selected = Some(node.id);
                    on_select(node.id);
                }

                changed
            }
            None => false,
        };

        if changed {
            visit.commit_on_finish();
        }
    });

    selected
}

/// Marks `page_id` as the page being dragged.
///
/// Clears every other selection, selects the page regardless of its view
/// permission and optionally collapses it.
pub fn mark_dragged(
    store: &mut TreeStore,
    page_id: PageId,
    collapse: bool,
) -> Result<(), TreeError> {
    if store.tree().find(page_id).is_none() {
        return Err(TreeError::NodeNotFound(page_id));
    }

    let _report = traverse(store, |visit| {
        if let Some(node) = visit.node_mut() {
            node.selected = node.id == page_id;
            if node.selected && collapse {
                node.is_open = false;
            }
        }
        visit.commit_on_finish();
    });

    Ok(())
}

/// Highlights `page_id` as the drop candidate and clears every other highlight.
pub fn set_drag_over(store: &mut TreeStore, page_id: PageId) -> Result<(), TreeError> {
    if store.tree().find(page_id).is_none() {
        return Err(TreeError::NodeNotFound(page_id));
    }

    let _report = traverse(store, |visit| {
        let changed = match visit.node_mut() {
            Some(node) => {
                let wanted = node.id == page_id;
                let changed = node.on_drag_over_state != wanted;
                node.on_drag_over_state = wanted;
                changed
            }
            None => false,
        };

        if changed {
            visit.commit_on_finish();
        }
    });

    Ok(())
}

/// Clears the drop highlight of `only`, or of every node when `None`.
///
/// Returns how many highlights were cleared.
pub fn clear_drag_over(store: &mut TreeStore, only: Option<PageId>) -> usize {
    let mut cleared = 0_usize;

    let _report = traverse(store, |visit| {
        let changed = match visit.node_mut() {
            Some(node) if node.on_drag_over_state && only.map_or(true, |id| id == node.id) => {
                node.on_drag_over_state = false;
                true
            }
            _ => false,
        };

        if changed {
            cleared = cleared.saturating_add(1);
            visit.commit_on_finish();
        }
    });

    cleared
}

/// Installs a freshly fetched child list on `parent_id` and opens it.
///
/// Any previously loaded children are dropped. `child_count` is reset to the
/// length of the fetched list.
pub fn set_children(
    store: &mut TreeStore,
    parent_id: PageId,
    children: Vec<PageNode>,
) -> Result<(), TreeError> {
    let mut pending = Some(children);

    let _report = traverse(store, |visit| {
        if visit.id() != parent_id {
            return;
        }

        let Some(children) = pending.take() else {
            return;
        };

        let parent = visit.index();
        let tree = visit.tree_mut();

        let previous = tree
            .get_mut(parent)
            .map(|node| core::mem::take(&mut node.children));
        if let Some(ChildList::Loaded(previous)) = previous {
            for child in previous {
                let _dropped = tree.take_subtree(child);
            }
        }

        let linked: Vec<Index> = children
            .into_iter()
            .map(|mut child| {
                child.parent_id = parent_id;
                tree.insert_subtree(child)
            })
            .collect();

        if let Some(node) = tree.get_mut(parent) {
            node.child_count = u32::try_from(linked.len()).unwrap_or(u32::MAX);
            node.children = ChildList::Loaded(linked);
            node.is_open = true;
        }

        visit.commit();
    });

    if pending.is_some() {
        return Err(TreeError::NodeNotFound(parent_id));
    }

    debug!(parent_id, "Loaded children");

    Ok(())
}

/// Refreshes a page's server-owned fields from a page-detail payload.
pub fn apply_detail(store: &mut TreeStore, detail: &PageNode) -> Result<(), TreeError> {
    let mut applied = false;

    let _report = traverse(store, |visit| {
        if visit.id() != detail.id || applied {
            return;
        }

        if let Some(node) = visit.node_mut() {
            node.apply_detail(detail);
            applied = true;
        }
        visit.commit();
    });

    if applied {
        Ok(())
    } else {
        Err(TreeError::NodeNotFound(detail.id))
    }
}

const fn insertion_index(action: MoveAction, related_position: usize) -> usize {
    match action {
        MoveAction::After => related_position.saturating_add(1),
        MoveAction::Before | MoveAction::Parent => related_position,
    }
}

fn ensure_insertable(
    tree: &PageTree,
    parent_id: PageId,
    has_fetched: bool,
) -> Result<(), TreeError> {
    let parent = tree
        .node(parent_id)
        .ok_or(TreeError::ParentNotFound(parent_id))?;

    if !parent.children.is_loaded() && parent.child_count > 0 && !has_fetched {
        return Err(TreeError::ChildrenRequired(parent_id));
    }

    Ok(())
}

/// Links `item` as the last child of `parent`.
///
/// An unloaded parent that reports children gets `fetched` spliced in first.
fn insert_child(
    tree: &mut PageTree,
    parent: Index,
    mut item: PageNode,
    fetched: Option<Vec<PageNode>>,
) {
    let Some(node) = tree.get(parent) else {
        return;
    };

    let parent_id = node.id;
    let needs_fetch = !node.children.is_loaded() && node.child_count > 0;

    item.parent_id = parent_id;
    let item_id = item.id;
    let mut carried = Some(item);

    let mut linked = Vec::new();
    if needs_fetch {
        for mut child in fetched.into_iter().flatten() {
            child.parent_id = parent_id;

            let child = if child.id == item_id {
                match carried.take() {
                    Some(own) => own,
                    None => continue,
                }
            } else {
                child
            };

            linked.push(tree.insert_subtree(child));
        }
    }

    let carried = carried.map(|item| tree.insert_subtree(item));

    let Some(node) = tree.get_mut(parent) else {
        return;
    };

    if needs_fetch {
        node.children = ChildList::Loaded(linked);
    }
    if let Some(index) = carried {
        node.children.push(index);
    }

    node.child_count = node.child_count.saturating_add(1);
    node.is_open = true;
}

/// Links `page` back at `position` in `parent_id`'s list or the root sequence.
pub(crate) fn restore(
    store: &mut TreeStore,
    mut page: PageNode,
    parent_id: PageId,
    position: usize,
) {
    page.parent_id = parent_id;

    store.commit_with(|tree| {
        let parent = (parent_id != ROOT_PARENT_ID)
            .then(|| tree.find(parent_id))
            .flatten();
        let index = tree.insert_subtree(page);

        let siblings = match parent {
            Some(parent) => tree.get_mut(parent).and_then(|node| {
                node.child_count = node.child_count.saturating_add(1);
                node.children.as_mut_vec()
            }),
            None => Some(tree.roots_mut()),
        };

        if let Some(siblings) = siblings {
            siblings.insert(position.min(siblings.len()), index);
        }
    });
}

/// Unlinks `page_id` from `parent`'s list and takes its subtree out of the arena.
fn detach_child(tree: &mut PageTree, parent: Index, page_id: PageId) -> Option<PageNode> {
    let position = tree
        .children_of(parent)?
        .iter()
        .position(|&child| tree.get(child).is_some_and(|node| node.id == page_id))?;

    let node = tree.get_mut(parent)?;
    let child = node.children.as_mut_vec()?.remove(position);
    node.child_count = node.child_count.saturating_sub(1);

    tree.take_subtree(child)
}
