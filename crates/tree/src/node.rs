//! Page node shapes.
//!
//! [`PageNode`] is the payload the server hands back for page-list and
//! page-detail requests. [`TreeNode`] is the same page once it lives in the
//! [`PageTree`](crate::tree::PageTree) arena, with its children expressed as
//! arena indices.

use serde::{Deserialize, Serialize};
use thunderdome::Index;

/// Server-side page identifier.
pub type PageId = i32;

/// `parent_id` carried by top-level pages.
pub const ROOT_PARENT_ID: PageId = -1;

const fn root_parent() -> PageId {
    ROOT_PARENT_ID
}

const fn visible() -> bool {
    true
}

/// A page as returned by the host.
///
/// Field names follow the server's JSON payload. `child_list_items` is
/// absent until the children have been fetched; an empty vector means the
/// page was loaded and has no children.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageNode {
    pub id: PageId,

    #[serde(default = "root_parent")]
    pub parent_id: PageId,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub page_type: String,

    #[serde(default)]
    pub url: String,

    /// Child count as reported by the server, independent of whether the
    /// children themselves are loaded.
    #[serde(default)]
    pub child_count: u32,

    #[serde(default = "visible")]
    pub can_view_page: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_list_items: Option<Vec<PageNode>>,

    #[serde(default)]
    pub is_open: bool,

    #[serde(default)]
    pub selected: bool,

    #[serde(default)]
    pub on_drag_over_state: bool,
}

impl Default for PageNode {
    fn default() -> Self {
        Self {
            id: 0,
            parent_id: ROOT_PARENT_ID,
            name: String::new(),
            page_type: String::new(),
            url: String::new(),
            child_count: 0,
            can_view_page: true,
            child_list_items: None,
            is_open: false,
            selected: false,
            on_drag_over_state: false,
        }
    }
}

impl PageNode {
    /// Creates a visible page with no children loaded.
    pub fn new(id: PageId, parent_id: PageId, name: impl Into<String>) -> Self {
        Self {
            id,
            parent_id,
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_child_count(mut self, child_count: u32) -> Self {
        self.child_count = child_count;
        self
    }

    /// Attaches an already loaded child list and aligns `child_count` with it.
    #[must_use]
    pub fn with_children(mut self, children: Vec<PageNode>) -> Self {
        self.child_count = u32::try_from(children.len()).unwrap_or(u32::MAX);
        self.child_list_items = Some(children);
        self
    }

    #[must_use]
    pub const fn with_view_permission(mut self, can_view_page: bool) -> Self {
        self.can_view_page = can_view_page;
        self
    }

    /// Returns true for pages sitting in the root sequence.
    pub const fn is_top_level(&self) -> bool {
        self.parent_id == ROOT_PARENT_ID
    }

    /// Counts this page and every page nested in its loaded children.
    pub fn subtree_len(&self) -> usize {
        1_usize.saturating_add(
            self.child_list_items
                .iter()
                .flatten()
                .map(Self::subtree_len)
                .sum::<usize>(),
        )
    }
}

/// Load state of a node's children.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ChildList {
    /// Children were never fetched.
    #[default]
    Unloaded,
    /// Children were fetched; the vector may be empty.
    Loaded(Vec<Index>),
}

impl ChildList {
    pub const fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    pub fn as_slice(&self) -> Option<&[Index]> {
        match self {
            Self::Unloaded => None,
            Self::Loaded(children) => Some(children.as_slice()),
        }
    }

    pub fn as_mut_vec(&mut self) -> Option<&mut Vec<Index>> {
        match self {
            Self::Unloaded => None,
            Self::Loaded(children) => Some(children),
        }
    }

    /// True only for a loaded, non-empty list.
    pub fn has_loaded_children(&self) -> bool {
        self.as_slice().is_some_and(|children| !children.is_empty())
    }

    /// Appends `child`, turning an unloaded list into a single-element one.
    pub fn push(&mut self, child: Index) {
        match self {
            Self::Unloaded => *self = Self::Loaded(vec![child]),
            Self::Loaded(children) => children.push(child),
        }
    }
}

/// A page stored in the tree arena.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeNode {
    pub id: PageId,
    pub parent_id: PageId,
    pub name: String,
    pub page_type: String,
    pub url: String,
    pub child_count: u32,
    pub can_view_page: bool,
    pub children: ChildList,
    pub is_open: bool,
    pub selected: bool,
    pub on_drag_over_state: bool,
}

impl TreeNode {
    /// Copies the scalar fields of `page`; children are linked by the tree.
    pub fn from_page(page: &PageNode) -> Self {
        Self {
            id: page.id,
            parent_id: page.parent_id,
            name: page.name.clone(),
            page_type: page.page_type.clone(),
            url: page.url.clone(),
            child_count: page.child_count,
            can_view_page: page.can_view_page,
            children: ChildList::Unloaded,
            is_open: page.is_open,
            selected: page.selected,
            on_drag_over_state: page.on_drag_over_state,
        }
    }

    /// Builds the wire shape, with `children` already exported by the caller.
    pub fn to_page(&self, children: Option<Vec<PageNode>>) -> PageNode {
        PageNode {
            id: self.id,
            parent_id: self.parent_id,
            name: self.name.clone(),
            page_type: self.page_type.clone(),
            url: self.url.clone(),
            child_count: self.child_count,
            can_view_page: self.can_view_page,
            child_list_items: children,
            is_open: self.is_open,
            selected: self.selected,
            on_drag_over_state: self.on_drag_over_state,
        }
    }

    /// Refreshes the server-owned metadata from a page-detail payload.
    ///
    /// Structure (parent, children) and UI flags are left alone; the child
    /// count is only taken over while the children are unloaded.
    pub fn apply_detail(&mut self, detail: &PageNode) {
        self.name.clone_from(&detail.name);
        self.page_type.clone_from(&detail.page_type);
        self.url.clone_from(&detail.url);
        self.can_view_page = detail.can_view_page;

        if !self.children.is_loaded() {
            self.child_count = detail.child_count;
        }
    }

    pub const fn is_top_level(&self) -> bool {
        self.parent_id == ROOT_PARENT_ID
    }
}

/// Where a moved page lands relative to `related_page_id`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveAction {
    Before,
    After,
    /// Become the last child of `parent_id`.
    Parent,
}

/// A move as sent to the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MoveRequest {
    pub action: MoveAction,
    pub page_id: PageId,
    pub parent_id: PageId,
    pub related_page_id: PageId,
}

impl MoveRequest {
    pub const fn before(page_id: PageId, related_page_id: PageId, parent_id: PageId) -> Self {
        Self {
            action: MoveAction::Before,
            page_id,
            parent_id,
            related_page_id,
        }
    }

    pub const fn after(page_id: PageId, related_page_id: PageId, parent_id: PageId) -> Self {
        Self {
            action: MoveAction::After,
            page_id,
            parent_id,
            related_page_id,
        }
    }

    /// Reparent request; the server ignores `related_page_id` for it.
    pub const fn parent(page_id: PageId, parent_id: PageId) -> Self {
        Self {
            action: MoveAction::Parent,
            page_id,
            parent_id,
            related_page_id: ROOT_PARENT_ID,
        }
    }
}
