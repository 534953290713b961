//! Hierarchical page tree kept in sync with a server-owned page hierarchy.
//!
//! This crate holds the synchronous core: the page model, the arena-backed
//! tree, the breadth-first traversal engine every mutation goes through, and
//! the mutation operations themselves. Network round trips live in
//! `pages-sync`, which feeds their results into the operations here.
//!
//! ## Core Concepts
//!
//! - **PageNode**: a page as the server returns it
//! - **PageTree**: the loaded pages, children addressed by arena index
//! - **TreeStore**: owner of the committed tree, the only write path
//! - **traverse**: breadth-first walk over a scratch copy with explicit commits

#![cfg_attr(
    test,
    allow(
        clippy::missing_assert_message,
        clippy::unwrap_used,
        clippy::indexing_slicing,
        reason = "Not useful in unit tests"
    )
)]

use thiserror::Error;

pub mod node;
pub mod ops;
pub mod traverse;
pub mod tree;

pub use node::{ChildList, MoveAction, MoveRequest, PageId, PageNode, TreeNode, ROOT_PARENT_ID};
pub use traverse::{traverse, CommitObserver, TraverseReport, TreeStore, Visit};
pub use tree::PageTree;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TreeError {
    #[error("Page {0} is not in the tree")]
    NodeNotFound(PageId),

    #[error("Parent page {0} is not in the tree")]
    ParentNotFound(PageId),

    #[error("Page {0} is already in the tree")]
    DuplicatePage(PageId),

    /// The parent reports children that were never fetched.
    ///
    /// Inserting into such a parent would leave its list incomplete; the
    /// caller has to fetch the children first and pass them along.
    #[error("Children of page {0} must be loaded before inserting into it")]
    ChildrenRequired(PageId),

    #[error("Related page {0} is not in the tree")]
    RelatedNotFound(PageId),

    #[error("Page {page_id} cannot move below itself (target {target_id})")]
    CyclicMove { page_id: PageId, target_id: PageId },

    #[error("Move action {0:?} does not reorder siblings")]
    UnsupportedAction(MoveAction),
}
