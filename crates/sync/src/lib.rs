//! Keeps a client-side page tree consistent with the server that owns it.
//!
//! [`PageTreeSync`] drives the operations of [`pages_tree`] from host
//! round trips: lazy child loading, inserts and deletes reported by the
//! server, persisted moves, and drag/drop reconciliation.
//!
//! # Example
//!
//! ```rust,ignore
//! use pages_sync::{PageTreeSync, SyncConfig};
//!
//! let mut sync = PageTreeSync::new(host, SyncConfig::default());
//! sync.reload().await?;
//! sync.load_children(page_id).await?;
//!
//! sync.drag_start(page_id)?;
//! sync.drag_over(target_id)?;
//! sync.drop_on(target_id).await?;
//! ```

#![cfg_attr(
    test,
    allow(
        clippy::missing_assert_message,
        clippy::unwrap_used,
        clippy::indexing_slicing,
        reason = "Not useful in unit tests"
    )
)]

use pages_tree::TreeError;
use thiserror::Error;

pub mod config;
pub mod drag;
pub mod host;
pub mod synchronizer;

pub use config::SyncConfig;
pub use drag::{DragError, DragEvent, DragPhase, DragState};
pub use host::{HostError, PageHost};
pub use synchronizer::{DropOutcome, PageTreeSync};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SyncError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Drag(#[from] DragError),

    #[error("Host request `{operation}` timed out")]
    Timeout { operation: &'static str },
}
