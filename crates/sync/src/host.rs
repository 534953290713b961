//! Network seam between the synchronizer and the page server.

use async_trait::async_trait;
use pages_tree::{MoveRequest, PageId, PageNode};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum HostError {
    /// The request never produced a usable response.
    #[error("Request failed: {0}")]
    Request(String),

    /// The server answered and refused the operation.
    #[error("Server rejected the request: {0}")]
    Rejected(String),
}

/// Calls the synchronizer makes against the page server.
///
/// Implementations own transport, authentication and payload decoding.
/// The synchronizer only relies on the ordering of the returned children.
#[async_trait]
pub trait PageHost: Send + Sync {
    /// Children of `parent_id`, in display order.
    async fn fetch_children(&self, parent_id: PageId) -> Result<Vec<PageNode>, HostError>;

    /// Makes a reorder or reparent durable on the server.
    async fn persist_move(&self, request: &MoveRequest) -> Result<(), HostError>;

    /// Authoritative fields of one page.
    async fn fetch_node_detail(&self, page_id: PageId) -> Result<PageNode, HostError>;
}
