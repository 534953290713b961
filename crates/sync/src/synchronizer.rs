//! Async driver that keeps a [`TreeStore`] in step with a [`PageHost`].
//!
//! Every structural operation takes `&mut self`, so a second operation can
//! only start once the previous one, including its host round trips, has
//! finished. Hosts that share a synchronizer across tasks wrap it in a
//! `tokio::sync::Mutex`.

use core::future::Future;
use core::time::Duration;

use pages_tree::ops;
use pages_tree::{
    MoveAction, MoveRequest, PageId, PageNode, PageTree, TreeError, TreeStore, ROOT_PARENT_ID,
};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::drag::{DragEvent, DragState};
use crate::host::{HostError, PageHost};
use crate::SyncError;

/// What a drop did to the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropOutcome {
    /// The dragged page now sits under the drop target.
    Moved,
    /// The drop target was the dragged page or one of its descendants.
    Ignored,
}

#[derive(Debug)]
pub struct PageTreeSync<H> {
    store: TreeStore,
    host: H,
    config: SyncConfig,
    drag: DragState,
}

impl<H: PageHost> PageTreeSync<H> {
    pub fn new(host: H, config: SyncConfig) -> Self {
        Self::with_store(host, config, TreeStore::default())
    }

    pub fn with_store(host: H, config: SyncConfig, store: TreeStore) -> Self {
        Self {
            store,
            host,
            config,
            drag: DragState::Idle,
        }
    }

    pub const fn host(&self) -> &H {
        &self.host
    }

    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The last committed tree.
    pub fn tree(&self) -> &PageTree {
        self.store.tree()
    }

    /// Direct access to the store, e.g. to subscribe commit observers.
    pub fn store_mut(&mut self) -> &mut TreeStore {
        &mut self.store
    }

    pub const fn drag_state(&self) -> DragState {
        self.drag
    }

    /// Replaces the whole tree with a freshly fetched root sequence.
    ///
    /// This is the recovery path when the local tree drifted from the
    /// server. Any drag in progress is abandoned.
    pub async fn reload(&mut self) -> Result<(), SyncError> {
        let roots = bounded(
            self.config.request_timeout,
            "fetch_children",
            self.host.fetch_children(ROOT_PARENT_ID),
        )
        .await?;

        debug!(roots = roots.len(), "Reloading page tree");

        self.store.reload(roots);
        self.drag = DragState::Idle;

        Ok(())
    }

    /// Fetches and installs the children of `parent_id`.
    ///
    /// Parents whose children are already loaded are left alone and no
    /// request is made. Returns whether a fetch happened.
    pub async fn load_children(&mut self, parent_id: PageId) -> Result<bool, SyncError> {
        let parent = self
            .store
            .tree()
            .node(parent_id)
            .ok_or(TreeError::NodeNotFound(parent_id))?;

        if parent.children.is_loaded() {
            debug!(parent_id, "Children already loaded");
            return Ok(false);
        }

        let children = bounded(
            self.config.request_timeout,
            "fetch_children",
            self.host.fetch_children(parent_id),
        )
        .await?;

        ops::set_children(&mut self.store, parent_id, children)?;

        Ok(true)
    }

    /// Inserts a page the server just created.
    pub async fn add_page(&mut self, page: PageNode) -> Result<(), SyncError> {
        let fetched = self.children_for_insert(page.parent_id).await?;

        ops::add_to_new_parent(&mut self.store, page, fetched)?;

        Ok(())
    }

    /// Drops a page the server reports as deleted.
    pub fn page_deleted(&mut self, page_id: PageId) -> Result<PageNode, SyncError> {
        let removed = ops::remove_deleted(&mut self.store, page_id)?;

        debug!(page_id, removed = removed.subtree_len(), "Removed deleted page");

        Ok(removed)
    }

    /// Persists `request` and applies it locally once the server accepted it.
    ///
    /// Moves onto the page itself or into its own subtree are ignored before
    /// any request is made; `Ok(false)` reports such a no-op.
    pub async fn move_page(&mut self, request: MoveRequest) -> Result<bool, SyncError> {
        let MoveRequest {
            action,
            page_id,
            parent_id,
            related_page_id,
        } = request;

        let tree = self.store.tree();
        if tree.find(page_id).is_none() {
            return Err(TreeError::NodeNotFound(page_id).into());
        }

        let target_parent = match action {
            MoveAction::Parent => parent_id,
            MoveAction::Before | MoveAction::After => {
                if related_page_id == page_id {
                    warn!(page_id, "Ignoring move next to itself");
                    return Ok(false);
                }

                tree.node(related_page_id)
                    .ok_or(TreeError::RelatedNotFound(related_page_id))?
                    .parent_id
            }
        };

        if target_parent != ROOT_PARENT_ID {
            if tree.find(target_parent).is_none() {
                return Err(TreeError::ParentNotFound(target_parent).into());
            }

            if tree.is_descendant(page_id, target_parent) {
                warn!(page_id, target_parent, "Ignoring move into own subtree");
                return Ok(false);
            }
        }

        self.persist(&request).await?;

        match action {
            MoveAction::Before | MoveAction::After => ops::reorder(&mut self.store, &request)?,
            MoveAction::Parent => {
                let fetched = self.children_for_insert(parent_id).await?;
                ops::reparent(&mut self.store, page_id, parent_id, fetched)?;
            }
        }

        self.refresh_detail(page_id).await;

        info!(page_id, target_parent, ?action, "Moved page");

        Ok(true)
    }

    /// Selects `page_id` if it may be viewed.
    ///
    /// `on_select` fires on every successful select, even when the page was
    /// already selected.
    pub fn select(&mut self, page_id: PageId, on_select: impl FnMut(PageId)) -> Option<PageId> {
        ops::select(&mut self.store, page_id, on_select)
    }

    pub fn toggle_open(&mut self, page_id: PageId) -> Result<bool, SyncError> {
        Ok(ops::toggle_open(&mut self.store, page_id)?)
    }

    pub fn toggle_expand_all(&mut self) -> usize {
        ops::toggle_expand_all(&mut self.store)
    }

    pub fn drag_start(&mut self, page_id: PageId) -> Result<(), SyncError> {
        let next = self.drag.apply(DragEvent::Start(page_id))?;

        ops::mark_dragged(&mut self.store, page_id, self.config.collapse_on_drag)?;
        self.drag = next;

        debug!(page_id, "Drag started");

        Ok(())
    }

    /// Highlights `page_id` as the current drop candidate.
    pub fn drag_over(&mut self, page_id: PageId) -> Result<(), SyncError> {
        let next = self.drag.apply(DragEvent::Over(page_id))?;

        ops::set_drag_over(&mut self.store, page_id)?;
        self.drag = next;

        Ok(())
    }

    pub fn drag_leave(&mut self, page_id: PageId) -> Result<(), SyncError> {
        let next = self.drag.apply(DragEvent::Leave(page_id))?;

        let _cleared = ops::clear_drag_over(&mut self.store, Some(page_id));
        self.drag = next;

        Ok(())
    }

    /// Ends a gesture without a drop.
    pub fn drag_end(&mut self) -> Result<(), SyncError> {
        let next = self.drag.apply(DragEvent::End)?;

        let _cleared = ops::clear_drag_over(&mut self.store, None);
        self.drag = next;

        Ok(())
    }

    /// Drops the dragged page onto `target_id`, making it the target's last child.
    ///
    /// Dropping onto the dragged page or into its subtree clears the
    /// highlight and keeps the gesture going. A dragged page that was
    /// deleted mid-gesture ends the gesture before any request is made.
    /// Any other drop persists the move, pops the page from its old parent
    /// and pushes it under the target, each as its own commit. The gesture
    /// is back to idle once the drop settles, whether or not it succeeded.
    pub async fn drop_on(&mut self, target_id: PageId) -> Result<DropOutcome, SyncError> {
        let next = self.drag.apply(DragEvent::Drop(target_id))?;
        let Some(dragged) = next.dragged() else {
            return Ok(DropOutcome::Ignored);
        };

        let tree = self.store.tree();
        if tree.find(dragged).is_none() {
            warn!(dragged, target_id, "Dragged page is gone, abandoning drag");
            let _cleared = ops::clear_drag_over(&mut self.store, None);
            self.drag = DragState::Idle;
            return Err(TreeError::NodeNotFound(dragged).into());
        }

        if tree.find(target_id).is_none() {
            return Err(TreeError::NodeNotFound(target_id).into());
        }

        if tree.is_descendant(dragged, target_id) {
            warn!(dragged, target_id, "Ignoring drop onto own subtree");
            let _cleared = ops::clear_drag_over(&mut self.store, None);
            return Ok(DropOutcome::Ignored);
        }

        self.drag = next;
        let _cleared = ops::clear_drag_over(&mut self.store, None);

        let result = self.reconcile_drop(dragged, target_id).await;

        self.drag = self.drag.apply(DragEvent::Settled).unwrap_or_default();

        match result {
            Ok(()) => {
                info!(dragged, target_id, "Dropped page");
                Ok(DropOutcome::Moved)
            }
            Err(err) => {
                warn!(dragged, target_id, %err, "Drop was not applied");
                Err(err)
            }
        }
    }

    /// Persists a drop and applies it locally.
    ///
    /// The dragged page's detail is read before persisting and written onto
    /// the page once it sits under the target, so the carried page never
    /// keeps metadata older than that read.
    async fn reconcile_drop(
        &mut self,
        dragged: PageId,
        target_id: PageId,
    ) -> Result<(), SyncError> {
        let mut detail = bounded(
            self.config.request_timeout,
            "fetch_node_detail",
            self.host.fetch_node_detail(dragged),
        )
        .await?;
        detail.parent_id = target_id;
        debug!(dragged, target_id, name = %detail.name, "Persisting drop");

        self.persist(&MoveRequest::parent(dragged, target_id)).await?;

        let fetched = self.children_for_insert(target_id).await?;
        ops::reparent(&mut self.store, dragged, target_id, fetched)?;

        if let Err(err) = ops::apply_detail(&mut self.store, &detail) {
            warn!(dragged, %err, "Could not apply dropped page detail");
        }

        self.refresh_detail(dragged).await;

        Ok(())
    }

    async fn persist(&self, request: &MoveRequest) -> Result<(), SyncError> {
        bounded(
            self.config.request_timeout,
            "persist_move",
            self.host.persist_move(request),
        )
        .await
        .inspect_err(|err| {
            warn!(
                page_id = request.page_id,
                action = ?request.action,
                %err,
                "Move was not persisted"
            );
        })
    }

    /// Children to splice in before inserting under `parent_id`.
    ///
    /// Only parents that report children they never loaded need a fetch.
    async fn children_for_insert(
        &self,
        parent_id: PageId,
    ) -> Result<Option<Vec<PageNode>>, SyncError> {
        if parent_id == ROOT_PARENT_ID {
            return Ok(None);
        }

        let parent = self
            .store
            .tree()
            .node(parent_id)
            .ok_or(TreeError::ParentNotFound(parent_id))?;

        if parent.children.is_loaded() || parent.child_count == 0 {
            return Ok(None);
        }

        let children = bounded(
            self.config.request_timeout,
            "fetch_children",
            self.host.fetch_children(parent_id),
        )
        .await?;

        Ok(Some(children))
    }

    /// Re-reads a page's server-owned fields after a structural change.
    ///
    /// The structural change is already committed, so a failure here is
    /// logged and the stale fields are kept.
    async fn refresh_detail(&mut self, page_id: PageId) {
        if !self.config.refresh_after_move {
            return;
        }

        let detail = bounded(
            self.config.request_timeout,
            "fetch_node_detail",
            self.host.fetch_node_detail(page_id),
        )
        .await;

        let applied = detail.and_then(|detail| {
            ops::apply_detail(&mut self.store, &detail).map_err(SyncError::from)
        });

        if let Err(err) = applied {
            warn!(page_id, %err, "Could not refresh page detail");
        }
    }
}

/// Awaits a host call for at most `budget`.
async fn bounded<T>(
    budget: Duration,
    operation: &'static str,
    call: impl Future<Output = Result<T, HostError>>,
) -> Result<T, SyncError> {
    match timeout(budget, call).await {
        Ok(result) => Ok(result?),
        Err(_elapsed) => {
            warn!(operation, ?budget, "Host request timed out");
            Err(SyncError::Timeout { operation })
        }
    }
}
