//! Drag gesture state machine.
//!
//! A gesture starts with [`DragEvent::Start`], hovers over candidates,
//! and either ends without a drop or drops onto a target. A drop moves the
//! gesture into [`DragState::Reconciling`] until the server round trips and
//! the local splice are done, after which [`DragEvent::Settled`] returns it
//! to [`DragState::Idle`]. Every pair not listed in [`DragState::apply`] is
//! rejected.

use core::fmt;

use pages_tree::PageId;
use thiserror::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        dragged: PageId,
        over: Option<PageId>,
    },
    Reconciling {
        dragged: PageId,
        target: PageId,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragEvent {
    Start(PageId),
    Over(PageId),
    Leave(PageId),
    End,
    Drop(PageId),
    /// Reconciliation finished, successfully or not.
    Settled,
}

/// Variant of a [`DragState`] without its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragPhase {
    Idle,
    Dragging,
    Reconciling,
}

impl fmt::Display for DragPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Dragging => "dragging",
            Self::Reconciling => "reconciling",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum DragError {
    #[error("Drag event {event:?} is not valid while {state}")]
    InvalidTransition { state: DragPhase, event: DragEvent },
}

impl DragState {
    pub const fn phase(&self) -> DragPhase {
        match self {
            Self::Idle => DragPhase::Idle,
            Self::Dragging { .. } => DragPhase::Dragging,
            Self::Reconciling { .. } => DragPhase::Reconciling,
        }
    }

    /// The page being dragged or reconciled, if any.
    pub const fn dragged(&self) -> Option<PageId> {
        match *self {
            Self::Idle => None,
            Self::Dragging { dragged, .. } | Self::Reconciling { dragged, .. } => Some(dragged),
        }
    }

    /// Computes the state following `event`.
    ///
    /// An `End` while idle is accepted and keeps the machine idle, since a
    /// gesture that dropped has already settled by the time it ends.
    pub const fn apply(self, event: DragEvent) -> Result<Self, DragError> {
        let next = match (self, event) {
            (Self::Idle, DragEvent::Start(dragged)) => Self::Dragging {
                dragged,
                over: None,
            },
            (Self::Idle, DragEvent::End) => Self::Idle,

            (Self::Dragging { dragged, .. }, DragEvent::Over(id)) => Self::Dragging {
                dragged,
                over: Some(id),
            },
            (Self::Dragging { dragged, over }, DragEvent::Leave(id)) => Self::Dragging {
                dragged,
                over: match over {
                    Some(current) if current == id => None,
                    other => other,
                },
            },
            (Self::Dragging { .. }, DragEvent::End) => Self::Idle,
            (Self::Dragging { dragged, .. }, DragEvent::Drop(target)) => {
                Self::Reconciling { dragged, target }
            }

            (Self::Reconciling { .. }, DragEvent::Settled) => Self::Idle,

            (state, event) => {
                return Err(DragError::InvalidTransition {
                    state: state.phase(),
                    event,
                })
            }
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_gesture() {
        let state = DragState::Idle
            .apply(DragEvent::Start(4))
            .and_then(|state| state.apply(DragEvent::Over(7)))
            .and_then(|state| state.apply(DragEvent::Drop(7)))
            .unwrap();

        assert_eq!(
            state,
            DragState::Reconciling {
                dragged: 4,
                target: 7
            }
        );
        assert_eq!(state.apply(DragEvent::Settled), Ok(DragState::Idle));
    }

    #[test]
    fn test_leave_only_clears_matching_highlight() {
        let over_seven = DragState::Dragging {
            dragged: 4,
            over: Some(7),
        };

        assert_eq!(over_seven.apply(DragEvent::Leave(8)), Ok(over_seven));
        assert_eq!(
            over_seven.apply(DragEvent::Leave(7)),
            Ok(DragState::Dragging {
                dragged: 4,
                over: None
            })
        );
    }

    #[test]
    fn test_end_without_drop_returns_to_idle() {
        let dragging = DragState::Idle.apply(DragEvent::Start(1)).unwrap();

        assert_eq!(dragging.apply(DragEvent::End), Ok(DragState::Idle));
        assert_eq!(DragState::Idle.apply(DragEvent::End), Ok(DragState::Idle));
    }

    #[test]
    fn test_invalid_transitions_are_rejected() {
        let reconciling = DragState::Reconciling {
            dragged: 1,
            target: 2,
        };
        let dragging = DragState::Dragging {
            dragged: 1,
            over: None,
        };

        let rejected = [
            (DragState::Idle, DragEvent::Drop(2)),
            (DragState::Idle, DragEvent::Over(2)),
            (DragState::Idle, DragEvent::Settled),
            (dragging, DragEvent::Start(3)),
            (dragging, DragEvent::Settled),
            (reconciling, DragEvent::Start(3)),
            (reconciling, DragEvent::Drop(3)),
            (reconciling, DragEvent::End),
        ];

        for (state, event) in rejected {
            assert_eq!(
                state.apply(event),
                Err(DragError::InvalidTransition {
                    state: state.phase(),
                    event
                }),
                "{event:?} from {state:?}"
            );
        }
    }

    #[test]
    fn test_error_message_names_phase() {
        let error = DragState::Idle.apply(DragEvent::Drop(5)).unwrap_err();

        assert_eq!(
            error.to_string(),
            "Drag event Drop(5) is not valid while idle"
        );
    }
}
