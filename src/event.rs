//! Overlap events produced by areas during stepping.
//!
//! Events are queued on the space and drained by the caller after each
//! step; there is no callback registry inside the physics core, which
//! also makes reentrant stepping from an event handler unrepresentable.

use crate::world::ObjectKey;

/// An overlap transition observed by a monitoring area.
///
/// Each transition fires exactly once: steady-state overlap across
/// consecutive steps produces no further events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlapEvent {
    /// A body began overlapping the area.
    BodyEntered { area: ObjectKey, body: ObjectKey },
    /// A previously overlapping body stopped overlapping the area.
    BodyExited { area: ObjectKey, body: ObjectKey },
    /// Another area began overlapping the area.
    AreaEntered { area: ObjectKey, other: ObjectKey },
    /// A previously overlapping area stopped overlapping the area.
    AreaExited { area: ObjectKey, other: ObjectKey },
}

impl OverlapEvent {
    /// The area that observed the transition.
    #[inline]
    pub fn area(&self) -> ObjectKey {
        match *self {
            OverlapEvent::BodyEntered { area, .. }
            | OverlapEvent::BodyExited { area, .. }
            | OverlapEvent::AreaEntered { area, .. }
            | OverlapEvent::AreaExited { area, .. } => area,
        }
    }

    /// The object on the other side of the transition.
    #[inline]
    pub fn other(&self) -> ObjectKey {
        match *self {
            OverlapEvent::BodyEntered { body, .. } | OverlapEvent::BodyExited { body, .. } => body,
            OverlapEvent::AreaEntered { other, .. } | OverlapEvent::AreaExited { other, .. } => {
                other
            }
        }
    }
}
