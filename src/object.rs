//! Collision object records: bodies and areas, their attached shapes and
//! interaction filters.

use std::collections::HashSet;
use std::sync::Arc;

use crate::collision::{Aabb, Shape};
use crate::math::{self as m, Pose};
use crate::world::{ObjectKey, SpaceKey};

/// The kind of a body, determining how it is treated in physics updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub enum BodyKind {
    /// Does not move and does not respond to collisions.
    Static,
    /// Moved explicitly via swept motion, not by force integration.
    Kinematic,
    /// Integrated from velocity and accumulated impulses each step.
    Rigid,
}

/// A shape attached to a collision object with a local offset,
/// allowing composite collision footprints.
///
/// The shape itself is shared by reference count, never deep-copied.
#[derive(Clone, Debug)]
pub struct ShapeInstance {
    pub shape: Arc<Shape>,
    pub offset: Pose,
}

/// Kind-specific state of a collision object.
///
/// A closed set: stepping dispatches over this with an exhaustive match.
#[derive(Clone, Debug)]
pub(crate) enum ObjectKind {
    Static,
    Kinematic {
        velocity: m::Vec2,
    },
    Rigid {
        velocity: m::Vec2,
        /// Impulses accumulated between steps, applied and cleared at
        /// the next integration.
        pending_impulse: m::Vec2,
    },
    Area {
        monitoring: bool,
        /// Handles currently overlapping this area, so enter/exit events
        /// fire exactly once per transition.
        overlaps: HashSet<ObjectKey>,
    },
}

/// A body or area owned by a [`PhysicsWorld`][crate::PhysicsWorld].
#[derive(Clone, Debug)]
pub struct CollisionObject {
    pub(crate) kind: ObjectKind,
    pub(crate) pose: Pose,
    /// Uniform scale applied to shape extents at query time.
    pub(crate) scale: f64,
    /// Bitmask describing what this object *is*.
    pub(crate) layer: u32,
    /// Bitmask describing what this object *detects*.
    pub(crate) mask: u32,
    /// Restitution coefficient in `[0, 1]`; the lesser of a colliding
    /// pair's coefficients is used.
    pub(crate) bounce: f64,
    pub(crate) enabled: bool,
    pub(crate) shapes: Vec<ShapeInstance>,
    /// Back-reference by handle; the object never owns its space.
    pub(crate) space: Option<SpaceKey>,
    /// Pairs explicitly excluded from detection and resolution.
    pub(crate) exceptions: Vec<ObjectKey>,
}

impl CollisionObject {
    pub(crate) fn new_body(kind: BodyKind) -> Self {
        let kind = match kind {
            BodyKind::Static => ObjectKind::Static,
            BodyKind::Kinematic => ObjectKind::Kinematic {
                velocity: m::Vec2::zero(),
            },
            BodyKind::Rigid => ObjectKind::Rigid {
                velocity: m::Vec2::zero(),
                pending_impulse: m::Vec2::zero(),
            },
        };
        Self::with_kind(kind)
    }

    pub(crate) fn new_area() -> Self {
        Self::with_kind(ObjectKind::Area {
            monitoring: true,
            overlaps: HashSet::new(),
        })
    }

    fn with_kind(kind: ObjectKind) -> Self {
        CollisionObject {
            kind,
            pose: Pose::identity(),
            scale: 1.0,
            layer: 1,
            mask: 1,
            bounce: 0.0,
            enabled: true,
            shapes: Vec::new(),
            space: None,
            exceptions: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn is_area(&self) -> bool {
        matches!(self.kind, ObjectKind::Area { .. })
    }

    /// Whether this object blocks motion (i.e. is not an area).
    #[inline]
    pub(crate) fn is_solid(&self) -> bool {
        !self.is_area()
    }

    /// Whether this object's pose can change during stepping or sweeps.
    #[inline]
    pub(crate) fn moves(&self) -> bool {
        matches!(
            self.kind,
            ObjectKind::Kinematic { .. } | ObjectKind::Rigid { .. }
        )
    }

    #[inline]
    pub(crate) fn velocity_or_zero(&self) -> m::Vec2 {
        match self.kind {
            ObjectKind::Kinematic { velocity } | ObjectKind::Rigid { velocity, .. } => velocity,
            ObjectKind::Static | ObjectKind::Area { .. } => m::Vec2::zero(),
        }
    }

    #[inline]
    pub(crate) fn velocity_mut(&mut self) -> Option<&mut m::Vec2> {
        match &mut self.kind {
            ObjectKind::Kinematic { velocity } | ObjectKind::Rigid { velocity, .. } => {
                Some(velocity)
            }
            ObjectKind::Static | ObjectKind::Area { .. } => None,
        }
    }

    #[inline]
    pub(crate) fn is_monitoring(&self) -> bool {
        matches!(self.kind, ObjectKind::Area { monitoring: true, .. })
    }

    /// The union of all attached shapes' bounding boxes under the current
    /// pose, or None if the object has no shapes.
    pub(crate) fn aggregate_aabb(&self) -> Option<Aabb> {
        let mut shapes = self.shapes.iter();
        let first = shapes.next()?;
        let mut aabb = self.shape_aabb(first);
        for inst in shapes {
            aabb = aabb.union(&self.shape_aabb(inst));
        }
        Some(aabb)
    }

    #[inline]
    pub(crate) fn shape_aabb(&self, inst: &ShapeInstance) -> Aabb {
        inst.shape.bounding_box(&(self.pose * inst.offset), self.scale)
    }

    /// The thinnest cross-section among the attached shapes, independent
    /// of orientation. Bounds the sample spacing of swept motion so a
    /// sweep cannot step over the object.
    pub(crate) fn min_shape_extent(&self) -> Option<f64> {
        self.shapes
            .iter()
            .map(|inst| match *inst.shape {
                Shape::Circle { r } => 2.0 * r * self.scale,
                Shape::Rect { hw, hh } => 2.0 * hw.min(hh) * self.scale,
            })
            .reduce(f64::min)
    }

    /// Layer/mask eligibility: either side's mask matching the other's
    /// layer suffices.
    #[inline]
    pub(crate) fn interacts_with(&self, other: &CollisionObject) -> bool {
        self.layer & other.mask != 0 || other.layer & self.mask != 0
    }

    #[inline]
    pub(crate) fn has_exception_with(&self, other: ObjectKey) -> bool {
        self.exceptions.contains(&other)
    }
}
