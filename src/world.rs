//! The top-level physics world: an explicit value owning all spaces and
//! collision objects, addressed through generation-checked handles.

use std::sync::Arc;

use itertools::Itertools;
use thunderdome::{Arena, Index};

use crate::collision::Shape;
use crate::error::PhysicsError;
use crate::event::OverlapEvent;
use crate::math::{self as m, Angle, Pose};
use crate::object::{BodyKind, CollisionObject, ObjectKind, ShapeInstance};
use crate::space::Space;

/// Handle to a [`Space`][crate::space::Space] owned by a world.
///
/// Generation-checked: operating on a freed handle is an error,
/// never an access to unrelated newer data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SpaceKey(pub(crate) Index);

/// Handle to a body or area owned by a world. Generation-checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectKey(pub(crate) Index);

// ordered by slot and generation bits so that pair and event ordering
// is deterministic
impl PartialOrd for ObjectKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ObjectKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.to_bits().cmp(&other.0.to_bits())
    }
}

/// The authoritative spatial state: all spaces, bodies and areas.
///
/// There is no global singleton; create a world and thread it through
/// to whatever drives the simulation.
#[derive(Default)]
pub struct PhysicsWorld {
    pub(crate) spaces: Arena<Space>,
    pub(crate) objects: Arena<CollisionObject>,
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self::default()
    }

    //
    // creation and lifecycle
    //

    pub fn create_space(&mut self) -> SpaceKey {
        let key = SpaceKey(self.spaces.insert(Space::new()));
        log::debug!("created space {:?}", key);
        key
    }

    /// Destroy a space, releasing its members back to the detached state.
    /// The members themselves stay alive; they are owned by their creators.
    pub fn free_space(&mut self, space: SpaceKey) -> Result<(), PhysicsError> {
        let sp = self
            .spaces
            .remove(space.0)
            .ok_or(PhysicsError::HandleNotFound)?;
        for member in sp.members {
            if let Some(obj) = self.objects.get_mut(member.0) {
                obj.space = None;
                if let ObjectKind::Area { overlaps, .. } = &mut obj.kind {
                    overlaps.clear();
                }
            }
        }
        log::debug!("freed space {:?}", space);
        Ok(())
    }

    /// Inactive spaces are excluded from stepping and their queries
    /// return no hits.
    pub fn set_space_active(&mut self, space: SpaceKey, active: bool) -> Result<(), PhysicsError> {
        self.space_mut(space)?.active = active;
        Ok(())
    }

    pub fn is_space_active(&self, space: SpaceKey) -> Result<bool, PhysicsError> {
        Ok(self.space(space)?.active)
    }

    pub fn create_body(&mut self, kind: BodyKind) -> ObjectKey {
        ObjectKey(self.objects.insert(CollisionObject::new_body(kind)))
    }

    pub fn create_area(&mut self) -> ObjectKey {
        ObjectKey(self.objects.insert(CollisionObject::new_area()))
    }

    /// Destroy an object. If it is still in a space it is removed from it
    /// first. Freeing an already-freed handle is an error, never a crash.
    pub fn free(&mut self, object: ObjectKey) -> Result<(), PhysicsError> {
        let space = self.object(object)?.space;
        if let Some(space) = space {
            self.space_remove(space, object)?;
        }
        self.objects.remove(object.0);
        log::debug!("freed object {:?}", object);
        Ok(())
    }

    /// Attach a shape to an object with a local offset.
    /// Returns the index of the new shape instance.
    pub fn add_shape(
        &mut self,
        object: ObjectKey,
        shape: impl Into<Arc<Shape>>,
        offset: Pose,
    ) -> Result<usize, PhysicsError> {
        let obj = self.object_mut(object)?;
        obj.shapes.push(ShapeInstance {
            shape: shape.into(),
            offset,
        });
        Ok(obj.shapes.len() - 1)
    }

    /// Detach the shape instance at the given index.
    pub fn remove_shape(&mut self, object: ObjectKey, index: usize) -> Result<(), PhysicsError> {
        let obj = self.object_mut(object)?;
        if index >= obj.shapes.len() {
            return Err(PhysicsError::HandleNotFound);
        }
        obj.shapes.remove(index);
        Ok(())
    }

    /// Add an object to a space. An object never belongs to two spaces at
    /// once: adding one that is already elsewhere moves it.
    pub fn space_add(&mut self, space: SpaceKey, object: ObjectKey) -> Result<(), PhysicsError> {
        if !self.spaces.contains(space.0) {
            return Err(PhysicsError::HandleNotFound);
        }
        let prev = self.object(object)?.space;
        match prev {
            Some(prev) if prev == space => return Ok(()),
            Some(prev) => self.space_remove(prev, object)?,
            None => (),
        }

        let obj = self
            .objects
            .get_mut(object.0)
            .expect("object checked above");
        obj.space = Some(space);
        let aabb = obj.aggregate_aabb();
        let sp = self.spaces.get_mut(space.0).expect("space checked above");
        sp.members.push(object);
        if let Some(aabb) = aabb {
            sp.index.update(object, aabb);
        }
        log::debug!("added object {:?} to space {:?}", object, space);
        Ok(())
    }

    /// Remove an object from a space, returning it to the detached state.
    /// Areas involved with the object get their exit events immediately.
    pub fn space_remove(&mut self, space: SpaceKey, object: ObjectKey) -> Result<(), PhysicsError> {
        if self.object(object)?.space != Some(space) {
            return Err(PhysicsError::SpaceMismatch);
        }
        let obj = self
            .objects
            .get_mut(object.0)
            .expect("object checked above");
        obj.space = None;
        let was_area = obj.is_area();
        let departing_overlaps: Vec<ObjectKey> =
            if let ObjectKind::Area { overlaps, .. } = &mut obj.kind {
                overlaps.drain().sorted().collect()
            } else {
                Vec::new()
            };

        let sp = self.spaces.get_mut(space.0).ok_or(PhysicsError::HandleNotFound)?;
        sp.members.retain(|m| *m != object);
        sp.index.remove(object);

        // fire exits for the departing object's own overlap set
        for other in departing_overlaps {
            let other_is_area = self
                .objects
                .get(other.0)
                .map(|o| o.is_area())
                .unwrap_or(false);
            let sp = self.spaces.get_mut(space.0).expect("space checked above");
            sp.events.push(if other_is_area {
                OverlapEvent::AreaExited {
                    area: object,
                    other,
                }
            } else {
                OverlapEvent::BodyExited {
                    area: object,
                    body: other,
                }
            });
        }

        // and for every remaining area that was overlapping it
        let members: Vec<ObjectKey> = self.spaces.get(space.0).expect("space checked above").members.clone();
        for member in members {
            if let Some(area) = self.objects.get_mut(member.0) {
                if let ObjectKind::Area { overlaps, .. } = &mut area.kind {
                    if overlaps.remove(&object) {
                        let sp = self.spaces.get_mut(space.0).expect("space checked above");
                        sp.events.push(if was_area {
                            OverlapEvent::AreaExited {
                                area: member,
                                other: object,
                            }
                        } else {
                            OverlapEvent::BodyExited {
                                area: member,
                                body: object,
                            }
                        });
                    }
                }
            }
        }
        log::debug!("removed object {:?} from space {:?}", object, space);
        Ok(())
    }

    //
    // mutators
    //

    pub fn set_pose(&mut self, object: ObjectKey, pose: Pose) -> Result<(), PhysicsError> {
        self.object_mut(object)?.pose = pose;
        Ok(())
    }

    pub fn set_position(&mut self, object: ObjectKey, position: m::Vec2) -> Result<(), PhysicsError> {
        self.object_mut(object)?.pose.translation = position;
        Ok(())
    }

    pub fn set_rotation(&mut self, object: ObjectKey, angle: Angle) -> Result<(), PhysicsError> {
        self.object_mut(object)?.pose.rotation = angle.into();
        Ok(())
    }

    /// Set the uniform scale applied to the object's shape extents.
    /// Non-positive scales are rejected as invalid geometry.
    pub fn set_scale(&mut self, object: ObjectKey, scale: f64) -> Result<(), PhysicsError> {
        if scale <= 0.0 {
            return Err(PhysicsError::InvalidGeometry);
        }
        self.object_mut(object)?.scale = scale;
        Ok(())
    }

    /// Set the linear velocity of a kinematic or rigid body.
    /// No effect on static bodies and areas.
    pub fn set_velocity(&mut self, object: ObjectKey, velocity: m::Vec2) -> Result<(), PhysicsError> {
        if let Some(v) = self.object_mut(object)?.velocity_mut() {
            *v = velocity;
        }
        Ok(())
    }

    /// Set the restitution coefficient, clamped to `[0, 1]`.
    pub fn set_bounce(&mut self, object: ObjectKey, bounce: f64) -> Result<(), PhysicsError> {
        self.object_mut(object)?.bounce = bounce.clamp(0.0, 1.0);
        Ok(())
    }

    /// Disabled objects are excluded from stepping and queries.
    pub fn set_enabled(&mut self, object: ObjectKey, enabled: bool) -> Result<(), PhysicsError> {
        self.object_mut(object)?.enabled = enabled;
        Ok(())
    }

    /// Toggle overlap monitoring of an area. No effect on bodies.
    /// Turning monitoring off drops current overlaps without exit events.
    pub fn set_monitoring(&mut self, object: ObjectKey, on: bool) -> Result<(), PhysicsError> {
        if let ObjectKind::Area {
            monitoring,
            overlaps,
        } = &mut self.object_mut(object)?.kind
        {
            *monitoring = on;
            if !on {
                overlaps.clear();
            }
        }
        Ok(())
    }

    pub fn set_collision_layer(&mut self, object: ObjectKey, layer: u32) -> Result<(), PhysicsError> {
        self.object_mut(object)?.layer = layer;
        Ok(())
    }

    pub fn set_collision_mask(&mut self, object: ObjectKey, mask: u32) -> Result<(), PhysicsError> {
        self.object_mut(object)?.mask = mask;
        Ok(())
    }

    /// Set or clear one bit of the collision layer.
    /// Masks are 32 bits wide; indices wrap modulo 32.
    pub fn set_collision_layer_bit(
        &mut self,
        object: ObjectKey,
        bit: u32,
        on: bool,
    ) -> Result<(), PhysicsError> {
        let obj = self.object_mut(object)?;
        if on {
            obj.layer |= 1 << (bit & 31);
        } else {
            obj.layer &= !(1 << (bit & 31));
        }
        Ok(())
    }

    /// Set or clear one bit of the collision mask.
    /// Masks are 32 bits wide; indices wrap modulo 32.
    pub fn set_collision_mask_bit(
        &mut self,
        object: ObjectKey,
        bit: u32,
        on: bool,
    ) -> Result<(), PhysicsError> {
        let obj = self.object_mut(object)?;
        if on {
            obj.mask |= 1 << (bit & 31);
        } else {
            obj.mask &= !(1 << (bit & 31));
        }
        Ok(())
    }

    /// Exclude a pair from collision detection and resolution.
    /// An exception on either side is enough to skip the pair.
    pub fn add_collision_exception_with(
        &mut self,
        object: ObjectKey,
        other: ObjectKey,
    ) -> Result<(), PhysicsError> {
        if !self.objects.contains(other.0) {
            return Err(PhysicsError::HandleNotFound);
        }
        let obj = self.object_mut(object)?;
        if !obj.exceptions.contains(&other) {
            obj.exceptions.push(other);
        }
        Ok(())
    }

    pub fn remove_collision_exception_with(
        &mut self,
        object: ObjectKey,
        other: ObjectKey,
    ) -> Result<(), PhysicsError> {
        self.object_mut(object)?.exceptions.retain(|e| *e != other);
        Ok(())
    }

    /// Accumulate an impulse on a rigid body, applied at the start of the
    /// next integration. No effect on static/kinematic bodies and areas.
    pub fn apply_impulse(&mut self, object: ObjectKey, impulse: m::Vec2) -> Result<(), PhysicsError> {
        if let ObjectKind::Rigid {
            pending_impulse, ..
        } = &mut self.object_mut(object)?.kind
        {
            *pending_impulse += impulse;
        }
        Ok(())
    }

    //
    // accessors
    //

    pub fn pose(&self, object: ObjectKey) -> Result<Pose, PhysicsError> {
        Ok(self.object(object)?.pose)
    }

    pub fn velocity(&self, object: ObjectKey) -> Result<m::Vec2, PhysicsError> {
        Ok(self.object(object)?.velocity_or_zero())
    }

    pub fn space_of(&self, object: ObjectKey) -> Result<Option<SpaceKey>, PhysicsError> {
        Ok(self.object(object)?.space)
    }

    pub fn is_area(&self, object: ObjectKey) -> Result<bool, PhysicsError> {
        Ok(self.object(object)?.is_area())
    }

    pub fn shape_count(&self, object: ObjectKey) -> Result<usize, PhysicsError> {
        Ok(self.object(object)?.shapes.len())
    }

    /// Take all overlap events queued on a space since the last drain.
    pub fn drain_events(&mut self, space: SpaceKey) -> Result<Vec<OverlapEvent>, PhysicsError> {
        Ok(std::mem::take(&mut self.space_mut(space)?.events))
    }

    //
    // internal lookups
    //

    #[inline]
    pub(crate) fn object(&self, key: ObjectKey) -> Result<&CollisionObject, PhysicsError> {
        self.objects.get(key.0).ok_or(PhysicsError::HandleNotFound)
    }

    #[inline]
    pub(crate) fn object_mut(
        &mut self,
        key: ObjectKey,
    ) -> Result<&mut CollisionObject, PhysicsError> {
        self.objects
            .get_mut(key.0)
            .ok_or(PhysicsError::HandleNotFound)
    }

    #[inline]
    pub(crate) fn space(&self, key: SpaceKey) -> Result<&Space, PhysicsError> {
        self.spaces.get(key.0).ok_or(PhysicsError::HandleNotFound)
    }

    #[inline]
    pub(crate) fn space_mut(&mut self, key: SpaceKey) -> Result<&mut Space, PhysicsError> {
        self.spaces
            .get_mut(key.0)
            .ok_or(PhysicsError::HandleNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freed_handles_stay_dead() {
        let mut world = PhysicsWorld::new();
        let body = world.create_body(BodyKind::Rigid);
        assert!(world.free(body).is_ok());
        assert_eq!(world.free(body), Err(PhysicsError::HandleNotFound));
        assert_eq!(
            world.pose(body).map(|_| ()),
            Err(PhysicsError::HandleNotFound)
        );

        // a new object may reuse the slot but not the handle
        let replacement = world.create_body(BodyKind::Rigid);
        assert_ne!(body, replacement);
        assert_eq!(world.free(body), Err(PhysicsError::HandleNotFound));
        assert!(world.pose(replacement).is_ok());
    }

    #[test]
    fn free_detaches_from_space_first() {
        let mut world = PhysicsWorld::new();
        let space = world.create_space();
        let body = world.create_body(BodyKind::Static);
        world.space_add(space, body).unwrap();
        assert_eq!(world.space_of(body).unwrap(), Some(space));

        world.free(body).unwrap();
        assert!(world.space(space).unwrap().members.is_empty());
    }

    #[test]
    fn objects_move_between_spaces() {
        let mut world = PhysicsWorld::new();
        let s1 = world.create_space();
        let s2 = world.create_space();
        let body = world.create_body(BodyKind::Kinematic);

        world.space_add(s1, body).unwrap();
        world.space_add(s2, body).unwrap();
        assert_eq!(world.space_of(body).unwrap(), Some(s2));
        assert!(world.space(s1).unwrap().members.is_empty());

        // removing from the wrong space is a recoverable error
        assert_eq!(
            world.space_remove(s1, body),
            Err(PhysicsError::SpaceMismatch)
        );
        world.space_remove(s2, body).unwrap();
        assert_eq!(world.space_of(body).unwrap(), None);
    }

    #[test]
    fn layer_mask_bit_setters() {
        let mut world = PhysicsWorld::new();
        let body = world.create_body(BodyKind::Static);
        world.set_collision_layer(body, 0).unwrap();
        world.set_collision_layer_bit(body, 3, true).unwrap();
        world.set_collision_mask_bit(body, 0, false).unwrap();
        let obj = world.object(body).unwrap();
        assert_eq!(obj.layer, 0b1000);
        assert_eq!(obj.mask, 0);

        // out-of-range indices wrap instead of overflowing the shift
        world.set_collision_layer_bit(body, 33, true).unwrap();
        assert_eq!(world.object(body).unwrap().layer, 0b1010);
    }

    #[test]
    fn freeing_a_space_detaches_members() {
        let mut world = PhysicsWorld::new();
        let space = world.create_space();
        let a = world.create_area();
        let b = world.create_body(BodyKind::Rigid);
        world.space_add(space, a).unwrap();
        world.space_add(space, b).unwrap();

        world.free_space(space).unwrap();
        assert_eq!(world.space_of(a).unwrap(), None);
        assert_eq!(world.space_of(b).unwrap(), None);
        // objects are still alive, owned by their creator
        assert!(world.pose(a).is_ok());
        assert_eq!(world.free_space(space), Err(PhysicsError::HandleNotFound));
    }
}
