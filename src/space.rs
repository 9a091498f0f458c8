//! Spaces and the simulation step: broad phase refresh, pair filtering,
//! contact generation, area transitions, contact resolution and rigid
//! body integration, plus kinematic sweeps and spatial queries.

use itertools::Itertools;

use crate::collision::narrowphase::{intersection_check, Contact};
use crate::collision::query::{self, Ray};
use crate::collision::shape::{Aabb, Shape};
use crate::collision::SweepAndPrune;
use crate::error::PhysicsError;
use crate::event::OverlapEvent;
use crate::math::{self as m, Angle, Pose, Unit};
use crate::object::{CollisionObject, ObjectKind};
use crate::world::{ObjectKey, PhysicsWorld, SpaceKey};

/// An isolated simulation region. Objects only ever interact with
/// members of the same space.
pub(crate) struct Space {
    pub(crate) members: Vec<ObjectKey>,
    pub(crate) index: SweepAndPrune,
    pub(crate) active: bool,
    /// Overlap events queued since the last drain.
    pub(crate) events: Vec<OverlapEvent>,
}

impl Space {
    pub(crate) fn new() -> Self {
        Space {
            members: Vec::new(),
            index: SweepAndPrune::new(),
            active: true,
            events: Vec::new(),
        }
    }
}

/// The result of a swept kinematic move that hit something.
#[derive(Clone, Copy, Debug)]
pub struct CastHit {
    /// The object that was hit.
    pub collider: ObjectKey,
    /// Surface normal at the hit, pointing from the obstacle
    /// towards the moving body.
    pub normal: Unit<m::Vec2>,
    /// A representative contact point in world space.
    pub point: m::Vec2,
    /// The part of the motion that was applied before stopping.
    pub travel: m::Vec2,
    /// The part of the motion left unconsumed.
    pub remainder: m::Vec2,
}

/// Tuning for [`move_and_slide`][PhysicsWorld::move_and_slide].
#[derive(Clone, Copy, Debug)]
pub struct SlideParams {
    /// Upper bound on collide-and-deflect iterations per call.
    pub max_slides: usize,
    /// Steepest surface angle away from `up` still counted as floor.
    pub floor_max_angle: Angle,
}

impl Default for SlideParams {
    fn default() -> Self {
        SlideParams {
            max_slides: 4,
            floor_max_angle: Angle::Deg(45.0),
        }
    }
}

/// What a [`move_and_slide`][PhysicsWorld::move_and_slide] call ran into.
#[derive(Clone, Copy, Debug)]
pub struct SlideOutcome {
    /// Velocity with the components into hit surfaces removed.
    pub velocity: m::Vec2,
    pub on_floor: bool,
    pub on_wall: bool,
    pub on_ceiling: bool,
}

/// A ray query hit.
#[derive(Clone, Copy, Debug)]
pub struct RayResult {
    pub collider: ObjectKey,
    pub position: m::Vec2,
    /// Outward surface normal at the hit point.
    pub normal: Unit<m::Vec2>,
}

/// The deepest contact over all shape instance combinations of a pair,
/// with the normal oriented from `a` towards `b`.
fn deepest_contact(a: &CollisionObject, b: &CollisionObject) -> Option<Contact> {
    let mut best: Option<Contact> = None;
    for inst_a in &a.shapes {
        let pose_a = a.pose * inst_a.offset;
        for inst_b in &b.shapes {
            let pose_b = b.pose * inst_b.offset;
            if let Some(contact) = intersection_check(
                inst_a.shape.as_ref(),
                &pose_a,
                a.scale,
                inst_b.shape.as_ref(),
                &pose_b,
                b.scale,
            ) {
                if best.map_or(true, |b| contact.depth > b.depth) {
                    best = Some(contact);
                }
            }
        }
    }
    best
}

impl PhysicsWorld {
    /// Advance a space by one fixed timestep.
    ///
    /// Refreshes the broad phase, detects contacts among members,
    /// queues area overlap transitions, resolves rigid body contacts
    /// and integrates rigid bodies. Inactive spaces are left untouched.
    ///
    /// A malformed member (freed handle, no shapes) is skipped,
    /// never an error; stepping itself cannot fail once the space
    /// handle resolves.
    pub fn step(&mut self, space: SpaceKey, dt: f64) -> Result<(), PhysicsError> {
        let Self { spaces, objects } = self;
        let sp = spaces
            .get_mut(space.0)
            .ok_or(PhysicsError::HandleNotFound)?;
        if !sp.active {
            return Ok(());
        }
        let members = sp.members.clone();

        // refresh cached bounding boxes; objects with nothing to collide
        // with drop out of the index entirely
        for &key in &members {
            let aabb = objects
                .get(key.0)
                .filter(|obj| obj.enabled)
                .and_then(|obj| obj.aggregate_aabb());
            match aabb {
                Some(aabb) => sp.index.update(key, aabb),
                None => sp.index.remove(key),
            }
        }

        let pairs = sp.index.pairs();
        log::trace!("stepping space {:?}: {} candidate pairs", space, pairs.len());

        // overlaps observed this step, as (monitoring area, other)
        let mut area_hits: Vec<(ObjectKey, ObjectKey)> = Vec::new();

        for (key_a, key_b) in pairs {
            let (a, b) = match (objects.get(key_a.0), objects.get(key_b.0)) {
                (Some(a), Some(b)) => (a, b),
                _ => continue,
            };
            if !a.interacts_with(b) {
                continue;
            }
            if a.has_exception_with(key_b) || b.has_exception_with(key_a) {
                continue;
            }
            let a_rigid = matches!(a.kind, ObjectKind::Rigid { .. });
            let b_rigid = matches!(b.kind, ObjectKind::Rigid { .. });
            let any_area = a.is_area() || b.is_area();
            // only pairs that can produce an event or a response get the
            // exact test; in particular static-static and static-kinematic
            // pairs end here
            if !any_area && !a_rigid && !b_rigid {
                continue;
            }

            let contact = match deepest_contact(a, b) {
                Some(c) => c,
                None => continue,
            };

            if any_area {
                // areas observe, never resolve
                if a.is_monitoring() {
                    area_hits.push((key_a, key_b));
                }
                if b.is_monitoring() {
                    area_hits.push((key_b, key_a));
                }
                continue;
            }

            // positional correction, split evenly between two rigid bodies
            let normal = *contact.normal;
            let (push_a, push_b) = if a_rigid && b_rigid {
                (-0.5 * contact.depth * normal, 0.5 * contact.depth * normal)
            } else if a_rigid {
                (-contact.depth * normal, m::Vec2::zero())
            } else {
                (m::Vec2::zero(), contact.depth * normal)
            };

            // velocity response along the normal, only when approaching;
            // static and kinematic bodies contribute zero velocity and
            // absorb none of the impulse
            let approach = (a.velocity_or_zero() - b.velocity_or_zero()).dot(normal);
            let (dv_a, dv_b) = if approach > 0.0 {
                let bounce = a.bounce.min(b.bounce);
                let response = (1.0 + bounce) * approach;
                if a_rigid && b_rigid {
                    (-0.5 * response * normal, 0.5 * response * normal)
                } else if a_rigid {
                    (-response * normal, m::Vec2::zero())
                } else {
                    (m::Vec2::zero(), response * normal)
                }
            } else {
                (m::Vec2::zero(), m::Vec2::zero())
            };

            if a_rigid {
                if let Some(obj) = objects.get_mut(key_a.0) {
                    obj.pose.translation += push_a;
                    if let Some(vel) = obj.velocity_mut() {
                        *vel += dv_a;
                    }
                }
            }
            if b_rigid {
                if let Some(obj) = objects.get_mut(key_b.0) {
                    obj.pose.translation += push_b;
                    if let Some(vel) = obj.velocity_mut() {
                        *vel += dv_b;
                    }
                }
            }
        }

        // diff each monitoring area's overlap set against what this step
        // observed; each transition fires exactly once
        area_hits.sort_unstable();
        let mut transitions: Vec<(ObjectKey, ObjectKey, bool)> = Vec::new();
        for &key in &members {
            let obj = match objects.get_mut(key.0) {
                Some(obj) => obj,
                None => continue,
            };
            let (monitoring, overlaps) = match &mut obj.kind {
                ObjectKind::Area {
                    monitoring,
                    overlaps,
                } => (*monitoring, overlaps),
                _ => continue,
            };
            if !monitoring {
                overlaps.clear();
                continue;
            }
            let current: Vec<ObjectKey> = area_hits
                .iter()
                .filter(|(area, _)| *area == key)
                .map(|(_, other)| *other)
                .collect();
            let exited: Vec<ObjectKey> = overlaps
                .iter()
                .copied()
                .filter(|other| !current.contains(other))
                .sorted()
                .collect();
            for &other in &exited {
                overlaps.remove(&other);
                transitions.push((key, other, false));
            }
            for &other in &current {
                if overlaps.insert(other) {
                    transitions.push((key, other, true));
                }
            }
        }

        let sp = spaces.get_mut(space.0).expect("space checked above");
        for (area, other, entered) in transitions {
            let other_is_area = objects.get(other.0).map_or(false, |o| o.is_area());
            sp.events.push(match (other_is_area, entered) {
                (false, true) => OverlapEvent::BodyEntered { area, body: other },
                (false, false) => OverlapEvent::BodyExited { area, body: other },
                (true, true) => OverlapEvent::AreaEntered { area, other },
                (true, false) => OverlapEvent::AreaExited { area, other },
            });
        }

        // integrate rigid bodies
        for &key in &members {
            let obj = match objects.get_mut(key.0) {
                Some(obj) => obj,
                None => continue,
            };
            if !obj.enabled {
                continue;
            }
            if let ObjectKind::Rigid {
                velocity,
                pending_impulse,
            } = &mut obj.kind
            {
                *velocity += *pending_impulse;
                *pending_impulse = m::Vec2::zero();
                obj.pose.translation += *velocity * dt;
            }
        }

        Ok(())
    }

    //
    // kinematic sweeps
    //

    /// Sweep a kinematic or rigid body along `motion`, stopping at the
    /// first obstacle.
    ///
    /// On a hit the body is moved to the point of impact and the
    /// unconsumed remainder of the motion is returned; otherwise the
    /// full motion is applied. Motion ending exactly tangent to an
    /// obstacle counts as no collision.
    pub fn move_and_collide(
        &mut self,
        body: ObjectKey,
        motion: m::Vec2,
    ) -> Result<Option<CastHit>, PhysicsError> {
        let obj = self.object(body)?;
        let space = match obj.space {
            Some(space) => space,
            None => return Ok(None),
        };
        if !self.space(space)?.active || !obj.enabled || !obj.moves() {
            return Ok(None);
        }
        if motion.mag_sq() < 1e-24 {
            return Ok(None);
        }
        let base_aabb = match obj.aggregate_aabb() {
            Some(aabb) => aabb,
            None => return Ok(None),
        };
        let swept = base_aabb.extended_by_motion(motion).padded(1e-6);
        let base_pose = obj.pose;

        let members = self.space(space)?.members.clone();
        let mover = self.object(body)?;
        let mut candidates: Vec<ObjectKey> = Vec::new();
        // the narrowest footprint among the mover and its candidates
        // bounds how far the march may step without skipping anything
        let mut min_extent = match mover.min_shape_extent() {
            Some(extent) => extent,
            None => return Ok(None),
        };
        for key in members {
            if key == body {
                continue;
            }
            let other = match self.objects.get(key.0) {
                Some(other) => other,
                None => continue,
            };
            if !other.enabled || !other.is_solid() {
                continue;
            }
            if !mover.interacts_with(other) {
                continue;
            }
            if mover.has_exception_with(key) || other.has_exception_with(body) {
                continue;
            }
            match other.aggregate_aabb() {
                Some(aabb) if aabb.overlaps(&swept) => {
                    if let Some(extent) = other.min_shape_extent() {
                        min_extent = min_extent.min(extent);
                    }
                    candidates.push(key);
                }
                _ => continue,
            }
        }

        // coarse march along the motion to bracket the time of impact,
        // then bisect the bracket; sample spacing stays under half the
        // narrowest footprint so no candidate fits between two samples
        let samples = ((2.0 * motion.mag() / min_extent).ceil() as usize).clamp(16, 4096);
        let mut t_free = 0.0;
        let mut first_hit: Option<(f64, ObjectKey, Contact)> = None;
        for i in 0..=samples {
            let t = i as f64 / samples as f64;
            if let Some((key, contact)) = self.sweep_contact(body, base_pose, motion, t, &candidates)
            {
                first_hit = Some((t, key, contact));
                break;
            }
            t_free = t;
        }
        let (mut t_hit, mut hit_key, mut contact) = match first_hit {
            Some(hit) => hit,
            None => {
                self.object_mut(body)?.pose.translation += motion;
                return Ok(None);
            }
        };
        if t_hit > 0.0 {
            for _ in 0..24 {
                let mid = 0.5 * (t_free + t_hit);
                match self.sweep_contact(body, base_pose, motion, mid, &candidates) {
                    Some((key, c)) => {
                        t_hit = mid;
                        hit_key = key;
                        contact = c;
                    }
                    None => t_free = mid,
                }
            }
        } else {
            // already overlapping before moving at all
            t_free = 0.0;
        }

        let travel = motion * t_free;
        self.object_mut(body)?.pose.translation += travel;
        Ok(Some(CastHit {
            collider: hit_key,
            // the contact normal points from the mover into the obstacle
            normal: -contact.normal,
            point: contact.point,
            travel,
            remainder: motion * (1.0 - t_free),
        }))
    }

    /// The deepest contact between the moving body (displaced to
    /// fraction `t` of `motion`) and any of the candidates.
    fn sweep_contact(
        &self,
        body: ObjectKey,
        base_pose: Pose,
        motion: m::Vec2,
        t: f64,
        candidates: &[ObjectKey],
    ) -> Option<(ObjectKey, Contact)> {
        let mover = self.objects.get(body.0)?;
        let mut pose = base_pose;
        pose.translation += motion * t;

        let mut best: Option<(ObjectKey, Contact)> = None;
        for &key in candidates {
            let other = match self.objects.get(key.0) {
                Some(other) => other,
                None => continue,
            };
            for inst_m in &mover.shapes {
                let pose_m = pose * inst_m.offset;
                for inst_o in &other.shapes {
                    let pose_o = other.pose * inst_o.offset;
                    if let Some(contact) = intersection_check(
                        inst_m.shape.as_ref(),
                        &pose_m,
                        mover.scale,
                        inst_o.shape.as_ref(),
                        &pose_o,
                        other.scale,
                    ) {
                        if best.as_ref().map_or(true, |(_, b)| contact.depth > b.depth) {
                            best = Some((key, contact));
                        }
                    }
                }
            }
        }
        best
    }

    /// Move a body by `velocity * dt`, deflecting along surfaces it hits.
    ///
    /// Each hit removes the velocity component into the surface and
    /// slides the unconsumed motion along the contact plane, up to
    /// `params.max_slides` iterations. Surfaces are classified against
    /// `up` using `params.floor_max_angle`.
    pub fn move_and_slide(
        &mut self,
        body: ObjectKey,
        velocity: m::Vec2,
        up: m::Vec2,
        dt: f64,
        params: &SlideParams,
    ) -> Result<SlideOutcome, PhysicsError> {
        let floor_dot = params.floor_max_angle.rad().cos() - 1e-9;
        let mut outcome = SlideOutcome {
            velocity,
            on_floor: false,
            on_wall: false,
            on_ceiling: false,
        };
        let mut motion = velocity * dt;
        for _ in 0..params.max_slides {
            let hit = match self.move_and_collide(body, motion)? {
                Some(hit) => hit,
                None => break,
            };
            let normal = *hit.normal;
            let toward_up = normal.dot(up);
            if toward_up >= floor_dot {
                outcome.on_floor = true;
            } else if toward_up <= -floor_dot {
                outcome.on_ceiling = true;
            } else {
                outcome.on_wall = true;
            }
            motion = hit.remainder - normal * hit.remainder.dot(normal);
            outcome.velocity -= normal * outcome.velocity.dot(normal);
            if motion.mag_sq() < 1e-18 {
                break;
            }
        }
        Ok(outcome)
    }

    //
    // queries
    //

    /// The nearest hit along the segment from `from` to `to` against
    /// members whose layer passes `mask`. Inactive spaces report no hits.
    pub fn intersect_ray(
        &self,
        space: SpaceKey,
        from: m::Vec2,
        to: m::Vec2,
        mask: u32,
    ) -> Result<Option<RayResult>, PhysicsError> {
        let sp = self.space(space)?;
        if !sp.active {
            return Ok(None);
        }
        let delta = to - from;
        let length = delta.mag();
        if length < 1e-12 {
            return Ok(None);
        }
        let ray = Ray {
            start: from,
            dir: Unit::new_normalize(delta),
        };
        let segment_aabb = Aabb {
            min: m::Vec2::new(from.x.min(to.x), from.y.min(to.y)),
            max: m::Vec2::new(from.x.max(to.x), from.y.max(to.y)),
        };

        let mut nearest: Option<(f64, RayResult)> = None;
        for &key in &sp.members {
            let obj = match self.objects.get(key.0) {
                Some(obj) => obj,
                None => continue,
            };
            if !obj.enabled || obj.layer & mask == 0 {
                continue;
            }
            match obj.aggregate_aabb() {
                Some(aabb) if aabb.overlaps(&segment_aabb) => (),
                _ => continue,
            }
            for inst in &obj.shapes {
                let pose = obj.pose * inst.offset;
                if let Some(hit) = query::ray_hit(&ray, length, inst.shape.as_ref(), &pose, obj.scale)
                {
                    if nearest.map_or(true, |(t, _)| hit.t < t) {
                        nearest = Some((
                            hit.t,
                            RayResult {
                                collider: key,
                                position: hit.point,
                                normal: hit.normal,
                            },
                        ));
                    }
                }
            }
        }
        Ok(nearest.map(|(_, result)| result))
    }

    /// All members containing the point and passing `mask`,
    /// in ascending handle order.
    pub fn intersect_point(
        &self,
        space: SpaceKey,
        point: m::Vec2,
        mask: u32,
    ) -> Result<Vec<ObjectKey>, PhysicsError> {
        let sp = self.space(space)?;
        if !sp.active {
            return Ok(Vec::new());
        }
        let mut hits = Vec::new();
        for &key in &sp.members {
            let obj = match self.objects.get(key.0) {
                Some(obj) => obj,
                None => continue,
            };
            if !obj.enabled || obj.layer & mask == 0 {
                continue;
            }
            let inside = obj.shapes.iter().any(|inst| {
                query::point_hit(point, inst.shape.as_ref(), &(obj.pose * inst.offset), obj.scale)
            });
            if inside {
                hits.push(key);
            }
        }
        hits.sort_unstable();
        Ok(hits)
    }

    /// All members intersecting the given shape and passing `mask`,
    /// deduplicated by handle, in ascending handle order.
    pub fn intersect_shape(
        &self,
        space: SpaceKey,
        shape: &Shape,
        pose: &Pose,
        mask: u32,
    ) -> Result<Vec<ObjectKey>, PhysicsError> {
        let sp = self.space(space)?;
        if !sp.active {
            return Ok(Vec::new());
        }
        let probe_aabb = shape.bounding_box(pose, 1.0);
        let mut hits = Vec::new();
        for &key in &sp.members {
            let obj = match self.objects.get(key.0) {
                Some(obj) => obj,
                None => continue,
            };
            if !obj.enabled || obj.layer & mask == 0 {
                continue;
            }
            match obj.aggregate_aabb() {
                Some(aabb) if aabb.overlaps(&probe_aabb) => (),
                _ => continue,
            }
            let intersects = obj.shapes.iter().any(|inst| {
                intersection_check(
                    shape,
                    pose,
                    1.0,
                    inst.shape.as_ref(),
                    &(obj.pose * inst.offset),
                    obj.scale,
                )
                .is_some()
            });
            if intersects {
                hits.push(key);
            }
        }
        hits.sort_unstable();
        Ok(hits)
    }
}
