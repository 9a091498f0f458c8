//! Collision shape primitives and their bounding volumes.

use crate::error::PhysicsError;
use crate::math::{self as m, Unit};

/// The geometry of a collider.
///
/// Shapes are immutable once created and shared between attachments by
/// reference count (see [`ShapeInstance`][crate::object::ShapeInstance]),
/// never deep-copied. Sizes are stored halved because this makes
/// intersection tests easier.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Serialize, serde::Deserialize))]
pub enum Shape {
    Circle { r: f64 },
    Rect { hw: f64, hh: f64 },
}

impl Shape {
    /// Create a circle shape from a radius.
    pub fn circle(radius: f64) -> Result<Self, PhysicsError> {
        if radius <= 0.0 {
            return Err(PhysicsError::InvalidGeometry);
        }
        Ok(Shape::Circle { r: radius })
    }

    /// Create a rect shape from full side lengths.
    pub fn rect(width: f64, height: f64) -> Result<Self, PhysicsError> {
        if width <= 0.0 || height <= 0.0 {
            return Err(PhysicsError::InvalidGeometry);
        }
        Ok(Shape::Rect {
            hw: width / 2.0,
            hh: height / 2.0,
        })
    }

    /// Create a rect shape with both sides set to the same length.
    pub fn square(side_length: f64) -> Result<Self, PhysicsError> {
        Self::rect(side_length, side_length)
    }

    /// The axis-aligned box covering the shape under the given pose and
    /// uniform scale. Conservative: never under-approximates the true
    /// extent, including rotation.
    pub fn bounding_box(&self, pose: &m::Pose, scale: f64) -> Aabb {
        let center = pose.translation;
        match *self {
            Shape::Circle { r } => {
                let r = r * scale;
                Aabb {
                    min: center - m::Vec2::new(r, r),
                    max: center + m::Vec2::new(r, r),
                }
            }
            Shape::Rect { hw, hh } => {
                let x_v = pose.rotation * m::Vec2::new(hw * scale, 0.0);
                let y_v = pose.rotation * m::Vec2::new(0.0, hh * scale);
                let half = m::Vec2::new(
                    x_v.x.abs() + y_v.x.abs(),
                    x_v.y.abs() + y_v.y.abs(),
                );
                Aabb {
                    min: center - half,
                    max: center + half,
                }
            }
        }
    }

    /// The furthest point of the shape along `dir`, in world space.
    pub fn support(&self, dir: Unit<m::Vec2>, pose: &m::Pose, scale: f64) -> m::Vec2 {
        match *self {
            Shape::Circle { r } => pose.translation + *dir * (r * scale),
            Shape::Rect { hw, hh } => {
                let dir_local = pose.rotation.reversed() * *dir;
                let corner = m::Vec2::new(
                    dir_local.x.signum() * hw * scale,
                    dir_local.y.signum() * hh * scale,
                );
                *pose * corner
            }
        }
    }
}

/// An axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: m::Vec2,
    pub max: m::Vec2,
}

impl Aabb {
    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn center(&self) -> m::Vec2 {
        (self.min + self.max) / 2.0
    }

    /// The smallest box containing both boxes.
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: m::Vec2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: m::Vec2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Whether the boxes share any area. Boxes that only touch at an edge
    /// still count as overlapping; the broad phase must over-approximate.
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }

    #[inline]
    pub fn contains_point(&self, point: m::Vec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Extend the box to cover a linear sweep by `motion`.
    pub fn extended_by_motion(&self, motion: m::Vec2) -> Aabb {
        Aabb {
            min: m::Vec2::new(
                self.min.x + motion.x.min(0.0),
                self.min.y + motion.y.min(0.0),
            ),
            max: m::Vec2::new(
                self.max.x + motion.x.max(0.0),
                self.max.y + motion.y.max(0.0),
            ),
        }
    }

    /// Grow the box by `margin` on every side.
    pub fn padded(&self, margin: f64) -> Aabb {
        Aabb {
            min: self.min - m::Vec2::new(margin, margin),
            max: self.max + m::Vec2::new(margin, margin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Angle;

    #[test]
    fn invalid_geometry_is_rejected() {
        assert_eq!(Shape::circle(0.0), Err(PhysicsError::InvalidGeometry));
        assert_eq!(Shape::circle(-1.0), Err(PhysicsError::InvalidGeometry));
        assert_eq!(Shape::rect(1.0, 0.0), Err(PhysicsError::InvalidGeometry));
        assert_eq!(Shape::rect(-2.0, 1.0), Err(PhysicsError::InvalidGeometry));
        assert!(Shape::circle(0.5).is_ok());
    }

    #[test]
    fn rotated_rect_bounding_box_covers_corners() {
        let shape = Shape::rect(2.0, 1.0).unwrap();
        let pose = m::PoseBuilder::new()
            .with_position([3.0, 1.0])
            .with_rotation(Angle::Deg(30.0))
            .build();
        let bb = shape.bounding_box(&pose, 1.0);
        // every corner of the rotated rect must be inside the box
        for corner in [
            m::Vec2::new(1.0, 0.5),
            m::Vec2::new(-1.0, 0.5),
            m::Vec2::new(1.0, -0.5),
            m::Vec2::new(-1.0, -0.5),
        ] {
            assert!(bb.contains_point(pose * corner));
        }
        // and the box must be centered on the pose
        assert!((bb.center() - pose.translation).mag() < 1e-9);
    }

    #[test]
    fn support_points_are_extremal() {
        let rect = Shape::rect(4.0, 2.0).unwrap();
        let pose = m::Pose::identity();
        let s = rect.support(Unit::new_normalize(m::Vec2::new(1.0, 1.0)), &pose, 1.0);
        assert!((s - m::Vec2::new(2.0, 1.0)).mag() < 1e-9);

        let circle = Shape::circle(1.5).unwrap();
        let s = circle.support(Unit::unit_y(), &pose, 2.0);
        assert!((s - m::Vec2::new(0.0, 3.0)).mag() < 1e-9);
    }

    #[test]
    fn aabb_sweep_extension() {
        let bb = Aabb {
            min: m::Vec2::new(0.0, 0.0),
            max: m::Vec2::new(1.0, 1.0),
        };
        let swept = bb.extended_by_motion(m::Vec2::new(2.0, -3.0));
        assert_eq!(swept.min, m::Vec2::new(0.0, -3.0));
        assert_eq!(swept.max, m::Vec2::new(3.0, 1.0));
    }
}
