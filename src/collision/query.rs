//! Exact intersection queries for points and rays vs. shapes,
//! independent of stepping.

use super::shape::Shape;
use crate::math::{self as m, Pose, Unit};

/// A ray with a normalized direction.
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub start: m::Vec2,
    pub dir: Unit<m::Vec2>,
}

impl Ray {
    #[inline]
    pub fn point_at_t(&self, t: f64) -> m::Vec2 {
        self.start + t * *self.dir
    }
}

/// A ray-shape intersection.
#[derive(Clone, Copy, Debug)]
pub struct RayHit {
    /// Distance along the ray at which the surface was hit.
    pub t: f64,
    /// The point on the shape's surface where the ray entered.
    pub point: m::Vec2,
    /// Outward surface normal at the hit point.
    pub normal: Unit<m::Vec2>,
}

/// Check whether or not a point is inside a shape.
pub fn point_hit(point: m::Vec2, shape: &Shape, pose: &Pose, scale: f64) -> bool {
    let p_local = pose.inversed() * point;
    match *shape {
        Shape::Circle { r } => {
            let r = r * scale;
            p_local.mag_sq() < r * r
        }
        Shape::Rect { hw, hh } => p_local.x.abs() < hw * scale && p_local.y.abs() < hh * scale,
    }
}

/// Find the nearest intersection of a ray with a shape within `t_max`.
///
/// Rays that start inside the shape report no hit; the surface must be
/// entered from the outside.
pub fn ray_hit(ray: &Ray, t_max: f64, shape: &Shape, pose: &Pose, scale: f64) -> Option<RayHit> {
    match *shape {
        Shape::Circle { r } => ray_circle(ray, t_max, pose.translation, r * scale),
        Shape::Rect { hw, hh } => ray_rect(ray, t_max, pose, hw * scale, hh * scale),
    }
}

fn ray_circle(ray: &Ray, t_max: f64, center: m::Vec2, r: f64) -> Option<RayHit> {
    let to_start = ray.start - center;
    // |to_start + t * dir|^2 = r^2, with |dir| = 1
    let b = ray.dir.dot(to_start);
    let c = to_start.mag_sq() - r * r;
    if c < 0.0 {
        // started inside
        return None;
    }
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let t = -b - discriminant.sqrt();
    if t < 0.0 || t > t_max {
        return None;
    }
    let point = ray.point_at_t(t);
    Some(RayHit {
        t,
        point,
        normal: Unit::new_normalize(point - center),
    })
}

fn ray_rect(ray: &Ray, t_max: f64, pose: &Pose, hw: f64, hh: f64) -> Option<RayHit> {
    let pose_inv = pose.inversed();
    let start = pose_inv * ray.start;
    let dir = pose_inv.rotation * *ray.dir;

    // slab test on both principal axes in rect-local space
    let mut t_enter = f64::MIN;
    let mut t_exit = f64::MAX;
    // normal of the face the ray enters through, in local space
    let mut enter_normal = m::Vec2::zero();

    for (s, d, half, axis) in [
        (start.x, dir.x, hw, m::Vec2::unit_x()),
        (start.y, dir.y, hh, m::Vec2::unit_y()),
    ] {
        if d == 0.0 {
            if s.abs() > half {
                return None;
            }
            continue;
        }
        let t_near = (-half - s) / d;
        let t_far = (half - s) / d;
        let (t_near, t_far) = if t_near <= t_far {
            (t_near, t_far)
        } else {
            (t_far, t_near)
        };
        if t_near > t_enter {
            t_enter = t_near;
            enter_normal = -d.signum() * axis;
        }
        t_exit = t_exit.min(t_far);
    }

    if t_enter > t_exit || t_enter < 0.0 || t_enter > t_max {
        return None;
    }
    Some(RayHit {
        t: t_enter,
        point: ray.point_at_t(t_enter),
        normal: pose.rotation * Unit::new_unchecked(enter_normal),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ray_through_rect_center_hits_near_face() {
        let rect = Shape::rect(4.0, 2.0).unwrap();
        let pose = Pose::new(m::Vec2::new(10.0, 0.0), m::Rotor2::identity());
        let ray = Ray {
            start: m::Vec2::zero(),
            dir: Unit::unit_x(),
        };
        let hit = ray_hit(&ray, 100.0, &rect, &pose, 1.0).unwrap();
        assert!((hit.t - 8.0).abs() < 1e-9);
        assert!((hit.point - m::Vec2::new(8.0, 0.0)).mag() < 1e-9);
        assert!((*hit.normal - m::Vec2::new(-1.0, 0.0)).mag() < 1e-9);

        // beyond the segment's reach
        assert!(ray_hit(&ray, 7.0, &rect, &pose, 1.0).is_none());
        // starting inside
        let inside = Ray {
            start: m::Vec2::new(10.0, 0.0),
            dir: Unit::unit_x(),
        };
        assert!(ray_hit(&inside, 100.0, &rect, &pose, 1.0).is_none());
    }

    #[test]
    fn ray_circle_entry_point() {
        let circle = Shape::circle(1.0).unwrap();
        let pose = Pose::new(m::Vec2::new(0.0, 5.0), m::Rotor2::identity());
        let ray = Ray {
            start: m::Vec2::zero(),
            dir: Unit::unit_y(),
        };
        let hit = ray_hit(&ray, 100.0, &circle, &pose, 1.0).unwrap();
        assert!((hit.t - 4.0).abs() < 1e-9);
        assert!((*hit.normal - m::Vec2::new(0.0, -1.0)).mag() < 1e-9);

        // a parallel ray off to the side misses
        let miss = Ray {
            start: m::Vec2::new(1.5, 0.0),
            dir: Unit::unit_y(),
        };
        assert!(ray_hit(&miss, 100.0, &circle, &pose, 1.0).is_none());
    }

    #[test]
    fn point_tests_are_shape_local() {
        let rect = Shape::rect(2.0, 2.0).unwrap();
        let pose = Pose::new(m::Vec2::new(0.0, 0.0), m::Rotor2::from_angle(0.5));
        assert!(point_hit(m::Vec2::new(0.1, 0.1), &rect, &pose, 1.0));
        assert!(!point_hit(m::Vec2::new(1.4, 1.4), &rect, &pose, 1.0));

        let circle = Shape::circle(1.0).unwrap();
        let pose = Pose::new(m::Vec2::new(3.0, 0.0), m::Rotor2::identity());
        assert!(point_hit(m::Vec2::new(3.5, 0.0), &circle, &pose, 1.0));
        assert!(!point_hit(m::Vec2::new(4.5, 0.0), &circle, &pose, 1.0));
        // scale enlarges the shape
        assert!(point_hit(m::Vec2::new(4.5, 0.0), &circle, &pose, 2.0));
    }
}
