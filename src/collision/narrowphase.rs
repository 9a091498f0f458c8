//! Narrow phase collision detection: exact pairwise intersection tests
//! producing a contact normal and penetration depth.

use super::shape::Shape;
use crate::math::{self as m, Pose, Unit};

/// An intersection between two shapes.
///
/// Transient: produced per colliding pair per step and consumed
/// immediately, never stored.
#[derive(Clone, Copy, Debug)]
pub struct Contact {
    /// The contact normal, oriented from the first shape towards the second.
    pub normal: Unit<m::Vec2>,
    /// Penetration depth, always greater than zero.
    /// Shapes that merely touch produce no contact.
    pub depth: f64,
    /// A representative point of contact in world space.
    pub point: m::Vec2,
}

/// Checks two transformed shapes for intersection.
///
/// Separating axis test over the shapes' candidate axes; the axis of
/// minimum positive overlap becomes the contact normal. Zero overlap on
/// any axis means the shapes are touching but not penetrating and no
/// contact is reported.
pub fn intersection_check(
    shape1: &Shape,
    pose1: &Pose,
    scale1: f64,
    shape2: &Shape,
    pose2: &Pose,
    scale2: f64,
) -> Option<Contact> {
    use Shape::*;
    match (*shape1, *shape2) {
        (Circle { r: r1 }, Circle { r: r2 }) => {
            circle_circle(pose1, r1 * scale1, pose2, r2 * scale2)
        }
        (Rect { hw, hh }, Circle { r }) => {
            rect_circle(pose1, hw * scale1, hh * scale1, pose2, r * scale2)
        }
        (Circle { r }, Rect { hw, hh }) => {
            rect_circle(pose2, hw * scale2, hh * scale2, pose1, r * scale1).map(flip_contact)
        }
        (Rect { hw: hw1, hh: hh1 }, Rect { hw: hw2, hh: hh2 }) => rect_rect(
            pose1,
            hw1 * scale1,
            hh1 * scale1,
            pose2,
            hw2 * scale2,
            hh2 * scale2,
        ),
    }
}

fn flip_contact(mut c: Contact) -> Contact {
    c.point -= c.depth * *c.normal;
    c.normal = -c.normal;
    c
}

//
// CIRCLE <-> CIRCLE
//

fn circle_circle(pose1: &Pose, r1: f64, pose2: &Pose, r2: f64) -> Option<Contact> {
    let pos1 = pose1.translation;
    let pos2 = pose2.translation;

    let dist = pos2 - pos1;
    let dist_sq = dist.mag_sq();
    let r_sum = r1 + r2;

    let (normal, depth) = if dist_sq < 1e-12 {
        // same position, consider penetration to be on the x axis
        (Unit::unit_x(), r_sum)
    } else if dist_sq < r_sum * r_sum {
        (Unit::new_normalize(dist), r_sum - dist_sq.sqrt())
    } else {
        return None;
    };

    Some(Contact {
        normal,
        depth,
        point: pos1 + r1 * *normal,
    })
}

//
// RECT <-> CIRCLE
//

fn rect_circle(pose_rect: &Pose, hw: f64, hh: f64, pose_circle: &Pose, r: f64) -> Option<Contact> {
    let center_wrt_rect = pose_rect.inversed() * pose_circle.translation;
    let dist_abs = m::Vec2::new(center_wrt_rect.x.abs(), center_wrt_rect.y.abs());
    let dist_signums = m::Vec2::new(center_wrt_rect.x.signum(), center_wrt_rect.y.signum());

    let c_to_corner = m::Vec2::new(hw - dist_abs.x, hh - dist_abs.y);
    if c_to_corner.x < -r || c_to_corner.y < -r {
        // too far to possibly intersect
        return None;
    }
    let point_abs: m::Vec2;
    let normal_abs: Unit<m::Vec2>;
    let depth: f64;
    if c_to_corner.x > 0.0 && c_to_corner.y > 0.0 {
        // circle center is inside the rect
        if c_to_corner.x < c_to_corner.y {
            point_abs = m::Vec2::new(hw, dist_abs.y);
            normal_abs = Unit::unit_x();
            depth = c_to_corner.x + r;
        } else {
            point_abs = m::Vec2::new(dist_abs.x, hh);
            normal_abs = Unit::unit_y();
            depth = c_to_corner.y + r;
        }
    } else if c_to_corner.x > 0.0 {
        // inside in the x direction but not y
        point_abs = m::Vec2::new(dist_abs.x, hh);
        normal_abs = Unit::unit_y();
        depth = c_to_corner.y + r;
    } else if c_to_corner.y > 0.0 {
        // inside in the y direction but not x
        point_abs = m::Vec2::new(hw, dist_abs.y);
        normal_abs = Unit::unit_x();
        depth = c_to_corner.x + r;
    } else {
        // outside both edges, possible intersection with the corner point
        point_abs = m::Vec2::new(hw, hh);
        if c_to_corner.mag_sq() < 1e-12 {
            // center exactly on the corner, consider penetration
            // to be on the x axis
            normal_abs = Unit::unit_x();
            depth = r;
        } else {
            normal_abs = Unit::new_normalize(-c_to_corner);
            depth = r - c_to_corner.mag();
        }
    }
    if depth <= 0.0 {
        // touching exactly counts as no contact
        return None;
    }

    let normal_wrt_rect = Unit::new_unchecked(m::Vec2::new(
        dist_signums.x * normal_abs.x,
        dist_signums.y * normal_abs.y,
    ));

    Some(Contact {
        normal: pose_rect.rotation * normal_wrt_rect,
        depth,
        point: *pose_rect
            * m::Vec2::new(dist_signums.x * point_abs.x, dist_signums.y * point_abs.y),
    })
}

//
// RECT <-> RECT
//

fn rect_rect(
    pose1: &Pose,
    hw1: f64,
    hh1: f64,
    pose2: &Pose,
    hw2: f64,
    hh2: f64,
) -> Option<Contact> {
    let pose2_wrt_pose1 = pose1.inversed() * *pose2;

    // obj1 is axis-aligned at the origin, these are obj2's values
    let dist = pose2_wrt_pose1.translation;

    let x2_axis = pose2_wrt_pose1.rotation * Unit::unit_x();
    let hw2_v = hw2 * (*x2_axis);

    let y2_axis = m::unit_left_normal(x2_axis);
    let hh2_v = hh2 * (*y2_axis);

    let axes = [Unit::unit_x(), Unit::unit_y(), x2_axis, y2_axis];

    // penetration along each axis; any nonpositive overlap separates
    let x1_pen = hw1 + hw2_v.x.abs() + hh2_v.x.abs() - dist.x.abs();
    if x1_pen <= 0.0 {
        return None;
    }
    let y1_pen = hh1 + hw2_v.y.abs() + hh2_v.y.abs() - dist.y.abs();
    if y1_pen <= 0.0 {
        return None;
    }
    let x2_pen = hw2 + x2_axis.x.abs() * hw1 + x2_axis.y.abs() * hh1 - (dist.dot(*x2_axis)).abs();
    if x2_pen <= 0.0 {
        return None;
    }
    let y2_pen = hh2 + y2_axis.x.abs() * hw1 + y2_axis.y.abs() * hh1 - (dist.dot(*y2_axis)).abs();
    if y2_pen <= 0.0 {
        return None;
    }

    let depths = [x1_pen, y1_pen, x2_pen, y2_pen];
    let (axis, &depth) = axes
        .iter()
        .zip(depths.iter())
        .min_by(|(_, d1), (_, d2)| d1.partial_cmp(d2).expect("There was a NaN somewhere"))
        .unwrap();

    // orient the axis of minimum penetration towards obj2
    let axis = Unit::new_unchecked(dist.dot(**axis).signum() * **axis);
    let normal = pose1.rotation * axis;

    // deepest point of obj2 against the normal
    let point = Shape::Rect { hw: hw2, hh: hh2 }.support(-normal, pose2, 1.0);

    Some(Contact {
        normal,
        depth,
        point,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Angle;

    fn pose_at(x: f64, y: f64) -> Pose {
        Pose::new(m::Vec2::new(x, y), m::Rotor2::identity())
    }

    #[test]
    fn circle_circle_depth_and_normal() {
        let c1 = Shape::circle(2.0).unwrap();
        let c2 = Shape::circle(2.0).unwrap();
        let p1 = pose_at(0.0, 0.0);
        let p2 = pose_at(3.0, 0.0);

        let contact = intersection_check(&c1, &p1, 1.0, &c2, &p2, 1.0).unwrap();
        assert!((contact.depth - 1.0).abs() < 1e-9);
        assert!((*contact.normal - m::Vec2::new(1.0, 0.0)).mag() < 1e-9);

        // reversed ordering gives the inverse normal
        let contact = intersection_check(&c2, &p2, 1.0, &c1, &p1, 1.0).unwrap();
        assert!((*contact.normal - m::Vec2::new(-1.0, 0.0)).mag() < 1e-9);

        // touching at exactly r1 + r2 is not a collision
        let p2 = pose_at(4.0, 0.0);
        assert!(intersection_check(&c1, &p1, 1.0, &c2, &p2, 1.0).is_none());
    }

    #[test]
    fn circle_circle_respects_scale() {
        let c1 = Shape::circle(1.0).unwrap();
        let c2 = Shape::circle(1.0).unwrap();
        let p1 = pose_at(0.0, 0.0);
        let p2 = pose_at(3.0, 0.0);
        assert!(intersection_check(&c1, &p1, 1.0, &c2, &p2, 1.0).is_none());
        let contact = intersection_check(&c1, &p1, 2.0, &c2, &p2, 2.0).unwrap();
        assert!((contact.depth - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rect_rect_overlapping_corners() {
        // 10x10 rects with origin corners (0,0) and (5,5):
        // overlap of 5 along both axes
        let r = Shape::rect(10.0, 10.0).unwrap();
        let p1 = pose_at(5.0, 5.0);
        let p2 = pose_at(10.0, 10.0);

        let contact = intersection_check(&r, &p1, 1.0, &r, &p2, 1.0).unwrap();
        assert!((contact.depth - 5.0).abs() < 1e-9);
        let n1 = *contact.normal;
        // axis-aligned overlap, so the normal is one of the principal axes
        // pointing from obj1 towards obj2
        assert!(n1.x >= 0.0 && n1.y >= 0.0);
        assert!((n1.mag() - 1.0).abs() < 1e-9);

        let contact = intersection_check(&r, &p2, 1.0, &r, &p1, 1.0).unwrap();
        assert!((contact.depth - 5.0).abs() < 1e-9);
        assert!((*contact.normal + n1).mag() < 1e-9);
    }

    #[test]
    fn rect_rect_separated_by_rotation() {
        let r = Shape::rect(2.0, 2.0).unwrap();
        let p1 = pose_at(0.0, 0.0);
        // a diamond whose corner just misses the first rect
        let p2 = Pose::new(m::Vec2::new(2.5, 0.0), Angle::Deg(45.0).into());
        assert!(intersection_check(&r, &p1, 1.0, &r, &p2, 1.0).is_none());
        // moved closer, the corner penetrates
        let p2 = Pose::new(m::Vec2::new(2.3, 0.0), Angle::Deg(45.0).into());
        let contact = intersection_check(&r, &p1, 1.0, &r, &p2, 1.0).unwrap();
        assert!(contact.depth > 0.0);
        assert!(contact.normal.x > 0.99);
    }

    #[test]
    fn rect_circle_face_and_corner() {
        let rect = Shape::rect(4.0, 4.0).unwrap();
        let circle = Shape::circle(1.0).unwrap();
        let p_rect = pose_at(0.0, 0.0);

        // face contact on the right side
        let p_circle = pose_at(2.5, 0.0);
        let contact = intersection_check(&rect, &p_rect, 1.0, &circle, &p_circle, 1.0).unwrap();
        assert!((contact.depth - 0.5).abs() < 1e-9);
        assert!((*contact.normal - m::Vec2::new(1.0, 0.0)).mag() < 1e-9);

        // flipped argument order inverts the normal
        let contact = intersection_check(&circle, &p_circle, 1.0, &rect, &p_rect, 1.0).unwrap();
        assert!((*contact.normal - m::Vec2::new(-1.0, 0.0)).mag() < 1e-9);

        // touching exactly is not a collision
        let p_circle = pose_at(3.0, 0.0);
        assert!(intersection_check(&rect, &p_rect, 1.0, &circle, &p_circle, 1.0).is_none());

        // corner contact
        let p_circle = pose_at(2.5, 2.5);
        let contact = intersection_check(&rect, &p_rect, 1.0, &circle, &p_circle, 1.0).unwrap();
        let expected_depth = 1.0 - (0.5f64 * 0.5 + 0.5 * 0.5).sqrt();
        assert!((contact.depth - expected_depth).abs() < 1e-9);
        let expected_normal = m::Vec2::new(1.0, 1.0).normalized();
        assert!((*contact.normal - expected_normal).mag() < 1e-9);

        // corner miss
        let p_circle = pose_at(2.8, 2.8);
        assert!(intersection_check(&rect, &p_rect, 1.0, &circle, &p_circle, 1.0).is_none());
    }

    #[test]
    fn rect_circle_center_on_corner_stays_finite() {
        let rect = Shape::rect(4.0, 4.0).unwrap();
        let circle = Shape::circle(1.0).unwrap();

        // circle centered exactly on the rect corner
        let contact =
            intersection_check(&rect, &pose_at(0.0, 0.0), 1.0, &circle, &pose_at(2.0, 2.0), 1.0)
                .unwrap();
        assert!((contact.depth - 1.0).abs() < 1e-9);
        assert!(!contact.normal.x.is_nan() && !contact.normal.y.is_nan());
        assert!((contact.normal.mag() - 1.0).abs() < 1e-9);
    }
}
