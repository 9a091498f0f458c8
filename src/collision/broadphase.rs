//! Broad phase collision detection is responsible for cheaply producing
//! pairs of possibly intersecting objects for further, more accurate
//! narrow phase inspection.

use std::collections::HashMap;

use super::shape::Aabb;
use crate::world::ObjectKey;

/// A sweep-and-prune broad phase over cached bounding boxes.
///
/// Entries are sorted along the x axis and swept; interval overlap on x
/// plus a y check yields the candidate pairs. This is conservative: it
/// may report pairs that don't actually collide, never the reverse.
#[derive(Debug, Default)]
pub struct SweepAndPrune {
    entries: HashMap<ObjectKey, Aabb>,
}

impl SweepAndPrune {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh the bounding box cached for an object.
    #[inline]
    pub fn update(&mut self, key: ObjectKey, aabb: Aabb) {
        self.entries.insert(key, aabb);
    }

    /// Drop an object from the index. Unknown keys are ignored.
    #[inline]
    pub fn remove(&mut self, key: ObjectKey) {
        self.entries.remove(&key);
    }

    #[inline]
    pub fn contains(&self, key: ObjectKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// All pairs of entries whose boxes overlap, each pair reported
    /// exactly once with the lower handle first, in ascending handle
    /// order for deterministic iteration.
    pub fn pairs(&self) -> Vec<(ObjectKey, ObjectKey)> {
        let mut sorted: Vec<(ObjectKey, &Aabb)> =
            self.entries.iter().map(|(k, bb)| (*k, bb)).collect();
        sorted.sort_unstable_by(|(k0, bb0), (k1, bb1)| {
            bb0.min
                .x
                .partial_cmp(&bb1.min.x)
                .expect("NaN in a bounding box")
                .then(k0.cmp(k1))
        });

        let mut pairs = Vec::new();
        for (i, (key_a, bb_a)) in sorted.iter().enumerate() {
            for (key_b, bb_b) in &sorted[i + 1..] {
                // sorted by min x, so past this point nothing can overlap a
                if bb_b.min.x > bb_a.max.x {
                    break;
                }
                if bb_a.min.y <= bb_b.max.y && bb_b.min.y <= bb_a.max.y {
                    let pair = if key_a < key_b {
                        (*key_a, *key_b)
                    } else {
                        (*key_b, *key_a)
                    };
                    pairs.push(pair);
                }
            }
        }
        pairs.sort_unstable();
        pairs
    }

    /// All entries whose boxes overlap the given region,
    /// in ascending handle order.
    pub fn query(&self, region: &Aabb) -> Vec<ObjectKey> {
        let mut hits: Vec<ObjectKey> = self
            .entries
            .iter()
            .filter(|(_, bb)| bb.overlaps(region))
            .map(|(k, _)| *k)
            .collect();
        hits.sort_unstable();
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math as m;
    use crate::object::BodyKind;
    use crate::world::PhysicsWorld;

    fn keys(world: &mut PhysicsWorld, n: usize) -> Vec<ObjectKey> {
        (0..n).map(|_| world.create_body(BodyKind::Static)).collect()
    }

    fn aabb(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Aabb {
        Aabb {
            min: m::Vec2::new(min_x, min_y),
            max: m::Vec2::new(max_x, max_y),
        }
    }

    #[test]
    fn pairs_are_unique_and_sorted() {
        let mut world = PhysicsWorld::new();
        let k = keys(&mut world, 3);
        let mut sap = SweepAndPrune::new();
        sap.update(k[0], aabb(0.0, 0.0, 2.0, 2.0));
        sap.update(k[1], aabb(1.0, 1.0, 3.0, 3.0));
        sap.update(k[2], aabb(1.5, 0.0, 2.5, 2.5));

        let pairs = sap.pairs();
        assert_eq!(pairs.len(), 3);
        for window in pairs.windows(2) {
            assert!(window[0] < window[1]);
        }
        // updating one entry away removes its pairs
        sap.update(k[2], aabb(10.0, 10.0, 11.0, 11.0));
        assert_eq!(sap.pairs().len(), 1);
        sap.remove(k[1]);
        assert!(!sap.contains(k[1]));
        assert!(sap.contains(k[0]));
        assert!(sap.pairs().is_empty());
    }

    #[test]
    fn region_query_finds_overlapping_entries() {
        let mut world = PhysicsWorld::new();
        let k = keys(&mut world, 2);
        let mut sap = SweepAndPrune::new();
        sap.update(k[0], aabb(0.0, 0.0, 1.0, 1.0));
        sap.update(k[1], aabb(5.0, 5.0, 6.0, 6.0));

        assert_eq!(sap.query(&aabb(0.5, 0.5, 5.5, 5.5)), vec![k[0], k[1]]);
        assert_eq!(sap.query(&aabb(2.0, 2.0, 3.0, 3.0)), Vec::new());
    }

    #[test]
    fn sweep_matches_brute_force_on_random_boxes() {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let mut world = PhysicsWorld::new();
        let k = keys(&mut world, 50);

        let mut sap = SweepAndPrune::new();
        let mut boxes = Vec::new();
        for key in &k {
            let min = m::Vec2::new(rng.gen_range(-20.0..20.0), rng.gen_range(-20.0..20.0));
            let size = m::Vec2::new(rng.gen_range(0.1..5.0), rng.gen_range(0.1..5.0));
            let bb = Aabb {
                min,
                max: min + size,
            };
            sap.update(*key, bb);
            boxes.push((*key, bb));
        }

        let mut expected = Vec::new();
        for (i, (key_a, bb_a)) in boxes.iter().enumerate() {
            for (key_b, bb_b) in &boxes[i + 1..] {
                if bb_a.overlaps(bb_b) {
                    let pair = if key_a < key_b {
                        (*key_a, *key_b)
                    } else {
                        (*key_b, *key_a)
                    };
                    expected.push(pair);
                }
            }
        }
        expected.sort_unstable();

        assert_eq!(sap.pairs(), expected);
    }
}
