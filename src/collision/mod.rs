//! Collision detection: shapes and their bounding volumes, broad phase
//! pair generation, narrow phase contact tests and ray/point queries.

pub mod broadphase;
pub use broadphase::SweepAndPrune;

pub mod shape;
pub use shape::{Aabb, Shape};

pub mod narrowphase;
pub use narrowphase::{intersection_check, Contact};

pub mod query;
pub use query::{Ray, RayHit};
