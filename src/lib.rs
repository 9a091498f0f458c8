pub mod math;
pub use math::{uv, Angle, Pose, PoseBuilder, Rotor2, Unit, Vec2};

pub mod error;
pub use error::PhysicsError;

pub mod collision;
pub use collision::{
    query::{Ray, RayHit},
    shape::{Aabb, Shape},
    Contact, SweepAndPrune,
};

pub mod object;
pub use object::{BodyKind, ShapeInstance};

pub mod event;
pub use event::OverlapEvent;

pub mod space;
pub use space::{CastHit, RayResult, SlideOutcome, SlideParams};

pub mod world;
pub use world::{ObjectKey, PhysicsWorld, SpaceKey};
