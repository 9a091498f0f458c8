use thiserror::Error;

/// Errors that can be returned by world and space operations.
///
/// Stepping itself never fails; malformed objects are skipped so a single
/// bad collider cannot stall the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum PhysicsError {
    /// A shape was constructed with a non-positive radius or extent.
    #[error("shape dimensions must be positive")]
    InvalidGeometry,
    /// The handle does not refer to a live object or space.
    /// It may have been freed, or it may come from a different world.
    #[error("no object or space with this handle")]
    HandleNotFound,
    /// The object is not a member of the given space.
    #[error("object is not in this space")]
    SpaceMismatch,
}
