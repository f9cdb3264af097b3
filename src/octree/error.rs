/// Ways building an octree can fail.
///
/// Queries against a finished index cannot fail.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum OctreeError {
    /// The bounding box handed to the builder was unusable.
    #[error("invalid bounding box: {reason}")]
    InvalidGeometry { reason: &'static str },

    /// The root volume could not be grown enough to hold an object.
    #[error("degenerate scene: object still outside the root after {steps} growth steps")]
    DegenerateScene { steps: usize },

    /// More nodes or list cells than fit a 32 bit index.
    #[error("octree {what} capacity exceeded")]
    CapacityExceeded { what: &'static str },

    #[error("invalid octree configuration: {reason}")]
    InvalidConfig { reason: &'static str },
}
