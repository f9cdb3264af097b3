pub mod triangle_mesh;

pub use triangle_mesh::{MeshHit, TriangleMesh};
