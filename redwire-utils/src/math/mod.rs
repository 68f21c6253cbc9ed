//! Small integer vectors used by the position types.

pub mod vector2;
pub mod vector3;

pub use vector2::Vector2;
pub use vector3::Vector3;
