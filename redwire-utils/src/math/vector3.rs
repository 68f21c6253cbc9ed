/// A three component vector. Ordered by `x`, then `y`, then `z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Vector3<T> {
    /// The x component.
    pub x: T,
    /// The y component.
    pub y: T,
    /// The z component.
    pub z: T,
}

impl<T> Vector3<T> {
    /// Creates a new vector.
    pub const fn new(x: T, y: T, z: T) -> Self {
        Self { x, y, z }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_is_lexicographic() {
        assert!(Vector3::new(-1, 9, 9) < Vector3::new(0, 0, 0));
        assert!(Vector3::new(0, 0, 1) < Vector3::new(0, 1, 0));
    }
}
