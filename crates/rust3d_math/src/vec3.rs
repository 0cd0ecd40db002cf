//! 3D Vector type

use bytemuck::{Pod, Zeroable};
use serde::{Serialize, Deserialize};

/// 3D Vector with x, y, z components
///
/// Used for positions, normals and rotation axes. All operations return new
/// values; nothing here mutates in place except the `*Assign` operators.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };
    pub const X: Self = Self { x: 1.0, y: 0.0, z: 0.0 };
    pub const Y: Self = Self { x: 0.0, y: 1.0, z: 0.0 };
    pub const Z: Self = Self { x: 0.0, y: 0.0, z: 1.0 };

    /// Create a new Vec3
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Build from an `[x, y, z]` array
    #[inline]
    pub const fn from_array(a: [f32; 3]) -> Self {
        Self { x: a[0], y: a[1], z: a[2] }
    }

    /// Components as an array (for GPU upload)
    #[inline]
    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// Dot product
    #[inline]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Right-handed cross product `self × other`
    #[inline]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Length squared (faster than length)
    #[inline]
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    /// Length (magnitude)
    #[inline]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Scale to unit length.
    ///
    /// A zero vector yields non-finite components.
    #[inline]
    pub fn normalized(self) -> Self {
        self / self.length()
    }

    /// True when every component is finite
    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from(a: [f32; 3]) -> Self {
        Self::from_array(a)
    }
}

impl From<Vec3> for [f32; 3] {
    fn from(v: Vec3) -> Self {
        v.to_array()
    }
}

/// `a · b`
#[inline]
pub fn dot(a: Vec3, b: Vec3) -> f32 {
    a.dot(b)
}

/// `a × b`
#[inline]
pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    a.cross(b)
}

/// `v / |v|`
#[inline]
pub fn normalize(v: Vec3) -> Vec3 {
    v.normalized()
}

/// `a − b`
#[inline]
pub fn subtract(a: Vec3, b: Vec3) -> Vec3 {
    a - b
}

// Operator overloads

impl std::ops::Add for Vec3 {
    type Output = Self;
    #[inline]
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl std::ops::AddAssign for Vec3 {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
        self.z += other.z;
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    #[inline]
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;
    #[inline]
    fn mul(self, scalar: f32) -> Self {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl std::ops::Neg for Vec3 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl std::ops::Div<f32> for Vec3 {
    type Output = Self;
    #[inline]
    fn div(self, scalar: f32) -> Self {
        Self::new(self.x / scalar, self.y / scalar, self.z / scalar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);
        // 4 + 10 + 18
        assert_eq!(dot(a, b), 32.0);
    }

    #[test]
    fn test_cross_right_handed() {
        assert_eq!(cross(Vec3::X, Vec3::Y), Vec3::Z);
        assert_eq!(cross(Vec3::Y, Vec3::Z), Vec3::X);
        assert_eq!(cross(Vec3::Z, Vec3::X), Vec3::Y);
        assert_eq!(cross(Vec3::Y, Vec3::X), -Vec3::Z);
    }

    #[test]
    fn test_normalize() {
        let n = normalize(Vec3::new(0.0, 3.0, 4.0));
        assert!((n.length() - 1.0).abs() < 0.0001);
        assert!((n.y - 0.6).abs() < 0.0001);
        assert!((n.z - 0.8).abs() < 0.0001);
    }

    #[test]
    fn test_normalize_zero_is_not_finite() {
        assert!(!normalize(Vec3::ZERO).is_finite());
    }

    #[test]
    fn test_subtract_does_not_mutate() {
        let a = Vec3::new(5.0, 6.0, 7.0);
        let b = Vec3::new(1.0, 2.0, 3.0);
        let c = subtract(a, b);
        assert_eq!(c, Vec3::new(4.0, 4.0, 4.0));
        assert_eq!(a, Vec3::new(5.0, 6.0, 7.0));
    }

    #[test]
    fn test_array_conversions() {
        let v: Vec3 = [1.0, 2.0, 3.0].into();
        let a: [f32; 3] = v.into();
        assert_eq!(a, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_pod_size() {
        assert_eq!(std::mem::size_of::<Vec3>(), 12);
        let v = Vec3::new(1.0, 2.0, 3.0);
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&v));
        assert_eq!(floats, &[1.0, 2.0, 3.0]);
    }
}
