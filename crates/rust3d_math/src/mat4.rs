//! 4x4 Matrix utilities for 3D transformations
//!
//! Matrices are stored as 16 floats in column-major order: the element at
//! row `r`, column `c` lives at index `c * 4 + r`. This is the layout GPU
//! uniform uploads expect, so a [`Mat4`] can be handed to the graphics API
//! without transposing.
//!
//! Composition reads right to left: `multiply(a, b)` applies `b` first, then
//! `a`. A typical model-view-projection chain is therefore
//! `multiply(projection, multiply(view, model))`.
//!
//! None of these functions validate their inputs. Degenerate axes or frusta
//! (zero length, `near == far`, ...) produce non-finite elements.

use crate::Vec3;

/// 4x4 matrix type (column-major, 16 elements)
pub type Mat4 = [f32; 16];

/// Identity matrix
pub const IDENTITY: Mat4 = [
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 1.0, 0.0,
    0.0, 0.0, 0.0, 1.0,
];

/// Read the element at `row`, `col`
#[inline]
pub fn at(m: &Mat4, row: usize, col: usize) -> f32 {
    m[col * 4 + row]
}

/// The multiplicative identity
pub fn identity() -> Mat4 {
    IDENTITY
}

/// Non-uniform scale along the three axes
pub fn scale(sx: f32, sy: f32, sz: f32) -> Mat4 {
    [
        sx, 0.0, 0.0, 0.0,
        0.0, sy, 0.0, 0.0,
        0.0, 0.0, sz, 0.0,
        0.0, 0.0, 0.0, 1.0,
    ]
}

/// Translation by `(tx, ty, tz)`
pub fn translate(tx: f32, ty: f32, tz: f32) -> Mat4 {
    [
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        tx, ty, tz, 1.0,
    ]
}

/// Rotation of `angle` radians about `axis` (Rodrigues' formula).
///
/// The axis is used as given. Pass a unit vector for a rigid rotation; a
/// non-unit axis also scales.
///
/// # Example
/// ```
/// use rust3d_math::{mat4, Vec3};
/// let quarter_turn = mat4::rotate(std::f32::consts::FRAC_PI_2, Vec3::Z);
/// let p = mat4::transform_point(&quarter_turn, Vec3::X);
/// assert!((p.y - 1.0).abs() < 1e-6);
/// ```
pub fn rotate(angle: f32, axis: Vec3) -> Mat4 {
    let c = angle.cos();
    let s = angle.sin();
    let t = 1.0 - c;
    let Vec3 { x, y, z } = axis;

    [
        t * x * x + c,     t * x * y + s * z, t * x * z - s * y, 0.0,
        t * x * y - s * z, t * y * y + c,     t * y * z + s * x, 0.0,
        t * x * z + s * y, t * y * z - s * x, t * z * z + c,     0.0,
        0.0,               0.0,               0.0,               1.0,
    ]
}

/// Multiply two 4x4 matrices: result = a * b
///
/// In column-major convention, this applies b first, then a.
pub fn multiply(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut result = [0.0f32; 16];

    for col in 0..4 {
        for row in 0..4 {
            result[col * 4 + row] = (0..4).map(|k| a[k * 4 + row] * b[col * 4 + k]).sum();
        }
    }

    result
}

/// Orthographic projection mapping the given box onto the `[-1, 1]` clip cube
pub fn ortho(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let x = right - left;
    let y = top - bottom;
    let z = far - near;

    [
        2.0 / x, 0.0, 0.0, 0.0,
        0.0, 2.0 / y, 0.0, 0.0,
        0.0, 0.0, -2.0 / z, 0.0,
        -(left + right) / x, -(bottom + top) / y, -(near + far) / z, 1.0,
    ]
}

/// Symmetric perspective projection
///
/// `fov_y` is the full vertical field of view in radians.
pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let f = 1.0 / (fov_y / 2.0).tan();
    let nf = 1.0 / (near - far);

    [
        f / aspect, 0.0, 0.0, 0.0,
        0.0, f, 0.0, 0.0,
        0.0, 0.0, (far + near) * nf, -1.0,
        0.0, 0.0, 2.0 * far * near * nf, 0.0,
    ]
}

/// View matrix looking from `eye` towards `target`.
///
/// The camera basis is `z = normalize(eye - target)`,
/// `x = normalize(up × z)`, `y = z × x`; the result is that rotation applied
/// after a translation by `-eye`. The camera looks down its local -Z.
pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    let z_axis = (eye - target).normalized();
    let x_axis = up.cross(z_axis).normalized();
    let y_axis = z_axis.cross(x_axis);

    [
        x_axis.x, y_axis.x, z_axis.x, 0.0,
        x_axis.y, y_axis.y, z_axis.y, 0.0,
        x_axis.z, y_axis.z, z_axis.z, 0.0,
        -x_axis.dot(eye), -y_axis.dot(eye), -z_axis.dot(eye), 1.0,
    ]
}

/// Transpose a matrix
pub fn transpose(m: &Mat4) -> Mat4 {
    let mut result = [0.0f32; 16];
    for row in 0..4 {
        for col in 0..4 {
            result[row * 4 + col] = m[col * 4 + row];
        }
    }
    result
}

/// Transform a point (w = 1), with perspective divide when w ≠ 1
pub fn transform_point(m: &Mat4, p: Vec3) -> Vec3 {
    let x = m[0] * p.x + m[4] * p.y + m[8] * p.z + m[12];
    let y = m[1] * p.x + m[5] * p.y + m[9] * p.z + m[13];
    let z = m[2] * p.x + m[6] * p.y + m[10] * p.z + m[14];
    let w = m[3] * p.x + m[7] * p.y + m[11] * p.z + m[15];

    if w == 1.0 {
        Vec3::new(x, y, z)
    } else {
        Vec3::new(x / w, y / w, z / w)
    }
}

/// Transform a direction (w = 0); translation is ignored
pub fn transform_vector(m: &Mat4, v: Vec3) -> Vec3 {
    Vec3::new(
        m[0] * v.x + m[4] * v.y + m[8] * v.z,
        m[1] * v.x + m[5] * v.y + m[9] * v.z,
        m[2] * v.x + m[6] * v.y + m[10] * v.z,
    )
}
