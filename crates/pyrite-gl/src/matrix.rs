//! Matrix engine: 4x4 column-major math and the per-mode matrix stacks
//!
//! Matrices are stored column-major in a flat `[f32; 16]`, element `(row,
//! col)` at index `col * 4 + row`. Every mutation of a stack top is followed
//! by a finiteness check; a NaN or infinity reaching the transform engine
//! would corrupt every draw after it, so it is a hard failure at the source.

use pyrite_core::{GlError, Result};

use crate::types::MatrixMode;

pub const MAX_STACK_DEPTH: usize = 16;

/// Column-major 4x4 matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat4(pub [f32; 16]);

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    #[inline]
    pub fn at(&self, row: usize, col: usize) -> f32 {
        self.0[col * 4 + row]
    }

    #[inline]
    fn set(&mut self, row: usize, col: usize, v: f32) {
        self.0[col * 4 + row] = v;
    }

    /// Matrix product `self * rhs`.
    pub fn mul(&self, rhs: &Mat4) -> Mat4 {
        let mut out = Mat4([0.0; 16]);
        for row in 0..4 {
            for col in 0..4 {
                let mut sum = 0.0;
                for k in 0..4 {
                    sum += self.at(row, k) * rhs.at(k, col);
                }
                out.set(row, col, sum);
            }
        }
        out
    }

    /// Transform `v` by the transpose: `out[i] = dot(column i, v)`.
    ///
    /// With a column-major modelview inverse this is the plane-equation and
    /// normal transform.
    pub fn mul_vec4_transposed(&self, v: [f32; 4]) -> [f32; 4] {
        let mut out = [0.0; 4];
        for (col, slot) in out.iter_mut().enumerate() {
            *slot = self.at(0, col) * v[0]
                + self.at(1, col) * v[1]
                + self.at(2, col) * v[2]
                + self.at(3, col) * v[3];
        }
        out
    }

    /// Transform a column vector: `out = M * v`.
    pub fn mul_vec4(&self, v: [f32; 4]) -> [f32; 4] {
        let mut out = [0.0; 4];
        for (row, slot) in out.iter_mut().enumerate() {
            *slot = self.at(row, 0) * v[0]
                + self.at(row, 1) * v[1]
                + self.at(row, 2) * v[2]
                + self.at(row, 3) * v[3];
        }
        out
    }

    pub fn transposed(&self) -> Mat4 {
        let mut out = Mat4([0.0; 16]);
        for row in 0..4 {
            for col in 0..4 {
                out.set(col, row, self.at(row, col));
            }
        }
        out
    }

    /// Right-multiply by a translation.
    pub fn translate(&mut self, x: f32, y: f32, z: f32) {
        for row in 0..4 {
            let v = self.at(row, 0) * x + self.at(row, 1) * y + self.at(row, 2) * z
                + self.at(row, 3);
            self.set(row, 3, v);
        }
    }

    /// Right-multiply by a non-uniform scale.
    pub fn scale(&mut self, x: f32, y: f32, z: f32) {
        for row in 0..4 {
            self.set(row, 0, self.at(row, 0) * x);
            self.set(row, 1, self.at(row, 1) * y);
            self.set(row, 2, self.at(row, 2) * z);
        }
    }

    /// Right-multiply by a rotation of `angle` degrees about `(x, y, z)`.
    ///
    /// A near-zero axis leaves the matrix unchanged.
    pub fn rotate(&mut self, angle: f32, x: f32, y: f32, z: f32) {
        let mag = (x * x + y * y + z * z).sqrt();
        if mag <= 1.0e-4 {
            return;
        }
        let (x, y, z) = (x / mag, y / mag, z / mag);
        let rad = angle.to_radians();
        let s = rad.sin();
        let c = rad.cos();
        let one_c = 1.0 - c;

        let (xx, yy, zz) = (x * x, y * y, z * z);
        let (xy, yz, zx) = (x * y, y * z, z * x);
        let (xs, ys, zs) = (x * s, y * s, z * s);

        let mut r = Mat4::IDENTITY;
        r.set(0, 0, one_c * xx + c);
        r.set(0, 1, one_c * xy - zs);
        r.set(0, 2, one_c * zx + ys);
        r.set(1, 0, one_c * xy + zs);
        r.set(1, 1, one_c * yy + c);
        r.set(1, 2, one_c * yz - xs);
        r.set(2, 0, one_c * zx - ys);
        r.set(2, 1, one_c * yz + xs);
        r.set(2, 2, one_c * zz + c);

        *self = self.mul(&r);
    }

    /// Orthographic projection matrix.
    pub fn ortho(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        let mut m = Mat4::IDENTITY;
        m.set(0, 0, 2.0 / (right - left));
        m.set(1, 1, 2.0 / (top - bottom));
        m.set(2, 2, -2.0 / (far - near));
        m.set(0, 3, -(right + left) / (right - left));
        m.set(1, 3, -(top + bottom) / (top - bottom));
        m.set(2, 3, -(far + near) / (far - near));
        m
    }

    /// Perspective projection matrix.
    pub fn frustum(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        let mut m = Mat4([0.0; 16]);
        m.set(0, 0, 2.0 * near / (right - left));
        m.set(1, 1, 2.0 * near / (top - bottom));
        m.set(0, 2, (right + left) / (right - left));
        m.set(1, 2, (top + bottom) / (top - bottom));
        m.set(2, 2, -(far + near) / (far - near));
        m.set(3, 2, -1.0);
        m.set(2, 3, -2.0 * far * near / (far - near));
        m
    }

    /// General inverse by the adjugate. Returns `None` for a singular
    /// matrix; callers decide how to degrade.
    pub fn invert(&self) -> Option<Mat4> {
        let m = &self.0;
        let mut inv = [0.0f32; 16];

        inv[0] = m[5] * m[10] * m[15] - m[5] * m[11] * m[14] - m[9] * m[6] * m[15]
            + m[9] * m[7] * m[14]
            + m[13] * m[6] * m[11]
            - m[13] * m[7] * m[10];
        inv[4] = -m[4] * m[10] * m[15] + m[4] * m[11] * m[14] + m[8] * m[6] * m[15]
            - m[8] * m[7] * m[14]
            - m[12] * m[6] * m[11]
            + m[12] * m[7] * m[10];
        inv[8] = m[4] * m[9] * m[15] - m[4] * m[11] * m[13] - m[8] * m[5] * m[15]
            + m[8] * m[7] * m[13]
            + m[12] * m[5] * m[11]
            - m[12] * m[7] * m[9];
        inv[12] = -m[4] * m[9] * m[14] + m[4] * m[10] * m[13] + m[8] * m[5] * m[14]
            - m[8] * m[6] * m[13]
            - m[12] * m[5] * m[10]
            + m[12] * m[6] * m[9];
        inv[1] = -m[1] * m[10] * m[15] + m[1] * m[11] * m[14] + m[9] * m[2] * m[15]
            - m[9] * m[3] * m[14]
            - m[13] * m[2] * m[11]
            + m[13] * m[3] * m[10];
        inv[5] = m[0] * m[10] * m[15] - m[0] * m[11] * m[14] - m[8] * m[2] * m[15]
            + m[8] * m[3] * m[14]
            + m[12] * m[2] * m[11]
            - m[12] * m[3] * m[10];
        inv[9] = -m[0] * m[9] * m[15] + m[0] * m[11] * m[13] + m[8] * m[1] * m[15]
            - m[8] * m[3] * m[13]
            - m[12] * m[1] * m[11]
            + m[12] * m[3] * m[9];
        inv[13] = m[0] * m[9] * m[14] - m[0] * m[10] * m[13] - m[8] * m[1] * m[14]
            + m[8] * m[2] * m[13]
            + m[12] * m[1] * m[10]
            - m[12] * m[2] * m[9];
        inv[2] = m[1] * m[6] * m[15] - m[1] * m[7] * m[14] - m[5] * m[2] * m[15]
            + m[5] * m[3] * m[14]
            + m[13] * m[2] * m[7]
            - m[13] * m[3] * m[6];
        inv[6] = -m[0] * m[6] * m[15] + m[0] * m[7] * m[14] + m[4] * m[2] * m[15]
            - m[4] * m[3] * m[14]
            - m[12] * m[2] * m[7]
            + m[12] * m[3] * m[6];
        inv[10] = m[0] * m[5] * m[15] - m[0] * m[7] * m[13] - m[4] * m[1] * m[15]
            + m[4] * m[3] * m[13]
            + m[12] * m[1] * m[7]
            - m[12] * m[3] * m[5];
        inv[14] = -m[0] * m[5] * m[14] + m[0] * m[6] * m[13] + m[4] * m[1] * m[14]
            - m[4] * m[2] * m[13]
            - m[12] * m[1] * m[6]
            + m[12] * m[2] * m[5];
        inv[3] = -m[1] * m[6] * m[11] + m[1] * m[7] * m[10] + m[5] * m[2] * m[11]
            - m[5] * m[3] * m[10]
            - m[9] * m[2] * m[7]
            + m[9] * m[3] * m[6];
        inv[7] = m[0] * m[6] * m[11] - m[0] * m[7] * m[10] - m[4] * m[2] * m[11]
            + m[4] * m[3] * m[10]
            + m[8] * m[2] * m[7]
            - m[8] * m[3] * m[6];
        inv[11] = -m[0] * m[5] * m[11] + m[0] * m[7] * m[9] + m[4] * m[1] * m[11]
            - m[4] * m[3] * m[9]
            - m[8] * m[1] * m[7]
            + m[8] * m[3] * m[5];
        inv[15] = m[0] * m[5] * m[10] - m[0] * m[6] * m[9] - m[4] * m[1] * m[10]
            + m[4] * m[2] * m[9]
            + m[8] * m[1] * m[6]
            - m[8] * m[2] * m[5];

        let det = m[0] * inv[0] + m[1] * inv[4] + m[2] * inv[8] + m[3] * inv[12];
        if det == 0.0 {
            return None;
        }
        let inv_det = 1.0 / det;
        for v in &mut inv {
            *v *= inv_det;
        }
        Some(Mat4(inv))
    }

    /// Reject any non-finite element.
    pub fn check_finite(&self) -> Result<()> {
        for (i, v) in self.0.iter().enumerate() {
            if !v.is_finite() {
                return Err(GlError::NonFiniteMatrix(i));
            }
        }
        Ok(())
    }
}

/// Fixed-depth matrix stack backed by an inline arena.
#[derive(Debug, Clone)]
pub struct MatrixStack {
    arena: [Mat4; MAX_STACK_DEPTH],
    depth: usize,
}

impl MatrixStack {
    pub fn new() -> Self {
        Self { arena: [Mat4::IDENTITY; MAX_STACK_DEPTH], depth: 0 }
    }

    pub fn top(&self) -> &Mat4 {
        &self.arena[self.depth]
    }

    pub fn top_mut(&mut self) -> &mut Mat4 {
        &mut self.arena[self.depth]
    }

    /// Duplicate the top entry.
    pub fn push(&mut self) -> Result<()> {
        if self.depth + 1 >= MAX_STACK_DEPTH {
            return Err(GlError::StackOverflow(MAX_STACK_DEPTH));
        }
        self.arena[self.depth + 1] = self.arena[self.depth];
        self.depth += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<()> {
        if self.depth == 0 {
            return Err(GlError::StackUnderflow);
        }
        self.depth -= 1;
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Default for MatrixStack {
    fn default() -> Self {
        Self::new()
    }
}

/// All matrix stacks plus the current matrix-mode selector.
#[derive(Debug)]
pub struct MatrixEngine {
    pub modelview: MatrixStack,
    pub projection: MatrixStack,
    pub texture: [MatrixStack; 4],
    pub mode: MatrixMode,
}

impl MatrixEngine {
    pub fn new() -> Self {
        Self {
            modelview: MatrixStack::new(),
            projection: MatrixStack::new(),
            texture: [
                MatrixStack::new(),
                MatrixStack::new(),
                MatrixStack::new(),
                MatrixStack::new(),
            ],
            mode: MatrixMode::ModelView,
        }
    }

    /// Stack addressed by the current mode; texture mode follows the
    /// client-active texture unit, like the texcoord arrays.
    pub fn current_mut(&mut self, client_unit: usize) -> &mut MatrixStack {
        match self.mode {
            MatrixMode::ModelView => &mut self.modelview,
            MatrixMode::Projection => &mut self.projection,
            MatrixMode::Texture => &mut self.texture[client_unit],
        }
    }

    /// Mutate the current top in place, then verify it stayed finite.
    pub fn edit<F>(&mut self, client_unit: usize, f: F) -> Result<()>
    where
        F: FnOnce(&mut Mat4),
    {
        let top = self.current_mut(client_unit).top_mut();
        f(top);
        top.check_finite()
    }
}

impl Default for MatrixEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: &Mat4, b: &Mat4) -> bool {
        a.0.iter().zip(b.0.iter()).all(|(x, y)| (x - y).abs() < 1e-5)
    }

    #[test]
    fn test_identity_mul() {
        let mut m = Mat4::IDENTITY;
        m.translate(1.0, 2.0, 3.0);
        let p = Mat4::IDENTITY.mul(&m);
        assert!(approx(&p, &m));
    }

    #[test]
    fn test_translate_column_major() {
        let mut m = Mat4::IDENTITY;
        m.translate(5.0, 6.0, 7.0);
        // translation lands in the fourth column
        assert_eq!(m.at(0, 3), 5.0);
        assert_eq!(m.at(1, 3), 6.0);
        assert_eq!(m.at(2, 3), 7.0);
        assert_eq!(m.0[12], 5.0);
    }

    #[test]
    fn test_rotate_zero_axis_is_noop() {
        let mut m = Mat4::IDENTITY;
        m.translate(1.0, 0.0, 0.0);
        let before = m;
        m.rotate(90.0, 0.0, 0.0, 0.0);
        assert_eq!(m, before);
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let mut m = Mat4::IDENTITY;
        m.rotate(90.0, 0.0, 0.0, 1.0);
        let v = m.mul_vec4([1.0, 0.0, 0.0, 1.0]);
        assert!((v[0]).abs() < 1e-6);
        assert!((v[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_invert_round_trip() {
        let mut m = Mat4::IDENTITY;
        m.translate(1.0, 2.0, 3.0);
        m.rotate(30.0, 0.0, 1.0, 0.0);
        m.scale(2.0, 2.0, 2.0);
        let inv = m.invert().unwrap();
        assert!(approx(&m.mul(&inv), &Mat4::IDENTITY));
    }

    #[test]
    fn test_invert_singular() {
        let mut m = Mat4::IDENTITY;
        m.scale(0.0, 1.0, 1.0);
        assert!(m.invert().is_none());
    }

    #[test]
    fn test_ortho_maps_corners() {
        let m = Mat4::ortho(0.0, 640.0, 480.0, 0.0, -1.0, 1.0);
        let v = m.mul_vec4([640.0, 480.0, 0.0, 1.0]);
        assert!((v[0] - 1.0).abs() < 1e-5);
        assert!((v[1] + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_stack_push_pop_round_trip() {
        let mut stack = MatrixStack::new();
        stack.top_mut().translate(1.0, 2.0, 3.0);
        let saved = *stack.top();
        stack.push().unwrap();
        stack.top_mut().scale(9.0, 9.0, 9.0);
        stack.pop().unwrap();
        assert_eq!(*stack.top(), saved);
    }

    #[test]
    fn test_stack_limits() {
        let mut stack = MatrixStack::new();
        for _ in 0..MAX_STACK_DEPTH - 1 {
            stack.push().unwrap();
        }
        assert_eq!(stack.push(), Err(GlError::StackOverflow(MAX_STACK_DEPTH)));
        for _ in 0..MAX_STACK_DEPTH - 1 {
            stack.pop().unwrap();
        }
        assert_eq!(stack.pop(), Err(GlError::StackUnderflow));
    }

    #[test]
    fn test_edit_rejects_non_finite() {
        let mut engine = MatrixEngine::new();
        let err = engine.edit(0, |m| m.0[5] = f32::NAN);
        assert_eq!(err, Err(GlError::NonFiniteMatrix(5)));
    }

    #[test]
    fn test_transposed_vector_product() {
        let mut m = Mat4::IDENTITY;
        m.translate(1.0, 2.0, 3.0);
        // dot of each column with v
        let v = m.mul_vec4_transposed([0.0, 0.0, 0.0, 1.0]);
        assert_eq!(v, [0.0, 0.0, 0.0, 1.0]);
        let v = m.mul_vec4_transposed([1.0, 1.0, 1.0, 0.0]);
        assert_eq!(v[3], 6.0);
    }
}
