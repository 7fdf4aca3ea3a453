use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

use crate::camera::precise::PreciseMat4;

/// Perspective projection parameters.
///
/// `fovy` is the vertical field of view in radians. `far` may be
/// `f64::INFINITY`, in which case the far plane row of the derived matrix is
/// non-finite and the frustum treats it as unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub fovy: f64,
    pub aspect: f64,
    pub near: f64,
    pub far: f64,
}

impl Projection {
    pub fn new(fovy: f64, aspect: f64, near: f64, far: f64) -> Self {
        Self {
            fovy,
            aspect,
            near,
            far,
        }
    }

    pub fn set_aspect(&mut self, aspect: f64) {
        self.aspect = aspect;
    }

    /// The standard right-handed perspective matrix.
    pub fn matrix(&self) -> Matrix4<f64> {
        Matrix4::new_perspective(self.aspect, self.fovy, self.near, self.far)
    }

    /// Independent high-precision variant, consumed only by verification.
    pub fn precise_matrix(&self) -> PreciseMat4 {
        PreciseMat4::perspective(self.fovy, self.aspect, self.near, self.far)
    }

    /// Analytic half-extents `(half_width, half_height)` of the frustum at
    /// the near plane.
    pub fn half_extents(&self) -> (f64, f64) {
        let half_height = self.near * (self.fovy / 2.0).tan();
        (half_height * self.aspect, half_height)
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::new(45f64.to_radians(), 1.0, 1.0, 1.0e8)
    }
}
