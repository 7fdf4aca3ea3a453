use nalgebra::Point3;

/// A triangle in 3-space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub p0: Point3<f64>,
    pub p1: Point3<f64>,
    pub p2: Point3<f64>,
}

impl Triangle {
    pub fn new(p0: Point3<f64>, p1: Point3<f64>, p2: Point3<f64>) -> Self {
        Self { p0, p1, p2 }
    }

    /// The point `(1-u-v)·p0 + u·p1 + v·p2`.
    pub fn barycentric(&self, u: f64, v: f64) -> Point3<f64> {
        let w = 1.0 - u - v;
        Point3::from(self.p0.coords * w + self.p1.coords * u + self.p2.coords * v)
    }
}
