//! Perspective camera orbiting the globe.
//!
//! The camera keeps its `from`/`to`/`up` state as homogeneous 4-vectors and
//! recomputes the cached view matrix (plus inverse, plus the double-double
//! verification copy) on every mutation. Mutations fire the registered
//! change listeners synchronously; a listener that mutates the camera again
//! re-enters this machinery and is not guarded against.

pub mod frustum;
pub mod precise;
pub mod projection;

use nalgebra::{Matrix4, Point3, Rotation3, Unit, Vector3, Vector4};

use crate::camera::precise::PreciseMat4;
use crate::core::crs::{forward, Crs};

pub use frustum::Frustum;
pub use projection::Projection;

/// The kind of mutation a change notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraEvent {
    /// The eye rotated around the target.
    Orbit,
    /// Eye and target translated together.
    Pan,
    /// The eye moved along the view axis.
    Zoom,
}

/// Callback invoked after every camera mutation.
pub type ChangeListener = Box<dyn Fn(&Camera, CameraEvent) + Send + Sync>;

pub struct Camera {
    from: Vector4<f64>,
    to: Vector4<f64>,
    up: Vector4<f64>,
    view: Matrix4<f64>,
    view_inverse: Matrix4<f64>,
    precise_view: PreciseMat4,
    listeners: Vec<ChangeListener>,
}

impl Camera {
    pub fn new(from: Point3<f64>, to: Point3<f64>, up: Vector3<f64>) -> Self {
        let mut camera = Self {
            from: from.to_homogeneous(),
            to: to.to_homogeneous(),
            up: Vector4::new(up.x, up.y, up.z, 0.0),
            view: Matrix4::identity(),
            view_inverse: Matrix4::identity(),
            precise_view: PreciseMat4::identity(),
            listeners: Vec::new(),
        };
        camera.update_matrices();
        camera
    }

    /// Camera hovering `altitude` meters above a geodetic point, looking at
    /// the surface straight below, with the polar axis as up reference.
    pub fn above(lon: f64, lat: f64, altitude: f64) -> Self {
        let eye = forward(
            Crs::Geodetic,
            Crs::Geocentric,
            Vector3::new(lon, lat, altitude),
        );
        let ground = forward(Crs::Geodetic, Crs::Geocentric, Vector3::new(lon, lat, 0.0));
        Self::new(
            Point3::from(eye),
            Point3::from(ground),
            Vector3::new(0.0, 0.0, 1.0),
        )
    }

    pub fn from_point(&self) -> Point3<f64> {
        Point3::new(self.from.x, self.from.y, self.from.z)
    }

    pub fn target_point(&self) -> Point3<f64> {
        Point3::new(self.to.x, self.to.y, self.to.z)
    }

    pub fn up_vector(&self) -> Vector3<f64> {
        self.up.xyz()
    }

    pub fn view_matrix(&self) -> &Matrix4<f64> {
        &self.view
    }

    pub fn view_inverse(&self) -> &Matrix4<f64> {
        &self.view_inverse
    }

    /// The double-double view matrix. Verification only; rendering never
    /// reads it.
    pub fn precise_view_matrix(&self) -> &PreciseMat4 {
        &self.precise_view
    }

    /// Largest entry-wise disagreement between the `f64` view matrix and the
    /// double-double one.
    pub fn precision_drift(&self) -> f64 {
        self.precise_view.max_abs_diff(&self.view)
    }

    /// Register a listener fired synchronously after every mutation.
    pub fn add_change_listener(&mut self, listener: ChangeListener) {
        self.listeners.push(listener);
    }

    /// Rotate the eye around the target: yaw about the polar axis, pitch
    /// about the camera right axis. The up vector follows the rotation.
    pub fn orbit(&mut self, yaw_deg: f64, pitch_deg: f64) {
        let target = self.target_point();
        let mut offset = self.from_point() - target;
        let mut up = self.up_vector();

        let yaw = Rotation3::from_axis_angle(&Vector3::z_axis(), yaw_deg.to_radians());
        offset = yaw * offset;
        up = yaw * up;

        let right = offset.cross(&up);
        if right.norm() > 0.0 {
            let pitch =
                Rotation3::from_axis_angle(&Unit::new_normalize(right), pitch_deg.to_radians());
            offset = pitch * offset;
            up = pitch * up;
        }

        self.from = (target + offset).to_homogeneous();
        self.up = Vector4::new(up.x, up.y, up.z, 0.0);
        self.update_matrices();
        self.notify(CameraEvent::Orbit);
    }

    /// Translate eye and target together along the camera right/up axes,
    /// in meters.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        let direction = (self.target_point() - self.from_point()).normalize();
        let right = direction.cross(&self.up_vector()).normalize();
        let up = right.cross(&direction);
        let delta = right * dx + up * dy;

        self.from = (self.from_point() + delta).to_homogeneous();
        self.to = (self.target_point() + delta).to_homogeneous();
        self.update_matrices();
        self.notify(CameraEvent::Pan);
    }

    /// Scale the eye-to-target distance; factors below 1 move in.
    pub fn zoom(&mut self, factor: f64) {
        let target = self.target_point();
        let offset = (self.from_point() - target) * factor;
        self.from = (target + offset).to_homogeneous();
        self.update_matrices();
        self.notify(CameraEvent::Zoom);
    }

    fn update_matrices(&mut self) {
        let eye = self.from_point();
        let target = self.target_point();
        let up = self.up_vector();

        self.view = Matrix4::look_at_rh(&eye, &target, &up);
        self.view_inverse = self.view.try_inverse().unwrap_or_else(Matrix4::identity);
        self.precise_view = PreciseMat4::look_at_rh(&eye, &target, &up);
    }

    fn notify(&self, event: CameraEvent) {
        for listener in &self.listeners {
            listener(self, event);
        }
    }
}
