/// Orbiting perspective camera and screen mapping
use nalgebra::{Matrix4, Point3, Vector3, Vector4};

use crate::config::CameraSettings;
use crate::selection::Ray;
use crate::transform::{OrbitState, Transform};

/// A point in screen space; `depth` grows away from the camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
    pub depth: f32,
    /// Clip-space w, used for perspective-correct interpolation
    pub w: f32,
}

/// Perspective camera looking at the workspace center
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            position: Point3::new(0.0, 0.0, 10.0),
            target: Point3::new(0.0, 0.0, 0.0),
            up: Vector3::new(0.0, 1.0, 0.0),
            fov: 45f32.to_radians(),
            aspect: aspect(width, height),
            near: 0.05,
            far: 1024.0,
        }
    }

    pub fn from_settings(settings: &CameraSettings, width: u32, height: u32) -> Self {
        Self {
            position: Point3::new(0.0, 0.0, settings.distance),
            fov: settings.fov.to_radians(),
            near: settings.near,
            far: settings.far,
            ..Self::new(width, height)
        }
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = aspect(width, height);
    }

    /// Place the camera on an orbit around its target
    pub fn orbit(&mut self, orbit: &OrbitState) {
        self.position = orbit.eye(&self.target);
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position, &self.target, &self.up)
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        Matrix4::new_perspective(self.aspect, self.fov, self.near, self.far)
    }

    pub fn view_projection(&self) -> Matrix4<f32> {
        Transform::view_projection(&self.view_matrix(), &self.projection_matrix())
    }

    /// Project a world point to screen space with a precomputed
    /// view-projection matrix. Points outside the depth range give `None`.
    pub fn project_with(
        view_projection: &Matrix4<f32>,
        point: &Point3<f32>,
        width: u32,
        height: u32,
    ) -> Option<ScreenPoint> {
        let clip = view_projection * point.to_homogeneous();

        // Behind the eye or degenerate
        if clip.w <= 1e-6 {
            return None;
        }

        let ndc = clip.xyz() / clip.w;
        if ndc.z < -1.0 || ndc.z > 1.0 {
            return None;
        }

        Some(ScreenPoint {
            x: (ndc.x + 1.0) * 0.5 * width as f32,
            y: (1.0 - ndc.y) * 0.5 * height as f32,
            depth: ndc.z,
            w: clip.w,
        })
    }

    /// Map a world point onto a `width` x `height` frame
    pub fn project_to_screen(&self, point: &Point3<f32>, width: u32, height: u32) -> Option<ScreenPoint> {
        Self::project_with(&self.view_projection(), point, width, height)
    }

    /// Ray from the eye through normalized device coordinates in [-1, 1]
    /// (x to the right, y up).
    pub fn ray_from_ndc(&self, ndc_x: f32, ndc_y: f32) -> Option<Ray> {
        let inverse = self.view_projection().try_inverse()?;
        let unproject = |z: f32| {
            let world = inverse * Vector4::new(ndc_x, ndc_y, z, 1.0);
            (world.w.abs() > f32::EPSILON).then(|| Point3::from(world.xyz() / world.w))
        };
        let near = unproject(-1.0)?;
        let far = unproject(1.0)?;
        let direction = far - near;
        (direction.norm() > f32::EPSILON).then(|| Ray::new(near, direction))
    }
}

fn aspect(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_viewport_sets_aspect() {
        let mut camera = Camera::new(800, 600);
        assert_relative_eq!(camera.aspect, 800.0 / 600.0);
        camera.set_viewport(100, 0);
        assert_relative_eq!(camera.aspect, 100.0);
    }

    #[test]
    fn test_settings_fov_in_degrees() {
        let settings = CameraSettings::default();
        let camera = Camera::from_settings(&settings, 10, 10);
        assert_relative_eq!(camera.fov, settings.fov.to_radians());
        assert_relative_eq!(camera.position.z, settings.distance);
    }

    #[test]
    fn test_target_projects_to_center() {
        let camera = Camera::new(800, 600);
        let point = camera.project_to_screen(&Point3::origin(), 800, 600).unwrap();
        assert_relative_eq!(point.x, 400.0, epsilon = 1e-3);
        assert_relative_eq!(point.y, 300.0, epsilon = 1e-3);
    }

    #[test]
    fn test_up_is_screen_up() {
        let camera = Camera::new(800, 600);
        let point = camera
            .project_to_screen(&Point3::new(0.0, 1.0, 0.0), 800, 600)
            .unwrap();
        assert!(point.y < 300.0);
    }

    #[test]
    fn test_behind_camera_is_rejected() {
        let camera = Camera::new(800, 600);
        assert!(camera
            .project_to_screen(&Point3::new(0.0, 0.0, 20.0), 800, 600)
            .is_none());
    }

    #[test]
    fn test_center_ray_hits_target() {
        let camera = Camera::new(800, 600);
        let ray = camera.ray_from_ndc(0.0, 0.0).unwrap();
        assert_relative_eq!(ray.direction.z, -1.0, epsilon = 1e-3);
        let along = ray.at(ray.origin.z);
        assert_relative_eq!(along.x, 0.0, epsilon = 1e-3);
        assert_relative_eq!(along.y, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_orbit_keeps_distance() {
        let mut camera = Camera::new(800, 600);
        camera.orbit(&OrbitState::new(0.3, 0.2, 6.0));
        assert_relative_eq!((camera.position - camera.target).norm(), 6.0, epsilon = 1e-4);
    }
}
