/// 3D transformation matrices and orbit state
use nalgebra::{Matrix4, Point3, Vector3};

/// Orbit camera angles (in radians) and distance around a target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitState {
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
}

/// Pitch stays just short of the poles so `look_at` keeps a valid up vector
const MAX_PITCH: f32 = std::f32::consts::FRAC_PI_2 - 0.01;
const MIN_DISTANCE: f32 = 0.1;

impl OrbitState {
    pub fn new(yaw: f32, pitch: f32, distance: f32) -> Self {
        Self {
            yaw,
            pitch: pitch.clamp(-MAX_PITCH, MAX_PITCH),
            distance: distance.max(MIN_DISTANCE),
        }
    }

    /// Rotate by delta amounts (in radians)
    pub fn rotate(&mut self, dyaw: f32, dpitch: f32) {
        self.yaw += dyaw;
        self.pitch = (self.pitch + dpitch).clamp(-MAX_PITCH, MAX_PITCH);
    }

    /// Multiply the distance by `factor`
    pub fn zoom(&mut self, factor: f32) {
        self.distance = (self.distance * factor).max(MIN_DISTANCE);
    }

    /// Eye position for looking at `target`
    pub fn eye(&self, target: &Point3<f32>) -> Point3<f32> {
        let rotation = Transform::rotation_matrix(self.pitch, self.yaw);
        let offset = rotation.transform_vector(&Vector3::new(0.0, 0.0, self.distance));
        *target + offset
    }
}

impl Default for OrbitState {
    fn default() -> Self {
        Self::new(0.6, 0.45, 10.0)
    }
}

/// Transform builder for 3D transformations
pub struct Transform;

impl Transform {
    /// Rotation about x (pitch) followed by rotation about y (yaw)
    pub fn rotation_matrix(pitch: f32, yaw: f32) -> Matrix4<f32> {
        let rx = Matrix4::new_rotation(Vector3::new(-pitch, 0.0, 0.0));
        let ry = Matrix4::new_rotation(Vector3::new(0.0, yaw, 0.0));

        ry * rx
    }

    /// Create a translation matrix
    pub fn translation_matrix(offset: &Vector3<f32>) -> Matrix4<f32> {
        Matrix4::new_translation(offset)
    }

    /// Create a uniform scale matrix
    pub fn scale_matrix(factor: f32) -> Matrix4<f32> {
        Matrix4::new_scaling(factor)
    }

    /// Uniform scale that leaves `pivot` fixed
    pub fn uniform_scale_about(pivot: &Point3<f32>, factor: f32) -> Matrix4<f32> {
        Self::translation_matrix(&pivot.coords)
            * Self::scale_matrix(factor)
            * Self::translation_matrix(&-pivot.coords)
    }

    /// Create a view-projection matrix
    pub fn view_projection(view: &Matrix4<f32>, projection: &Matrix4<f32>) -> Matrix4<f32> {
        projection * view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_orbit_state() {
        let mut state = OrbitState::new(0.0, 0.0, 5.0);
        state.rotate(0.1, 0.2);
        assert!((state.yaw - 0.1).abs() < 1e-6);
        assert!((state.pitch - 0.2).abs() < 1e-6);

        state.rotate(0.0, 10.0);
        assert!(state.pitch < std::f32::consts::FRAC_PI_2);
    }

    #[test]
    fn test_identity_rotation() {
        let matrix = Transform::rotation_matrix(0.0, 0.0);
        assert!((matrix - Matrix4::identity()).norm() < 1e-6);
    }

    #[test]
    fn test_eye_distance() {
        let state = OrbitState::new(1.2, 0.4, 7.0);
        let target = Point3::new(0.5, 0.0, -0.5);
        let eye = state.eye(&target);
        assert_relative_eq!((eye - target).norm(), 7.0, epsilon = 1e-4);
    }

    #[test]
    fn test_positive_pitch_looks_down() {
        let state = OrbitState::new(0.0, 0.5, 3.0);
        assert!(state.eye(&Point3::origin()).y > 0.0);
    }

    #[test]
    fn test_scale_about_pivot() {
        let pivot = Point3::new(1.0, 2.0, 3.0);
        let matrix = Transform::uniform_scale_about(&pivot, 3.0);
        let moved = matrix.transform_point(&pivot);
        assert_relative_eq!((moved - pivot).norm(), 0.0, epsilon = 1e-5);
    }
}
