/// Oriented half-space planes
use nalgebra::{Point3, Vector3};

/// A plane `normal · p + constant = 0`.
///
/// Points with a negative signed distance are on the clipped side; the kept
/// half-space is the one the normal points into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vector3<f32>,
    pub constant: f32,
}

impl Plane {
    pub fn new(normal: Vector3<f32>, constant: f32) -> Self {
        Self { normal, constant }
    }

    pub fn distance_to_point(&self, point: &Point3<f32>) -> f32 {
        self.normal.dot(&point.coords) + self.constant
    }

    /// Flip the plane to keep the opposite half-space.
    pub fn negate(self) -> Self {
        Self {
            normal: -self.normal,
            constant: -self.constant,
        }
    }

    /// The point on the plane closest to the origin.
    pub fn coplanar_point(&self) -> Point3<f32> {
        Point3::from(self.normal * -self.constant)
    }

    pub fn clips(&self, point: &Point3<f32>) -> bool {
        self.distance_to_point(point) < 0.0
    }
}

/// Whether any plane in `planes` clips `point`.
pub fn clipped_by_any(planes: &[Plane], point: &Point3<f32>) -> bool {
    planes.iter().any(|plane| plane.clips(point))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_sign() {
        // Keeps y <= 0.25
        let plane = Plane::new(Vector3::new(0.0, -1.0, 0.0), 0.25);
        assert!(!plane.clips(&Point3::new(0.0, 0.0, 0.0)));
        assert!(plane.clips(&Point3::new(0.0, 0.5, 0.0)));
        assert_eq!(plane.distance_to_point(&Point3::new(3.0, 0.25, -1.0)), 0.0);
    }

    #[test]
    fn test_negate_keeps_other_side() {
        let plane = Plane::new(Vector3::new(-1.0, 0.0, 0.0), -1.0).negate();
        assert_eq!(plane.normal, Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(plane.constant, 1.0);
        assert!(plane.clips(&Point3::new(-1.5, 0.0, 0.0)));
        assert!(!plane.clips(&Point3::new(-0.5, 0.0, 0.0)));
    }

    #[test]
    fn test_coplanar_point() {
        let plane = Plane::new(Vector3::new(0.0, -1.0, 0.0), 0.5);
        let point = plane.coplanar_point();
        assert_eq!(point, Point3::new(0.0, 0.5, 0.0));
        assert_eq!(plane.distance_to_point(&point), 0.0);
    }
}
