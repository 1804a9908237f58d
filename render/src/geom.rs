//! Geometry helpers: axis-aligned boxes, planes and the view frustum.

use nalgebra_glm as glm;
use nalgebra_glm::{Mat4, Vec3, Vec4};

/// Axis-aligned bounding box.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Aabb {
        Aabb { min, max }
    }

    /// Unit cube centred on the origin.
    pub fn unit() -> Aabb {
        Aabb {
            min: Vec3::new(-0.5, -0.5, -0.5),
            max: Vec3::new(0.5, 0.5, 0.5),
        }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Aabb {
        let mut iter = points.into_iter();
        let first = iter.next().copied().unwrap_or_else(Vec3::zeros);
        let mut aabb = Aabb {
            min: first,
            max: first,
        };
        for p in iter {
            aabb.min = glm::min2(&aabb.min, p);
            aabb.max = glm::max2(&aabb.max, p);
        }
        aabb
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn grow(&mut self, p: &Vec3) {
        self.min = glm::min2(&self.min, p);
        self.max = glm::max2(&self.max, p);
    }

    /// World-space box of this local box under an affine transform,
    /// computed from the eight transformed corners (conservative).
    pub fn transformed(&self, m: &Mat4) -> Aabb {
        let corners = [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ];
        let transformed: Vec<Vec3> = corners
            .iter()
            .map(|c| (m * Vec4::new(c.x, c.y, c.z, 1.0)).xyz())
            .collect();
        Aabb::from_points(transformed.iter())
    }
}

/// Plane in constant-normal form: `dot(normal, p) + d = 0`.
#[derive(Copy, Clone, Debug)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    fn from_coefficients(v: Vec4) -> Plane {
        let normal = v.xyz();
        let len = glm::length(&normal);
        if len > 0.0 {
            Plane {
                normal: normal / len,
                d: v.w / len,
            }
        } else {
            Plane {
                normal: Vec3::new(0.0, 0.0, 1.0),
                d: v.w,
            }
        }
    }

    pub fn signed_distance(&self, p: &Vec3) -> f32 {
        glm::dot(&self.normal, p) + self.d
    }
}

/// Six view-frustum planes, normals pointing into the frustum.
#[derive(Copy, Clone, Debug)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Standard row-combination extraction from a view-projection matrix
    /// (left/right/bottom/top/near/far).
    pub fn from_view_projection(vp: &Mat4) -> Frustum {
        let row = |i: usize| -> Vec4 {
            Vec4::new(vp[(i, 0)], vp[(i, 1)], vp[(i, 2)], vp[(i, 3)])
        };
        let r0 = row(0);
        let r1 = row(1);
        let r2 = row(2);
        let r3 = row(3);
        Frustum {
            planes: [
                Plane::from_coefficients(r3 + r0), // left
                Plane::from_coefficients(r3 - r0), // right
                Plane::from_coefficients(r3 + r1), // bottom
                Plane::from_coefficients(r3 - r1), // top
                Plane::from_coefficients(r3 + r2), // near
                Plane::from_coefficients(r3 - r2), // far
            ],
        }
    }

    /// Positive-vertex AABB test: the box intersects the frustum when, for
    /// every plane, its most-positive corner w.r.t. the plane normal lies
    /// in the inside half-space.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        for plane in &self.planes {
            let positive = Vec3::new(
                if plane.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            if plane.signed_distance(&positive) < 0.0 {
                return false;
            }
        }
        true
    }

    pub fn contains_point(&self, p: &Vec3) -> bool {
        self.planes.iter().all(|plane| plane.signed_distance(p) >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_frustum() -> Frustum {
        // camera at origin looking down -Z
        let proj = glm::perspective(16.0 / 9.0, 70f32.to_radians(), 0.1, 100.0);
        let view = Mat4::identity();
        Frustum::from_view_projection(&(proj * view))
    }

    #[test]
    fn box_in_front_of_camera_intersects() {
        let f = test_frustum();
        let aabb = Aabb::new(Vec3::new(-0.5, -0.5, -5.5), Vec3::new(0.5, 0.5, -4.5));
        assert!(f.intersects_aabb(&aabb));
    }

    #[test]
    fn box_behind_camera_is_outside() {
        let f = test_frustum();
        let aabb = Aabb::new(Vec3::new(-0.5, -0.5, 4.5), Vec3::new(0.5, 0.5, 5.5));
        assert!(!f.intersects_aabb(&aabb));
    }

    #[test]
    fn box_far_to_the_side_is_outside() {
        let f = test_frustum();
        let aabb = Aabb::new(Vec3::new(199.5, -0.5, -0.5), Vec3::new(200.5, 0.5, 0.5));
        assert!(!f.intersects_aabb(&aabb));
    }

    #[test]
    fn box_past_far_plane_is_outside() {
        let f = test_frustum();
        let aabb = Aabb::new(Vec3::new(-0.5, -0.5, -205.0), Vec3::new(0.5, 0.5, -201.0));
        assert!(!f.intersects_aabb(&aabb));
    }

    #[test]
    fn transformed_aabb_covers_rotation() {
        let aabb = Aabb::unit();
        let m = glm::rotate(&Mat4::identity(), 45f32.to_radians(), &Vec3::new(0.0, 1.0, 0.0));
        let world = aabb.transformed(&m);
        let half_diag = (0.5f32 * 0.5 + 0.5 * 0.5).sqrt();
        assert!((world.max.x - half_diag).abs() < 1e-5);
        assert!((world.max.y - 0.5).abs() < 1e-6);
    }
}
