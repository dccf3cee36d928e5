//! Math types
//!
//! Thin aliases over `nalgebra` for the transform math of the demo.

pub use nalgebra::{Matrix4, Point3, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4x4 matrix type, column-major like GLSL
pub type Mat4 = Matrix4<f32>;

/// Right-handed perspective projection for Vulkan clip space
///
/// Depth maps to `[0, 1]` and Y points down, so the result feeds the vertex
/// shader directly without the OpenGL-style Y flip in the shader.
pub fn perspective_vk(fovy_radians: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let f = 1.0 / (fovy_radians / 2.0).tan();
    let mut m = Mat4::zeros();
    m[(0, 0)] = f / aspect;
    m[(1, 1)] = -f;
    m[(2, 2)] = far / (near - far);
    m[(2, 3)] = (near * far) / (near - far);
    m[(3, 2)] = -1.0;
    m
}

/// Column-major bytes as uploaded to a `mat4` uniform
pub fn to_columns(m: &Mat4) -> [[f32; 4]; 4] {
    (*m).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector4;

    #[test]
    fn test_perspective_maps_near_and_far_to_vulkan_depth() {
        let proj = perspective_vk(std::f32::consts::FRAC_PI_4, 4.0 / 3.0, 0.1, 10.0);

        let near = proj * Vector4::new(0.0, 0.0, -0.1, 1.0);
        let far = proj * Vector4::new(0.0, 0.0, -10.0, 1.0);

        assert_relative_eq!(near.z / near.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_perspective_flips_y() {
        let proj = perspective_vk(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 10.0);
        let up = proj * Vector4::new(0.0, 1.0, -1.0, 1.0);
        assert!(up.y / up.w < 0.0);
    }

    #[test]
    fn test_columns_are_column_major() {
        let m = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        let columns = to_columns(&m);
        assert_eq!(columns[3], [1.0, 2.0, 3.0, 1.0]);
    }
}
