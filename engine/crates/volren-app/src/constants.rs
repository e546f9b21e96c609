use glam::{Mat4, Vec3};

/// 每帧更新的 constant buffer
///
/// shader 通过其中的 descriptor index 在 CBV/SRV/UAV 表中访问其他资源
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PerFrameConstants {
    pub model: Mat4,
    /// 离屏 render target 的尺寸
    pub render_dims: [u32; 2],
    pub front_index: u32,
    pub back_index: u32,
    pub cube_index: u32,
    pub volume_index: u32,
    _padding: [u32; 2],
}

/// 各个资源在 CBV/SRV/UAV 表中的位置
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DescriptorIndices {
    pub front: u32,
    pub back: u32,
    pub cube: u32,
    pub volume: u32,
}

impl PerFrameConstants {
    pub fn new(model: Mat4, render_dims: [u32; 2], indices: DescriptorIndices) -> Self {
        Self {
            model,
            render_dims,
            front_index: indices.front,
            back_index: indices.back,
            cube_index: indices.cube,
            volume_index: indices.volume,
            _padding: [0; 2],
        }
    }
}

/// 以原点为中心旋转的单位立方体：先把 [0, 1]^3 平移到原点，再绕 y 轴旋转
pub fn cube_model_matrix(angle: f32) -> Mat4 {
    Mat4::from_rotation_y(angle) * Mat4::from_translation(Vec3::splat(-0.5))
}

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraConstants {
    pub projection: Mat4,
    pub view: Mat4,
}

impl CameraConstants {
    const FOV_Y: f32 = std::f32::consts::FRAC_PI_4;
    const Z_NEAR: f32 = 0.1;
    const Z_FAR: f32 = 100.0;

    /// 固定的相机：位于 +z 方向看向原点
    pub fn new(aspect: f32) -> Self {
        let mut projection = Mat4::perspective_rh(Self::FOV_Y, aspect, Self::Z_NEAR, Self::Z_FAR);
        // Vulkan 的 NDC y 轴向下
        projection.y_axis.y *= -1.0;

        Self {
            projection,
            view: Mat4::look_at_rh(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, Vec3::Y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_layout() {
        assert_eq!(size_of::<PerFrameConstants>(), 96);
        assert_eq!(size_of::<CameraConstants>(), 128);
        assert!(size_of::<PerFrameConstants>() <= 256);
    }

    #[test]
    fn test_indices_are_written() {
        let constants = PerFrameConstants::new(
            Mat4::IDENTITY,
            [1280, 720],
            DescriptorIndices {
                front: 3,
                back: 4,
                cube: 1,
                volume: 5,
            },
        );
        let words: &[u32] = bytemuck::cast_slice(bytemuck::bytes_of(&constants));
        assert_eq!(&words[16..22], &[1280, 720, 3, 4, 1, 5]);
    }

    #[test]
    fn test_cube_is_centered() {
        let center = cube_model_matrix(1.0).transform_point3(Vec3::splat(0.5));
        assert!(center.abs_diff_eq(Vec3::ZERO, 1e-6));
    }

    #[test]
    fn test_cube_is_visible() {
        let camera = CameraConstants::new(16.0 / 9.0);
        let view_proj = camera.projection * camera.view;
        for corner in [Vec3::ZERO, Vec3::ONE, Vec3::X, Vec3::new(0.0, 1.0, 1.0)] {
            let world = cube_model_matrix(0.3).transform_point3(corner);
            let ndc = view_proj.project_point3(world);
            assert!(ndc.x.abs() < 1.0 && ndc.y.abs() < 1.0, "{:?}", ndc);
            assert!(ndc.z > 0.0 && ndc.z < 1.0, "{:?}", ndc);
        }
    }
}
