//! 包围体数据的单位立方体，坐标同时也是 3D 纹理坐标

/// 每个顶点只有位置：3 个 f32
pub const CUBE_VERTEX_STRIDE: u32 = size_of::<[f32; 3]>() as u32;

pub const CUBE_VERTEX_COUNT: u32 = 36;

/// [0, 1]^3 的立方体，每个面两个三角形，从外部看为逆时针
#[rustfmt::skip]
pub const CUBE_VERTICES: [[f32; 3]; CUBE_VERTEX_COUNT as usize] = [
    // -x
    [0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 1.0],
    [0.0, 0.0, 0.0], [0.0, 1.0, 1.0], [0.0, 1.0, 0.0],
    // +x
    [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [1.0, 1.0, 1.0],
    [1.0, 0.0, 0.0], [1.0, 1.0, 1.0], [1.0, 0.0, 1.0],
    // -y
    [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1.0],
    [0.0, 0.0, 0.0], [1.0, 0.0, 1.0], [0.0, 0.0, 1.0],
    // +y
    [0.0, 1.0, 0.0], [0.0, 1.0, 1.0], [1.0, 1.0, 1.0],
    [0.0, 1.0, 0.0], [1.0, 1.0, 1.0], [1.0, 1.0, 0.0],
    // -z
    [0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0],
    [0.0, 0.0, 0.0], [1.0, 1.0, 0.0], [1.0, 0.0, 0.0],
    // +z
    [0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0],
    [0.0, 0.0, 1.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0],
];

#[inline]
pub fn cube_vertex_bytes() -> &'static [u8] {
    bytemuck::cast_slice(&CUBE_VERTICES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        assert_eq!(CUBE_VERTEX_STRIDE, 12);
        assert_eq!(cube_vertex_bytes().len(), 36 * 12);
    }

    #[test]
    fn test_triangles_face_outwards() {
        let center = glam::Vec3::splat(0.5);
        for triangle in CUBE_VERTICES.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|i| glam::Vec3::from_array(triangle[i]));
            let normal = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(normal.dot(centroid - center) > 0.0, "{:?}", triangle);
        }
    }

    #[test]
    fn test_every_corner_is_used() {
        for corner in 0..8u32 {
            let p = [(corner & 1) as f32, ((corner >> 1) & 1) as f32, ((corner >> 2) & 1) as f32];
            assert!(CUBE_VERTICES.contains(&p));
        }
    }
}
