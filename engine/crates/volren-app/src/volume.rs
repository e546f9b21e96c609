use std::path::Path;

use anyhow::Context;

/// 单通道的体数据，x 变化最快，然后是 y、z
pub struct VolumeData {
    pub dims: [u32; 3],
    pub voxels: Vec<u8>,
}

impl VolumeData {
    #[inline]
    pub fn voxel_count(dims: [u32; 3]) -> usize {
        dims[0] as usize * dims[1] as usize * dims[2] as usize
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32, z: u32) -> u8 {
        let [w, h, _] = self.dims;
        self.voxels[(z as usize * h as usize + y as usize) * w as usize + x as usize]
    }
}

/// 一次性读入整个 raw 文件，大小必须与 `dims` 一致
pub fn load_raw(path: &Path, dims: [u32; 3]) -> anyhow::Result<VolumeData> {
    let _span = tracy_client::span!("load_raw_volume");

    let voxels = std::fs::read(path).with_context(|| format!("failed to read volume: {}", path.display()))?;
    let expected = VolumeData::voxel_count(dims);
    anyhow::ensure!(
        voxels.len() == expected,
        "volume {} has {} bytes, expected {} for {}x{}x{}",
        path.display(),
        voxels.len(),
        expected,
        dims[0],
        dims[1],
        dims[2]
    );

    log::info!("loaded volume {}: {}x{}x{}", path.display(), dims[0], dims[1], dims[2]);
    Ok(VolumeData { dims, voxels })
}

/// 文件存在时读取，否则生成同样分辨率的程序化体数据
pub fn load_or_generate(path: &Path, dims: [u32; 3]) -> anyhow::Result<VolumeData> {
    if path.exists() {
        load_raw(path, dims)
    } else {
        log::warn!("volume file not found: {}, use procedural volume", path.display());
        Ok(procedural(dims))
    }
}

/// 以中心为球心的同心球壳，密度向外递减
pub fn procedural(dims: [u32; 3]) -> VolumeData {
    let _span = tracy_client::span!("procedural_volume");

    let mut voxels = Vec::with_capacity(VolumeData::voxel_count(dims));
    let extent = glam::UVec3::from_array(dims).as_vec3();
    for z in 0..dims[2] {
        for y in 0..dims[1] {
            for x in 0..dims[0] {
                // 归一化到 [-1, 1]
                let p = (glam::vec3(x as f32, y as f32, z as f32) + 0.5) / extent * 2.0 - 1.0;
                let r = p.length();
                let density = if r >= 1.0 {
                    0.0
                } else {
                    let shell = 0.5 + 0.5 * (r * 24.0).cos();
                    (1.0 - r) * (0.35 + 0.65 * shell)
                };
                voxels.push((density.clamp(0.0, 1.0) * 255.0) as u8);
            }
        }
    }

    VolumeData { dims, voxels }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("volren-volume-{}-{}.raw", tag, std::process::id()))
    }

    #[test]
    fn test_procedural_size_and_shape() {
        let volume = procedural([16, 8, 4]);
        assert_eq!(volume.voxels.len(), 16 * 8 * 4);

        // 角落在球外，中心附近密度最高
        assert_eq!(volume.get(0, 0, 0), 0);
        assert!(volume.get(8, 4, 2) > volume.get(1, 1, 1));
    }

    #[test]
    fn test_load_raw() {
        let path = temp_file("ok");
        let bytes = (0..4 * 4 * 2).map(|i| i as u8).collect::<Vec<_>>();
        std::fs::write(&path, &bytes).unwrap();

        let volume = load_raw(&path, [4, 4, 2]).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(volume.voxels, bytes);
        assert_eq!(volume.get(1, 2, 1), (16 + 2 * 4 + 1) as u8);
    }

    #[test]
    fn test_load_raw_rejects_wrong_size() {
        let path = temp_file("short");
        std::fs::write(&path, [0u8; 10]).unwrap();

        let result = load_raw(&path, [4, 4, 4]);
        std::fs::remove_file(&path).unwrap();

        let message = result.err().unwrap().to_string();
        assert!(message.contains("expected 64"), "{}", message);
    }

    #[test]
    fn test_missing_file_falls_back_to_procedural() {
        let path = temp_file("missing");
        let volume = load_or_generate(&path, [8, 8, 8]).unwrap();
        assert_eq!(volume.dims, [8, 8, 8]);
        assert_eq!(volume.voxels.len(), 512);
    }
}
