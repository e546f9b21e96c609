//! texture 上传时 staging buffer 的布局

use ash::vk;

use crate::{
    basic::align::align_up,
    error::{GfxError, GfxResult},
};

/// 单个 subresource 在 staging buffer 中的布局
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GfxSubresourceFootprint {
    /// 第一行在 staging buffer 中的位置
    pub offset: u64,
    /// staging buffer 中相邻两行的间距
    pub row_pitch: u64,
    /// 源数据中一行的字节数
    pub row_size: u64,
    pub bytes_per_texel: u32,
    pub extent: vk::Extent3D,
}

impl GfxSubresourceFootprint {
    #[inline]
    pub fn num_rows(&self) -> u32 {
        self.extent.height * self.extent.depth
    }

    #[inline]
    pub fn slice_pitch(&self) -> u64 {
        self.row_pitch * self.extent.height as u64
    }

    /// 紧密排列的源数据的字节数
    #[inline]
    pub fn source_size(&self) -> u64 {
        self.row_size * self.num_rows() as u64
    }

    /// staging buffer 至少需要的字节数
    #[inline]
    pub fn required_size(&self) -> u64 {
        self.offset + self.slice_pitch() * self.extent.depth as u64
    }

    /// 对应的 `vkCmdCopyBufferToImage` region
    pub fn buffer_image_copy(&self, aspect: vk::ImageAspectFlags) -> vk::BufferImageCopy {
        vk::BufferImageCopy {
            buffer_offset: self.offset,
            // 以 texel 为单位
            buffer_row_length: (self.row_pitch / self.bytes_per_texel as u64) as u32,
            buffer_image_height: self.extent.height,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: aspect,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            },
            image_offset: vk::Offset3D::default(),
            image_extent: self.extent,
        }
    }
}

/// 计算 mip 0 的上传布局
///
/// - 行间距按 `row_pitch_alignment` 对齐，并且是 texel 大小的整数倍
/// - 起始位置从 `base_offset` 开始按 `placement_alignment` 对齐，并且是 texel 大小的整数倍
pub fn copyable_footprint(
    extent: vk::Extent3D,
    bytes_per_texel: u32,
    base_offset: u64,
    row_pitch_alignment: u64,
    placement_alignment: u64,
) -> GfxSubresourceFootprint {
    let bpp = bytes_per_texel.max(1) as u64;
    let row_size = extent.width as u64 * bpp;

    let mut row_pitch = align_up(row_size, row_pitch_alignment);
    while row_pitch % bpp != 0 {
        row_pitch += row_pitch_alignment;
    }

    let mut offset = align_up(base_offset, placement_alignment);
    while offset % bpp != 0 {
        offset += placement_alignment;
    }

    GfxSubresourceFootprint {
        offset,
        row_pitch,
        row_size,
        bytes_per_texel: bpp as u32,
        extent,
    }
}

/// 把紧密排列的 `src` 按行拷贝到 `dst` 中 footprint 描述的位置
///
/// 返回拷贝的行数（`height * depth`）
pub fn copy_rows_into(footprint: &GfxSubresourceFootprint, src: &[u8], dst: &mut [u8]) -> GfxResult<usize> {
    let e = footprint.extent;
    if footprint.row_size == 0 || e.width == 0 || e.height == 0 || e.depth == 0 {
        return Err(GfxError::InvalidDescription(format!(
            "can not upload into an empty extent {}x{}x{}",
            e.width, e.height, e.depth
        )));
    }
    let expected = footprint.source_size() as usize;
    if src.len() != expected {
        return Err(GfxError::UploadSizeMismatch {
            expected,
            actual: src.len(),
        });
    }
    assert!(dst.len() as u64 >= footprint.required_size(), "staging buffer is too small for the footprint");

    let row_size = footprint.row_size as usize;
    let row_pitch = footprint.row_pitch as usize;
    let offset = footprint.offset as usize;

    let mut rows = 0;
    for (row_index, src_row) in src.chunks_exact(row_size).enumerate() {
        // slice 之间紧接排列，因此第 z 个 slice 的第 y 行就是第 z * height + y 行
        let dst_start = offset + row_index * row_pitch;
        dst[dst_start..dst_start + row_size].copy_from_slice(src_row);
        rows += 1;
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(width: u32, height: u32, depth: u32) -> vk::Extent3D {
        vk::Extent3D { width, height, depth }
    }

    #[test]
    fn test_volume_upload_row_count() {
        let footprint = copyable_footprint(extent(256, 256, 256), 1, 100, 256, 512);
        assert_eq!(footprint.offset, 512);
        assert_eq!(footprint.row_pitch, 256);
        assert_eq!(footprint.num_rows(), 65536);

        let src = (0..256usize * 256 * 256).map(|i| (i % 251) as u8).collect::<Vec<_>>();
        let mut dst = vec![0u8; footprint.required_size() as usize];
        let rows = copy_rows_into(&footprint, &src, &mut dst).unwrap();

        assert_eq!(rows, 65536);
        // 第一个字节落在 placement offset 上
        assert_eq!(dst[512], src[0]);
        assert_eq!(dst[511], 0);
        assert_eq!(&dst[512..512 + src.len()], &src[..]);
    }

    #[test]
    fn test_row_pitch_padding() {
        let footprint = copyable_footprint(extent(3, 2, 1), 4, 0, 256, 16);
        assert_eq!(footprint.row_size, 12);
        assert_eq!(footprint.row_pitch, 256);
        assert_eq!(footprint.required_size(), 512);

        let src = (1..=24u8).collect::<Vec<_>>();
        let mut dst = vec![0u8; 512];
        assert_eq!(copy_rows_into(&footprint, &src, &mut dst).unwrap(), 2);
        assert_eq!(&dst[0..12], &src[0..12]);
        assert!(dst[12..256].iter().all(|b| *b == 0));
        assert_eq!(&dst[256..268], &src[12..24]);

        let region = footprint.buffer_image_copy(vk::ImageAspectFlags::COLOR);
        assert_eq!(region.buffer_row_length, 64);
        assert_eq!(region.buffer_image_height, 2);
    }

    #[test]
    fn test_pitch_is_multiple_of_texel_size() {
        let footprint = copyable_footprint(extent(5, 1, 1), 12, 4, 256, 4);
        assert_eq!(footprint.row_pitch % 12, 0);
        assert_eq!(footprint.row_pitch % 256, 0);
        assert_eq!(footprint.offset % 12, 0);
    }

    #[test]
    fn test_empty_extent_is_rejected() {
        for empty in [extent(0, 4, 1), extent(4, 0, 1), extent(4, 4, 0)] {
            let footprint = copyable_footprint(empty, 1, 0, 4, 4);
            let mut dst = vec![0u8; 64];
            assert!(matches!(
                copy_rows_into(&footprint, &[], &mut dst),
                Err(GfxError::InvalidDescription(_))
            ));
        }
    }

    #[test]
    fn test_size_mismatch() {
        let footprint = copyable_footprint(extent(4, 4, 1), 1, 0, 4, 4);
        let mut dst = vec![0u8; footprint.required_size() as usize];
        let err = copy_rows_into(&footprint, &[0u8; 15], &mut dst).unwrap_err();
        assert!(matches!(
            err,
            GfxError::UploadSizeMismatch {
                expected: 16,
                actual: 15
            }
        ));
    }
}
