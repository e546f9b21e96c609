use ash::vk;

use crate::resources::desc::GfxViewFlags;

/// sRGB 格式对应的线性格式
pub fn linear_format(format: vk::Format) -> Option<vk::Format> {
    let linear = match format {
        vk::Format::R8_SRGB => vk::Format::R8_UNORM,
        vk::Format::R8G8_SRGB => vk::Format::R8G8_UNORM,
        vk::Format::R8G8B8A8_SRGB => vk::Format::R8G8B8A8_UNORM,
        vk::Format::B8G8R8A8_SRGB => vk::Format::B8G8R8A8_UNORM,
        vk::Format::A8B8G8R8_SRGB_PACK32 => vk::Format::A8B8G8R8_UNORM_PACK32,
        _ => return None,
    };
    Some(linear)
}

#[inline]
pub fn is_depth_format(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D16_UNORM
            | vk::Format::X8_D24_UNORM_PACK32
            | vk::Format::D32_SFLOAT
            | vk::Format::D16_UNORM_S8_UINT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D32_SFLOAT_S8_UINT
    )
}

#[inline]
pub fn has_stencil(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT
    )
}

/// 整个资源的 aspect，barrier 使用
pub fn aspect_flags(format: vk::Format) -> vk::ImageAspectFlags {
    if has_stencil(format) {
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    } else if is_depth_format(format) {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

/// 非压缩格式每个 texel 的字节数
pub fn bytes_per_texel(format: vk::Format) -> Option<u32> {
    let bytes = match format {
        vk::Format::R8_UNORM | vk::Format::R8_SNORM | vk::Format::R8_UINT | vk::Format::R8_SRGB => 1,
        vk::Format::R8G8_UNORM | vk::Format::R8G8_SRGB | vk::Format::R16_SFLOAT | vk::Format::R16_UNORM => 2,
        vk::Format::D16_UNORM => 2,
        vk::Format::R8G8B8A8_UNORM
        | vk::Format::R8G8B8A8_SRGB
        | vk::Format::B8G8R8A8_UNORM
        | vk::Format::B8G8R8A8_SRGB
        | vk::Format::A8B8G8R8_UNORM_PACK32
        | vk::Format::A8B8G8R8_SRGB_PACK32
        | vk::Format::R16G16_SFLOAT
        | vk::Format::R32_SFLOAT
        | vk::Format::R32_UINT
        | vk::Format::D32_SFLOAT
        | vk::Format::D24_UNORM_S8_UINT
        | vk::Format::X8_D24_UNORM_PACK32 => 4,
        vk::Format::R16G16B16A16_SFLOAT | vk::Format::R32G32_SFLOAT => 8,
        vk::Format::R32G32B32_SFLOAT => 12,
        vk::Format::R32G32B32A32_SFLOAT => 16,
        _ => return None,
    };
    Some(bytes)
}

/// texture 的资源格式与各个 view 的格式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GfxTextureFormats {
    /// 创建 image 时使用的格式
    pub resource: vk::Format,
    pub rtv: vk::Format,
    /// SRV、UAV 以及 DSV
    pub other_views: vk::Format,
    /// view 的格式与资源格式不同，需要 `MUTABLE_FORMAT`
    pub mutable: bool,
}

/// 带有 RTV 的 sRGB texture：资源与 SRV/UAV 使用线性格式，只有 RTV 是 sRGB
pub fn texture_formats(format: vk::Format, views: GfxViewFlags) -> GfxTextureFormats {
    match linear_format(format) {
        Some(linear) if views.contains(GfxViewFlags::RTV) => GfxTextureFormats {
            resource: linear,
            rtv: format,
            other_views: linear,
            mutable: true,
        },
        _ => GfxTextureFormats {
            resource: format,
            rtv: format,
            other_views: format,
            mutable: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srgb_render_target_is_split() {
        let formats = texture_formats(vk::Format::R8G8B8A8_SRGB, GfxViewFlags::RTV | GfxViewFlags::SRV);
        assert_eq!(formats.resource, vk::Format::R8G8B8A8_UNORM);
        assert_eq!(formats.rtv, vk::Format::R8G8B8A8_SRGB);
        assert_eq!(formats.other_views, vk::Format::R8G8B8A8_UNORM);
        assert!(formats.mutable);
    }

    #[test]
    fn test_srgb_without_rtv_is_kept() {
        let formats = texture_formats(vk::Format::R8G8B8A8_SRGB, GfxViewFlags::SRV);
        assert_eq!(formats.resource, vk::Format::R8G8B8A8_SRGB);
        assert!(!formats.mutable);
    }

    #[test]
    fn test_linear_render_target_is_kept() {
        let formats = texture_formats(vk::Format::R16G16B16A16_SFLOAT, GfxViewFlags::RTV);
        assert_eq!(formats.resource, formats.rtv);
        assert!(!formats.mutable);
    }

    #[test]
    fn test_aspect_flags() {
        assert_eq!(aspect_flags(vk::Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
        assert_eq!(
            aspect_flags(vk::Format::D24_UNORM_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(aspect_flags(vk::Format::R8_UNORM), vk::ImageAspectFlags::COLOR);
    }

    #[test]
    fn test_bytes_per_texel() {
        assert_eq!(bytes_per_texel(vk::Format::R8_UNORM), Some(1));
        assert_eq!(bytes_per_texel(vk::Format::R8G8B8A8_SRGB), Some(4));
        assert_eq!(bytes_per_texel(vk::Format::BC7_UNORM_BLOCK), None);
    }
}
