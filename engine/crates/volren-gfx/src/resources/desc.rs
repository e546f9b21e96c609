use ash::vk;
use bitflags::bitflags;

use crate::state::resource_state::GfxResourceState;

bitflags! {
    /// 资源需要创建的 view
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct GfxViewFlags: u8 {
        const CBV = 1;
        const SRV = 2;
        const UAV = 4;
        const RTV = 8;
        const DSV = 16;
    }
}

/// 资源所在的内存
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GfxResidency {
    /// 只有 GPU 可以访问
    #[default]
    Device,
    /// CPU 顺序写入，GPU 读取
    Upload,
    /// GPU 写入，CPU 读取
    Readback,
}

impl GfxResidency {
    #[inline]
    pub fn is_host_visible(self) -> bool {
        self != GfxResidency::Device
    }
}

/// 创建 buffer 的描述，只使用一次
#[derive(Clone, Debug)]
pub struct GfxBufferDesc {
    pub name: String,
    pub views: GfxViewFlags,
    pub residency: GfxResidency,
    pub initial_state: GfxResourceState,
    /// 字节数；为 0 时使用 `count * stride`
    pub size: u64,
    pub count: u32,
    /// 每个元素的字节数
    pub stride: u32,
    /// typed view 的格式，raw 或者 structured buffer 为 `UNDEFINED`
    pub format: vk::Format,
    /// raw view：按 4 字节元素访问
    pub raw: bool,
}

// new & builder
impl GfxBufferDesc {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            views: GfxViewFlags::empty(),
            residency: GfxResidency::Device,
            initial_state: GfxResourceState::Common,
            size,
            count: 0,
            stride: 0,
            format: vk::Format::UNDEFINED,
            raw: false,
        }
    }

    /// 由元素个数和 stride 决定大小
    pub fn new_elements(name: impl Into<String>, count: u32, stride: u32) -> Self {
        Self {
            count,
            stride,
            ..Self::new(name, 0)
        }
    }

    #[inline]
    pub fn views(mut self, views: GfxViewFlags) -> Self {
        self.views = views;
        self
    }
    #[inline]
    pub fn residency(mut self, residency: GfxResidency) -> Self {
        self.residency = residency;
        self
    }
    #[inline]
    pub fn initial_state(mut self, state: GfxResourceState) -> Self {
        self.initial_state = state;
        self
    }
    #[inline]
    pub fn stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        self
    }
    #[inline]
    pub fn format(mut self, format: vk::Format) -> Self {
        self.format = format;
        self
    }
    #[inline]
    pub fn raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }
}

// getters
impl GfxBufferDesc {
    /// 请求的字节数（未对齐）
    #[inline]
    pub fn requested_size(&self) -> u64 {
        if self.size > 0 { self.size } else { self.count as u64 * self.stride as u64 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GfxTextureDimension {
    #[default]
    Tex2D,
    Tex3D,
}

/// 创建 texture 的描述，只使用一次
#[derive(Clone, Debug)]
pub struct GfxTextureDesc {
    pub name: String,
    pub views: GfxViewFlags,
    pub dimension: GfxTextureDimension,
    /// 期望的格式；带有 RTV 的 sRGB 格式会被拆分为线性的资源格式 + sRGB 的 RTV
    pub format: vk::Format,
    pub initial_state: GfxResourceState,
    pub width: u32,
    pub height: u32,
    /// 3D texture 的深度
    pub depth: u32,
    pub mip_levels: u32,
}

// new & builder
impl GfxTextureDesc {
    pub fn new_2d(name: impl Into<String>, format: vk::Format, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            views: GfxViewFlags::empty(),
            dimension: GfxTextureDimension::Tex2D,
            format,
            initial_state: GfxResourceState::Undefined,
            width,
            height,
            depth: 1,
            mip_levels: 1,
        }
    }

    pub fn new_3d(name: impl Into<String>, format: vk::Format, width: u32, height: u32, depth: u32) -> Self {
        Self {
            dimension: GfxTextureDimension::Tex3D,
            depth,
            ..Self::new_2d(name, format, width, height)
        }
    }

    #[inline]
    pub fn views(mut self, views: GfxViewFlags) -> Self {
        self.views = views;
        self
    }
    #[inline]
    pub fn initial_state(mut self, state: GfxResourceState) -> Self {
        self.initial_state = state;
        self
    }
    #[inline]
    pub fn mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels;
        self
    }
}

// getters
impl GfxTextureDesc {
    #[inline]
    pub fn extent(&self) -> vk::Extent3D {
        vk::Extent3D {
            width: self.width,
            height: self.height,
            depth: self.depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_flag_values() {
        assert_eq!(GfxViewFlags::CBV.bits(), 1);
        assert_eq!(GfxViewFlags::SRV.bits(), 2);
        assert_eq!(GfxViewFlags::UAV.bits(), 4);
        assert_eq!(GfxViewFlags::RTV.bits(), 8);
        assert_eq!(GfxViewFlags::DSV.bits(), 16);
        assert_eq!((GfxViewFlags::RTV | GfxViewFlags::SRV).bits(), 10);
    }

    #[test]
    fn test_requested_size_from_elements() {
        let desc = GfxBufferDesc::new_elements("cube", 36, 12);
        assert_eq!(desc.requested_size(), 432);
        assert_eq!(GfxBufferDesc::new("cb", 80).requested_size(), 80);
    }

    #[test]
    fn test_3d_desc() {
        let desc = GfxTextureDesc::new_3d("volume", vk::Format::R8_UNORM, 256, 256, 256).views(GfxViewFlags::SRV);
        assert_eq!(desc.dimension, GfxTextureDimension::Tex3D);
        assert_eq!(desc.extent().depth, 256);
        assert_eq!(desc.initial_state, GfxResourceState::Undefined);
    }
}
