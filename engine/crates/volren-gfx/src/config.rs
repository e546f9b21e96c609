use ash::vk;
use serde::Deserialize;

/// 同时在 GPU 上执行的帧数
pub const FRAMES_IN_FLIGHT: usize = 2;

/// 期望的 swapchain image 数量，实际数量受 surface capabilities 限制
pub const NUM_BACK_BUFFERS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GfxPresentMode {
    /// 垂直同步
    #[default]
    Fifo,
    Mailbox,
    Immediate,
}

impl GfxPresentMode {
    #[inline]
    pub fn vk_present_mode(self) -> vk::PresentModeKHR {
        match self {
            GfxPresentMode::Fifo => vk::PresentModeKHR::FIFO,
            GfxPresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
            GfxPresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        }
    }
}

/// 描述符表的容量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GfxDescriptorCapacity {
    /// shader visible 的 CBV/SRV/UAV 表
    pub cbv_srv_uav: u32,
    pub rtv: u32,
    pub dsv: u32,
}

impl Default for GfxDescriptorCapacity {
    fn default() -> Self {
        Self {
            cbv_srv_uav: 1024,
            // back buffers 占用前 NUM_BACK_BUFFERS 个
            rtv: NUM_BACK_BUFFERS + 13,
            dsv: 4,
        }
    }
}

/// 构造 [`crate::gfx::Gfx`] 所需的全部参数
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GfxConfig {
    pub app_name: String,

    /// 启用 `VK_LAYER_KHRONOS_validation` 以及 debug messenger
    pub enable_validation: bool,

    pub descriptor_capacity: GfxDescriptorCapacity,

    pub present_mode: GfxPresentMode,

    /// 期望 swapchain 使用 sRGB 格式
    pub srgb_back_buffer: bool,

    pub back_buffer_count: u32,

    /// 等待 fence 的超时时间；`None` 表示无限等待
    pub fence_timeout_ns: Option<u64>,
}

impl Default for GfxConfig {
    fn default() -> Self {
        Self {
            app_name: "volren".to_string(),
            enable_validation: cfg!(debug_assertions),
            descriptor_capacity: GfxDescriptorCapacity::default(),
            present_mode: GfxPresentMode::default(),
            srgb_back_buffer: true,
            back_buffer_count: NUM_BACK_BUFFERS,
            fence_timeout_ns: None,
        }
    }
}

impl GfxConfig {
    /// 传给 `vkWaitSemaphores` 的超时时间
    #[inline]
    pub fn wait_timeout_ns(&self) -> u64 {
        self.fence_timeout_ns.unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity_has_room_for_back_buffers() {
        let config = GfxConfig::default();
        assert_eq!(config.descriptor_capacity.cbv_srv_uav, 1024);
        assert!(config.descriptor_capacity.rtv >= config.back_buffer_count);
        assert_eq!(config.wait_timeout_ns(), u64::MAX);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: GfxConfig = toml::from_str(
            r#"
            present_mode = "mailbox"
            fence_timeout_ns = 30000000000

            [descriptor_capacity]
            rtv = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.present_mode, GfxPresentMode::Mailbox);
        assert_eq!(config.wait_timeout_ns(), 30_000_000_000);
        assert_eq!(config.descriptor_capacity.rtv, 8);
        assert_eq!(config.descriptor_capacity.dsv, 4);
        assert_eq!(config.app_name, "volren");
    }
}
