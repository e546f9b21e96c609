use std::ffi::{CStr, CString, c_char};

use ash::vk;
use itertools::Itertools;

use crate::{
    error::{GfxError, GfxResult, VkResultExt},
    foundation::debug_messenger::GfxDebugMsger,
};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

pub struct GfxInstance {
    /// 仅仅是函数指针，以及一个裸的 handle
    pub(crate) ash_instance: ash::Instance,

    /// 是否启用了 debug utils，决定了是否可以设置 debug name 以及 label
    pub(crate) debug_utils_enabled: bool,
}

impl GfxInstance {
    /// 设置所需的 layers 和 extensions，创建 vk instance
    ///
    /// # params
    /// - `surface_exts`：由 `ash_window::enumerate_required_extensions` 得到的 surface 相关扩展
    pub fn new(
        vk_entry: &ash::Entry,
        app_name: &str,
        enable_validation: bool,
        surface_exts: &[*const c_char],
    ) -> GfxResult<Self> {
        let app_name = CString::new(app_name).unwrap_or_else(|_| c"volren".to_owned());
        let app_info = vk::ApplicationInfo::default()
            .api_version(vk::API_VERSION_1_3) // 版本过低时，有些函数无法正确加载
            .application_name(app_name.as_c_str())
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"volren")
            .engine_version(vk::make_api_version(0, 1, 0, 0));

        let mut required_exts = surface_exts.iter().map(|ext| unsafe { CStr::from_ptr(*ext) }).collect_vec();
        if enable_validation {
            // debug messenger，debug name 以及 label
            required_exts.push(ash::ext::debug_utils::NAME);
        }
        let enabled_extensions = Self::get_extensions(vk_entry, &required_exts)?;
        log::info!(
            "instance extensions: {}",
            enabled_extensions.iter().map(|ext| format!("\n\t{:?}", unsafe { CStr::from_ptr(*ext) })).join("")
        );

        let enabled_layers = Self::get_layers(vk_entry, enable_validation)?;
        log::info!(
            "instance layers: {}",
            enabled_layers.iter().map(|layer| format!("\n\t{:?}", unsafe { CStr::from_ptr(*layer) })).join("")
        );

        let mut instance_ci = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&enabled_extensions)
            .enabled_layer_names(&enabled_layers);

        // 为 instance 的创建和销毁过程也挂上 debug messenger
        let mut debug_utils_messenger_ci = GfxDebugMsger::debug_utils_messenger_ci();
        if enable_validation {
            instance_ci = instance_ci.push_next(&mut debug_utils_messenger_ci);
        }

        let handle = unsafe { vk_entry.create_instance(&instance_ci, None) }.vk_context("create instance")?;

        Ok(Self {
            ash_instance: handle,
            debug_utils_enabled: enable_validation,
        })
    }

    pub fn destroy(self) {
        log::info!("destroying instance");
        unsafe {
            self.ash_instance.destroy_instance(None);
        }
    }
}

// getters
impl GfxInstance {
    #[inline]
    pub fn ash_instance(&self) -> &ash::Instance {
        &self.ash_instance
    }

    #[inline]
    pub fn vk_instance(&self) -> vk::Instance {
        self.ash_instance.handle()
    }
}

// 构造过程
impl GfxInstance {
    /// 检查所有 extension 是否都受支持
    fn get_extensions(vk_entry: &ash::Entry, required_exts: &[&CStr]) -> GfxResult<Vec<*const c_char>> {
        let all_ext_props =
            unsafe { vk_entry.enumerate_instance_extension_properties(None) }.vk_context("enumerate instance exts")?;

        for ext in required_exts {
            let supported = all_ext_props
                .iter()
                .any(|supported_ext| *ext == unsafe { CStr::from_ptr(supported_ext.extension_name.as_ptr()) });
            if !supported {
                return Err(GfxError::MissingExtension {
                    kind: "instance extension",
                    name: ext.to_string_lossy().into_owned(),
                });
            }
        }

        Ok(required_exts.iter().unique().map(|ext| ext.as_ptr()).collect_vec())
    }

    /// validation layer 没有安装时只给出警告
    fn get_layers(vk_entry: &ash::Entry, enable_validation: bool) -> GfxResult<Vec<*const c_char>> {
        if !enable_validation {
            return Ok(Vec::new());
        }

        let all_layer_props =
            unsafe { vk_entry.enumerate_instance_layer_properties() }.vk_context("enumerate instance layers")?;
        let is_supported = all_layer_props
            .iter()
            .any(|layer| VALIDATION_LAYER == unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) });

        if is_supported {
            Ok(vec![VALIDATION_LAYER.as_ptr()])
        } else {
            log::warn!("{:?} is not installed, continue without validation", VALIDATION_LAYER);
            Ok(Vec::new())
        }
    }
}
