use std::ffi::CStr;

use ash::vk;

use crate::error::{GfxResult, VkResultExt};

pub struct GfxDebugMsger {
    pub vk_debug_utils_instance: ash::ext::debug_utils::Instance,
    pub vk_debug_utils_messenger: vk::DebugUtilsMessengerEXT,
}

impl GfxDebugMsger {
    pub fn new(vk_entry: &ash::Entry, instance: &ash::Instance) -> GfxResult<Self> {
        let loader = ash::ext::debug_utils::Instance::new(vk_entry, instance);

        let create_info = Self::debug_utils_messenger_ci();
        let debug_messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None) }
            .vk_context("create debug messenger")?;

        Ok(Self {
            vk_debug_utils_instance: loader,
            vk_debug_utils_messenger: debug_messenger,
        })
    }

    pub fn destroy(self) {
        // 触发 drop 进行销毁
    }
}

impl Drop for GfxDebugMsger {
    fn drop(&mut self) {
        unsafe {
            log::info!("destroying debug messenger");
            self.vk_debug_utils_instance.destroy_debug_utils_messenger(self.vk_debug_utils_messenger, None);
        }
    }
}

/// debug messenger 的回调函数，把 validation 的消息转发到 log
/// # Safety
unsafe extern "system" fn vk_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    let callback_data = unsafe { *p_callback_data };

    let msg = if callback_data.p_message.is_null() {
        std::borrow::Cow::from("")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };

    let format_msg = format!("[{:?}]\n{}", message_type, format_validation_message(msg.as_ref()));

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::error!("{}", format_msg),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::warn!("{}", format_msg),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => log::info!("{}", format_msg),
        _ => log::debug!("{}", format_msg),
    };

    // 只有 layer developer 才需要返回 True
    vk::FALSE
}

/// validation layer 可以配置为输出 json，此时把 MainMessage 单独拿出来放在最后，
/// 因为其中带有换行符。其他格式原样返回
fn format_validation_message(msg: &str) -> String {
    let mut json_value = serde_json::from_str::<serde_json::Value>(msg);
    let Some(obj) = json_value.as_mut().ok().and_then(|v| v.as_object_mut()) else {
        return msg.to_string();
    };

    let main_msg = obj.remove("MainMessage");
    let main_msg_str = main_msg.as_ref().and_then(|value| value.as_str()).unwrap_or_default();
    let total_msg_str = serde_json::to_string_pretty(&obj).unwrap_or_else(|_| msg.to_string());

    format!("{}\n{}\n", total_msg_str, main_msg_str)
}

// 构造过程辅助函数
impl GfxDebugMsger {
    const DEBUG_MSG_TYPE: vk::DebugUtilsMessageTypeFlagsEXT = vk::DebugUtilsMessageTypeFlagsEXT::from_raw(
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL.as_raw()
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION.as_raw()
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE.as_raw(),
    );

    const DEBUG_MSG_SEVERITY: vk::DebugUtilsMessageSeverityFlagsEXT = vk::DebugUtilsMessageSeverityFlagsEXT::from_raw(
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING.as_raw() | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR.as_raw(),
    );

    /// 用于创建 debug messenger 的结构体
    pub fn debug_utils_messenger_ci() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
        vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(Self::DEBUG_MSG_SEVERITY)
            .message_type(Self::DEBUG_MSG_TYPE)
            .pfn_user_callback(Some(vk_debug_callback))
    }
}

/// 可以设置 debug name 的 vulkan 对象
pub trait DebugType {
    fn debug_type_name() -> &'static str;
    fn vk_handle(&self) -> impl vk::Handle;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_message_is_kept() {
        assert_eq!(format_validation_message("vkCreateImage: bad usage"), "vkCreateImage: bad usage");
    }

    #[test]
    fn test_json_main_message_moves_to_end() {
        let msg = r#"{"MessageID": 42, "MainMessage": "line1\nline2"}"#;
        let formatted = format_validation_message(msg);
        assert!(formatted.ends_with("line1\nline2\n"));
        assert!(formatted.contains("\"MessageID\": 42"));
        assert!(!formatted.contains("MainMessage"));
    }
}
