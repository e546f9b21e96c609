use ash::vk;
use thiserror::Error;

/// GFX 层的错误类型
///
/// 描述符表溢出、帧顺序错误之类的编程错误不在这里，直接 panic。
#[derive(Error, Debug)]
pub enum GfxError {
    #[error("failed to load vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("{what} failed: {result}")]
    Vulkan { what: &'static str, result: vk::Result },

    #[error("no suitable gpu: {0}")]
    NoSuitableAdapter(String),

    #[error("required {kind} is missing: {name}")]
    MissingExtension { kind: &'static str, name: String },

    #[error("timed out after {timeout_ns}ns waiting for fence value {value}")]
    FenceTimeout { value: u64, timeout_ns: u64 },

    #[error("device lost")]
    DeviceLost,

    #[error("upload size mismatch: expected {expected} bytes, got {actual}")]
    UploadSizeMismatch { expected: usize, actual: usize },

    #[error("invalid resource description: {0}")]
    InvalidDescription(String),
}

pub type GfxResult<T> = Result<T, GfxError>;

/// 为 `VkResult` 附加调用上下文
pub trait VkResultExt<T> {
    fn vk_context(self, what: &'static str) -> GfxResult<T>;
}

impl<T> VkResultExt<T> for Result<T, vk::Result> {
    #[inline]
    fn vk_context(self, what: &'static str) -> GfxResult<T> {
        self.map_err(|result| GfxError::from_vk(what, result))
    }
}

impl GfxError {
    pub fn from_vk(what: &'static str, result: vk::Result) -> Self {
        match result {
            vk::Result::ERROR_DEVICE_LOST => GfxError::DeviceLost,
            _ => GfxError::Vulkan { what, result },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_lost_is_mapped() {
        let r: Result<(), vk::Result> = Err(vk::Result::ERROR_DEVICE_LOST);
        assert!(matches!(r.vk_context("queue submit"), Err(GfxError::DeviceLost)));
    }

    #[test]
    fn test_context_is_kept() {
        let r: Result<(), vk::Result> = Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        let err = r.vk_context("create buffer").unwrap_err();
        assert!(matches!(
            err,
            GfxError::Vulkan {
                what: "create buffer",
                result: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY
            }
        ));
        assert!(err.to_string().starts_with("create buffer failed"));
    }
}
