use std::path::PathBuf;

use serde::Deserialize;
use volren_crate_tools::{config::load_toml_or_default, resource::VolrenPath};
use volren_gfx::config::GfxConfig;

/// 默认的配置文件名，位于工作区根目录
pub const CONFIG_FILE: &str = "volren.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Volren".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// raw 体数据：每个 voxel 一个 u8
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// 相对路径基于工作区根目录
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("assets/volume_256.raw"),
            width: 256,
            height: 256,
            depth: 256,
        }
    }
}

impl VolumeConfig {
    #[inline]
    pub fn dims(&self) -> [u32; 3] {
        [self.width, self.height, self.depth]
    }

    #[inline]
    pub fn resolved_path(&self) -> PathBuf {
        VolrenPath::resolve(&self.path)
    }
}

/// 应用的全部配置，显式传给窗口与 [`volren_gfx::gfx::Gfx`]
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub volume: VolumeConfig,
    pub gfx: GfxConfig,
}

impl AppConfig {
    /// 读取工作区根目录下的 `volren.toml`，不存在时使用默认值
    pub fn load() -> anyhow::Result<Self> {
        load_toml_or_default(VolrenPath::config_path(CONFIG_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use volren_gfx::config::GfxPresentMode;

    #[test]
    fn test_default() {
        let config = AppConfig::default();
        assert_eq!(config.window.title, "Volren");
        assert_eq!(config.volume.dims(), [256, 256, 256]);
        assert_eq!(config.gfx, GfxConfig::default());
    }

    #[test]
    fn test_parse_full() {
        let config: AppConfig = toml::from_str(
            r#"
            [window]
            title = "skull"
            width = 800
            height = 600

            [volume]
            path = "assets/skull.raw"
            width = 128
            height = 128
            depth = 64

            [gfx]
            present_mode = "mailbox"
            enable_validation = false
            "#,
        )
        .unwrap();

        assert_eq!(config.window.title, "skull");
        assert_eq!((config.window.width, config.window.height), (800, 600));
        assert_eq!(config.volume.path, PathBuf::from("assets/skull.raw"));
        assert_eq!(config.volume.dims(), [128, 128, 64]);
        assert_eq!(config.gfx.present_mode, GfxPresentMode::Mailbox);
        assert!(!config.gfx.enable_validation);
    }

    #[test]
    fn test_parse_partial_keeps_defaults() {
        let config: AppConfig = toml::from_str("[volume]\ndepth = 32\n").unwrap();
        assert_eq!(config.volume.dims(), [256, 256, 32]);
        assert_eq!(config.window, WindowConfig::default());
    }

    #[test]
    fn test_relative_volume_path_is_resolved() {
        let path = VolumeConfig::default().resolved_path();
        assert!(path.starts_with(VolrenPath::workspace_path()));
        assert!(path.ends_with("assets/volume_256.raw"));
    }
}
