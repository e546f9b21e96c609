use std::{
    env,
    path::{Path, PathBuf},
};

/// 统一资源路径管理
///
/// 所有路径基于工作区根目录（通过 `CARGO_MANIFEST_DIR` 推导）。
/// 可以通过环境变量 `VOLREN_WORKSPACE` 覆盖，方便在安装目录下运行。
///
/// # 使用示例
/// ```ignore
/// let volume = VolrenPath::assets_path("skull_256.raw"); // assets/skull_256.raw
/// let config = VolrenPath::config_path("volren.toml");  // volren.toml
/// ```
pub struct VolrenPath {}
// 核心路径
impl VolrenPath {
    /// 获取工作区根目录
    pub fn workspace_path() -> PathBuf {
        if let Ok(root) = env::var("VOLREN_WORKSPACE") {
            return PathBuf::from(root);
        }
        // 本 crate 位于工作区根目录下
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        manifest_dir.parent().unwrap_or(manifest_dir).to_path_buf()
    }

    pub fn target_path() -> PathBuf {
        Self::workspace_path().join("target")
    }
}
// 根目录下
impl VolrenPath {
    /// 获取 `assets/` 目录下的文件路径
    pub fn assets_path(filename: &str) -> PathBuf {
        Self::workspace_path().join("assets").join(filename)
    }

    /// 配置文件直接放在工作区根目录
    pub fn config_path(filename: &str) -> PathBuf {
        Self::workspace_path().join(filename)
    }

    /// 相对路径视为相对工作区根目录，绝对路径保持不变
    pub fn resolve(path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() { path.to_path_buf() } else { Self::workspace_path().join(path) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assets_path_under_workspace() {
        let p = VolrenPath::assets_path("volume.raw");
        assert!(p.ends_with("assets/volume.raw"));
        assert!(p.starts_with(VolrenPath::workspace_path()));
    }

    #[test]
    fn test_resolve_keeps_absolute() {
        let abs = env::temp_dir().join("volren-abs.raw");
        assert_eq!(VolrenPath::resolve(&abs), abs);

        let rel = VolrenPath::resolve("assets/volume.raw");
        assert_eq!(rel, VolrenPath::workspace_path().join("assets/volume.raw"));
    }
}
