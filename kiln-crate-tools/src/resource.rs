use std::path::{Path, PathBuf};

/// 统一资源路径管理
///
/// 所有路径基于工作区根目录（通过 `CARGO_MANIFEST_DIR` 推导）。
/// 避免使用硬编码相对路径，确保在不同构建环境下路径一致。
///
/// # 使用示例
/// ```ignore
/// let material = KilnPath::assets_path("demo/brick.mtl"); // assets/demo/brick.mtl
/// let config = KilnPath::config_path();                    // kiln.toml
/// ```
pub struct KilnPath {}
// 核心路径
impl KilnPath {
    /// 获取工作区根目录
    pub fn workspace_path() -> PathBuf {
        // 从 kiln-crate-tools 到 workspace root
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn target_path() -> PathBuf {
        Self::workspace_path().join("target")
    }
}
// 根目录下
impl KilnPath {
    /// 获取 `assets/` 目录
    pub fn assets_root() -> PathBuf {
        Self::workspace_path().join("assets")
    }

    /// 获取 `assets/` 目录下的文件路径
    pub fn assets_path(filename: &str) -> PathBuf {
        Self::assets_root().join(filename)
    }

    /// 默认的引擎配置文件 `kiln.toml`
    pub fn config_path() -> PathBuf {
        Self::workspace_path().join("kiln.toml")
    }
}
