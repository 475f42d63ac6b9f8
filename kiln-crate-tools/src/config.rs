use crate::resource::KilnPath;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 资源加载引擎的运行参数
///
/// 对应 `kiln.toml`，所有字段都有默认值，配置文件里只需写需要覆盖的项：
///
/// ```toml
/// asset_root = "assets"
/// io_threads = 4
/// log_level = "debug"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 资源根目录，相对路径基于工作区根目录
    pub asset_root: PathBuf,

    /// IO 线程池大小，0 表示交给 rayon 决定（通常等于 CPU 核数）
    pub io_threads: usize,

    /// 日志级别：error / warn / info / debug / trace
    pub log_level: String,

    /// 主循环最多运行多少帧，超过后放弃等待仍在加载的资源
    pub max_frames: u32,

    /// 两帧之间的间隔
    pub frame_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("assets"),
            io_threads: 0,
            log_level: "info".to_string(),
            max_frames: 600,
            frame_interval_ms: 16,
        }
    }
}

impl EngineConfig {
    /// 从 TOML 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).with_context(|| format!("读取配置文件失败: {:?}", path.as_ref()))?;

        toml::from_str(&content).with_context(|| format!("解析 TOML 配置失败: {:?}", path.as_ref()))
    }

    /// 配置文件存在时加载，否则使用默认配置
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            log::info!("config {:?} not found, use default engine config", path.as_ref());
            Ok(Self::default())
        }
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self).context("序列化配置失败")?;

        fs::write(path.as_ref(), content).with_context(|| format!("写入配置文件失败: {:?}", path.as_ref()))?;

        Ok(())
    }

    /// 资源根目录的绝对路径
    pub fn resolved_asset_root(&self) -> PathBuf {
        if self.asset_root.is_absolute() {
            self.asset_root.clone()
        } else {
            KilnPath::workspace_path().join(&self.asset_root)
        }
    }
}
