use anyhow::Context;
use kiln_assets::{Material, Model, Shader, Texture, register_builtin_managers};
use kiln_crate_tools::config::EngineConfig;
use kiln_crate_tools::init_log::{init_log_with_level, parse_level};
use kiln_resource::file_system::ThreadedFileSystem;
use kiln_resource::{Asset, DependencyManager, ErasedHandle, FileSystem, ResourceState, ResourceType};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

pub fn panic_handler(info: &std::panic::PanicHookInfo) {
    log::error!("{}", info);
}

/// 根据扩展名决定资源类型
pub fn resource_type_for_path(path: &Path) -> Option<ResourceType> {
    let ty = match path.extension()?.to_str()? {
        "model" => Model::TYPE,
        "mtl" => Material::TYPE,
        "vs" | "fs" | "cs" => Shader::TYPE,
        "png" | "tga" | "jpg" | "jpeg" => Texture::TYPE,
        _ => return None,
    };
    Some(ty)
}

/// 一次加载结束时某个根资源的状态
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub path: PathBuf,
    pub ty: ResourceType,
    pub state: ResourceState,
    pub failure: Option<String>,
}

/// 不带窗口的加载循环：请求一批根资源，每帧驱动一次 `update`，直到全部完成或超过帧数上限
pub struct AsyncLoadApp {
    config: EngineConfig,
    deps: DependencyManager,
    roots: Vec<(PathBuf, ErasedHandle)>,
}
// new & init
impl AsyncLoadApp {
    /// 进程级初始化：panic hook、日志、tracy
    pub fn init_env(config: &EngineConfig) {
        std::panic::set_hook(Box::new(panic_handler));

        init_log_with_level(parse_level(&config.log_level));

        tracy_client::Client::start();
        tracy_client::set_thread_name!("MainThread");
    }

    /// 使用磁盘文件系统，根目录与 IO 线程数来自配置
    pub fn new(config: EngineConfig) -> anyhow::Result<Self> {
        let asset_root = config.resolved_asset_root();
        log::info!("asset root: {:?}, io threads: {}", asset_root, config.io_threads);

        let file_system = ThreadedFileSystem::new(asset_root, config.io_threads)?;
        Self::with_file_system(config, Rc::new(file_system))
    }

    pub fn with_file_system(config: EngineConfig, file_system: Rc<dyn FileSystem>) -> anyhow::Result<Self> {
        let mut deps = DependencyManager::new();
        register_builtin_managers(&mut deps, file_system).context("failed to register builtin managers")?;

        Ok(Self {
            config,
            deps,
            roots: Vec::new(),
        })
    }
}
// destroy
impl AsyncLoadApp {
    pub fn destroy(mut self) {
        for (_, handle) in std::mem::take(&mut self.roots) {
            self.deps.unload_erased(handle);
        }
        self.deps.destroy();
    }
}
// tools
impl AsyncLoadApp {
    /// 请求加载一个根资源，类型由扩展名决定
    pub fn request(&mut self, path: impl Into<PathBuf>) -> anyhow::Result<ErasedHandle> {
        let path = path.into();
        let ty = resource_type_for_path(&path).with_context(|| format!("unsupported asset type: {:?}", path))?;

        let handle = self.deps.load_erased(ty, &path);
        self.roots.push((path, handle));
        Ok(handle)
    }

    /// 运行加载循环，返回实际运行的帧数
    pub fn run(&mut self) -> u32 {
        let interval = Duration::from_millis(self.config.frame_interval_ms);

        let mut frame = 0;
        while frame < self.config.max_frames {
            frame += 1;
            self.deps.update();
            if let Some(client) = tracy_client::Client::running() {
                client.frame_mark();
            }

            if self.deps.is_idle() {
                log::info!("all resources finished after {} frame(s)", frame);
                return frame;
            }
            std::thread::sleep(interval);
        }

        log::warn!(
            "gave up after {} frame(s), {} dependency wait(s) still pending",
            frame,
            self.deps.pending_waits().len()
        );
        frame
    }

    pub fn report(&self) -> Vec<LoadReport> {
        self.roots
            .iter()
            .map(|(path, handle)| {
                let info = self.deps.get_resource(handle.ty, handle.raw);
                LoadReport {
                    path: path.clone(),
                    ty: handle.ty,
                    state: info.as_ref().map_or(ResourceState::Empty, |info| info.state),
                    failure: info.and_then(|info| info.failure).map(|e| e.to_string()),
                }
            })
            .collect()
    }

    /// 打印根资源状态与各类型的统计
    pub fn log_summary(&self) {
        for report in self.report() {
            match &report.failure {
                Some(failure) => log::error!("{} {:?}: {:?} ({})", report.ty, report.path, report.state, failure),
                None => log::info!("{} {:?}: {:?}", report.ty, report.path, report.state),
            }
        }
        for (ty, stats) in self.deps.stats() {
            log::info!(
                "{}: {} resource(s), {} ready, {} failed, {} loading, {} read(s)",
                ty,
                stats.resources,
                stats.ready,
                stats.failed,
                stats.loading,
                stats.reads_issued
            );
        }
    }

    #[inline]
    pub fn dependency_manager(&self) -> &DependencyManager {
        &self.deps
    }
}
