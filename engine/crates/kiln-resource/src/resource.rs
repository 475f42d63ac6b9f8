use crate::error::ResourceError;
use crate::file_system::NativeFile;
use crate::handle::ErasedHandle;
use std::path::{Path, PathBuf};

/// 资源加载状态机
///
/// 状态流转: Empty -> Loading -> Ready
///                           \-> Failure
/// `Ready`/`Failure` 之后只有显式的 `reload` 才会回到 `Loading`。
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ResourceState {
    /// 尚未发起加载，或句柄已失效
    #[default]
    Empty,
    /// IO 进行中，或已解析但仍在等待依赖
    Loading,
    /// 自身与所有依赖都已加载完成
    Ready,
    /// 打开/读取/解析失败，或某个依赖失败
    Failure,
}

impl ResourceState {
    /// `Ready` 与 `Failure` 为终止状态
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, ResourceState::Ready | ResourceState::Failure)
    }
}

/// 一个已加载（或正在加载）的资源实例
///
/// 只有所属的 [`crate::ResourceManager`] 会修改其中的状态与引用计数。
pub struct Resource<A> {
    pub(crate) path: PathBuf,
    pub(crate) state: ResourceState,
    pub(crate) ref_count: u32,
    pub(crate) asset: Option<A>,
    pub(crate) failure: Option<ResourceError>,

    /// 解析时请求的依赖，持有它们的引用计数
    pub(crate) dependencies: Vec<ErasedHandle>,
    /// reload 期间暂存的旧依赖，新依赖全部请求后才释放
    pub(crate) stale_dependencies: Vec<ErasedHandle>,
    /// 还未进入终止状态的依赖数
    pub(crate) pending_dependencies: u32,
    pub(crate) failed_dependency: Option<ResourceError>,

    pub(crate) native_file: Option<NativeFile>,
    pub(crate) reloading: bool,
}

impl<A> Resource<A> {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self {
            path,
            state: ResourceState::Empty,
            ref_count: 0,
            asset: None,
            failure: None,
            dependencies: Vec::new(),
            stale_dependencies: Vec::new(),
            pending_dependencies: 0,
            failed_dependency: None,
            native_file: None,
            reloading: false,
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn state(&self) -> ResourceState {
        self.state
    }

    #[inline]
    pub(crate) fn set_state(&mut self, state: ResourceState) {
        self.state = state;
    }

    #[inline]
    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state == ResourceState::Ready
    }

    /// 资源负载
    ///
    /// 解析完成后即可访问，即使此时仍在等待依赖（状态为 `Loading`）。
    /// 依赖负载是否有效之前，请先检查 [`Self::state`]。
    #[inline]
    pub fn asset(&self) -> Option<&A> {
        self.asset.as_ref()
    }

    /// 最近一次加载失败的原因
    #[inline]
    pub fn failure(&self) -> Option<&ResourceError> {
        self.failure.as_ref()
    }

    #[inline]
    pub fn dependencies(&self) -> &[ErasedHandle] {
        &self.dependencies
    }
}
