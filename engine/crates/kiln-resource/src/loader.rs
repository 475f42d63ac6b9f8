use crate::byte_reader::ByteReader;
use crate::dependency_manager::{DependencyManager, DependencyWait};
use crate::error::ResourceError;
use crate::handle::{ErasedHandle, RawResourceHandle, ResourceHandle};
use crate::resource::ResourceState;
use crate::resource_type::{Asset, ResourceType};
use std::path::{Component, Path, PathBuf};

/// 单一资源类型的加载钩子
///
/// 由 [`crate::ResourceManager`] 在合适的时机调用：
/// - `resource_loaded`：文件读取完成，解析字节并通过 `ctx` 请求依赖
/// - `reload_resource`：`reload` 触发的重新解析
/// - `child_resource_loaded`：某个依赖进入终止状态
/// - `destroy_resource`：引用计数归零，或资源因依赖失败而放弃负载
pub trait AssetLoader<A: Asset>: 'static {
    fn resource_loaded(&mut self, ctx: &mut LoadContext<'_>, bytes: ByteReader) -> anyhow::Result<A>;

    fn reload_resource(
        &mut self,
        ctx: &mut LoadContext<'_>,
        previous: Option<A>,
        bytes: ByteReader,
    ) -> anyhow::Result<A> {
        if let Some(previous) = previous {
            self.destroy_resource(ctx.path(), previous);
        }
        self.resource_loaded(ctx, bytes)
    }

    fn child_resource_loaded(&mut self, _asset: &mut A, _child: ErasedHandle, _state: ResourceState) {}

    fn destroy_resource(&mut self, _path: &Path, _asset: A) {}
}

/// 同类型依赖由正在解析的 manager 自己处理（它此时不在注册表里）
pub(crate) trait LocalLoader {
    fn load_local(&mut self, path: &Path) -> RawResourceHandle;
    /// 只减少引用计数，不会触发销毁
    fn release_local(&mut self, raw: RawResourceHandle);
    fn state_local(&self, raw: RawResourceHandle) -> ResourceState;
}

/// 解析回调结束后交还给 manager 的依赖信息
pub(crate) struct LoadOutcome {
    pub dependencies: Vec<ErasedHandle>,
    pub waits: Vec<DependencyWait>,
    pub failed_dependency: Option<ResourceError>,
}

/// 解析回调中的依赖请求入口
///
/// `load`/`load_resource` 立即返回子资源句柄；子资源尚未完成时会登记一条
/// [`DependencyWait`]，当前资源在所有依赖完成前保持 `Loading`。
pub struct LoadContext<'a> {
    broker: &'a mut DependencyManager,
    local: &'a mut dyn LocalLoader,
    parent: ErasedHandle,
    path: &'a Path,

    dependencies: Vec<ErasedHandle>,
    waits: Vec<DependencyWait>,
    failed_dependency: Option<ResourceError>,
}

impl<'a> LoadContext<'a> {
    pub(crate) fn new(
        broker: &'a mut DependencyManager,
        local: &'a mut dyn LocalLoader,
        parent: ErasedHandle,
        path: &'a Path,
    ) -> Self {
        Self {
            broker,
            local,
            parent,
            path,
            dependencies: Vec::new(),
            waits: Vec::new(),
            failed_dependency: None,
        }
    }

    /// 正在解析的资源路径
    pub fn path(&self) -> &Path {
        self.path
    }

    /// 正在解析的资源句柄
    pub fn handle(&self) -> ErasedHandle {
        self.parent
    }

    /// 相对路径基于当前资源所在目录
    ///
    /// 结果会消去 `.` 与 `..`，不同写法指向同一文件时能够去重。
    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        let relative = relative.as_ref();
        if relative.is_absolute() {
            return normalize_path(relative);
        }
        match self.path.parent() {
            Some(dir) => normalize_path(&dir.join(relative)),
            None => normalize_path(relative),
        }
    }

    pub fn load<C: Asset>(&mut self, path: impl AsRef<Path>) -> ResourceHandle<C> {
        ResourceHandle::from_raw(self.load_resource(C::TYPE, path.as_ref()))
    }

    /// 先 [`Self::resolve`] 再 [`Self::load`]
    pub fn load_relative<C: Asset>(&mut self, relative: impl AsRef<Path>) -> ResourceHandle<C> {
        let path = self.resolve(relative);
        self.load(path)
    }

    /// 请求一个 `child_type` 类型的依赖
    ///
    /// # Panics
    /// `child_type` 没有注册 manager 时 panic。
    pub fn load_resource(&mut self, child_type: ResourceType, path: &Path) -> RawResourceHandle {
        let (raw, state) = if child_type == self.parent.ty {
            let raw = self.local.load_local(path);
            if raw == self.parent.raw {
                // 自己依赖自己永远等不到完成
                self.local.release_local(raw);
                log::error!("{} {:?} requested itself as a dependency", child_type, self.path);
                self.failed_dependency.get_or_insert(ResourceError::SelfDependency {
                    path: self.path.to_path_buf(),
                });
                return raw;
            }
            (raw, self.local.state_local(raw))
        } else {
            self.broker.load_child(child_type, path)
        };

        let child = ErasedHandle::new(child_type, raw);
        self.dependencies.push(child);

        match state {
            ResourceState::Ready => {}
            ResourceState::Failure => {
                log::warn!("{:?} depends on {} {:?}, which already failed", self.path, child_type, path);
                self.failed_dependency.get_or_insert(ResourceError::DependencyFailed {
                    path: self.path.to_path_buf(),
                    dependency: path.to_path_buf(),
                    dependency_type: child_type,
                });
            }
            ResourceState::Loading | ResourceState::Empty => {
                self.waits.push(DependencyWait {
                    parent: self.parent,
                    child,
                    child_path: path.to_path_buf(),
                });
            }
        }

        raw
    }

    /// 到目前为止请求的依赖数
    pub fn dependency_count(&self) -> usize {
        self.dependencies.len()
    }

    pub(crate) fn finish(self) -> LoadOutcome {
        LoadOutcome {
            dependencies: self.dependencies,
            waits: self.waits,
            failed_dependency: self.failed_dependency,
        }
    }
}

/// 纯字面处理，不访问文件系统，也不解析符号链接
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(normalized.components().next_back(), Some(Component::Normal(_))) {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("a/b/../c.txt")), Path::new("a/c.txt"));
        assert_eq!(normalize_path(Path::new("./a/./b.txt")), Path::new("a/b.txt"));
        assert_eq!(normalize_path(Path::new("a/../../b.txt")), Path::new("../b.txt"));
        assert_eq!(normalize_path(Path::new("/a/../../b.txt")), Path::new("/b.txt"));
        assert_eq!(normalize_path(Path::new("c.txt")), Path::new("c.txt"));
    }
}
