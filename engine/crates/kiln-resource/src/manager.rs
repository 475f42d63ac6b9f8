use crate::byte_reader::ByteReader;
use crate::dependency_manager::{DependencyManager, ErasedManager, ResourceInfo};
use crate::error::{FileError, ResourceError};
use crate::file_system::{FileCompletion, FileSystem, NativeFile};
use crate::handle::{ErasedHandle, RawResourceHandle, ResourceHandle};
use crate::loader::{AssetLoader, LoadContext, LocalLoader};
use crate::resource::{Resource, ResourceState};
use crate::resource_type::{Asset, ResourceType};
use crossbeam_channel::{Receiver, Sender};
use slotmap::SlotMap;
use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// 某个 manager 当前的资源统计
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct ManagerStats {
    pub resources: usize,
    pub loading: usize,
    pub ready: usize,
    pub failed: usize,
    /// 累计发起的文件读取次数（包括 reload）
    pub reads_issued: u64,
}

struct InFlightRead {
    handle: RawResourceHandle,
    expected: u64,
}

/// manager 的存储部分
///
/// 与 loader 分开存放，解析回调运行时它可以作为 [`LocalLoader`] 借给 [`LoadContext`]。
struct ResourceStore<A: Asset> {
    resources: SlotMap<RawResourceHandle, Resource<A>>,

    // 路径到句柄的映射，用于去重 (避免重复加载同一文件)
    path_lookup: HashMap<PathBuf, RawResourceHandle>,

    // 正在进行的读取，key 为原生文件句柄
    in_flight: HashMap<NativeFile, InFlightRead>,
    // 打开就失败的请求，下一次 update 时按普通 IO 失败处理
    failed_opens: Vec<(RawResourceHandle, FileError)>,

    file_system: Rc<dyn FileSystem>,
    completion_sender: Sender<FileCompletion>,
    completion_receiver: Receiver<FileCompletion>,

    // 本帧进入终止状态的资源，由 DependencyManager 取走并通知等待者
    finished: Vec<RawResourceHandle>,

    reads_issued: u64,
}

impl<A: Asset> ResourceStore<A> {
    fn load(&mut self, path: &Path) -> RawResourceHandle {
        if let Some(&handle) = self.path_lookup.get(path)
            && let Some(resource) = self.resources.get_mut(handle)
        {
            resource.ref_count += 1;
            return handle;
        }

        let mut resource = Resource::new(path.to_path_buf());
        resource.ref_count = 1;
        resource.set_state(ResourceState::Loading);
        let handle = self.resources.insert(resource);
        self.path_lookup.insert(path.to_path_buf(), handle);

        log::info!("Request load {}: {:?}", A::TYPE, path);
        self.start_io(handle);

        handle
    }

    /// 打开文件并发起读取，完成消息发回本 manager 的 channel
    fn start_io(&mut self, handle: RawResourceHandle) {
        let Some(resource) = self.resources.get_mut(handle) else {
            return;
        };

        match self.file_system.open_async(&resource.path) {
            Ok(file) => {
                let expected = self.file_system.size(file).unwrap_or(0);
                resource.native_file = Some(file);
                self.in_flight.insert(file, InFlightRead { handle, expected });
                self.file_system.read_async(file, expected, self.completion_sender.clone());
                self.reads_issued += 1;
            }
            Err(e) => {
                self.failed_opens.push((handle, e));
            }
        }
    }

    fn get_mut_or_panic(&mut self, handle: RawResourceHandle, op: &str) -> &mut Resource<A> {
        match self.resources.get_mut(handle) {
            Some(resource) => resource,
            None => panic!(
                "{op} of a stale {} handle {:?}: double unload or use after destroy",
                A::TYPE,
                handle
            ),
        }
    }
}

impl<A: Asset> LocalLoader for ResourceStore<A> {
    fn load_local(&mut self, path: &Path) -> RawResourceHandle {
        self.load(path)
    }

    fn release_local(&mut self, raw: RawResourceHandle) {
        if let Some(resource) = self.resources.get_mut(raw) {
            debug_assert!(resource.ref_count > 1);
            resource.ref_count = resource.ref_count.saturating_sub(1).max(1);
        }
    }

    fn state_local(&self, raw: RawResourceHandle) -> ResourceState {
        self.resources.get(raw).map(Resource::state).unwrap_or_default()
    }
}

/// 单一类型资源的管理器
///
/// 职责:
/// 1. 按路径去重，维护引用计数。
/// 2. 通过 [`FileSystem`] 发起异步读取，在 `update` 中处理完成消息。
/// 3. 调用 [`AssetLoader`] 解析字节，跟踪解析过程中请求的依赖。
/// 4. 所有依赖完成后把资源推进到 `Ready`/`Failure`，并交给 [`DependencyManager`] 通知等待者。
pub struct ResourceManager<A: Asset> {
    loader: Box<dyn AssetLoader<A>>,
    store: ResourceStore<A>,
}
// new & init
impl<A: Asset> ResourceManager<A> {
    pub fn new(loader: impl AssetLoader<A>, file_system: Rc<dyn FileSystem>) -> Self {
        let (completion_sender, completion_receiver) = crossbeam_channel::unbounded();
        Self {
            loader: Box::new(loader),
            store: ResourceStore {
                resources: SlotMap::with_key(),
                path_lookup: HashMap::new(),
                in_flight: HashMap::new(),
                failed_opens: Vec::new(),
                file_system,
                completion_sender,
                completion_receiver,
                finished: Vec::new(),
                reads_issued: 0,
            },
        }
    }
}
// tools
impl<A: Asset> ResourceManager<A> {
    /// 请求加载资源
    ///
    /// 这是一个非阻塞调用。
    /// 1. 如果已存在同路径的资源，引用计数加一并直接返回现有 Handle，不发起 IO。
    /// 2. 如果是新请求，分配 Handle，状态设为 Loading，引用计数为 1。
    /// 3. 发起异步读取。
    /// 4. 立即返回 Handle。
    pub fn load(&mut self, path: impl AsRef<Path>) -> ResourceHandle<A> {
        let _span = crate::profile_span!("ResourceManager::load");
        ResourceHandle::from_raw(self.store.load(path.as_ref()))
    }

    /// 重新读取并解析资源，引用计数不变
    ///
    /// # Panics
    /// 资源仍处于 `Loading`，或句柄已失效。
    pub fn reload(&mut self, handle: ResourceHandle<A>) {
        self.begin_reload(handle.raw());
    }

    /// 句柄失效时返回 `None`
    pub fn get_resource(&self, handle: ResourceHandle<A>) -> Option<&Resource<A>> {
        self.store.resources.get(handle.raw())
    }

    /// 句柄失效时返回 `Empty`
    pub fn state(&self, handle: ResourceHandle<A>) -> ResourceState {
        self.store.state_local(handle.raw())
    }

    pub fn find(&self, path: impl AsRef<Path>) -> Option<ResourceHandle<A>> {
        self.store.path_lookup.get(path.as_ref()).copied().map(ResourceHandle::from_raw)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceHandle<A>, &Resource<A>)> {
        self.store
            .resources
            .iter()
            .map(|(raw, resource)| (ResourceHandle::from_raw(raw), resource))
    }

    pub fn stats(&self) -> ManagerStats {
        let mut stats = ManagerStats {
            resources: self.store.resources.len(),
            reads_issued: self.store.reads_issued,
            ..Default::default()
        };
        for resource in self.store.resources.values() {
            match resource.state() {
                ResourceState::Loading => stats.loading += 1,
                ResourceState::Ready => stats.ready += 1,
                ResourceState::Failure => stats.failed += 1,
                ResourceState::Empty => {}
            }
        }
        stats
    }
}
// 生命周期推进
impl<A: Asset> ResourceManager<A> {
    fn begin_reload(&mut self, handle: RawResourceHandle) {
        let resource = self.store.get_mut_or_panic(handle, "reload");
        assert!(
            resource.state != ResourceState::Loading,
            "reload of {} {:?} while it is still loading",
            A::TYPE,
            resource.path
        );

        log::info!("Reload {}: {:?}", A::TYPE, resource.path);
        resource.set_state(ResourceState::Loading);
        resource.reloading = true;
        resource.failure = None;
        resource.failed_dependency = None;
        // 新依赖全部请求之后才释放旧依赖
        let previous = std::mem::take(&mut resource.dependencies);
        resource.stale_dependencies.extend(previous);

        self.store.start_io(handle);
    }

    /// 引用计数减一，归零时销毁资源并返回需要级联释放的依赖
    fn release(&mut self, handle: RawResourceHandle) -> Option<Vec<ErasedHandle>> {
        let resource = self.store.get_mut_or_panic(handle, "unload");
        assert!(resource.ref_count > 0, "{} {:?} has no reference left", A::TYPE, resource.path);

        resource.ref_count -= 1;
        if resource.ref_count > 0 {
            return None;
        }

        let resource = self.store.resources.remove(handle)?;
        self.store.path_lookup.remove(&resource.path);
        if let Some(file) = resource.native_file {
            // 读取还没完成，之后即使完成消息到达也会因为找不到记录而被忽略
            self.store.in_flight.remove(&file);
            self.store.file_system.cancel(file);
            log::info!("Cancel pending read of {}: {:?}", A::TYPE, resource.path);
        }
        log::info!("Destroy {}: {:?}", A::TYPE, resource.path);

        let Resource {
            path,
            asset,
            dependencies,
            stale_dependencies,
            ..
        } = resource;
        if let Some(asset) = asset {
            self.loader.destroy_resource(&path, asset);
        }

        let mut released = dependencies;
        released.extend(stale_dependencies);
        Some(released)
    }

    fn poll(&mut self, broker: &mut DependencyManager) {
        for (handle, error) in std::mem::take(&mut self.store.failed_opens) {
            if self.store.resources.contains_key(handle) {
                self.fail(handle, error.into(), broker);
            }
        }

        let completions: Vec<FileCompletion> = self.store.completion_receiver.try_iter().collect();
        for completion in completions {
            self.on_file_completed(completion, broker);
        }
    }

    /// 文件读取完成
    fn on_file_completed(&mut self, completion: FileCompletion, broker: &mut DependencyManager) {
        let Some(read) = self.store.in_flight.remove(&completion.file) else {
            log::debug!(
                "Ignore completion of {:?} for {}: resource no longer waits for it",
                completion.file,
                A::TYPE
            );
            return;
        };
        self.store.file_system.close(completion.file);

        let Some(resource) = self.store.resources.get_mut(read.handle) else {
            return;
        };
        resource.native_file = None;

        let bytes = match completion.result {
            Ok(bytes) if (bytes.len() as u64) < read.expected => Err(FileError::ShortRead {
                path: resource.path.clone(),
                expected: read.expected,
                transferred: bytes.len() as u64,
            }),
            other => other,
        };

        match bytes {
            Ok(bytes) => {
                log::info!("IO finished for {}: {:?}, size: {}", A::TYPE, resource.path, bytes.len());
                self.parse(read.handle, ByteReader::new(bytes), broker);
            }
            Err(e) => self.fail(read.handle, e.into(), broker),
        }
    }

    fn parse(&mut self, handle: RawResourceHandle, bytes: ByteReader, broker: &mut DependencyManager) {
        let _span = crate::profile_span!("ResourceManager::parse");
        let Some(resource) = self.store.resources.get_mut(handle) else {
            return;
        };
        let path = resource.path.clone();
        let reloading = resource.reloading;
        let previous = if reloading { resource.asset.take() } else { None };

        let parent = ErasedHandle::new(A::TYPE, handle);
        let mut ctx = LoadContext::new(broker, &mut self.store, parent, &path);
        let result = if reloading {
            self.loader.reload_resource(&mut ctx, previous, bytes)
        } else {
            self.loader.resource_loaded(&mut ctx, bytes)
        };
        let outcome = ctx.finish();

        let Some(resource) = self.store.resources.get_mut(handle) else {
            return;
        };
        resource.reloading = false;
        resource.dependencies.extend(outcome.dependencies);
        broker.queue_unloads(std::mem::take(&mut resource.stale_dependencies));

        match result {
            Ok(asset) => {
                resource.asset = Some(asset);
                resource.pending_dependencies = outcome.waits.len() as u32;
                resource.failed_dependency = outcome.failed_dependency;
                broker.push_waits(outcome.waits);
                self.try_finalize(handle);
            }
            Err(source) => {
                // 已经请求的依赖保留引用，直到资源销毁或 reload
                log::error!("Failed to parse {} {:?}: {:#}", A::TYPE, path, source);
                resource.set_state(ResourceState::Failure);
                resource.failure = Some(ResourceError::Parse { path, source });
                self.store.finished.push(handle);
            }
        }
    }

    fn fail(&mut self, handle: RawResourceHandle, error: ResourceError, broker: &mut DependencyManager) {
        let Some(resource) = self.store.resources.get_mut(handle) else {
            return;
        };
        log::error!("Failed to load {} {:?}: {}", A::TYPE, resource.path, error);

        resource.native_file = None;
        resource.set_state(ResourceState::Failure);
        resource.failure = Some(error);
        if resource.reloading {
            resource.reloading = false;
            broker.queue_unloads(std::mem::take(&mut resource.stale_dependencies));
            if let Some(previous) = resource.asset.take() {
                self.loader.destroy_resource(&resource.path, previous);
            }
        }
        self.store.finished.push(handle);
    }

    /// 所有依赖都完成后进入终止状态
    fn try_finalize(&mut self, handle: RawResourceHandle) {
        let Some(resource) = self.store.resources.get_mut(handle) else {
            return;
        };
        if resource.state != ResourceState::Loading
            || resource.pending_dependencies > 0
            || resource.native_file.is_some()
            || resource.asset.is_none()
        {
            return;
        }

        match resource.failed_dependency.take() {
            Some(error) => {
                log::warn!("{} {:?} failed: {}", A::TYPE, resource.path, error);
                resource.set_state(ResourceState::Failure);
                resource.failure = Some(error);
                if let Some(asset) = resource.asset.take() {
                    self.loader.destroy_resource(&resource.path, asset);
                }
            }
            None => {
                log::info!("{} ready: {:?}", A::TYPE, resource.path);
                resource.set_state(ResourceState::Ready);
                resource.failure = None;
            }
        }
        self.store.finished.push(handle);
    }

    fn on_child_loaded(&mut self, parent: RawResourceHandle, child: ErasedHandle, child_path: &Path, state: ResourceState) {
        let Some(resource) = self.store.resources.get_mut(parent) else {
            log::debug!("Drop child notification for destroyed {} {:?}", A::TYPE, parent);
            return;
        };
        debug_assert!(resource.pending_dependencies > 0);
        resource.pending_dependencies = resource.pending_dependencies.saturating_sub(1);

        if state == ResourceState::Failure && resource.failed_dependency.is_none() {
            resource.failed_dependency = Some(ResourceError::DependencyFailed {
                path: resource.path.clone(),
                dependency: child_path.to_path_buf(),
                dependency_type: child.ty,
            });
        }
        if let Some(asset) = resource.asset.as_mut() {
            self.loader.child_resource_loaded(asset, child, state);
        }

        self.try_finalize(parent);
    }

    /// 销毁所有资源（不论引用计数），返回泄漏的资源数以及它们持有的依赖
    fn destroy_resources(&mut self) -> (usize, Vec<ErasedHandle>) {
        let leaked = self.store.resources.len();
        for file in self.store.in_flight.drain().map(|(file, _)| file) {
            self.store.file_system.cancel(file);
        }
        let mut dependencies = Vec::new();
        for (_, resource) in self.store.resources.drain() {
            log::warn!(
                "Leaked {} {:?} with {} reference(s)",
                A::TYPE,
                resource.path,
                resource.ref_count
            );
            dependencies.extend(resource.dependencies);
            dependencies.extend(resource.stale_dependencies);
            if let Some(asset) = resource.asset {
                self.loader.destroy_resource(&resource.path, asset);
            }
        }
        self.store.path_lookup.clear();
        self.store.failed_opens.clear();
        self.store.finished.clear();
        (leaked, dependencies)
    }

    fn forget_dependencies_of(&mut self, ty: ResourceType) {
        for resource in self.store.resources.values_mut() {
            resource.dependencies.retain(|dependency| dependency.ty != ty);
            resource.stale_dependencies.retain(|dependency| dependency.ty != ty);
        }
    }
}

impl<A: Asset> ErasedManager for ResourceManager<A> {
    fn resource_type(&self) -> ResourceType {
        A::TYPE
    }

    fn load_raw(&mut self, path: &Path) -> RawResourceHandle {
        self.store.load(path)
    }

    fn release_raw(&mut self, raw: RawResourceHandle) -> Option<Vec<ErasedHandle>> {
        self.release(raw)
    }

    fn reload_raw(&mut self, raw: RawResourceHandle) {
        self.begin_reload(raw)
    }

    fn state_raw(&self, raw: RawResourceHandle) -> ResourceState {
        self.store.state_local(raw)
    }

    fn info_raw(&self, raw: RawResourceHandle) -> Option<ResourceInfo<'_>> {
        self.store.resources.get(raw).map(|resource| ResourceInfo {
            ty: A::TYPE,
            path: resource.path(),
            state: resource.state(),
            ref_count: resource.ref_count(),
            dependencies: resource.dependencies(),
            failure: resource.failure(),
        })
    }

    fn poll_file_completions(&mut self, broker: &mut DependencyManager) {
        self.poll(broker)
    }

    fn child_resource_loaded(
        &mut self,
        parent: RawResourceHandle,
        child: ErasedHandle,
        child_path: &Path,
        state: ResourceState,
    ) {
        self.on_child_loaded(parent, child, child_path, state)
    }

    fn drain_finished(&mut self) -> Vec<RawResourceHandle> {
        std::mem::take(&mut self.store.finished)
    }

    fn destroy_all(&mut self) -> (usize, Vec<ErasedHandle>) {
        self.destroy_resources()
    }

    fn forget_dependencies(&mut self, ty: ResourceType) {
        self.forget_dependencies_of(ty)
    }

    fn manager_stats(&self) -> ManagerStats {
        self.stats()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
