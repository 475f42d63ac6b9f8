use crate::error::{RegistryError, ResourceError};
use crate::handle::{ErasedHandle, RawResourceHandle, ResourceHandle};
use crate::manager::{ManagerStats, ResourceManager};
use crate::resource::{Resource, ResourceState};
use crate::resource_type::{Asset, ResourceType};
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

/// 类型擦除后的 manager 接口，供 [`DependencyManager`] 跨类型调用
pub(crate) trait ErasedManager: Any {
    fn resource_type(&self) -> ResourceType;

    fn load_raw(&mut self, path: &Path) -> RawResourceHandle;
    /// 引用计数减一；资源被销毁时返回需要继续释放的依赖
    fn release_raw(&mut self, raw: RawResourceHandle) -> Option<Vec<ErasedHandle>>;
    fn reload_raw(&mut self, raw: RawResourceHandle);

    fn state_raw(&self, raw: RawResourceHandle) -> ResourceState;
    fn info_raw(&self, raw: RawResourceHandle) -> Option<ResourceInfo<'_>>;

    /// 处理本 manager 收到的文件完成消息，解析时可以通过 `broker` 请求其他类型的资源
    fn poll_file_completions(&mut self, broker: &mut DependencyManager);
    fn child_resource_loaded(
        &mut self,
        parent: RawResourceHandle,
        child: ErasedHandle,
        child_path: &Path,
        state: ResourceState,
    );
    /// 取走上次调用以来进入终止状态的资源
    fn drain_finished(&mut self) -> Vec<RawResourceHandle>;

    /// 销毁所有资源（不论引用计数），返回泄漏的资源数以及这些资源持有的依赖
    fn destroy_all(&mut self) -> (usize, Vec<ErasedHandle>);
    /// 丢弃所有资源记录中指向 `ty` 类型的依赖句柄
    fn forget_dependencies(&mut self, ty: ResourceType);
    fn manager_stats(&self) -> ManagerStats;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// 一条依赖等待记录：`parent` 在等待 `child` 进入终止状态
///
/// 同一个 `child` 可能同时被多个 parent 等待（菱形依赖），每条记录都会被单独通知。
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DependencyWait {
    pub parent: ErasedHandle,
    pub child: ErasedHandle,
    pub child_path: PathBuf,
}

/// 不关心具体类型时查看到的资源信息（编辑器 / 调试 UI 使用）
#[derive(Debug)]
pub struct ResourceInfo<'a> {
    pub ty: ResourceType,
    pub path: &'a Path,
    pub state: ResourceState,
    pub ref_count: u32,
    pub dependencies: &'a [ErasedHandle],
    pub failure: Option<&'a ResourceError>,
}

/// 跨类型的资源注册表与依赖中转站
///
/// 唯一同时知道所有资源类型的组件。
/// 职责:
/// 1. 按 [`ResourceType`] 注册 [`ResourceManager`]。
/// 2. 转发 "类型 A 的资源需要类型 T 的资源 P" 这样的依赖请求，并记录尚未完成的 [`DependencyWait`]。
/// 3. 子资源进入终止状态时通知所有等待它的 parent。
/// 4. 提供统一的加载 / 卸载 / 查询接口，以及每帧驱动一次的 [`Self::update`]。
///
/// 显式构造、显式传递，没有全局状态；同一进程内可以存在多个互不相干的实例。
#[derive(Default)]
pub struct DependencyManager {
    // 处理某个 manager 的回调期间，它会被临时取出，对应槽位为 None
    managers: HashMap<ResourceType, Option<Box<dyn ErasedManager>>>,
    // 注册顺序，决定 update 的处理顺序和销毁顺序（逆序）
    registration_order: Vec<ResourceType>,

    pending_waits: Vec<DependencyWait>,
    unload_queue: VecDeque<ErasedHandle>,

    notifications_sent: u64,
    destroyed: bool,
}
// new & init
impl DependencyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个 manager；同一类型重复注册返回错误
    pub fn register_manager<A: Asset>(&mut self, manager: ResourceManager<A>) -> Result<(), RegistryError> {
        if self.managers.contains_key(&A::TYPE) {
            return Err(RegistryError::DuplicateManager(A::TYPE));
        }

        log::info!("Register resource manager: {}", A::TYPE);
        self.managers.insert(A::TYPE, Some(Box::new(manager)));
        self.registration_order.push(A::TYPE);
        Ok(())
    }

    /// 注销某个类型的 manager，并销毁其中仍然存活的资源
    ///
    /// 1. 被销毁资源持有的其他类型依赖会被正常释放。
    /// 2. 其他资源记录中指向该类型的依赖句柄被丢弃，之后重新注册同一类型也不会误释放新资源。
    /// 3. 仍在等待该类型资源的 parent 会收到 `Failure` 通知。
    ///
    /// 返回该类型此前是否已注册。
    pub fn unregister_manager(&mut self, ty: ResourceType) -> bool {
        let Some(mut manager) = self.managers.remove(&ty).flatten() else {
            return false;
        };
        self.registration_order.retain(|registered| *registered != ty);

        log::info!("Unregister resource manager: {}", ty);
        let (leaked, dependencies) = manager.destroy_all();
        if leaked > 0 {
            log::warn!("{} {} resource(s) were still alive when unregistered", leaked, ty);
        }
        for manager in self.managers.values_mut().flatten() {
            manager.forget_dependencies(ty);
        }

        self.pending_waits.retain(|wait| wait.parent.ty != ty);
        self.unload_queue.retain(|handle| handle.ty != ty);
        self.unload_queue
            .extend(dependencies.into_iter().filter(|handle| handle.ty != ty));
        self.flush_unloads();
        let (orphaned, remaining): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.pending_waits).into_iter().partition(|wait| wait.child.ty == ty);
        self.pending_waits = remaining;
        for wait in orphaned {
            self.notify_parent(&wait, ResourceState::Failure);
        }
        self.propagate();
        true
    }
}
// destroy
impl DependencyManager {
    pub fn destroy(mut self) {
        self.destroy_mut();
    }

    /// 按注册的逆序销毁所有 manager 中的资源
    pub fn destroy_mut(&mut self) {
        let _span = crate::profile_span!("DependencyManager::destroy");
        for ty in self.registration_order.iter().rev() {
            if let Some(Some(manager)) = self.managers.get_mut(ty) {
                // 所有 manager 都会被销毁，依赖无需再释放
                let (leaked, _) = manager.destroy_all();
                if leaked > 0 {
                    log::warn!("{} {} resource(s) were still referenced at teardown", leaked, ty);
                }
            }
        }
        self.pending_waits.clear();
        self.unload_queue.clear();
        self.destroyed = true;
    }
}
impl Drop for DependencyManager {
    fn drop(&mut self) {
        if !self.destroyed {
            self.destroy_mut();
        }
    }
}
// typed API
impl DependencyManager {
    pub fn manager<A: Asset>(&self) -> Option<&ResourceManager<A>> {
        self.managers
            .get(&A::TYPE)?
            .as_ref()?
            .as_any()
            .downcast_ref::<ResourceManager<A>>()
    }

    pub fn manager_mut<A: Asset>(&mut self) -> Option<&mut ResourceManager<A>> {
        self.managers
            .get_mut(&A::TYPE)?
            .as_mut()?
            .as_any_mut()
            .downcast_mut::<ResourceManager<A>>()
    }

    /// 请求加载资源，立即返回句柄
    ///
    /// # Panics
    /// `A` 没有注册 manager 时 panic。
    pub fn load<A: Asset>(&mut self, path: impl AsRef<Path>) -> ResourceHandle<A> {
        ResourceHandle::from_raw(self.manager_slot_mut(A::TYPE).load_raw(path.as_ref()))
    }

    /// # Panics
    /// 句柄已失效（重复卸载）。
    pub fn unload<A: Asset>(&mut self, handle: ResourceHandle<A>) {
        self.unload_resource(A::TYPE, handle.raw());
    }

    /// # Panics
    /// 资源仍处于 `Loading`，或句柄已失效。
    pub fn reload<A: Asset>(&mut self, handle: ResourceHandle<A>) {
        self.reload_resource(A::TYPE, handle.raw());
    }

    /// 资源处于 `Ready` 时返回负载
    pub fn get<A: Asset>(&self, handle: ResourceHandle<A>) -> Option<&A> {
        self.resource(handle)
            .filter(|resource| resource.is_ready())
            .and_then(Resource::asset)
    }

    /// 资源记录本身，可能仍在 `Loading`
    pub fn resource<A: Asset>(&self, handle: ResourceHandle<A>) -> Option<&Resource<A>> {
        self.manager::<A>()?.get_resource(handle)
    }

    pub fn state<A: Asset>(&self, handle: ResourceHandle<A>) -> ResourceState {
        self.state_erased(handle.erase())
    }
}
// erased API
impl DependencyManager {
    /// # Panics
    /// `ty` 没有注册 manager 时 panic。
    pub fn load_erased(&mut self, ty: ResourceType, path: impl AsRef<Path>) -> ErasedHandle {
        let raw = self.manager_slot_mut(ty).load_raw(path.as_ref());
        ErasedHandle::new(ty, raw)
    }

    /// 转发给对应类型的 manager；引用计数归零时级联释放其依赖
    ///
    /// # Panics
    /// `ty` 没有注册 manager，或句柄已失效（重复卸载）。
    pub fn unload_resource(&mut self, ty: ResourceType, handle: RawResourceHandle) {
        self.manager_slot_mut(ty);
        self.unload_queue.push_back(ErasedHandle::new(ty, handle));
        self.flush_unloads();
    }

    pub fn unload_erased(&mut self, handle: ErasedHandle) {
        self.unload_resource(handle.ty, handle.raw);
    }

    pub fn reload_resource(&mut self, ty: ResourceType, handle: RawResourceHandle) {
        self.manager_slot_mut(ty).reload_raw(handle);
    }

    pub fn state_erased(&self, handle: ErasedHandle) -> ResourceState {
        self.managers
            .get(&handle.ty)
            .and_then(Option::as_ref)
            .map(|manager| manager.state_raw(handle.raw))
            .unwrap_or_default()
    }

    /// 查看任意类型的资源，调用方需要自己检查 `state`
    pub fn get_resource(&self, ty: ResourceType, handle: RawResourceHandle) -> Option<ResourceInfo<'_>> {
        self.managers.get(&ty)?.as_ref()?.info_raw(handle)
    }

    pub fn path_erased(&self, handle: ErasedHandle) -> Option<&Path> {
        self.get_resource(handle.ty, handle.raw).map(|info| info.path)
    }
}
// Subsystem API
impl DependencyManager {
    /// 驱动加载流程 (每帧调用)
    ///
    /// 1. 按注册顺序处理每个 manager 的文件完成消息（解析、请求依赖）。
    /// 2. 反复收集进入终止状态的资源并通知等待者，直到没有新的终止事件。
    pub fn update(&mut self) {
        let _span = crate::profile_span!("DependencyManager::update");

        for ty in self.registration_order.clone() {
            let Some(mut manager) = self.take_manager(ty) else {
                continue;
            };
            manager.poll_file_completions(self);
            self.restore_manager(ty, manager);
        }
        self.flush_unloads();

        self.propagate();
    }

    /// 子资源进入终止状态，通知所有等待它的 parent
    ///
    /// 先把所有匹配的等待记录从列表中摘除，再逐个通知；通知过程中新增的等待记录不属于本批次。
    pub fn resource_loaded(&mut self, child_type: ResourceType, handle: RawResourceHandle) {
        let child = ErasedHandle::new(child_type, handle);
        let state = self.state_erased(child);
        if !state.is_terminal() {
            // 已经被卸载，或者又进入了 reload
            log::debug!("resource_loaded for {:?} in state {:?}, ignored", child, state);
            return;
        }

        let (matched, remaining): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.pending_waits).into_iter().partition(|wait| wait.child == child);
        self.pending_waits = remaining;

        for wait in &matched {
            self.notify_parent(wait, state);
        }
    }

    /// 仍在等待依赖完成的记录
    pub fn pending_waits(&self) -> &[DependencyWait] {
        &self.pending_waits
    }

    /// 累计发出的依赖完成通知数
    pub fn notifications_sent(&self) -> u64 {
        self.notifications_sent
    }

    /// 没有任何资源处于 `Loading`
    pub fn is_idle(&self) -> bool {
        self.pending_waits.is_empty()
            && self
                .managers
                .values()
                .flatten()
                .all(|manager| manager.manager_stats().loading == 0)
    }

    /// 按注册顺序返回每个 manager 的统计
    pub fn stats(&self) -> Vec<(ResourceType, ManagerStats)> {
        self.registration_order
            .iter()
            .filter_map(|ty| {
                let manager = self.managers.get(ty)?.as_ref()?;
                Some((*ty, manager.manager_stats()))
            })
            .collect()
    }

    pub fn registered_types(&self) -> &[ResourceType] {
        &self.registration_order
    }
}
// 供 manager / LoadContext 使用
impl DependencyManager {
    /// 解析回调中请求其他类型的资源
    pub(crate) fn load_child(&mut self, child_type: ResourceType, path: &Path) -> (RawResourceHandle, ResourceState) {
        let manager = self.manager_slot_mut(child_type);
        let raw = manager.load_raw(path);
        (raw, manager.state_raw(raw))
    }

    pub(crate) fn push_waits(&mut self, waits: Vec<DependencyWait>) {
        self.pending_waits.extend(waits);
    }

    /// 延迟到所有 manager 都在注册表中时再释放
    pub(crate) fn queue_unloads(&mut self, handles: Vec<ErasedHandle>) {
        self.unload_queue.extend(handles);
    }
}
// 内部实现
impl DependencyManager {
    fn manager_slot_mut(&mut self, ty: ResourceType) -> &mut Box<dyn ErasedManager> {
        match self.managers.get_mut(&ty) {
            Some(Some(manager)) => manager,
            Some(None) => panic!("resource manager for {} is busy, same-type requests must go through LoadContext", ty),
            None => panic!("no resource manager registered for {}", ty),
        }
    }

    fn take_manager(&mut self, ty: ResourceType) -> Option<Box<dyn ErasedManager>> {
        self.managers.get_mut(&ty).and_then(Option::take)
    }

    fn restore_manager(&mut self, ty: ResourceType, manager: Box<dyn ErasedManager>) {
        if let Some(slot) = self.managers.get_mut(&ty) {
            *slot = Some(manager);
        }
    }

    fn notify_parent(&mut self, wait: &DependencyWait, state: ResourceState) {
        match self.managers.get_mut(&wait.parent.ty) {
            Some(Some(parent)) => {
                parent.child_resource_loaded(wait.parent.raw, wait.child, &wait.child_path, state);
                self.notifications_sent += 1;
            }
            _ => log::warn!("Drop notification of {:?}: parent manager is not available", wait.child),
        }
    }

    /// 收集所有 manager 的终止事件并扇出通知，直到稳定
    fn propagate(&mut self) {
        loop {
            let mut finished = Vec::new();
            for ty in &self.registration_order {
                if let Some(Some(manager)) = self.managers.get_mut(ty) {
                    finished.extend(manager.drain_finished().into_iter().map(|raw| (*ty, raw)));
                }
            }
            if finished.is_empty() {
                break;
            }

            for (ty, raw) in finished {
                self.resource_loaded(ty, raw);
            }
            self.flush_unloads();
        }
    }

    fn flush_unloads(&mut self) {
        while let Some(handle) = self.unload_queue.pop_front() {
            let Some(Some(manager)) = self.managers.get_mut(&handle.ty) else {
                // 依赖所属的 manager 已经注销，资源随之销毁
                log::debug!("Skip unload of {:?}: manager is not registered", handle);
                continue;
            };
            if let Some(dependencies) = manager.release_raw(handle.raw) {
                // 已销毁的资源不再等待任何依赖
                self.pending_waits.retain(|wait| wait.parent != handle);
                self.unload_queue.extend(dependencies);
            }
        }
    }
}
