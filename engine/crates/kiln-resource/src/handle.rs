use crate::resource_type::{Asset, ResourceType};
use slotmap::new_key_type;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

// 带代际的 slot 索引，资源销毁后旧句柄不会命中复用的 slot
new_key_type! { pub struct RawResourceHandle; }

/// 带类型的资源句柄
///
/// `load` 返回后立即有效，与资源是否加载完成无关；有效期由引用计数决定。
pub struct ResourceHandle<A> {
    raw: RawResourceHandle,
    _marker: PhantomData<fn() -> A>,
}

impl<A> ResourceHandle<A> {
    #[inline]
    pub fn from_raw(raw: RawResourceHandle) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn raw(self) -> RawResourceHandle {
        self.raw
    }
}

impl<A: Asset> ResourceHandle<A> {
    #[inline]
    pub fn erase(self) -> ErasedHandle {
        ErasedHandle::new(A::TYPE, self.raw)
    }
}

impl<A> Clone for ResourceHandle<A> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<A> Copy for ResourceHandle<A> {}

impl<A> PartialEq for ResourceHandle<A> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}
impl<A> Eq for ResourceHandle<A> {}

impl<A> Hash for ResourceHandle<A> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<A: Asset> fmt::Debug for ResourceHandle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceHandle<{}>({:?})", A::TYPE, self.raw)
    }
}

/// 擦除类型后的句柄，用于跨类型的依赖记录
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ErasedHandle {
    pub ty: ResourceType,
    pub raw: RawResourceHandle,
}

impl ErasedHandle {
    #[inline]
    pub fn new(ty: ResourceType, raw: RawResourceHandle) -> Self {
        Self { ty, raw }
    }

    /// 类型匹配时还原为带类型的句柄
    pub fn downcast<A: Asset>(self) -> Option<ResourceHandle<A>> {
        (self.ty == A::TYPE).then(|| ResourceHandle::from_raw(self.raw))
    }
}

impl<A: Asset> From<ResourceHandle<A>> for ErasedHandle {
    fn from(handle: ResourceHandle<A>) -> Self {
        handle.erase()
    }
}
