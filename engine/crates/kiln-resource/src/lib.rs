//! 资源加载与依赖解析
//!
//! - [`ResourceManager`]：单一类型资源的持有者，负责路径去重、引用计数、异步 IO 以及解析回调。
//! - [`DependencyManager`]：跨类型的注册表与中转站，负责转发依赖加载请求、记录依赖等待，
//!   并在子资源完成时通知所有等待者（菱形依赖下同一个子资源可能有多个等待者）。
//! - [`FileSystem`]：异步文件读取能力，完成事件通过 channel 回到主线程，在 `update()` 中统一处理。
//!
//! 整个子系统是单线程协作式的：`load` 总是立即返回句柄，资源状态只会在
//! [`DependencyManager::update`] 中推进。

pub mod byte_reader;
pub mod dependency_manager;
pub mod error;
pub mod file_system;
pub mod handle;
pub mod loader;
pub mod manager;
pub mod resource;
pub mod resource_type;


pub use byte_reader::ByteReader;
pub use dependency_manager::{DependencyManager, DependencyWait, ResourceInfo};
pub use error::{FileError, RegistryError, ResourceError};
pub use file_system::{FileCompletion, FileSystem, NativeFile};
pub use handle::{ErasedHandle, RawResourceHandle, ResourceHandle};
pub use loader::{AssetLoader, LoadContext};
pub use manager::{ManagerStats, ResourceManager};
pub use resource::{Resource, ResourceState};
pub use resource_type::{Asset, ResourceType};

/// tracy client 运行时才创建 span，单元测试里不会启动 tracy
macro_rules! profile_span {
    ($name:literal) => {
        tracy_client::Client::running().map(|_| tracy_client::span!($name))
    };
}
pub(crate) use profile_span;
