//! 异步文件读取能力
//!
//! 完成事件不会以回调的形式在 IO 线程上执行，而是作为 [`FileCompletion`] 消息发回请求方的
//! channel，由 [`crate::DependencyManager::update`] 在主线程统一处理。

pub mod memory;
pub mod threaded;

pub use memory::MemoryFileSystem;
pub use threaded::ThreadedFileSystem;

use crate::error::FileError;
use crossbeam_channel::Sender;
use std::path::Path;

/// 文件系统返回的原生文件句柄
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NativeFile(u64);

impl NativeFile {
    #[inline]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// 一次异步读取的结果；`Ok` 中字节数即实际传输的字节数
#[derive(Debug)]
pub struct FileCompletion {
    pub file: NativeFile,
    pub result: Result<Vec<u8>, FileError>,
}

/// 异步文件 IO 能力
///
/// 所有方法都必须立即返回，读取结果通过 `on_complete` 送达。
pub trait FileSystem {
    /// 打开文件；路径不存在时应返回 [`FileError::NotFound`]
    fn open_async(&self, path: &Path) -> Result<NativeFile, FileError>;

    /// 打开时得到的文件大小
    fn size(&self, file: NativeFile) -> Option<u64>;

    /// 发起读取，完成后向 `on_complete` 发送一条 [`FileCompletion`]
    fn read_async(&self, file: NativeFile, size: u64, on_complete: Sender<FileCompletion>);

    fn close(&self, file: NativeFile);

    /// 放弃一个尚未完成的读取
    ///
    /// 实现可以选择仍然投递完成消息，manager 会忽略未知句柄的完成事件。
    fn cancel(&self, file: NativeFile) {
        self.close(file);
    }
}
