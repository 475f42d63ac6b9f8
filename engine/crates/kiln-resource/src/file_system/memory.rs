use crate::error::FileError;
use crate::file_system::{FileCompletion, FileSystem, NativeFile};
use crossbeam_channel::Sender;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::rc::Rc;

struct MemoryFile {
    bytes: Vec<u8>,
    /// `size()` 报告的大小，可以大于实际数据，用来模拟读取不完整
    reported_size: u64,
}

struct QueuedRead {
    file: NativeFile,
    path: PathBuf,
    reply: Sender<FileCompletion>,
}

#[derive(Default)]
struct MemoryInner {
    files: HashMap<PathBuf, MemoryFile>,
    open_files: HashMap<NativeFile, PathBuf>,
    queued: VecDeque<QueuedRead>,
    read_counts: HashMap<PathBuf, usize>,
    next_file: u64,
}

/// 内存文件系统
///
/// 读取请求只会排队，直到调用 `complete_*` 才投递完成消息，
/// 因此可以精确控制多个资源的完成顺序。克隆得到的是同一个文件系统。
#[derive(Clone, Default)]
pub struct MemoryFileSystem {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        let bytes = bytes.into();
        let reported_size = bytes.len() as u64;
        self.inner
            .borrow_mut()
            .files
            .insert(path.into(), MemoryFile { bytes, reported_size });
    }

    /// 插入一个 `size()` 报告为 `reported_size` 的文件
    pub fn insert_with_reported_size(&self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>, reported_size: u64) {
        self.inner.borrow_mut().files.insert(
            path.into(),
            MemoryFile {
                bytes: bytes.into(),
                reported_size,
            },
        );
    }

    pub fn remove(&self, path: impl AsRef<Path>) -> bool {
        self.inner.borrow_mut().files.remove(path.as_ref()).is_some()
    }

    /// 针对 `path` 发起过的读取次数
    pub fn read_count(&self, path: impl AsRef<Path>) -> usize {
        self.inner.borrow().read_counts.get(path.as_ref()).copied().unwrap_or(0)
    }

    /// 尚未投递的读取数
    pub fn queued_reads(&self) -> usize {
        self.inner.borrow().queued.len()
    }

    pub fn is_queued(&self, path: impl AsRef<Path>) -> bool {
        self.inner.borrow().queued.iter().any(|read| read.path == path.as_ref())
    }

    /// 按请求顺序投递下一个读取
    pub fn complete_next(&self) -> bool {
        let read = self.inner.borrow_mut().queued.pop_front();
        match read {
            Some(read) => {
                self.deliver(read);
                true
            }
            None => false,
        }
    }

    /// 投递所有针对 `path` 的读取，返回投递数量
    pub fn complete_path(&self, path: impl AsRef<Path>) -> usize {
        let reads: VecDeque<QueuedRead> = {
            let mut inner = self.inner.borrow_mut();
            let (matched, remaining): (VecDeque<QueuedRead>, VecDeque<QueuedRead>) = std::mem::take(&mut inner.queued)
                .into_iter()
                .partition(|read| read.path == path.as_ref());
            inner.queued = remaining;
            matched
        };
        let count = reads.len();
        reads.into_iter().for_each(|read| self.deliver(read));
        count
    }

    /// 投递当前排队的所有读取（投递过程中新产生的读取留到下一次）
    pub fn complete_all(&self) -> usize {
        let reads: Vec<QueuedRead> = self.inner.borrow_mut().queued.drain(..).collect();
        let count = reads.len();
        reads.into_iter().for_each(|read| self.deliver(read));
        count
    }

    fn deliver(&self, read: QueuedRead) {
        let result = match self.inner.borrow().files.get(&read.path) {
            Some(file) => Ok(file.bytes.clone()),
            None => Err(FileError::NotFound(read.path.clone())),
        };
        // 接收方已经销毁时忽略
        let _ = read.reply.send(FileCompletion { file: read.file, result });
    }
}

impl FileSystem for MemoryFileSystem {
    fn open_async(&self, path: &Path) -> Result<NativeFile, FileError> {
        let mut inner = self.inner.borrow_mut();
        if !inner.files.contains_key(path) {
            return Err(FileError::NotFound(path.to_path_buf()));
        }
        inner.next_file += 1;
        let file = NativeFile::from_raw(inner.next_file);
        inner.open_files.insert(file, path.to_path_buf());
        Ok(file)
    }

    fn size(&self, file: NativeFile) -> Option<u64> {
        let inner = self.inner.borrow();
        let path = inner.open_files.get(&file)?;
        inner.files.get(path).map(|f| f.reported_size)
    }

    fn read_async(&self, file: NativeFile, _size: u64, on_complete: Sender<FileCompletion>) {
        let mut inner = self.inner.borrow_mut();
        let Some(path) = inner.open_files.get(&file).cloned() else {
            drop(inner);
            let _ = on_complete.send(FileCompletion {
                file,
                result: Err(FileError::Cancelled(PathBuf::new())),
            });
            return;
        };
        *inner.read_counts.entry(path.clone()).or_default() += 1;
        inner.queued.push_back(QueuedRead {
            file,
            path,
            reply: on_complete,
        });
    }

    fn close(&self, file: NativeFile) {
        self.inner.borrow_mut().open_files.remove(&file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_wait_for_explicit_completion() {
        let fs = MemoryFileSystem::new();
        fs.insert("a.txt", "aaa");
        fs.insert("b.txt", "bbb");
        let (tx, rx) = crossbeam_channel::unbounded();

        let a = fs.open_async(Path::new("a.txt")).unwrap();
        let b = fs.open_async(Path::new("b.txt")).unwrap();
        fs.read_async(a, 3, tx.clone());
        fs.read_async(b, 3, tx);

        assert!(rx.try_recv().is_err());
        assert_eq!(fs.queued_reads(), 2);

        assert_eq!(fs.complete_path("b.txt"), 1);
        let completion = rx.try_recv().unwrap();
        assert_eq!(completion.file, b);
        assert_eq!(completion.result.unwrap(), b"bbb");

        assert!(fs.complete_next());
        assert_eq!(rx.try_recv().unwrap().file, a);
        assert!(!fs.complete_next());
    }

    #[test]
    fn test_open_missing() {
        let fs = MemoryFileSystem::new();
        assert!(matches!(fs.open_async(Path::new("nope")), Err(FileError::NotFound(_))));
    }

    #[test]
    fn test_read_count_and_reported_size() {
        let fs = MemoryFileSystem::new();
        fs.insert_with_reported_size("big.bin", vec![0u8; 4], 16);
        let (tx, _rx) = crossbeam_channel::unbounded();

        let file = fs.open_async(Path::new("big.bin")).unwrap();
        assert_eq!(fs.size(file), Some(16));
        fs.read_async(file, 16, tx);

        assert_eq!(fs.read_count("big.bin"), 1);
        assert!(fs.is_queued("big.bin"));
    }

    #[test]
    fn test_removed_file_completes_with_not_found() {
        let fs = MemoryFileSystem::new();
        fs.insert("gone.txt", "x");
        let (tx, rx) = crossbeam_channel::unbounded();

        let file = fs.open_async(Path::new("gone.txt")).unwrap();
        fs.read_async(file, 1, tx);
        assert!(fs.remove("gone.txt"));
        fs.complete_all();

        assert!(matches!(rx.try_recv().unwrap().result, Err(FileError::NotFound(_))));
    }
}
